// Declarative-regex record parsing shared by every record kind
//
// A kind supplies an anchored pattern whose named groups become field names,
// a cast table, a construct hook and a closed table of derived attributes.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use crate::backend::Family;
use crate::error::{IpError, IpResult};
use crate::net::{IpNetwork, MacAddr};
use crate::table::Retriever;
use crate::value::{Cast, Value};

/// Captured text per field name. Every named group of the pattern is present,
/// `None` when its group did not participate in the match.
pub type RawFields = BTreeMap<String, Option<String>>;

/// Typed fields of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, Option<Value>>);

impl Fields {
    /// Apply `casts` to the non-null captures; other captures stay strings.
    pub fn cast(raw: RawFields, casts: &[(&str, Cast)]) -> IpResult<Fields> {
        let mut fields = BTreeMap::new();
        for (name, text) in raw {
            let value = match text {
                None => None,
                Some(text) => {
                    let cast = casts
                        .iter()
                        .find(|(field, _)| *field == name)
                        .map(|(_, cast)| *cast)
                        .unwrap_or(Cast::Str);
                    Some(cast.apply(&name, &text)?)
                }
            };
            fields.insert(name, value);
        }
        Ok(Fields(fields))
    }

    /// `None` when the kind has no such field; `Some(None)` when it is null.
    pub fn get(&self, name: &str) -> Option<&Option<Value>> {
        self.0.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.0.get(name).and_then(Option::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<u64> {
        self.value(name).and_then(Value::as_int)
    }

    pub fn network(&self, name: &str) -> Option<IpNetwork> {
        self.value(name).and_then(Value::as_network)
    }

    pub fn addr(&self, name: &str) -> Option<IpAddr> {
        self.value(name).and_then(Value::as_addr)
    }

    pub fn mac(&self, name: &str) -> Option<MacAddr> {
        self.value(name).and_then(Value::as_mac)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Non-null fields as `name=value`, sorted by name.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| format!("{}={}", k, v)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What a construct hook knows beyond the matched line.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Family the line was retrieved under.
    pub family: Family,
    /// Argument list of the query that produced the line.
    pub args: &'a [String],
}

impl<'a> ParseContext<'a> {
    pub fn new(family: Family, args: &'a [String]) -> Self {
        ParseContext { family, args }
    }

    /// Value following `keyword` in the query arguments.
    pub fn arg_after(&self, keyword: &str) -> Option<&'a str> {
        let idx = self.args.iter().position(|a| a == keyword)?;
        self.args.get(idx + 1).map(String::as_str)
    }
}

/// A kind of record parsed from one line of `ip` output.
pub trait Record: Clone + fmt::Debug + Serialize + Sized {
    /// Name used in errors and canonical rendering.
    const KIND: &'static str;

    /// Pattern anchored at line start; named groups become fields.
    fn pattern() -> &'static Regex;

    /// Post-process the captures, resolve the subtype and apply casts.
    fn construct(raw: RawFields, line: &str, cx: &ParseContext<'_>) -> IpResult<Self>;

    fn fields(&self) -> &Fields;

    /// Closed table of synthesized attributes. `None` means the name is not
    /// one of them.
    fn derived(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Produce the raw output lines for a `show` query.
    fn retrieve(source: &Retriever<'_>, args: &[String]) -> IpResult<Vec<String>>;

    /// Look up a stored field, then a derived attribute.
    fn attr(&self, name: &str) -> IpResult<Option<Value>> {
        if let Some(value) = self.fields().get(name) {
            return Ok(value.clone());
        }
        self.derived(name)
            .map(Some)
            .ok_or_else(|| IpError::NoSuchAttribute {
                kind: Self::KIND,
                name: name.to_string(),
            })
    }

    /// Rendering that defines record equality.
    fn canonical(&self) -> String {
        format!("{} {}", Self::KIND, self.fields().render())
    }

    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Match `line` against the kind's pattern and collect every named group.
pub fn capture<R: Record>(line: &str) -> IpResult<RawFields> {
    let pattern = R::pattern();
    let caps = pattern.captures(line).ok_or_else(|| IpError::NoMatch {
        kind: R::KIND,
        line: line.to_string(),
    })?;

    Ok(pattern
        .capture_names()
        .flatten()
        .map(|name| {
            let text = caps.name(name).map(|m| m.as_str().to_string());
            (name.to_string(), text)
        })
        .collect())
}

/// Parse one output line into a fully typed record.
pub fn parse_line<R: Record>(line: &str, cx: &ParseContext<'_>) -> IpResult<R> {
    let raw = capture::<R>(line)?;
    R::construct(raw, line, cx)
}

/// Build a record from explicit field text, as if those groups had matched.
pub fn from_raw<R: Record>(pairs: &[(&str, &str)], cx: &ParseContext<'_>) -> IpResult<R> {
    let mut raw: RawFields = R::pattern()
        .capture_names()
        .flatten()
        .map(|name| (name.to_string(), None))
        .collect();
    for (name, text) in pairs {
        raw.insert(name.to_string(), Some(text.to_string()));
    }
    R::construct(raw, "", cx)
}

/// Equality, display and hashing shared by the record kinds.
///
/// Equality compares canonical renderings. The hash covers only `$hash`, so
/// records sharing that field land in the same bucket, but a hash set still
/// keeps them apart unless their canonical renderings match.
macro_rules! record_identity {
    ($ty:ty, |$rec:ident| $hash:expr) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                $crate::record::Record::canonical(self) == $crate::record::Record::canonical(other)
            }
        }

        impl Eq for $ty {}

        impl std::hash::Hash for $ty {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                let $rec = self;
                std::hash::Hash::hash(&$hash, state);
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&$crate::record::Record::canonical(self))
            }
        }
    };
}

pub(crate) use record_identity;
