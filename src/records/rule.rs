// Policy routing rules, from `ip -4 rule show` and `ip -6 rule show`

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::backend::{Family, Object, Verb};
use crate::command::CommandArgs;
use crate::error::IpResult;
use crate::net::{self, IpNetwork};
use crate::record::{Fields, ParseContext, RawFields, Record, record_identity};
use crate::table::{Retriever, Table};
use crate::value::Cast;

static RULE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?P<pref>\d+):\s+",
        r"(?:from (?P<fromprefix>\S+)\s*)?",
        r"(?:to (?P<toprefix>\S+)\s*)?",
        r"(?:fwmark (?P<fwmark>[^\s/]+)(?:/(?P<fwmask>\S+))?\s*)?",
        r"(?:iif (?P<iif>\S+)\s*)?",
        r"(?:oif (?P<oif>\S+)\s*)?",
        r"(?:lookup (?P<lookup>\S+))?",
    ))
    .expect("Invalid rule pattern")
});

const RULE_CASTS: &[(&str, Cast)] = &[
    ("pref", Cast::Int),
    ("fromprefix", Cast::Network),
    ("toprefix", Cast::Network),
    ("fwmark", Cast::Int),
    ("fwmask", Cast::Int),
];

/// Keyword order for `ip rule add|del`.
const RULE_ORDER: &[&str] = &["from", "fwmark", "lookup", "pref"];

/// Prefix fields whose `all`/`any` tokens mean the whole family.
const PREFIX_FIELDS: &[&str] = &["fromprefix", "toprefix"];

#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    #[serde(flatten)]
    fields: Fields,
}

record_identity!(Rule, |rule| rule.pref());

impl Record for Rule {
    const KIND: &'static str = "rule";

    fn pattern() -> &'static Regex {
        &RULE_RE
    }

    fn construct(mut raw: RawFields, _line: &str, cx: &ParseContext<'_>) -> IpResult<Self> {
        for field in PREFIX_FIELDS {
            if let Some(slot) = raw.get_mut(*field) {
                if matches!(slot.as_deref(), Some("all") | Some("any")) {
                    *slot = Some(net::zero(cx.family).to_string());
                }
            }
        }

        Ok(Rule {
            fields: Fields::cast(raw, RULE_CASTS)?,
        })
    }

    fn fields(&self) -> &Fields {
        &self.fields
    }

    fn retrieve(source: &Retriever<'_>, args: &[String]) -> IpResult<Vec<String>> {
        source.show(source.family(), Object::Rule, args)
    }
}

impl Rule {
    pub fn pref(&self) -> Option<u64> {
        self.fields.int("pref")
    }

    pub fn from_prefix(&self) -> Option<IpNetwork> {
        self.fields.network("fromprefix")
    }

    pub fn to_prefix(&self) -> Option<IpNetwork> {
        self.fields.network("toprefix")
    }

    pub fn fwmark(&self) -> Option<u64> {
        self.fields.int("fwmark")
    }

    pub fn fwmask(&self) -> Option<u64> {
        self.fields.int("fwmask")
    }

    pub fn iif(&self) -> Option<&str> {
        self.fields.str("iif")
    }

    pub fn oif(&self) -> Option<&str> {
        self.fields.str("oif")
    }

    /// Routing table the rule selects.
    pub fn lookup(&self) -> Option<&str> {
        self.fields.str("lookup")
    }

    /// Arguments selecting exactly this rule.
    ///
    /// Field names lose their `prefix` suffix (`fromprefix` becomes `from`)
    /// and the mark is rejoined with its mask.
    pub fn selector(&self) -> CommandArgs {
        let mut args = CommandArgs::new();
        for (name, value) in self.fields.iter() {
            let Some(value) = value else {
                continue;
            };
            match name {
                "fwmask" => {}
                "fwmark" => {
                    args = match self.fwmask() {
                        Some(mask) => args.kw("fwmark", format!("{}/{}", value, mask)),
                        None => args.kw("fwmark", value),
                    };
                }
                _ => args = args.kw(name.replace("prefix", ""), value),
            }
        }
        args
    }
}

impl Table<'_, Rule> {
    /// `ip rule add from <prefix> <args>`; `any` selects the whole family.
    pub fn add(&self, fromprefix: &str, args: &CommandArgs) -> IpResult<()> {
        let from = match fromprefix {
            "any" | "all" => net::zero(self.family()).to_string(),
            prefix => prefix.to_string(),
        };
        let argv = args.clone().kw("from", from).build(RULE_ORDER);
        self.mutate(self.family(), Object::Rule, Verb::Add, argv)
    }

    /// `ip rule del` with every field of a listed rule.
    pub fn delete(&self, rule: &Rule) -> IpResult<()> {
        let argv = rule.selector().build(RULE_ORDER);
        self.mutate(self.family(), Object::Rule, Verb::Delete, argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::IpRoute;
    use crate::error::IpError;
    use crate::record::{from_raw, parse_line};
    use crate::testing::MockBackend;
    use crate::value::Value;
    use std::collections::HashSet;
    use std::hash::{DefaultHasher, Hash, Hasher};

    fn parse(line: &str) -> IpResult<Rule> {
        parse_line::<Rule>(line, &ParseContext::new(Family::V4, &[]))
    }

    #[test]
    fn test_main_rule() {
        let rule = parse("32766:\tfrom all lookup main").unwrap();
        assert_eq!(rule.pref(), Some(32766));
        assert_eq!(rule.from_prefix(), Some(net::zero(Family::V4)));
        assert_eq!(rule.lookup(), Some("main"));
        assert_eq!(rule.fwmark(), None);
    }

    #[test]
    fn test_v6_all_prefix() {
        let rule =
            parse_line::<Rule>("0:\tfrom all lookup local", &ParseContext::new(Family::V6, &[]))
                .unwrap();
        assert_eq!(rule.from_prefix(), Some(net::zero(Family::V6)));
    }

    #[test]
    fn test_dotted_prefixes_and_mark() {
        let rule = parse("100:\tfrom 10.0.0.0/8 to 192.168.0.0/16 fwmark 0x1/0xff iif eth0 lookup 100").unwrap();
        assert_eq!(rule.from_prefix(), Some("10.0.0.0/8".parse().unwrap()));
        assert_eq!(rule.to_prefix(), Some("192.168.0.0/16".parse().unwrap()));
        assert_eq!(rule.fwmark(), Some(1));
        assert_eq!(rule.fwmask(), Some(255));
        assert_eq!(rule.iif(), Some("eth0"));
        assert_eq!(rule.lookup(), Some("100"));
    }

    #[test]
    fn test_decimal_fwmark() {
        let rule = parse("200:\tfrom all fwmark 42 lookup 7").unwrap();
        assert_eq!(rule.fwmark(), Some(42));
        assert_eq!(rule.attr("fwmark").unwrap(), Some(Value::Int(42)));
    }

    #[test]
    fn test_bad_fwmark_is_cast_failure() {
        let result = parse("200:\tfrom all fwmark 0xzz lookup 7");
        assert!(matches!(result, Err(IpError::CastFailure { ref field, .. }) if field == "fwmark"));
    }

    #[test]
    fn test_unmatched_line() {
        assert!(matches!(parse("from all lookup main"), Err(IpError::NoMatch { kind: "rule", .. })));
        assert!(matches!(parse("main:\tfrom all"), Err(IpError::NoMatch { .. })));
        assert!(matches!(parse(""), Err(IpError::NoMatch { .. })));
    }

    #[test]
    fn test_from_raw_matches_parsed_line() {
        let cx = ParseContext::new(Family::V4, &[]);
        let built: Rule = from_raw(
            &[
                ("pref", "100"),
                ("fromprefix", "all"),
                ("fwmark", "0x1"),
                ("fwmask", "0xff"),
                ("lookup", "100"),
            ],
            &cx,
        )
        .unwrap();
        let parsed = parse("100:\tfrom all fwmark 0x1/0xff lookup 100").unwrap();
        assert_eq!(built, parsed);
        assert_eq!(built.from_prefix(), Some(net::zero(Family::V4)));
        assert_eq!(built.fwmask(), Some(255));
    }

    #[test]
    fn test_no_derived_attributes() {
        let rule = parse("32766:\tfrom all lookup main").unwrap();
        assert!(matches!(
            rule.attr("is_main"),
            Err(IpError::NoSuchAttribute { kind: "rule", .. })
        ));
    }

    #[test]
    fn test_same_pref_shares_hash() {
        let first = parse("1000:\tfrom 10.0.0.0/8 lookup 10").unwrap();
        let second = parse("1000:\tfrom 172.16.0.0/12 lookup 20").unwrap();
        assert_ne!(first, second);

        // hashing covers only the preference; equality still tells them apart
        assert_eq!(hash_of(&first), hash_of(&second));
        let set: HashSet<Rule> = [first.clone(), second, first].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    fn hash_of(record: &Rule) -> u64 {
        let mut hasher = DefaultHasher::new();
        record.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_add_any_prefix() {
        let ip = IpRoute::with_backend(MockBackend::new());
        let args = CommandArgs::new().kw("pref", 1000).kw("lookup", 10);
        ip.rules4().add("any", &args).unwrap();

        let call = ip.backend().last_mutation().unwrap();
        assert_eq!(call.to_string(), "-4 rule add from 0.0.0.0/0 lookup 10 pref 1000");

        ip.rules6().add("2001:db8::/32", &CommandArgs::new().kw("fwmark", "0x10").kw("lookup", 20)).unwrap();
        assert_eq!(
            ip.backend().last_mutation().unwrap().to_string(),
            "-6 rule add from 2001:db8::/32 fwmark 0x10 lookup 20"
        );
    }

    #[test]
    fn test_delete_listed_rule() {
        let rule = parse("100:\tfrom 10.0.0.0/8 fwmark 0x1/0xff iif eth0 lookup 100").unwrap();
        let ip = IpRoute::with_backend(MockBackend::new());
        ip.rules4().delete(&rule).unwrap();

        let call = ip.backend().last_mutation().unwrap();
        assert_eq!(call.verb, Verb::Delete);
        assert_eq!(
            call.args,
            vec!["from", "10.0.0.0/8", "fwmark", "1/255", "lookup", "100", "pref", "100", "iif", "eth0"]
        );
    }

    #[test]
    fn test_query_uses_table_family() {
        let backend = MockBackend::new()
            .with_output(Family::V6, Object::Rule, "0:\tfrom all lookup local\n32766:\tfrom all lookup main");
        let ip = IpRoute::with_backend(backend);
        assert!(ip.rules4().all().unwrap().is_empty());
        let rules = ip.rules6().all().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].from_prefix(), Some(net::zero(Family::V6)));
    }
}
