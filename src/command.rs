// Linearizes positional and keyword arguments into the order `ip` parses them

use std::fmt;

/// Value of a keyword argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    One(String),
    Many(Vec<String>),
}

impl ArgValue {
    fn push_to(&self, out: &mut Vec<String>) {
        match self {
            ArgValue::One(v) => out.push(v.clone()),
            ArgValue::Many(vs) => out.extend(vs.iter().cloned()),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::One(v) => f.write_str(v),
            ArgValue::Many(vs) => f.write_str(&vs.join(" ")),
        }
    }
}

/// Arguments for a query or mutation: positional values plus named keywords.
///
/// Keywords behave like a mapping (setting a name twice replaces the value)
/// but remember insertion order. Keywords that are not part of a kind's fixed
/// order are emitted after the ordered ones, in insertion order. Callers that
/// need a particular placement for those should pass them positionally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    positional: Vec<String>,
    keywords: Vec<(String, ArgValue)>,
}

impl CommandArgs {
    pub fn new() -> Self {
        CommandArgs::default()
    }

    /// Positional arguments, in order.
    pub fn from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        CommandArgs {
            positional: args.into_iter().map(|a| a.to_string()).collect(),
            keywords: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl ToString) -> Self {
        self.positional.push(value.to_string());
        self
    }

    /// Insert a positional argument ahead of the existing ones.
    pub fn prepend(mut self, value: impl ToString) -> Self {
        self.positional.insert(0, value.to_string());
        self
    }

    pub fn kw(self, name: impl Into<String>, value: impl ToString) -> Self {
        self.with_value(name.into(), ArgValue::One(value.to_string()))
    }

    pub fn kw_many<I, T>(self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.with_value(name.into(), ArgValue::Many(values))
    }

    pub fn with_value(mut self, name: String, value: ArgValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: String, value: ArgValue) {
        match self.keywords.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.keywords.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.keywords
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<ArgValue> {
        let idx = self.keywords.iter().position(|(k, _)| k == name)?;
        Some(self.keywords.remove(idx).1)
    }

    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }

    /// Flatten in insertion order: positionals, then each keyword as `name value`.
    ///
    /// Used as the query argument list and as the result-cache key.
    pub fn unwind(&self) -> Vec<String> {
        self.build(&[])
    }

    /// Flatten into the exact order `ip` expects.
    ///
    /// Positionals come first, then every supplied keyword named in `order`
    /// in that order, then the remaining keywords. The empty keyword name
    /// stands for a positional block: its values are emitted without a name.
    pub fn build(&self, order: &[&str]) -> Vec<String> {
        let mut out = self.positional.clone();

        for name in order {
            if let Some(value) = self.get(name) {
                push_keyword(&mut out, name, value);
            }
        }

        for (name, value) in &self.keywords {
            if !order.contains(&name.as_str()) {
                push_keyword(&mut out, name, value);
            }
        }

        out
    }
}

fn push_keyword(out: &mut Vec<String>, name: &str, value: &ArgValue) {
    if !name.is_empty() {
        out.push(name.to_string());
    }
    value.push_to(out);
}
