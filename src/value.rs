// Typed field values and the casts that produce them from captured text

use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

use crate::error::{IpError, IpResult};
use crate::net::{self, IpNetwork, MacAddr};

/// A typed field value on a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(u64),
    #[serde(serialize_with = "net::serialize_network")]
    Network(IpNetwork),
    Addr(IpAddr),
    #[serde(serialize_with = "net::serialize_mac")]
    Mac(MacAddr),
    Str(String),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_network(&self) -> Option<IpNetwork> {
        match self {
            Value::Network(net) => Some(*net),
            _ => None,
        }
    }

    pub fn as_addr(&self) -> Option<IpAddr> {
        match self {
            Value::Addr(addr) => Some(*addr),
            _ => None,
        }
    }

    pub fn as_mac(&self) -> Option<MacAddr> {
        match self {
            Value::Mac(mac) => Some(*mac),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Network(net) => write!(f, "{}", net),
            Value::Addr(addr) => write!(f, "{}", addr),
            Value::Mac(mac) => f.write_str(&net::mac_string(mac)),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Int(n)
    }
}

impl From<IpNetwork> for Value {
    fn from(net: IpNetwork) -> Self {
        Value::Network(net)
    }
}

impl From<IpAddr> for Value {
    fn from(addr: IpAddr) -> Self {
        Value::Addr(addr)
    }
}

impl From<MacAddr> for Value {
    fn from(mac: MacAddr) -> Self {
        Value::Mac(mac)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Conversion applied to a captured field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    /// Decimal, or hexadecimal when prefixed with `0x`.
    Int,
    Network,
    Addr,
    Mac,
    Str,
}

impl Cast {
    pub fn target(self) -> &'static str {
        match self {
            Cast::Int => "integer",
            Cast::Network => "network",
            Cast::Addr => "address",
            Cast::Mac => "hardware address",
            Cast::Str => "string",
        }
    }

    pub fn apply(self, field: &str, raw: &str) -> IpResult<Value> {
        let value = match self {
            Cast::Int => parse_int(raw).map(Value::Int),
            Cast::Network => raw.parse().ok().map(Value::Network),
            Cast::Addr => raw.parse().ok().map(Value::Addr),
            Cast::Mac => raw.parse().ok().map(Value::Mac),
            Cast::Str => Some(Value::Str(raw.to_string())),
        };

        value.ok_or_else(|| IpError::CastFailure {
            field: field.to_string(),
            value: raw.to_string(),
            target: self.target(),
        })
    }
}

fn parse_int(raw: &str) -> Option<u64> {
    match raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}
