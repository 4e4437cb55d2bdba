// Routes, from `ip -4 route show` and `ip -6 route show`, including multipath nexthops

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

use super::lookup::RouteEngine;
use crate::backend::{Family, Object, Verb};
use crate::command::CommandArgs;
use crate::error::{IpError, IpResult};
use crate::net::{self, IpNetwork};
use crate::record::{Fields, ParseContext, RawFields, Record, record_identity};
use crate::table::{Retriever, Table};
use crate::value::{Cast, Value};

static ROUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?:(?P<type>unicast|local|broadcast|multicast|throw|unreachable|prohibit|blackhole|nat|anycast)\s+)?",
        r"(?P<network>[^\s\\]+)\s*",
        r"(?:via (?:inet6? )?(?P<via>[^\s\\]+)\s*)?",
        r"(?:dev (?P<dev>[^\s\\]+)\s*)?",
        r"(?:table (?P<table>[^\s\\]+)\s*)?",
        r"(?:proto (?P<proto>[^\s\\]+)\s*)?",
        r"(?:scope (?P<scope>[^\s\\]+)\s*)?",
        r"(?:src (?P<src>[^\s\\]+)\s*)?",
        r"(?:metric (?P<metric>[^\s\\]+)\s*)?",
        r"(?:mtu (?:lock )?(?P<mtu>[^\s\\]+)\s*)?",
        r"(?:advmss (?P<advmss>[^\s\\]+)\s*)?",
    ))
    .expect("Invalid route pattern")
});

static NEXTHOP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"nexthop via (?:inet6? )?(?P<via>\S+)\s+dev (?P<dev>\S+) weight (?P<weight>\d+)")
        .expect("Invalid nexthop pattern")
});

const ROUTE_CASTS: &[(&str, Cast)] = &[
    ("network", Cast::Network),
    ("src", Cast::Addr),
    ("metric", Cast::Int),
    ("mtu", Cast::Int),
    ("advmss", Cast::Int),
];

/// Keyword order for `ip route add|replace|del`; `""` is the nexthop block.
const ROUTE_ORDER: &[&str] = &["table", "src", "advmss", "mtu", ""];

const FLUSH_ORDER: &[&str] = &["table"];

/// Route type keyword printed ahead of the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    Unicast,
    Local,
    Broadcast,
    Multicast,
    Throw,
    Unreachable,
    Prohibit,
    Blackhole,
    Nat,
    Anycast,
}

impl RouteType {
    pub const ALL: [RouteType; 10] = [
        RouteType::Unicast,
        RouteType::Local,
        RouteType::Broadcast,
        RouteType::Multicast,
        RouteType::Throw,
        RouteType::Unreachable,
        RouteType::Prohibit,
        RouteType::Blackhole,
        RouteType::Nat,
        RouteType::Anycast,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RouteType::Unicast => "unicast",
            RouteType::Local => "local",
            RouteType::Broadcast => "broadcast",
            RouteType::Multicast => "multicast",
            RouteType::Throw => "throw",
            RouteType::Unreachable => "unreachable",
            RouteType::Prohibit => "prohibit",
            RouteType::Blackhole => "blackhole",
            RouteType::Nat => "nat",
            RouteType::Anycast => "anycast",
        }
    }

    /// A missing type keyword means unicast.
    fn from_keyword(keyword: Option<&str>) -> Self {
        keyword
            .and_then(|k| RouteType::ALL.into_iter().find(|t| t.as_str() == k))
            .unwrap_or(RouteType::Unicast)
    }
}

/// One leg of a multipath route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Nexthop {
    via: IpAddr,
    dev: String,
    weight: u64,
}

impl Nexthop {
    pub fn new(via: IpAddr, dev: impl Into<String>, weight: u64) -> Self {
        Nexthop {
            via,
            dev: dev.into(),
            weight,
        }
    }

    /// Every `nexthop via .. dev .. weight ..` clause in `line`, in order.
    pub fn parse_all(line: &str) -> IpResult<Vec<Nexthop>> {
        NEXTHOP_RE
            .captures_iter(line)
            .map(|caps| -> IpResult<Nexthop> {
                let via = caps["via"].parse().map_err(|_| IpError::CastFailure {
                    field: "via".to_string(),
                    value: caps["via"].to_string(),
                    target: Cast::Addr.target(),
                })?;
                let weight = caps["weight"].parse().map_err(|_| IpError::CastFailure {
                    field: "weight".to_string(),
                    value: caps["weight"].to_string(),
                    target: Cast::Int.target(),
                })?;
                Ok(Nexthop {
                    via,
                    dev: caps["dev"].to_string(),
                    weight,
                })
            })
            .collect()
    }

    pub fn via(&self) -> IpAddr {
        self.via
    }

    pub fn dev(&self) -> &str {
        &self.dev
    }

    pub fn weight(&self) -> u64 {
        self.weight
    }

    /// Command tokens: `nexthop via <addr> dev <dev> weight <weight>`.
    pub fn tokens(&self) -> Vec<String> {
        vec![
            "nexthop".to_string(),
            "via".to_string(),
            self.via.to_string(),
            "dev".to_string(),
            self.dev.clone(),
            "weight".to_string(),
            self.weight.to_string(),
        ]
    }
}

impl fmt::Display for Nexthop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens().join(" "))
    }
}

impl CommandArgs {
    /// Attach multipath legs; route mutations emit them after every other keyword.
    pub fn nexthops(self, nexthops: &[Nexthop]) -> Self {
        self.kw_many("nexthops", nexthops.iter().flat_map(Nexthop::tokens))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Route {
    #[serde(flatten)]
    fields: Fields,
    nexthops: Vec<Nexthop>,
    #[serde(skip)]
    route_type: RouteType,
    #[serde(skip)]
    family: Family,
}

record_identity!(Route, |route| route.network());

impl Record for Route {
    const KIND: &'static str = "route";

    fn pattern() -> &'static Regex {
        &ROUTE_RE
    }

    fn construct(mut raw: RawFields, line: &str, cx: &ParseContext<'_>) -> IpResult<Self> {
        if raw.get("network").and_then(|n| n.as_deref()) == Some("default") {
            raw.insert(
                "network".to_string(),
                Some(net::zero(cx.family).to_string()),
            );
        }

        let route_type = RouteType::from_keyword(raw.get("type").and_then(|t| t.as_deref()));
        let nexthops = Nexthop::parse_all(line)?;
        Ok(Route {
            fields: Fields::cast(raw, ROUTE_CASTS)?,
            nexthops,
            route_type,
            family: cx.family,
        })
    }

    fn fields(&self) -> &Fields {
        &self.fields
    }

    fn derived(&self, name: &str) -> Option<Value> {
        let keyword = name.strip_prefix("is_")?;
        RouteType::ALL
            .into_iter()
            .find(|t| t.as_str() == keyword)
            .map(|t| Value::Bool(self.route_type == t))
    }

    fn retrieve(source: &Retriever<'_>, args: &[String]) -> IpResult<Vec<String>> {
        source.show(source.family(), Object::Route, args)
    }

    fn canonical(&self) -> String {
        let mut out = format!("{} {}", Self::KIND, self.fields.render());
        for nexthop in &self.nexthops {
            out.push(' ');
            out.push_str(&nexthop.to_string());
        }
        out
    }
}

impl Route {
    pub fn route_type(&self) -> RouteType {
        self.route_type
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn network(&self) -> Option<IpNetwork> {
        self.fields.network("network")
    }

    /// Gateway as printed; kept as text since it may carry a family prefix.
    pub fn via(&self) -> Option<&str> {
        self.fields.str("via")
    }

    pub fn dev(&self) -> Option<&str> {
        self.fields.str("dev")
    }

    pub fn table(&self) -> Option<&str> {
        self.fields.str("table")
    }

    pub fn proto(&self) -> Option<&str> {
        self.fields.str("proto")
    }

    pub fn scope(&self) -> Option<&str> {
        self.fields.str("scope")
    }

    pub fn src(&self) -> Option<IpAddr> {
        self.fields.addr("src")
    }

    pub fn metric(&self) -> Option<u64> {
        self.fields.int("metric")
    }

    pub fn mtu(&self) -> Option<u64> {
        self.fields.int("mtu")
    }

    pub fn advmss(&self) -> Option<u64> {
        self.fields.int("advmss")
    }

    pub fn nexthops(&self) -> &[Nexthop] {
        &self.nexthops
    }

    pub fn is_multipath(&self) -> bool {
        !self.nexthops.is_empty()
    }
}

impl Table<'_, Route> {
    /// `ip route add <network> <args>`
    pub fn add(&self, network: impl ToString, args: &CommandArgs) -> IpResult<()> {
        self.route_command(Verb::Add, network, args)
    }

    pub fn replace(&self, network: impl ToString, args: &CommandArgs) -> IpResult<()> {
        self.route_command(Verb::Replace, network, args)
    }

    pub fn delete(&self, network: impl ToString, args: &CommandArgs) -> IpResult<()> {
        self.route_command(Verb::Delete, network, args)
    }

    /// `ip route flush <args>`, e.g. `table 100`.
    pub fn flush(&self, args: &CommandArgs) -> IpResult<()> {
        self.mutate(self.family(), Object::Route, Verb::Flush, args.build(FLUSH_ORDER))
    }

    /// Route the kernel's main table would pick for `dest`.
    pub fn lookup(&self, dest: IpAddr) -> IpResult<Option<Route>> {
        let routes = self.all()?;
        Ok(RouteEngine::new(&routes).lookup(dest).cloned())
    }

    fn route_command(&self, verb: Verb, network: impl ToString, args: &CommandArgs) -> IpResult<()> {
        let mut args = args.clone();
        if let Some(nexthops) = args.remove("nexthops") {
            args.insert(String::new(), nexthops);
        }
        let argv = args.prepend(network).build(ROUTE_ORDER);
        self.mutate(self.family(), Object::Route, verb, argv)
    }
}
