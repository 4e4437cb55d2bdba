// Neighbor (ARP / NDP) table entries, from `ip -4 neigh show` and `ip -6 neigh show`

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::net::IpAddr;

use crate::backend::{Family, Object, Verb};
use crate::command::CommandArgs;
use crate::error::{IpError, IpResult};
use crate::net::MacAddr;
use crate::record::{Fields, ParseContext, RawFields, Record, record_identity};
use crate::table::{Retriever, Table};
use crate::value::{Cast, Value};

static NEIGHBOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?P<ipaddr>[0-9a-fA-F.:]+)\s+",
        r"(?:dev (?P<ifname>\S+)\s+)?",
        r"(?:lladdr (?P<ifaddr>[0-9a-fA-F:]+)\s+)?",
        r"(?:(?P<router>router)\s+)?",
        r"(?:(?P<proxy>proxy)(?:\s+|$))?",
        r"(?:(?:extern_learn|offload|managed)(?:\s+|$))*",
        r"(?P<nud>[A-Z_]+\b)?",
    ))
    .expect("Invalid neighbor pattern")
});

const NEIGHBOR_CASTS: &[(&str, Cast)] = &[("ipaddr", Cast::Addr), ("ifaddr", Cast::Mac)];

/// Neighbor unreachability detection states, queryable as boolean attributes.
pub const NUD_STATES: &[&str] = &[
    "INCOMPLETE",
    "REACHABLE",
    "STALE",
    "DELAY",
    "PROBE",
    "FAILED",
    "NOARP",
    "PERMANENT",
    "NONE",
];

/// Keyword order for `ip neigh add|change|replace|del`.
const NEIGH_ORDER: &[&str] = &["lladdr", "nud", "proxy", "dev"];

#[derive(Debug, Clone, Serialize)]
pub struct Neighbor {
    #[serde(flatten)]
    fields: Fields,
}

record_identity!(Neighbor, |neighbor| neighbor.ipaddr());

impl Record for Neighbor {
    const KIND: &'static str = "neighbor";

    fn pattern() -> &'static Regex {
        &NEIGHBOR_RE
    }

    fn construct(raw: RawFields, line: &str, _cx: &ParseContext<'_>) -> IpResult<Self> {
        // only proxy entries may omit the state
        let present = |name: &str| raw.get(name).is_some_and(Option::is_some);
        if !present("nud") && !present("proxy") {
            return Err(IpError::NoMatch {
                kind: Self::KIND,
                line: line.to_string(),
            });
        }

        Ok(Neighbor {
            fields: Fields::cast(raw, NEIGHBOR_CASTS)?,
        })
    }

    fn fields(&self) -> &Fields {
        &self.fields
    }

    fn derived(&self, name: &str) -> Option<Value> {
        let state = name.to_uppercase();
        if NUD_STATES.contains(&state.as_str()) {
            return Some(Value::Bool(self.nud() == Some(state.as_str())));
        }
        None
    }

    fn retrieve(source: &Retriever<'_>, args: &[String]) -> IpResult<Vec<String>> {
        let mut lines = source.show(Family::V4, Object::Neigh, args)?;
        lines.extend(source.show(Family::V6, Object::Neigh, args)?);
        Ok(lines)
    }
}

impl Neighbor {
    pub fn ipaddr(&self) -> Option<IpAddr> {
        self.fields.addr("ipaddr")
    }

    /// Device name; absent when the query already selected a device.
    pub fn ifname(&self) -> Option<&str> {
        self.fields.str("ifname")
    }

    /// Link-layer address, absent for incomplete or failed entries.
    pub fn lladdr(&self) -> Option<MacAddr> {
        self.fields.mac("ifaddr")
    }

    pub fn nud(&self) -> Option<&str> {
        self.fields.str("nud")
    }

    pub fn is_router(&self) -> bool {
        self.fields.str("router").is_some()
    }

    pub fn is_proxy(&self) -> bool {
        self.fields.str("proxy").is_some()
    }
}

impl Table<'_, Neighbor> {
    pub fn add(&self, ipaddr: impl ToString, args: &CommandArgs) -> IpResult<()> {
        self.neighbor_command(Verb::Add, ipaddr, args)
    }

    pub fn change(&self, ipaddr: impl ToString, args: &CommandArgs) -> IpResult<()> {
        self.neighbor_command(Verb::Change, ipaddr, args)
    }

    pub fn replace(&self, ipaddr: impl ToString, args: &CommandArgs) -> IpResult<()> {
        self.neighbor_command(Verb::Replace, ipaddr, args)
    }

    pub fn delete(&self, ipaddr: impl ToString, args: &CommandArgs) -> IpResult<()> {
        self.neighbor_command(Verb::Delete, ipaddr, args)
    }

    fn neighbor_command(&self, verb: Verb, ipaddr: impl ToString, args: &CommandArgs) -> IpResult<()> {
        let argv = args.clone().prepend(ipaddr).build(NEIGH_ORDER);
        self.mutate(Family::Any, Object::Neigh, verb, argv)
    }
}
