// Links, as listed by `ip -o -0 link show`

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::address::Address;
use super::neighbor::Neighbor;
use crate::backend::{Backend, Family, Object, Verb};
use crate::command::CommandArgs;
use crate::context::IpRoute;
use crate::error::{IpError, IpResult};
use crate::net::{IpNetwork, MacAddr};
use crate::record::{Fields, ParseContext, RawFields, Record, record_identity};
use crate::table::{Retriever, Table};
use crate::value::{Cast, Value};

static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?P<num>\d+): ",
        r"(?P<name>\S+?)(?:@(?P<phy>\S+?))?: ",
        r"<(?P<flags>[^>]*)> ",
        r"(?:mtu (?P<mtu>[^\s\\]+)\s*)?",
        r"(?:qdisc (?P<qdisc>[^\s\\]+)\s*)?",
        r"(?:master (?P<masterdev>[^\s\\]+)\s*)?",
        r"(?:state (?P<state>[^\s\\]+)\s*)?",
        r"(?:mode (?P<mode>[^\s\\]+)\s*)?",
        r"(?:group (?P<group>[^\s\\]+)\s*)?",
        r"(?:qlen (?P<qlen>[^\s\\]+)\s*)?",
        r"(?:\\\s*)?link/(?P<type>[^\s\\]+)",
        r"(?: (?P<addr>[a-fA-F\d.:]+))?",
        r"(?: brd (?P<brd>[a-fA-F\d.:]+))?",
    ))
    .expect("Invalid link pattern")
});

const LINK_CASTS: &[(&str, Cast)] = &[("num", Cast::Int), ("mtu", Cast::Int), ("qlen", Cast::Int)];

const ETHER_CASTS: &[(&str, Cast)] = &[
    ("num", Cast::Int),
    ("mtu", Cast::Int),
    ("qlen", Cast::Int),
    ("addr", Cast::Mac),
    ("brd", Cast::Mac),
];

const GRE_CASTS: &[(&str, Cast)] = &[
    ("num", Cast::Int),
    ("mtu", Cast::Int),
    ("qlen", Cast::Int),
    ("addr", Cast::Addr),
    ("brd", Cast::Addr),
];

/// Interface flags that can be queried as boolean attributes.
pub const LINK_FLAGS: &[&str] = &[
    "UP",
    "LOWER_UP",
    "LOOPBACK",
    "BROADCAST",
    "POINTOPOINT",
    "MULTICAST",
    "PROMISC",
    "ALLMULTI",
    "NOARP",
    "DYNAMIC",
    "MASTER",
    "SLAVE",
];

/// Keyword order for `ip link add`.
const ADD_ORDER: &[&str] = &["type", "mode"];

/// Link subtype, chosen from the `link/<type>` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// Hardware addresses are MACs.
    Ethernet,
    /// Hardware addresses are IP tunnel endpoints.
    Gre,
    /// Hardware addresses kept as text.
    Other,
}

impl LinkType {
    fn from_hw_type(hw_type: Option<&str>) -> Self {
        match hw_type {
            Some("ether") => LinkType::Ethernet,
            Some("gre") => LinkType::Gre,
            _ => LinkType::Other,
        }
    }

    fn casts(self) -> &'static [(&'static str, Cast)] {
        match self {
            LinkType::Ethernet => ETHER_CASTS,
            LinkType::Gre => GRE_CASTS,
            LinkType::Other => LINK_CASTS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    #[serde(flatten)]
    fields: Fields,
    #[serde(skip)]
    link_type: LinkType,
}

record_identity!(Link, |link| link.name());

impl Record for Link {
    const KIND: &'static str = "link";

    fn pattern() -> &'static Regex {
        &LINK_RE
    }

    fn construct(mut raw: RawFields, _line: &str, cx: &ParseContext<'_>) -> IpResult<Self> {
        // `ip link show group N` leaves the group out of each line
        if let Some(group) = cx.arg_after("group") {
            raw.insert("group".to_string(), Some(group.to_string()));
        }

        let link_type = LinkType::from_hw_type(raw.get("type").and_then(|t| t.as_deref()));
        let fields = Fields::cast(raw, link_type.casts())?;
        Ok(Link { fields, link_type })
    }

    fn fields(&self) -> &Fields {
        &self.fields
    }

    fn derived(&self, name: &str) -> Option<Value> {
        let flag = name.to_uppercase();
        if LINK_FLAGS.contains(&flag.as_str()) {
            return Some(Value::Bool(self.has_flag(&flag)));
        }
        None
    }

    fn retrieve(source: &Retriever<'_>, args: &[String]) -> IpResult<Vec<String>> {
        match source.show(Family::Link, source.link_object(), args) {
            Ok(lines) => Ok(lines),
            Err(IpError::ExternalProcess { command, .. }) => {
                // asking for a missing device is not an error here
                tracing::debug!("No links for '{}'", command);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

impl Link {
    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// Interface index.
    pub fn index(&self) -> u64 {
        self.fields.int("num").unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.fields.str("name").unwrap_or_default()
    }

    /// Lower device after the `@`, e.g. `p3p1` for `vp3p1-primary@p3p1`.
    pub fn phy(&self) -> Option<&str> {
        self.fields.str("phy")
    }

    pub fn flags(&self) -> Vec<&str> {
        self.fields
            .str("flags")
            .map(|f| f.split(',').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags().iter().any(|f| f.eq_ignore_ascii_case(flag))
    }

    pub fn is_up(&self) -> bool {
        self.has_flag("UP")
    }

    pub fn mtu(&self) -> Option<u64> {
        self.fields.int("mtu")
    }

    pub fn qdisc(&self) -> Option<&str> {
        self.fields.str("qdisc")
    }

    pub fn state(&self) -> Option<&str> {
        self.fields.str("state")
    }

    pub fn master(&self) -> Option<&str> {
        self.fields.str("masterdev")
    }

    pub fn group(&self) -> Option<&str> {
        self.fields.str("group")
    }

    pub fn qlen(&self) -> Option<u64> {
        self.fields.int("qlen")
    }

    /// Raw hardware type, e.g. `ether`, `loopback`, `gre`.
    pub fn hw_type(&self) -> Option<&str> {
        self.fields.str("type")
    }

    pub fn addr(&self) -> Option<&Value> {
        self.fields.value("addr")
    }

    pub fn brd(&self) -> Option<&Value> {
        self.fields.value("brd")
    }

    /// Hardware address, for Ethernet links.
    pub fn mac(&self) -> Option<MacAddr> {
        self.fields.mac("addr")
    }

    /// Addresses configured on this link.
    pub fn addresses<B: Backend>(&self, ip: &IpRoute<B>) -> IpResult<Vec<Address>> {
        let name = self.name().to_string();
        ip.addresses().query_filtered(
            &CommandArgs::new().kw("dev", &name),
            |address: &Address| address.ifname() == name,
        )
    }

    /// Remote ends of point-to-point addresses on this link.
    pub fn peers<B: Backend>(&self, ip: &IpRoute<B>) -> IpResult<Vec<IpNetwork>> {
        Ok(self
            .addresses(ip)?
            .iter()
            .filter_map(Address::peer)
            .collect())
    }

    /// Neighbor table entries learned on this link.
    pub fn neighbors<B: Backend>(&self, ip: &IpRoute<B>) -> IpResult<Vec<Neighbor>> {
        ip.neighbors()
            .query(&CommandArgs::new().kw("dev", self.name()))
    }
}

impl Table<'_, Link> {
    /// Look up a single link by name; a missing device yields `None`.
    pub fn get(&self, name: &str) -> IpResult<Option<Link>> {
        let links = self.query_filtered(&CommandArgs::new().kw("dev", name), |link: &Link| {
            link.name() == name
        })?;
        Ok(links.into_iter().next())
    }

    /// Resolve an interface index to its name.
    pub fn name_of(&self, index: u64) -> IpResult<Option<String>> {
        let links = self.query_filtered(&CommandArgs::new(), |link: &Link| link.index() == index)?;
        Ok(links.first().map(|link| link.name().to_string()))
    }

    /// `ip link add link <parent> dev <args>`, e.g. a macvlan on top of `parent`.
    pub fn add(&self, parent: &Link, args: &CommandArgs) -> IpResult<()> {
        let mut argv = vec![
            "link".to_string(),
            parent.name().to_string(),
            "dev".to_string(),
        ];
        argv.extend(args.build(ADD_ORDER));
        self.mutate(Family::Any, Object::Link, Verb::Add, argv)
    }

    /// `ip link del <link>`
    pub fn delete(&self, link: &Link) -> IpResult<()> {
        self.mutate(
            Family::Any,
            Object::Link,
            Verb::Delete,
            vec![link.name().to_string()],
        )
    }

    /// `ip link set dev <link> <args>`
    pub fn set(&self, link: &Link, args: &CommandArgs) -> IpResult<()> {
        let mut argv = vec!["dev".to_string(), link.name().to_string()];
        argv.extend(args.build(&[]));
        self.mutate(Family::Any, Object::Link, Verb::Set, argv)
    }
}
