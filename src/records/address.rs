// Protocol addresses, from `ip -o -4 addr show` and `ip -o -6 addr show`

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::net::IpAddr;

use crate::backend::{Family, Object, Verb};
use crate::command::CommandArgs;
use crate::error::{IpError, IpResult};
use crate::net::IpNetwork;
use crate::record::{Fields, ParseContext, RawFields, Record, record_identity};
use crate::table::{Retriever, Table};
use crate::value::{Cast, Value};

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?P<ifnum>\d+):\s+",
        r"(?P<ifname>\S+?)(?:@(?P<phy>\S+?))?\s+",
        r"(?P<family>inet6?) ",
        r"(?P<addr>\S+) ",
        r"(?:peer (?P<peer>\S+) )?",
        r"(?:brd (?P<brd>\S+) )?",
        r"scope (?P<scope>\S+)",
        r"(?P<flags>(?: (?:secondary|temporary|dynamic|noprefixroute|deprecated|tentative|permanent|mngtmpaddr|nodad|optimistic|dadfailed|home|stable-privacy|autojoin)\b)*)",
        r" ?(?:[^\s:\\]+)?(?::(?P<label>[^\s\\]+))?\s*(?:\\|$)",
    ))
    .expect("Invalid address pattern")
});

const ADDRESS_CASTS: &[(&str, Cast)] = &[
    ("ifnum", Cast::Int),
    ("addr", Cast::Network),
    ("brd", Cast::Addr),
    ("peer", Cast::Network),
];

/// Scopes exposed as `<scope>_scope` boolean attributes.
pub const ADDRESS_SCOPES: &[&str] = &["host", "link", "global", "site"];

/// Keyword order for `ip addr add|change|replace`.
const ADD_ORDER: &[&str] = &["peer", "dev", "scope", "to", "label"];

/// Keyword order for `ip addr del`.
const DELETE_ORDER: &[&str] = &["peer", "dev", "label"];

#[derive(Debug, Clone, Serialize)]
pub struct Address {
    #[serde(flatten)]
    fields: Fields,
}

record_identity!(Address, |address| address.addr());

impl Record for Address {
    const KIND: &'static str = "address";

    fn pattern() -> &'static Regex {
        &ADDRESS_RE
    }

    fn construct(mut raw: RawFields, _line: &str, _cx: &ParseContext<'_>) -> IpResult<Self> {
        let flags = raw
            .get("flags")
            .cloned()
            .flatten()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        raw.insert("flags".to_string(), flags);

        Ok(Address {
            fields: Fields::cast(raw, ADDRESS_CASTS)?,
        })
    }

    fn fields(&self) -> &Fields {
        &self.fields
    }

    fn derived(&self, name: &str) -> Option<Value> {
        let scope = name.strip_suffix("_scope")?;
        if ADDRESS_SCOPES.contains(&scope) {
            return Some(Value::Bool(self.scope() == Some(scope)));
        }
        None
    }

    fn retrieve(source: &Retriever<'_>, args: &[String]) -> IpResult<Vec<String>> {
        let mut lines = source.show(Family::V4, Object::Addr, args)?;
        lines.extend(source.show(Family::V6, Object::Addr, args)?);
        Ok(lines)
    }
}

impl Address {
    pub fn ifindex(&self) -> u64 {
        self.fields.int("ifnum").unwrap_or_default()
    }

    pub fn ifname(&self) -> &str {
        self.fields.str("ifname").unwrap_or_default()
    }

    pub fn addr(&self) -> Option<IpNetwork> {
        self.fields.network("addr")
    }

    pub fn is_ipv6(&self) -> bool {
        self.fields.str("family") == Some("inet6")
    }

    pub fn brd(&self) -> Option<IpAddr> {
        self.fields.addr("brd")
    }

    pub fn peer(&self) -> Option<IpNetwork> {
        self.fields.network("peer")
    }

    pub fn scope(&self) -> Option<&str> {
        self.fields.str("scope")
    }

    /// Address flags such as `secondary` or `dynamic`.
    pub fn flags(&self) -> Vec<&str> {
        self.fields
            .str("flags")
            .map(|f| f.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Label suffix after the colon, e.g. `test` for `lo:test`.
    pub fn label(&self) -> Option<&str> {
        self.fields.str("label")
    }

    /// Label as iproute2 expects it back, e.g. `lo:test`.
    pub fn full_label(&self) -> Option<String> {
        self.label()
            .map(|label| format!("{}:{}", self.ifname(), label))
    }
}

impl Table<'_, Address> {
    /// `ip addr add <network> <args>`
    pub fn add(&self, network: impl ToString, args: &CommandArgs) -> IpResult<()> {
        self.address_command(Verb::Add, ADD_ORDER, network, args)
    }

    pub fn change(&self, network: impl ToString, args: &CommandArgs) -> IpResult<()> {
        self.address_command(Verb::Change, ADD_ORDER, network, args)
    }

    pub fn replace(&self, network: impl ToString, args: &CommandArgs) -> IpResult<()> {
        self.address_command(Verb::Replace, ADD_ORDER, network, args)
    }

    pub fn delete(&self, network: impl ToString, args: &CommandArgs) -> IpResult<()> {
        self.address_command(Verb::Delete, DELETE_ORDER, network, args)
    }

    /// Delete a previously listed address from its interface.
    pub fn remove(&self, address: &Address) -> IpResult<()> {
        let network = address.addr().ok_or(IpError::MissingField {
            kind: Address::KIND,
            field: "addr",
        })?;
        let mut args = CommandArgs::new().kw("dev", address.ifname());
        if let Some(peer) = address.peer() {
            args = args.kw("peer", peer);
        }
        if let Some(label) = address.full_label() {
            args = args.kw("label", label);
        }
        self.delete(network, &args)
    }

    fn address_command(
        &self,
        verb: Verb,
        order: &[&str],
        network: impl ToString,
        args: &CommandArgs,
    ) -> IpResult<()> {
        let argv = args.clone().prepend(network).build(order);
        self.mutate(Family::Any, Object::Addr, verb, argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::IpRoute;
    use crate::record::{from_raw, parse_line};
    use crate::testing::MockBackend;

    const LO4: &str = "1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever preferred_lft forever";
    const LO6: &str = "1: lo    inet6 ::1/128 scope host \\       valid_lft forever preferred_lft forever";
    const ETH4: &str = "2: eth0    inet 10.0.0.5/24 brd 10.0.0.255 scope global dynamic noprefixroute eth0\\       valid_lft 85902sec preferred_lft 85902sec";
    const LABELED: &str = "1: lo    inet 172.16.0.0/12 scope global lo:test\\       valid_lft forever preferred_lft forever";
    const PPP: &str = "5: ppp0    inet 10.64.64.1 peer 10.64.64.64/32 scope global ppp0\\       valid_lft forever preferred_lft forever";

    fn parse(line: &str) -> IpResult<Address> {
        parse_line::<Address>(line, &ParseContext::new(Family::V4, &[]))
    }

    #[test]
    fn test_loopback_v4() {
        let address = parse(LO4).unwrap();
        assert_eq!(address.ifindex(), 1);
        assert_eq!(address.ifname(), "lo");
        assert_eq!(address.addr(), Some("127.0.0.1/8".parse().unwrap()));
        assert_eq!(address.scope(), Some("host"));
        assert_eq!(address.attr("host_scope").unwrap(), Some(Value::Bool(true)));
        assert_eq!(address.attr("global_scope").unwrap(), Some(Value::Bool(false)));
        assert_eq!(address.label(), None);
        assert!(!address.is_ipv6());
    }

    #[test]
    fn test_loopback_v6() {
        let address = parse(LO6).unwrap();
        assert!(address.is_ipv6());
        assert_eq!(address.addr(), Some("::1/128".parse().unwrap()));
        assert_eq!(address.attr("host_scope").unwrap(), Some(Value::Bool(true)));
    }

    #[test]
    fn test_broadcast_and_flags() {
        let address = parse(ETH4).unwrap();
        assert_eq!(address.brd(), Some("10.0.0.255".parse().unwrap()));
        assert_eq!(address.flags(), vec!["dynamic", "noprefixroute"]);
        assert_eq!(address.attr("global_scope").unwrap(), Some(Value::Bool(true)));
    }

    #[test]
    fn test_label() {
        let address = parse(LABELED).unwrap();
        assert_eq!(address.label(), Some("test"));
        assert_eq!(address.full_label(), Some("lo:test".to_string()));
    }

    #[test]
    fn test_peer() {
        let address = parse(PPP).unwrap();
        assert_eq!(address.addr(), Some("10.64.64.1/32".parse().unwrap()));
        assert_eq!(address.peer(), Some("10.64.64.64/32".parse().unwrap()));
    }

    #[test]
    fn test_unknown_scope_attribute() {
        let address = parse(LO4).unwrap();
        assert!(matches!(
            address.attr("universe_scope"),
            Err(IpError::NoSuchAttribute { .. })
        ));
        assert!(address.attr("scope_host").is_err());
    }

    #[test]
    fn test_bad_address_is_cast_failure() {
        let result = parse("1: lo    inet 127.0.0.1/99 scope host lo\\");
        assert!(matches!(result, Err(IpError::CastFailure { ref field, .. }) if field == "addr"));
    }

    #[test]
    fn test_flag_words_need_a_boundary() {
        let address = parse("3: home0    inet 192.168.7.2/24 scope global home0\\       valid_lft forever preferred_lft forever").unwrap();
        assert_eq!(address.ifname(), "home0");
        assert!(address.flags().is_empty());
        assert_eq!(address.label(), None);

        let address = parse("3: home0    inet 192.168.7.3/24 scope global secondary home0:vip\\").unwrap();
        assert_eq!(address.flags(), vec!["secondary"]);
        assert_eq!(address.label(), Some("vip"));
    }

    #[test]
    fn test_unmatched_line() {
        assert!(matches!(parse("garbage"), Err(IpError::NoMatch { kind: "address", .. })));
        assert!(matches!(
            parse("2: eth0    inet 10.0.0.5/24 brd 10.0.0.255 eth0\\"),
            Err(IpError::NoMatch { .. })
        ));
    }

    #[test]
    fn test_from_raw_matches_parsed_line() {
        let cx = ParseContext::new(Family::V4, &[]);
        let built: Address = from_raw(
            &[
                ("ifnum", "2"),
                ("ifname", "eth0"),
                ("family", "inet"),
                ("addr", "10.0.0.5/24"),
                ("brd", "10.0.0.255"),
                ("scope", "global"),
            ],
            &cx,
        )
        .unwrap();
        let parsed = parse("2: eth0    inet 10.0.0.5/24 brd 10.0.0.255 scope global eth0\\       valid_lft forever preferred_lft forever").unwrap();
        assert_eq!(built, parsed);
        assert_eq!(built.ifindex(), 2);
        assert!(built.flags().is_empty());
    }

    #[test]
    fn test_query_concatenates_families() {
        let backend = MockBackend::new()
            .with_output(Family::V4, Object::Addr, LO4)
            .with_output(Family::V6, Object::Addr, LO6);
        let ip = IpRoute::with_backend(backend);

        let addresses = ip.addresses().all().unwrap();
        assert_eq!(addresses.len(), 2);
        assert!(!addresses[0].is_ipv6());
        assert!(addresses[1].is_ipv6());
        assert_eq!(ip.backend().show_count(Object::Addr), 2);
    }

    #[test]
    fn test_add_command_order() {
        let ip = IpRoute::with_backend(MockBackend::new());
        let args = CommandArgs::new().kw("label", "lo:test").kw("dev", "lo");
        ip.addresses().add("172.16.0.0/12", &args).unwrap();

        let call = ip.backend().last_mutation().unwrap();
        assert_eq!(call.family, Family::Any);
        assert_eq!(call.object, Object::Addr);
        assert_eq!(call.verb, Verb::Add);
        assert_eq!(call.args, vec!["172.16.0.0/12", "dev", "lo", "label", "lo:test"]);
    }

    #[test]
    fn test_delete_ignores_scope_order() {
        let ip = IpRoute::with_backend(MockBackend::new());
        let args = CommandArgs::new()
            .kw("scope", "global")
            .kw("dev", "eth0")
            .kw("peer", "10.0.0.2");
        ip.addresses().delete("10.0.0.1", &args).unwrap();
        assert_eq!(
            ip.backend().last_mutation().unwrap().args,
            vec!["10.0.0.1", "peer", "10.0.0.2", "dev", "eth0", "scope", "global"]
        );
    }

    #[test]
    fn test_remove_listed_address() {
        let ip = IpRoute::with_backend(MockBackend::new());
        let address = parse(LABELED).unwrap();
        ip.addresses().remove(&address).unwrap();
        let call = ip.backend().last_mutation().unwrap();
        assert_eq!(call.verb, Verb::Delete);
        assert_eq!(
            call.args,
            vec!["172.16.0.0/12", "dev", "lo", "label", "lo:test"]
        );
    }

    #[test]
    fn test_remove_without_addr_fails() {
        let ip = IpRoute::with_backend(MockBackend::new());
        let cx = ParseContext::new(Family::V4, &[]);
        let address: Address = from_raw(&[("ifnum", "2"), ("ifname", "eth0")], &cx).unwrap();

        let result = ip.addresses().remove(&address);
        assert!(matches!(
            result,
            Err(IpError::MissingField { kind: "address", field: "addr" })
        ));
        assert!(ip.backend().last_mutation().is_none());
    }

    #[test]
    fn test_change_and_replace_verbs() {
        let ip = IpRoute::with_backend(MockBackend::new());
        let args = CommandArgs::new().kw("dev", "eth0");
        ip.addresses().change("10.0.0.5/24", &args).unwrap();
        assert_eq!(ip.backend().last_mutation().unwrap().verb, Verb::Change);
        ip.addresses().replace("10.0.0.5/24", &args).unwrap();
        assert_eq!(ip.backend().last_mutation().unwrap().verb, Verb::Replace);
    }
}
