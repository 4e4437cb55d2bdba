// Address value types: IP networks with prefix and hardware addresses
//
// `IpNetwork` keeps host bits as written, so `10.0.0.5/24` renders back as
// `10.0.0.5/24`; a bare address parses as a host prefix (/32 or /128).

use serde::Serializer;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

pub use ipnetwork::IpNetwork;
pub use mac_address::MacAddress as MacAddr;

use crate::backend::Family;

/// Zero prefix for a family; anything but `-6` means IPv4.
pub fn zero(family: Family) -> IpNetwork {
    let addr = match family {
        Family::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        _ => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    };
    // A zero prefix is valid for either family, so the fallback never runs.
    IpNetwork::new(addr, 0).unwrap_or_else(|_| IpNetwork::from(addr))
}

/// iproute2 prints hardware addresses in lowercase.
pub fn mac_string(mac: &MacAddr) -> String {
    mac.to_string().to_lowercase()
}

pub(crate) fn serialize_network<S: Serializer>(
    net: &IpNetwork,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(net)
}

pub(crate) fn serialize_mac<S: Serializer>(mac: &MacAddr, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&mac_string(mac))
}
