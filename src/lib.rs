// iproute-model: typed records over iproute2 `ip` output, and the command lines that change them
//
// Each record kind (links, addresses, neighbors, routes, rules) parses one
// output line through a declarative pattern. Queries go through a per-kind
// result cache owned by `IpRoute`; mutations clear it.

pub mod backend;
pub mod cache;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod net;
pub mod record;
pub mod records;
pub mod table;
pub mod value;

#[cfg(test)]
mod testing;

pub use backend::{Backend, Family, Invocation, IpCommand, Object, Verb};
pub use command::{ArgValue, CommandArgs};
pub use config::{Config, LinkSource};
pub use context::IpRoute;
pub use error::{IpError, IpResult};
pub use net::{IpNetwork, MacAddr};
pub use record::Record;
pub use records::{Address, Link, LinkType, Neighbor, Nexthop, Route, RouteType, Rule};
pub use table::Table;
pub use value::Value;
