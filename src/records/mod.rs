// Record kinds parsed from `ip` output

pub mod address;
pub mod link;
pub mod lookup;
pub mod neighbor;
pub mod route;
pub mod rule;

pub use address::Address;
pub use link::{Link, LinkType};
pub use lookup::RouteEngine;
pub use neighbor::Neighbor;
pub use route::{Nexthop, Route, RouteType};
pub use rule::Rule;
