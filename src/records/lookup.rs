// Route lookup engine with longest prefix matching

use std::net::IpAddr;

use super::route::Route;

pub struct RouteEngine<'a> {
    routes: &'a [Route],
}

impl<'a> RouteEngine<'a> {
    pub fn new(routes: &'a [Route]) -> Self {
        RouteEngine { routes }
    }

    /// Find the best matching route for a destination using longest prefix matching.
    ///
    /// Equal prefix lengths fall back to the lowest metric, then to listing order.
    pub fn lookup(&self, dest: IpAddr) -> Option<&'a Route> {
        let mut best_match: Option<(&'a Route, u8, u64)> = None;

        for route in self.routes {
            let Some(network) = route.network() else {
                continue;
            };
            if !network.contains(dest) {
                continue;
            }

            let prefix_len = network.prefix();
            let metric = route.metric().unwrap_or_default();
            match best_match {
                None => best_match = Some((route, prefix_len, metric)),
                Some((_, current_len, _)) if prefix_len > current_len => {
                    best_match = Some((route, prefix_len, metric));
                }
                Some((_, current_len, current_metric))
                    if prefix_len == current_len && metric < current_metric =>
                {
                    best_match = Some((route, prefix_len, metric));
                }
                _ => {}
            }
        }

        best_match.map(|(route, _, _)| route)
    }
}
