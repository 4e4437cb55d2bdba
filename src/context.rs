// Entry point owning the backend and the per-kind result caches

use std::sync::Mutex;

use crate::backend::{Backend, Family, IpCommand, Object};
use crate::cache::ResultCache;
use crate::config::{CacheConfig, Config, LinkSource};
use crate::record::Record;
use crate::records::{Address, Link, Neighbor, Route, Rule};
use crate::table::Table;

/// Access to the kernel's network configuration through `ip`.
///
/// Construct one per process and share it. Each record kind has its own
/// cache; caching is off until a timeout is set.
pub struct IpRoute<B: Backend = IpCommand> {
    backend: B,
    link_object: Object,
    links: Mutex<ResultCache<Link>>,
    addresses: Mutex<ResultCache<Address>>,
    neighbors: Mutex<ResultCache<Neighbor>>,
    routes4: Mutex<ResultCache<Route>>,
    routes6: Mutex<ResultCache<Route>>,
    rules4: Mutex<ResultCache<Rule>>,
    rules6: Mutex<ResultCache<Rule>>,
}

impl IpRoute<IpCommand> {
    pub fn new() -> Self {
        IpRoute::with_backend(IpCommand::default())
    }

    /// Build from the `[command]` and `[cache]` sections.
    pub fn from_config(config: &Config) -> Self {
        let backend =
            IpCommand::new(config.command.program.clone()).with_oneline(config.command.oneline);
        let mut ip = IpRoute::with_backend(backend);
        ip.set_link_source(config.command.link_source);
        ip.apply_cache_config(&config.cache);
        ip
    }
}

impl Default for IpRoute<IpCommand> {
    fn default() -> Self {
        IpRoute::new()
    }
}

impl<B: Backend> IpRoute<B> {
    pub fn with_backend(backend: B) -> Self {
        IpRoute {
            backend,
            link_object: Object::Link,
            links: Mutex::new(ResultCache::disabled()),
            addresses: Mutex::new(ResultCache::disabled()),
            neighbors: Mutex::new(ResultCache::disabled()),
            routes4: Mutex::new(ResultCache::disabled()),
            routes6: Mutex::new(ResultCache::disabled()),
            rules4: Mutex::new(ResultCache::disabled()),
            rules6: Mutex::new(ResultCache::disabled()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Older iproute2 releases list links through `ip -0 addr show`.
    pub fn set_link_source(&mut self, source: LinkSource) {
        self.link_object = match source {
            LinkSource::Link => Object::Link,
            LinkSource::Addr => Object::Addr,
        };
    }

    pub fn apply_cache_config(&self, cache: &CacheConfig) {
        self.links().set_cache_timeout(cache.link_timeout());
        self.addresses().set_cache_timeout(cache.address_timeout());
        self.neighbors().set_cache_timeout(cache.neighbor_timeout());
        self.routes4().set_cache_timeout(cache.route_timeout());
        self.routes6().set_cache_timeout(cache.route_timeout());
        self.rules4().set_cache_timeout(cache.rule_timeout());
        self.rules6().set_cache_timeout(cache.rule_timeout());
    }

    pub fn links(&self) -> Table<'_, Link> {
        self.table(&self.links, Family::Link)
    }

    /// Addresses of both families.
    pub fn addresses(&self) -> Table<'_, Address> {
        self.table(&self.addresses, Family::Any)
    }

    /// Neighbors of both families.
    pub fn neighbors(&self) -> Table<'_, Neighbor> {
        self.table(&self.neighbors, Family::Any)
    }

    pub fn routes4(&self) -> Table<'_, Route> {
        self.table(&self.routes4, Family::V4)
    }

    pub fn routes6(&self) -> Table<'_, Route> {
        self.table(&self.routes6, Family::V6)
    }

    pub fn rules4(&self) -> Table<'_, Rule> {
        self.table(&self.rules4, Family::V4)
    }

    pub fn rules6(&self) -> Table<'_, Rule> {
        self.table(&self.rules6, Family::V6)
    }

    fn table<'a, R: Record>(
        &'a self,
        cache: &'a Mutex<ResultCache<R>>,
        family: Family,
    ) -> Table<'a, R> {
        Table::new(&self.backend, cache, family, self.link_object)
    }
}
