// Query and mutation entry points for one record kind

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::backend::{Backend, Family, Invocation, Object, Verb};
use crate::cache::ResultCache;
use crate::command::CommandArgs;
use crate::error::IpResult;
use crate::record::{ParseContext, Record, parse_line};

/// Backend handle given to a kind's retrieval hook.
#[derive(Clone, Copy)]
pub struct Retriever<'a> {
    backend: &'a dyn Backend,
    family: Family,
    link_object: Object,
}

impl<'a> Retriever<'a> {
    pub fn new(backend: &'a dyn Backend, family: Family, link_object: Object) -> Self {
        Retriever {
            backend,
            family,
            link_object,
        }
    }

    /// Family of the table being queried.
    pub fn family(&self) -> Family {
        self.family
    }

    /// Object whose `show` lists links on this iproute2 version.
    pub fn link_object(&self) -> Object {
        self.link_object
    }

    pub fn show(&self, family: Family, object: Object, args: &[String]) -> IpResult<Vec<String>> {
        let invocation = Invocation::new(family, object, Verb::Show, args.to_vec());
        self.backend.show(&invocation)
    }
}

/// A record kind bound to a backend and its result cache.
pub struct Table<'a, R: Record> {
    backend: &'a dyn Backend,
    cache: &'a Mutex<ResultCache<R>>,
    family: Family,
    link_object: Object,
}

impl<'a, R: Record> Table<'a, R> {
    pub(crate) fn new(
        backend: &'a dyn Backend,
        cache: &'a Mutex<ResultCache<R>>,
        family: Family,
        link_object: Object,
    ) -> Self {
        Table {
            backend,
            cache,
            family,
            link_object,
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// Every record the `show` command lists.
    pub fn all(&self) -> IpResult<Vec<R>> {
        self.query(&CommandArgs::new())
    }

    pub fn query(&self, args: &CommandArgs) -> IpResult<Vec<R>> {
        self.query_filtered(args, |_| true)
    }

    /// Run `show` with `args` and keep the records accepted by `filter`.
    ///
    /// Results are cached per argument list, before filtering. A line that
    /// does not parse aborts the whole query.
    pub fn query_filtered<F>(&self, args: &CommandArgs, filter: F) -> IpResult<Vec<R>>
    where
        F: Fn(&R) -> bool,
    {
        let key = args.unwind();

        let cached = self.lock().get(&key);
        let records = match cached {
            Some(records) => {
                tracing::trace!(kind = R::KIND, args = ?key, "Cache hit");
                records
            }
            None => {
                tracing::trace!(kind = R::KIND, args = ?key, "Cache miss");
                let records = self.fetch(&key)?;
                self.lock().put(key, &records);
                records
            }
        };

        Ok(records.into_iter().filter(|r| filter(r)).collect())
    }

    fn fetch(&self, args: &[String]) -> IpResult<Vec<R>> {
        let source = Retriever::new(self.backend, self.family, self.link_object);
        let lines = R::retrieve(&source, args)?;
        let cx = ParseContext::new(self.family, args);
        lines
            .iter()
            .map(|line| parse_line::<R>(line, &cx))
            .collect()
    }

    /// Enable caching with `timeout`, or disable it with `None` or zero.
    pub fn set_cache_timeout(&self, timeout: Option<Duration>) {
        self.lock().set_timeout(timeout);
    }

    pub fn cache_timeout(&self) -> Option<Duration> {
        self.lock().timeout()
    }

    /// Drop every cached result for this kind.
    pub fn invalidate(&self) {
        self.lock().clear();
    }

    /// Run a mutation; on success every cached query of this kind is stale.
    pub(crate) fn mutate(
        &self,
        family: Family,
        object: Object,
        verb: Verb,
        args: Vec<String>,
    ) -> IpResult<()> {
        let invocation = Invocation::new(family, object, verb, args);
        tracing::debug!(kind = R::KIND, command = %invocation, "Applying change");
        self.backend.execute(&invocation)?;
        self.invalidate();
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'a, ResultCache<R>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::{Family, Object};
    use crate::command::CommandArgs;
    use crate::context::IpRoute;
    use crate::records::Address;
    use crate::testing::MockBackend;
    use std::thread::sleep;
    use std::time::Duration;

    const ADDRS: &str = "1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever preferred_lft forever\n2: eth0    inet 10.0.0.5/24 brd 10.0.0.255 scope global eth0\\       valid_lft forever preferred_lft forever";

    fn backend() -> MockBackend {
        MockBackend::new().with_output(Family::V4, Object::Addr, ADDRS)
    }

    #[test]
    fn test_cache_expires_after_timeout() {
        let ip = IpRoute::with_backend(backend());
        let table = ip.addresses();
        table.set_cache_timeout(Some(Duration::from_millis(100)));

        table.all().unwrap();
        table.all().unwrap();
        // one retrieval runs both the -4 and the -6 show
        assert_eq!(ip.backend().show_count(Object::Addr), 2);

        sleep(Duration::from_millis(100));
        table.all().unwrap();
        assert_eq!(ip.backend().show_count(Object::Addr), 4);
    }

    #[test]
    fn test_without_cache_every_query_retrieves() {
        let ip = IpRoute::with_backend(backend());
        ip.addresses().all().unwrap();
        ip.addresses().all().unwrap();
        assert_eq!(ip.backend().show_count(Object::Addr), 4);
    }

    #[test]
    fn test_cache_keyed_by_arguments() {
        let ip = IpRoute::with_backend(backend());
        let table = ip.addresses();
        table.set_cache_timeout(Some(Duration::from_secs(60)));

        table.all().unwrap();
        table.query(&CommandArgs::new().kw("dev", "eth0")).unwrap();
        table.query(&CommandArgs::new().kw("dev", "eth0")).unwrap();
        assert_eq!(ip.backend().show_count(Object::Addr), 4);
    }

    #[test]
    fn test_mutation_clears_every_entry() {
        let ip = IpRoute::with_backend(backend());
        let table = ip.addresses();
        table.set_cache_timeout(Some(Duration::from_secs(60)));

        table.all().unwrap();
        table.query(&CommandArgs::new().kw("dev", "lo")).unwrap();
        assert_eq!(ip.backend().show_count(Object::Addr), 4);

        table
            .add("10.9.9.9/32", &CommandArgs::new().kw("dev", "lo"))
            .unwrap();
        table.all().unwrap();
        table.query(&CommandArgs::new().kw("dev", "lo")).unwrap();
        assert_eq!(ip.backend().show_count(Object::Addr), 8);
    }

    #[test]
    fn test_failed_mutation_keeps_cache() {
        let backend = backend().failing(Family::Any, Object::Addr);
        let ip = IpRoute::with_backend(backend);
        let table = ip.addresses();
        table.set_cache_timeout(Some(Duration::from_secs(60)));

        table.all().unwrap();
        assert!(table.add("10.9.9.9/32", &CommandArgs::new()).is_err());
        table.all().unwrap();
        assert_eq!(ip.backend().show_count(Object::Addr), 2);
    }

    #[test]
    fn test_filter_applied_on_cache_hit() {
        let ip = IpRoute::with_backend(backend());
        let table = ip.addresses();
        table.set_cache_timeout(Some(Duration::from_secs(60)));

        let global = table
            .query_filtered(&CommandArgs::new(), |a: &Address| a.scope() == Some("global"))
            .unwrap();
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].ifname(), "eth0");

        let host = table
            .query_filtered(&CommandArgs::new(), |a: &Address| a.scope() == Some("host"))
            .unwrap();
        assert_eq!(host.len(), 1);
        assert_eq!(host[0].ifname(), "lo");
        assert_eq!(table.all().unwrap().len(), 2);
        assert_eq!(ip.backend().show_count(Object::Addr), 2);
    }

    #[test]
    fn test_unparsable_line_aborts_query() {
        let backend = MockBackend::new().with_output(Family::V4, Object::Route, "10.0.0.0/8 dev eth0\n\t???");
        let ip = IpRoute::with_backend(backend);
        assert!(ip.routes4().all().is_err());
    }
}
