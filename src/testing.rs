// Scripted backend for unit tests: canned output per (family, object), every call recorded

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::backend::{Backend, Family, Invocation, Object, Verb};
use crate::error::{IpError, IpResult};

#[derive(Default)]
pub struct MockBackend {
    outputs: HashMap<(Family, Object), Vec<String>>,
    failing: HashSet<(Family, Object)>,
    calls: Mutex<Vec<Invocation>>,
}

impl MockBackend {
    pub fn new() -> Self {
        MockBackend::default()
    }

    /// Lines returned by `show` for this family and object.
    pub fn with_output(mut self, family: Family, object: Object, output: &str) -> Self {
        let lines = output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(String::from)
            .collect();
        self.outputs.insert((family, object), lines);
        self
    }

    /// Make every call for this family and object exit non-zero.
    pub fn failing(mut self, family: Family, object: Object) -> Self {
        self.failing.insert((family, object));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of `show` invocations against `object`, any family.
    pub fn show_count(&self, object: Object) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.verb == Verb::Show && call.object == object)
            .count()
    }

    pub fn last_mutation(&self) -> Option<Invocation> {
        self.calls()
            .into_iter()
            .rev()
            .find(|call| call.verb.is_mutation())
    }

    fn record(&self, invocation: &Invocation) -> IpResult<()> {
        self.calls.lock().unwrap().push(invocation.clone());
        if self.failing.contains(&(invocation.family, invocation.object)) {
            return Err(IpError::ExternalProcess {
                command: format!("ip {}", invocation),
                exit_code: 1,
                output: "Cannot find device".to_string(),
            });
        }
        Ok(())
    }
}

impl Backend for MockBackend {
    fn show(&self, invocation: &Invocation) -> IpResult<Vec<String>> {
        self.record(invocation)?;
        Ok(self
            .outputs
            .get(&(invocation.family, invocation.object))
            .cloned()
            .unwrap_or_default())
    }

    fn execute(&self, invocation: &Invocation) -> IpResult<()> {
        self.record(invocation)
    }
}
