use indexmap::IndexMap;

use crate::{Story, Value};

pub type ExternalFn = Box<dyn FnMut(&mut Story, &[Value]) -> Result<Value, String>>;

/// A host function bound to an `EXTERNAL` declaration.
pub struct ExternalFunction {
    pub(crate) callback: ExternalFn,
    /// Safe to run while the engine speculatively reads past a newline.
    /// Unsafe functions stop the lookahead so they run exactly once.
    pub lookahead_safe: bool,
}

pub struct ExternalRegistry {
    entries: IndexMap<String, ExternalFunction>,
    // Names taken out for a call, and whether they were unbound meanwhile.
    in_flight: Vec<(String, bool)>,
}

impl ExternalRegistry {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            in_flight: Vec::new(),
        }
    }

    pub fn register(&mut self, name: &str, fun: ExternalFn, lookahead_safe: bool) {
        self.entries.insert(
            name.to_string(),
            ExternalFunction {
                callback: fun,
                lookahead_safe,
            },
        );
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        if let Some((_, unbound)) = self.in_flight.iter_mut().rev().find(|(n, _)| n == name) {
            *unbound = true;
            self.entries.shift_remove(name);
            return true;
        }
        self.entries.shift_remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name) || self.in_flight.iter().any(|(n, u)| n == name && !u)
    }

    pub fn is_lookahead_safe(&self, name: &str) -> Option<bool> {
        self.entries.get(name).map(|f| f.lookahead_safe)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Takes a binding out for the duration of a call, so the callback may
    /// borrow the story mutably.
    pub(crate) fn take(&mut self, name: &str) -> Option<ExternalFunction> {
        let fun = self.entries.shift_remove(name)?;
        self.in_flight.push((name.to_string(), false));
        Some(fun)
    }

    /// Puts a binding back unless the callback unbound or rebound the name
    /// meanwhile.
    pub(crate) fn restore(&mut self, name: &str, fun: ExternalFunction) {
        let unbound = match self.in_flight.iter().rposition(|(n, _)| n == name) {
            Some(i) => self.in_flight.remove(i).1,
            None => false,
        };
        if !unbound && !self.entries.contains_key(name) {
            self.entries.insert(name.to_string(), fun);
        }
    }
}

impl Default for ExternalRegistry {
    fn default() -> Self {
        Self::new()
    }
}
