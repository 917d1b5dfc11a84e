use indexmap::IndexMap;

use crate::core::VariableChange;
use crate::{Story, Value};

pub type ObserverFn = Box<dyn FnMut(&mut Story, &str, Option<&Value>, &Value)>;

/// Returned by `observe_variable`; pass to `remove_observer` to unregister.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObserverHandle {
    pub(crate) id: u64,
    pub(crate) name: String,
}

impl ObserverHandle {
    pub fn variable(&self) -> &str {
        &self.name
    }
}

/// Observers per variable, kept in registration order.
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: u64,
    by_name: IndexMap<String, Vec<(u64, ObserverFn)>>,
    // Ids of observers taken out for a dispatch in progress, per variable.
    dispatching: IndexMap<String, Vec<u64>>,
    removed_in_dispatch: Vec<u64>,
    // Changes made to a variable while its observers were running.
    deferred: Vec<VariableChange>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, fun: ObserverFn) -> ObserverHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.by_name
            .entry(name.to_string())
            .or_default()
            .push((id, fun));
        ObserverHandle {
            id,
            name: name.to_string(),
        }
    }

    pub fn remove(&mut self, handle: &ObserverHandle) -> bool {
        if let Some(list) = self.by_name.get_mut(&handle.name) {
            let before = list.len();
            list.retain(|(id, _)| *id != handle.id);
            if list.len() != before {
                return true;
            }
        }
        let in_flight = self
            .dispatching
            .get(&handle.name)
            .is_some_and(|ids| ids.contains(&handle.id));
        if in_flight && !self.removed_in_dispatch.contains(&handle.id) {
            self.removed_in_dispatch.push(handle.id);
            return true;
        }
        false
    }

    pub fn has_observers(&self, name: &str) -> bool {
        self.dispatching.contains_key(name) || self.by_name.get(name).is_some_and(|l| !l.is_empty())
    }

    pub(crate) fn is_dispatching(&self, name: &str) -> bool {
        self.dispatching.contains_key(name)
    }

    /// Holds a change until the running dispatch for its variable ends.
    pub(crate) fn defer(&mut self, change: VariableChange) {
        self.deferred.push(change);
    }

    /// Takes the observers of `name` out so they can run with `&mut Story`.
    pub(crate) fn take(&mut self, name: &str) -> Vec<(u64, ObserverFn)> {
        let taken: Vec<(u64, ObserverFn)> = self
            .by_name
            .get_mut(name)
            .map(std::mem::take)
            .unwrap_or_default();
        self.dispatching
            .insert(name.to_string(), taken.iter().map(|(id, _)| *id).collect());
        taken
    }

    pub(crate) fn is_removed(&self, id: u64) -> bool {
        self.removed_in_dispatch.contains(&id)
    }

    /// Returns taken observers, followed by any registered meanwhile, and
    /// hands back the changes deferred for `name`.
    pub(crate) fn restore(
        &mut self,
        name: &str,
        mut taken: Vec<(u64, ObserverFn)>,
    ) -> Vec<VariableChange> {
        let removed = &mut self.removed_in_dispatch;
        taken.retain(|(id, _)| match removed.iter().position(|r| r == id) {
            Some(i) => {
                removed.swap_remove(i);
                false
            }
            None => true,
        });
        self.dispatching.shift_remove(name);
        let entry = self.by_name.entry(name.to_string()).or_default();
        let added = std::mem::take(entry);
        taken.extend(added);
        *entry = taken;

        let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.deferred)
            .into_iter()
            .partition(|c| c.name == name);
        self.deferred = rest;
        mine
    }
}
