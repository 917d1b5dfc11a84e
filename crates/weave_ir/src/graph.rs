//! The immutable content graph: an arena of containers addressed by path.

use ahash::RandomState;
use indexmap::IndexMap;

use crate::{Component, Node, Path};

pub type FastHashMap<K, V> = hashbrown::HashMap<K, V, RandomState>;

pub fn fast_map_new<K, V>() -> FastHashMap<K, V> {
    FastHashMap::with_hasher(RandomState::with_seeds(0, 0, 0, 0))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub u32);

impl ContainerId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountFlags {
    pub visits: bool,
    pub turns: bool,
    pub count_start_only: bool,
}

impl CountFlags {
    pub fn from_bits(bits: u32) -> Self {
        Self {
            visits: bits & 1 != 0,
            turns: bits & 2 != 0,
            count_start_only: bits & 4 != 0,
        }
    }

    pub fn bits(self) -> u32 {
        (self.visits as u32) | ((self.turns as u32) << 1) | ((self.count_start_only as u32) << 2)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Container {
    pub name: Option<String>,
    pub path: Path,
    pub parent: Option<ContainerId>,
    pub content: Vec<Node>,
    /// Every named child container, inline or named-only, in declaration order.
    pub named: IndexMap<String, ContainerId>,
    /// Subset of `named` that does not appear in `content`.
    pub named_only: Vec<String>,
    pub flags: CountFlags,
}

impl Container {
    pub fn counts_visits(&self) -> bool {
        self.flags.visits
    }

    pub fn counts_turns(&self) -> bool {
        self.flags.turns
    }
}

/// Where a path lands: a whole container, or one node inside a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Container(ContainerId),
    Node { container: ContainerId, index: usize },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListDefinition {
    pub name: String,
    pub items: IndexMap<String, i64>,
}

impl ListDefinition {
    pub fn value_of(&self, item: &str) -> Option<i64> {
        self.items.get(item).copied()
    }

    pub fn item_with_value(&self, value: i64) -> Option<&str> {
        self.items
            .iter()
            .find(|(_, v)| **v == value)
            .map(|(k, _)| k.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct StoryGraph {
    pub version: u32,
    pub containers: Vec<Container>,
    pub list_definitions: IndexMap<String, ListDefinition>,
    by_path: FastHashMap<String, ContainerId>,
}

impl StoryGraph {
    pub const ROOT: ContainerId = ContainerId(0);

    pub(crate) fn new(version: u32) -> Self {
        Self {
            version,
            containers: Vec::new(),
            list_definitions: IndexMap::new(),
            by_path: fast_map_new(),
        }
    }

    pub(crate) fn alloc(&mut self, container: Container) -> ContainerId {
        let id = ContainerId(self.containers.len() as u32);
        self.by_path.insert(container.path.to_string(), id);
        self.containers.push(container);
        id
    }

    pub(crate) fn container_mut(&mut self, id: ContainerId) -> &mut Container {
        &mut self.containers[id.index()]
    }

    pub fn root(&self) -> &Container {
        &self.containers[Self::ROOT.index()]
    }

    pub fn container(&self, id: ContainerId) -> &Container {
        &self.containers[id.index()]
    }

    pub fn node(&self, id: ContainerId, index: usize) -> Option<&Node> {
        self.containers.get(id.index())?.content.get(index)
    }

    pub fn container_at(&self, path: &str) -> Option<ContainerId> {
        self.by_path.get(path).copied()
    }

    pub fn named_root_container(&self, name: &str) -> Option<ContainerId> {
        self.root().named.get(name).copied()
    }

    /// Resolves an absolute path from the root container.
    pub fn resolve(&self, path: &Path) -> Option<Target> {
        self.resolve_from(Self::ROOT, path)
    }

    /// Resolves `path` starting at `start`. Relative and absolute paths are
    /// both walked component by component from `start`.
    pub fn resolve_from(&self, start: ContainerId, path: &Path) -> Option<Target> {
        let mut current = start;
        let comps = path.components();
        for (i, c) in comps.iter().enumerate() {
            let container = self.containers.get(current.index())?;
            match c {
                Component::Index(ix) => match container.content.get(*ix)? {
                    Node::Container(child) => current = *child,
                    _ if i + 1 == comps.len() => {
                        return Some(Target::Node {
                            container: current,
                            index: *ix,
                        });
                    }
                    _ => return None,
                },
                Component::Name(n) => current = *container.named.get(n)?,
                Component::Parent => current = container.parent?,
            }
        }
        Some(Target::Container(current))
    }

    pub fn list_definition(&self, name: &str) -> Option<&ListDefinition> {
        self.list_definitions.get(name)
    }

    /// Finds the definition and value of an item written as `Origin.item`
    /// or a bare `item` that is unique across definitions.
    pub fn find_list_item(&self, qualified: &str) -> Option<(&ListDefinition, i64)> {
        if let Some((origin, item)) = qualified.split_once('.') {
            let def = self.list_definitions.get(origin)?;
            return def.value_of(item).map(|v| (def, v));
        }
        self.list_definitions
            .values()
            .find_map(|def| def.value_of(qualified).map(|v| (def, v)))
    }
}
