//! Set-valued list values.
//!
//! A list holds items drawn from one or more list definitions, each item
//! carrying its declared integer value. Ordering operations compare by that
//! value; ties break on origin name, then item name.

use std::fmt;

use indexmap::IndexMap;
use weave_ir::{ListLiteral, StoryGraph};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListItem {
    pub origin: String,
    pub name: String,
}

impl ListItem {
    pub fn new(origin: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            name: name.into(),
        }
    }

    /// Parses `Origin.item`.
    pub fn parse(full: &str) -> Self {
        match full.split_once('.') {
            Some((origin, name)) => Self::new(origin, name),
            None => Self::new("", full),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.origin, self.name)
    }
}

#[derive(Clone, Debug, Default)]
pub struct InkList {
    items: IndexMap<ListItem, i64>,
    origins: Vec<String>,
}

impl PartialEq for InkList {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self.items.keys().all(|k| other.items.contains_key(k))
    }
}

impl InkList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_literal(lit: &ListLiteral) -> Self {
        let mut list = Self::new();
        for (full, value) in &lit.items {
            list.insert(ListItem::parse(full), *value);
        }
        for origin in &lit.origins {
            list.add_origin(origin);
        }
        list
    }

    pub fn to_literal(&self) -> ListLiteral {
        ListLiteral {
            items: self
                .items
                .iter()
                .map(|(k, v)| (k.full_name(), *v))
                .collect(),
            origins: self.origins.clone(),
        }
    }

    /// A single-item list looked up in the story's definitions.
    pub fn single(graph: &StoryGraph, origin: &str, value: i64) -> Option<Self> {
        let def = graph.list_definition(origin)?;
        let name = def.item_with_value(value)?;
        let mut list = Self::new();
        list.insert(ListItem::new(origin, name), value);
        Some(list)
    }

    pub fn insert(&mut self, item: ListItem, value: i64) {
        self.add_origin(&item.origin);
        self.items.insert(item, value);
    }

    pub fn add_origin(&mut self, origin: &str) {
        if !origin.is_empty() && !self.origins.iter().any(|o| o == origin) {
            self.origins.push(origin.to_string());
        }
    }

    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains_item(&self, item: &ListItem) -> bool {
        self.items.contains_key(item)
    }

    /// Items sorted by value, then origin, then name.
    pub fn ordered(&self) -> Vec<(&ListItem, i64)> {
        let mut v: Vec<(&ListItem, i64)> = self.items.iter().map(|(k, v)| (k, *v)).collect();
        v.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        v
    }

    pub fn min_item(&self) -> Option<(&ListItem, i64)> {
        self.ordered().into_iter().next()
    }

    pub fn max_item(&self) -> Option<(&ListItem, i64)> {
        self.ordered().into_iter().last()
    }

    fn min_value(&self) -> i64 {
        self.min_item().map(|(_, v)| v).unwrap_or(0)
    }

    fn max_value(&self) -> i64 {
        self.max_item().map(|(_, v)| v).unwrap_or(0)
    }

    pub fn min_as_list(&self) -> Self {
        self.pick(self.min_item())
    }

    pub fn max_as_list(&self) -> Self {
        self.pick(self.max_item())
    }

    fn pick(&self, item: Option<(&ListItem, i64)>) -> Self {
        let mut out = Self {
            items: IndexMap::new(),
            origins: self.origins.clone(),
        };
        if let Some((k, v)) = item {
            out.items.insert(k.clone(), v);
        }
        out
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for (k, v) in &other.items {
            out.insert(k.clone(), *v);
        }
        for o in &other.origins {
            out.add_origin(o);
        }
        out
    }

    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = Self {
            items: IndexMap::new(),
            origins: self.origins.clone(),
        };
        for (k, v) in &self.items {
            if other.items.contains_key(k) {
                out.items.insert(k.clone(), *v);
            }
        }
        out
    }

    pub fn without(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for k in other.items.keys() {
            out.items.shift_remove(k);
        }
        out
    }

    /// True when every item of `other` is present. Empty lists contain nothing.
    pub fn contains(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        other.items.keys().all(|k| self.items.contains_key(k))
    }

    pub fn greater_than(&self, other: &Self) -> bool {
        if self.is_empty() {
            return false;
        }
        if other.is_empty() {
            return true;
        }
        self.min_value() > other.max_value()
    }

    pub fn greater_than_or_equals(&self, other: &Self) -> bool {
        if self.is_empty() {
            return false;
        }
        if other.is_empty() {
            return true;
        }
        self.min_value() >= other.min_value() && self.max_value() >= other.max_value()
    }

    pub fn less_than(&self, other: &Self) -> bool {
        if other.is_empty() {
            return false;
        }
        if self.is_empty() {
            return true;
        }
        self.max_value() < other.min_value()
    }

    pub fn less_than_or_equals(&self, other: &Self) -> bool {
        if other.is_empty() {
            return false;
        }
        if self.is_empty() {
            return true;
        }
        self.max_value() <= other.max_value() && self.min_value() <= other.min_value()
    }

    /// Every item of every origin this list draws from.
    pub fn all(&self, graph: &StoryGraph) -> Self {
        let mut out = Self::new();
        for origin in &self.origins {
            if let Some(def) = graph.list_definition(origin) {
                for (name, v) in &def.items {
                    out.insert(ListItem::new(origin.clone(), name.clone()), *v);
                }
            }
        }
        out.origins = self.origins.clone();
        out
    }

    pub fn inverse(&self, graph: &StoryGraph) -> Self {
        self.all(graph).without(self)
    }

    /// Shifts every item by `delta`, dropping items that fall off their definition.
    pub fn shifted(&self, graph: &StoryGraph, delta: i64) -> Self {
        let mut out = Self {
            items: IndexMap::new(),
            origins: self.origins.clone(),
        };
        for (item, v) in &self.items {
            let Some(def) = graph.list_definition(&item.origin) else {
                continue;
            };
            if let Some(name) = def.item_with_value(v + delta) {
                out.items
                    .insert(ListItem::new(item.origin.clone(), name), v + delta);
            }
        }
        out
    }

    /// Items whose values fall within `[min, max]`.
    pub fn range(&self, min: i64, max: i64) -> Self {
        let mut out = Self {
            items: IndexMap::new(),
            origins: self.origins.clone(),
        };
        for (k, v) in &self.items {
            if *v >= min && *v <= max {
                out.items.insert(k.clone(), *v);
            }
        }
        out
    }

    pub fn value(&self) -> i64 {
        self.max_value()
    }

    pub fn item_at(&self, index: usize) -> Option<(ListItem, i64)> {
        self.ordered().get(index).map(|(k, v)| ((*k).clone(), *v))
    }
}

impl fmt::Display for InkList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (item, _)) in self.ordered().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&item.name)?;
        }
        Ok(())
    }
}
