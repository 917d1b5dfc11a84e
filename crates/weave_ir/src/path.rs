//! Dotted paths into the content graph.
//!
//! A path is a sequence of components: a child name, an index into a
//! container's ordered content, or `^` for the parent container. Relative
//! paths start with a `.` in their textual form.

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Component {
    Index(usize),
    Name(String),
    Parent,
}

impl Component {
    pub fn parse(s: &str) -> Self {
        if s == "^" {
            return Component::Parent;
        }
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(i) = s.parse::<usize>() {
                return Component::Index(i);
            }
        }
        Component::Name(s.to_string())
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Component::Index(_))
    }

    pub fn is_parent(&self) -> bool {
        matches!(self, Component::Parent)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Index(i) => write!(f, "{i}"),
            Component::Name(n) => f.write_str(n),
            Component::Parent => f.write_str("^"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path {
    components: Vec<Component>,
    relative: bool,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(components: Vec<Component>, relative: bool) -> Self {
        Self {
            components,
            relative,
        }
    }

    /// Parses the textual form. The empty string is the root path.
    pub fn parse(s: &str) -> Self {
        let (relative, body) = match s.strip_prefix('.') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let components = if body.is_empty() {
            Vec::new()
        } else {
            body.split('.').map(Component::parse).collect()
        };
        Self {
            components,
            relative,
        }
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    pub fn is_root(&self) -> bool {
        !self.relative && self.components.is_empty()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn last(&self) -> Option<&Component> {
        self.components.last()
    }

    pub fn with_component(&self, c: Component) -> Path {
        let mut components = self.components.clone();
        components.push(c);
        Path {
            components,
            relative: self.relative,
        }
    }

    pub fn with_index(&self, i: usize) -> Path {
        self.with_component(Component::Index(i))
    }

    pub fn parent(&self) -> Option<Path> {
        if self.components.is_empty() {
            return None;
        }
        let mut components = self.components.clone();
        components.pop();
        Some(Path {
            components,
            relative: self.relative,
        })
    }

    /// Turns a path written relative to a node into an absolute one.
    ///
    /// `container` is the absolute path of the container holding the node.
    /// A leading `^` names that container itself; every later `^` climbs one
    /// level. Absolute paths are returned unchanged.
    pub fn anchored_at(&self, container: &Path) -> Path {
        if !self.relative {
            return self.clone();
        }
        let mut out: Vec<Component> = container.components.clone();
        let mut parts = self.components.iter().peekable();
        if parts.peek().is_some_and(|c| c.is_parent()) {
            parts.next();
        }
        for c in parts {
            match c {
                Component::Parent => {
                    out.pop();
                }
                other => out.push(other.clone()),
            }
        }
        Path {
            components: out,
            relative: false,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative {
            f.write_str(".")?;
        }
        for (i, c) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Path::parse(s))
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::parse(s)
    }
}
