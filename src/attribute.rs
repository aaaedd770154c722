//! Attribute tree
//!
//! Hierarchical namespace that maps attribute paths such as
//! `["Requester", "alice", "42", "number"]` to stable [`Quark`] handles and
//! back. Nodes live in an arena indexed by quark; each node records its parent
//! and its children by name.

use crate::error::{Result, StateError};
use crate::types::Quark;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;

/// Pattern segment matching every direct child.
pub const WILDCARD: &str = "*";

/// Separator used by [`AttributeTree::get_full_attribute_path`].
pub const PATH_SEPARATOR: &str = "/";

/// A validated path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeName(String);

impl AttributeName {
    /// Parses and validates a string as an attribute name.
    ///
    /// # Errors
    ///
    /// Returns `StateError::InvalidAttribute` if the name is empty, is the
    /// wildcard, contains a NUL byte or is longer than 255 bytes.
    pub fn parse<S: Into<String>>(name: S) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(StateError::InvalidAttribute(
                "Attribute name cannot be empty".into(),
            ));
        }

        if name == WILDCARD {
            return Err(StateError::InvalidAttribute(format!(
                "Attribute name cannot be the wildcard '{}'",
                WILDCARD
            )));
        }

        if name.contains('\0') {
            return Err(StateError::InvalidAttribute(
                "Attribute name cannot contain null bytes".into(),
            ));
        }

        if name.len() > 255 {
            return Err(StateError::InvalidAttribute(
                "Attribute name cannot exceed 255 characters".into(),
            ));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<AttributeName> for String {
    fn from(name: AttributeName) -> Self {
        name.0
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct AttributeNode {
    name: String,
    parent: Option<Quark>,
    children: FxHashMap<String, Quark>,
    /// Children in creation order
    child_order: Vec<Quark>,
}

impl AttributeNode {
    fn new(name: String, parent: Option<Quark>) -> Self {
        Self {
            name,
            parent,
            children: FxHashMap::default(),
            child_order: Vec::new(),
        }
    }
}

/// Arena of attribute nodes. Index 0 is the root.
#[derive(Debug)]
pub struct AttributeTree {
    nodes: Vec<AttributeNode>,
}

impl AttributeTree {
    pub fn new() -> Self {
        Self::with_capacity(1)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity.max(1));
        nodes.push(AttributeNode::new(String::new(), None));
        Self { nodes }
    }

    /// Number of attributes, root excluded.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn node(&self, quark: Quark) -> Result<&AttributeNode> {
        self.nodes
            .get(quark.index())
            .ok_or_else(|| StateError::NotFound(format!("quark {}", quark)))
    }

    /// Resolve `path` from the root, creating every missing node.
    pub fn get_or_create_quark<S: AsRef<str>>(&mut self, path: &[S]) -> Result<Quark> {
        self.get_or_create_quark_relative(Quark::ROOT, path)
    }

    /// Resolve `path` below `start`, creating every missing node.
    pub fn get_or_create_quark_relative<S: AsRef<str>>(
        &mut self,
        start: Quark,
        path: &[S],
    ) -> Result<Quark> {
        self.node(start)?;

        let mut current = start;
        for segment in path {
            let segment = segment.as_ref();
            current = match self.nodes[current.index()].children.get(segment) {
                Some(&child) => child,
                None => self.add_child(current, AttributeName::parse(segment)?),
            };
        }
        Ok(current)
    }

    fn add_child(&mut self, parent: Quark, name: AttributeName) -> Quark {
        let quark = Quark::new(self.nodes.len() as u32);
        let name = String::from(name);

        let parent_node = &mut self.nodes[parent.index()];
        parent_node.children.insert(name.clone(), quark);
        parent_node.child_order.push(quark);

        self.nodes.push(AttributeNode::new(name, Some(parent)));
        log::trace!("created attribute quark {} under {}", quark, parent);
        quark
    }

    /// Resolve `path` from the root without creating anything.
    pub fn get_quark<S: AsRef<str>>(&self, path: &[S]) -> Result<Quark> {
        self.get_quark_relative(Quark::ROOT, path)
    }

    pub fn get_quark_relative<S: AsRef<str>>(&self, start: Quark, path: &[S]) -> Result<Quark> {
        let mut current = start;
        self.node(current)?;

        for segment in path {
            let segment = segment.as_ref();
            current = *self.nodes[current.index()]
                .children
                .get(segment)
                .ok_or_else(|| StateError::NotFound(self.describe_missing(current, segment)))?;
        }
        Ok(current)
    }

    fn describe_missing(&self, parent: Quark, segment: &str) -> String {
        let parent_path = self.get_full_attribute_path(parent).unwrap_or_default();
        if parent_path.is_empty() {
            segment.to_string()
        } else {
            format!("{}{}{}", parent_path, PATH_SEPARATOR, segment)
        }
    }

    /// Direct children of `quark`. `"*"` matches every child (creation
    /// order); any other pattern matches the child with that exact name.
    pub fn get_children(&self, quark: Quark, pattern: &str) -> Result<Vec<Quark>> {
        let node = self.node(quark)?;
        if pattern == WILDCARD {
            Ok(node.child_order.clone())
        } else {
            Ok(node.children.get(pattern).copied().into_iter().collect())
        }
    }

    /// Every quark matching a multi-segment pattern below `start`, where each
    /// element is a literal name or `"*"`.
    pub fn get_quarks<S: AsRef<str>>(&self, start: Quark, pattern: &[S]) -> Result<Vec<Quark>> {
        self.node(start)?;

        let mut frontier = vec![start];
        for segment in pattern {
            let segment = segment.as_ref();
            let mut next = Vec::new();
            for quark in frontier {
                next.extend(self.get_children(quark, segment)?);
            }
            if next.is_empty() {
                return Ok(next);
            }
            frontier = next;
        }
        Ok(frontier)
    }

    /// Path segments of `quark`, root first. The root has an empty path.
    pub fn get_path(&self, quark: Quark) -> Result<Vec<String>> {
        self.node(quark)?;

        let mut chain: SmallVec<[Quark; 8]> = SmallVec::new();
        let mut current = quark;
        while let Some(parent) = self.nodes[current.index()].parent {
            chain.push(current);
            current = parent;
        }

        Ok(chain
            .iter()
            .rev()
            .map(|q| self.nodes[q.index()].name.clone())
            .collect())
    }

    /// Last segment of the path of `quark`.
    pub fn get_attribute_name(&self, quark: Quark) -> Result<&str> {
        Ok(&self.node(quark)?.name)
    }

    /// Path of `quark` joined with `/`.
    pub fn get_full_attribute_path(&self, quark: Quark) -> Result<String> {
        Ok(self.get_path(quark)?.join(PATH_SEPARATOR))
    }

    /// Parent of `quark`, `None` for the root.
    pub fn get_parent(&self, quark: Quark) -> Result<Option<Quark>> {
        Ok(self.node(quark)?.parent)
    }
}

impl Default for AttributeTree {
    fn default() -> Self {
        Self::new()
    }
}
