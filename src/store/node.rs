//! In-memory node tree of a container file.

use std::collections::BTreeMap;

use super::array::Array;
use super::attr::Attributes;
use crate::util::{Error, Result};

/// A named node: either a group of further nodes or a leaf dataset.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Group(Group),
    Dataset(Dataset),
}

impl Node {
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(g) => Some(g),
            Self::Dataset(_) => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match self {
            Self::Group(g) => Some(g),
            Self::Dataset(_) => None,
        }
    }

    pub fn as_dataset(&self) -> Option<&Dataset> {
        match self {
            Self::Dataset(d) => Some(d),
            Self::Group(_) => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    pub fn attrs(&self) -> &Attributes {
        match self {
            Self::Group(g) => &g.attrs,
            Self::Dataset(d) => &d.attrs,
        }
    }

    /// Number of nodes in this subtree, this one included.
    pub fn count(&self) -> usize {
        match self {
            Self::Group(g) => 1 + g.descendants(),
            Self::Dataset(_) => 1,
        }
    }
}

/// A group: named children in lexicographic order plus attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Group {
    attrs: Attributes,
    children: BTreeMap<String, Node>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    pub fn contains(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    /// Child group by name; `None` if absent or a dataset.
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.children.get(name).and_then(Node::as_group)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.children.get_mut(name).and_then(Node::as_group_mut)
    }

    /// Child dataset by name; `None` if absent or a group.
    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.children.get(name).and_then(Node::as_dataset)
    }

    /// Return the child group `name`, creating it if missing.
    ///
    /// Fails with `DuplicateEntry` if a dataset already holds the name.
    pub fn ensure_group(&mut self, name: &str) -> Result<&mut Group> {
        let node = self
            .children
            .entry(name.to_string())
            .or_insert_with(|| Node::Group(Group::new()));
        match node {
            Node::Group(g) => Ok(g),
            Node::Dataset(_) => Err(Error::DuplicateEntry(format!(
                "{} is a dataset, not a group",
                name
            ))),
        }
    }

    /// Insert a new dataset; fails with `DuplicateEntry` if the name is taken.
    pub fn insert_dataset(&mut self, name: &str, dataset: Dataset) -> Result<()> {
        if self.children.contains_key(name) {
            return Err(Error::DuplicateEntry(name.to_string()));
        }
        self.children.insert(name.to_string(), Node::Dataset(dataset));
        Ok(())
    }

    /// Insert or replace a child node.
    pub(crate) fn insert_node(&mut self, name: String, node: Node) {
        self.children.insert(name, node);
    }

    /// Remove a child (a whole subtree for a group).
    pub fn remove(&mut self, name: &str) -> Option<Node> {
        self.children.remove(name)
    }

    /// Children in name order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Child names in order.
    pub fn names(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Number of nodes below this group.
    pub fn descendants(&self) -> usize {
        self.children.values().map(Node::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Leaf dataset contents.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Opaque bytes (JSON blobs, UTF-8 text).
    Bytes(Vec<u8>),
    /// Typed array, zlib-compressed on disk when `compressed` is set.
    Array { array: Array, compressed: bool },
}

/// A leaf dataset with its attribute map.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub attrs: Attributes,
    pub payload: Payload,
}

impl Dataset {
    pub fn bytes(data: Vec<u8>) -> Self {
        Self { attrs: Attributes::new(), payload: Payload::Bytes(data) }
    }

    pub fn array(array: Array, compressed: bool) -> Self {
        Self {
            attrs: Attributes::new(),
            payload: Payload::Array { array, compressed },
        }
    }

    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Bytes(b) => Some(b),
            Payload::Array { .. } => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match &self.payload {
            Payload::Array { array, .. } => Some(array),
            Payload::Bytes(_) => None,
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.payload, Payload::Array { compressed: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_group_reuses_existing() {
        let mut root = Group::new();
        root.ensure_group("arrays").unwrap().ensure_group("imts").unwrap();
        root.ensure_group("arrays").unwrap();
        assert_eq!(root.len(), 1);
        assert!(root.group("arrays").unwrap().contains("imts"));
    }

    #[test]
    fn test_dataset_blocks_group() {
        let mut root = Group::new();
        root.insert_dataset("leaf", Dataset::bytes(b"x".to_vec())).unwrap();
        assert!(matches!(root.ensure_group("leaf"), Err(Error::DuplicateEntry(_))));
        assert!(matches!(
            root.insert_dataset("leaf", Dataset::bytes(Vec::new())),
            Err(Error::DuplicateEntry(_))
        ));
        assert_eq!(root.dataset("leaf").unwrap().as_bytes(), Some(&b"x"[..]));
    }

    #[test]
    fn test_remove_subtree_and_count() {
        let mut root = Group::new();
        let g = root.ensure_group("a").unwrap();
        g.insert_dataset("x", Dataset::bytes(Vec::new())).unwrap();
        g.insert_dataset("y", Dataset::bytes(Vec::new())).unwrap();
        assert_eq!(Node::Group(root.clone()).count(), 4);

        assert!(root.remove("a").is_some());
        assert!(root.is_empty());
        assert!(root.remove("a").is_none());
    }
}
