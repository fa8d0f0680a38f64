//! Path-keyed node tree shared by the shipped backends.
//!
//! Nodes live in one flat map keyed by normalised path; each group also keeps
//! the names of its children so enumeration follows insertion order.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::{AttributeValue, Dataset, NodeKind};
use crate::path;
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Group {
        attributes: Vec<(String, AttributeValue)>,
        children: Vec<String>,
    },
    Dataset(Dataset),
}

impl Node {
    fn empty_group() -> Self {
        Node::Group { attributes: Vec::new(), children: Vec::new() }
    }

    fn kind(&self) -> NodeKind {
        match self {
            Node::Group { .. } => NodeKind::Group,
            Node::Dataset(_) => NodeKind::Dataset,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NodeTree {
    nodes: HashMap<String, Node>,
}

impl NodeTree {
    /// A tree holding only the root group.
    pub(crate) fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(path::ROOT.to_string(), Node::empty_group());
        Self { nodes }
    }

    pub(crate) fn kind(&self, path: &str) -> Option<NodeKind> {
        self.nodes.get(&path::normalize(path)).map(Node::kind)
    }

    pub(crate) fn create_group(&mut self, path: &str) -> Result<()> {
        let key = path::normalize(path);
        if self.nodes.contains_key(&key) {
            return Err(Error::StorageError(format!("{key} already exists")));
        }
        self.link_child(&key)?;
        self.nodes.insert(key, Node::empty_group());
        Ok(())
    }

    pub(crate) fn children(&self, path: &str) -> Result<Vec<(String, NodeKind)>> {
        let key = path::normalize(path);
        let children = self.group_children(&key)?;
        Ok(children
            .iter()
            .filter_map(|name| {
                let child = path::join(&key, name);
                self.nodes.get(&child).map(|n| (name.clone(), n.kind()))
            })
            .collect())
    }

    pub(crate) fn remove(&mut self, path: &str) -> Result<()> {
        let key = path::normalize(path);
        if path::is_root(&key) {
            return Err(Error::StorageError("the root group cannot be removed".into()));
        }
        if !self.nodes.contains_key(&key) {
            return Err(Error::StorageError(format!("{key} does not exist")));
        }

        let prefix = format!("{key}/");
        self.nodes.retain(|p, _| p != &key && !p.starts_with(&prefix));

        let name = path::leaf(&key).to_string();
        if let Some(Node::Group { children, .. }) = self.nodes.get_mut(&path::parent(&key)) {
            children.retain(|c| *c != name);
        }
        Ok(())
    }

    pub(crate) fn set_attribute(&mut self, path: &str, name: &str, value: AttributeValue) -> Result<()> {
        let attributes = self.group_attributes_mut(path)?;
        match attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => attributes.push((name.to_string(), value)),
        }
        Ok(())
    }

    pub(crate) fn attribute(&self, path: &str, name: &str) -> Result<Option<AttributeValue>> {
        Ok(self
            .group_attributes(path)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone()))
    }

    pub(crate) fn attributes(&self, path: &str) -> Result<Vec<(String, AttributeValue)>> {
        Ok(self.group_attributes(path)?.to_vec())
    }

    pub(crate) fn write_dataset(&mut self, path: &str, dataset: Dataset) -> Result<()> {
        let key = path::normalize(path);
        match self.nodes.get_mut(&key) {
            Some(Node::Dataset(existing)) => {
                *existing = dataset;
                return Ok(());
            }
            Some(Node::Group { .. }) => {
                return Err(Error::StorageError(format!("{key} is a group, not a dataset")));
            }
            None => {}
        }
        self.link_child(&key)?;
        self.nodes.insert(key, Node::Dataset(dataset));
        Ok(())
    }

    pub(crate) fn read_dataset(&self, path: &str) -> Result<Dataset> {
        let key = path::normalize(path);
        match self.nodes.get(&key) {
            Some(Node::Dataset(ds)) => Ok(ds.clone()),
            Some(Node::Group { .. }) => Err(Error::StorageError(format!("{key} is a group, not a dataset"))),
            None => Err(Error::StorageError(format!("{key} does not exist"))),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Register `key` in its parent's child list. The parent must be a group.
    fn link_child(&mut self, key: &str) -> Result<()> {
        if path::is_root(key) {
            return Err(Error::StorageError("the root group already exists".into()));
        }
        let parent = path::parent(key);
        match self.nodes.get_mut(&parent) {
            Some(Node::Group { children, .. }) => {
                children.push(path::leaf(key).to_string());
                Ok(())
            }
            Some(Node::Dataset(_)) => Err(Error::StorageError(format!(
                "cannot create {key}: parent {parent} is a dataset"
            ))),
            None => Err(Error::StorageError(format!(
                "cannot create {key}: parent {parent} does not exist"
            ))),
        }
    }

    fn group_children(&self, key: &str) -> Result<&[String]> {
        match self.nodes.get(key) {
            Some(Node::Group { children, .. }) => Ok(children),
            Some(Node::Dataset(_)) => Err(Error::StorageError(format!("{key} is a dataset, not a group"))),
            None => Err(Error::StorageError(format!("{key} does not exist"))),
        }
    }

    fn group_attributes(&self, path: &str) -> Result<&[(String, AttributeValue)]> {
        let key = path::normalize(path);
        match self.nodes.get(&key) {
            Some(Node::Group { attributes, .. }) => Ok(attributes),
            Some(Node::Dataset(_)) => Err(Error::StorageError(format!("{key} is a dataset, not a group"))),
            None => Err(Error::StorageError(format!("{key} does not exist"))),
        }
    }

    fn group_attributes_mut(&mut self, path: &str) -> Result<&mut Vec<(String, AttributeValue)>> {
        let key = path::normalize(path);
        match self.nodes.get_mut(&key) {
            Some(Node::Group { attributes, .. }) => Ok(attributes),
            Some(Node::Dataset(_)) => Err(Error::StorageError(format!("{key} is a dataset, not a group"))),
            None => Err(Error::StorageError(format!("{key} does not exist"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DatasetBuffer;

    fn ints(extents: &[usize], values: Vec<i32>) -> Dataset {
        Dataset::new(extents, DatasetBuffer::Int32(values)).unwrap()
    }

    #[test]
    fn test_new_tree_has_root() {
        let tree = NodeTree::new();
        assert_eq!(tree.kind("/"), Some(NodeKind::Group));
        assert!(tree.children("/").unwrap().is_empty());
    }

    #[test]
    fn test_create_group_requires_parent() {
        let mut tree = NodeTree::new();
        assert!(tree.create_group("/a/b").is_err());
        tree.create_group("/a").unwrap();
        tree.create_group("/a/b/").unwrap();
        assert_eq!(tree.kind("/a/b"), Some(NodeKind::Group));
        assert!(tree.create_group("/a").is_err());
    }

    #[test]
    fn test_children_keep_insertion_order() {
        let mut tree = NodeTree::new();
        tree.create_group("/g").unwrap();
        tree.write_dataset("/g/1", ints(&[1], vec![1])).unwrap();
        tree.write_dataset("/g/0", ints(&[1], vec![0])).unwrap();
        tree.create_group("/g/sub").unwrap();

        let names: Vec<String> = tree.children("/g").unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["1", "0", "sub"]);
    }

    #[test]
    fn test_write_dataset_replaces_in_place() {
        let mut tree = NodeTree::new();
        tree.write_dataset("/d", ints(&[2], vec![1, 2])).unwrap();
        tree.write_dataset("/d", ints(&[3], vec![3, 4, 5])).unwrap();
        assert_eq!(tree.read_dataset("/d").unwrap().extents(), &[3]);
        assert_eq!(tree.children("/").unwrap().len(), 1);
    }

    #[test]
    fn test_dataset_under_dataset_is_rejected() {
        let mut tree = NodeTree::new();
        tree.write_dataset("/d", ints(&[1], vec![1])).unwrap();
        assert!(tree.write_dataset("/d/e", ints(&[1], vec![1])).is_err());
        assert!(tree.create_group("/d/g").is_err());
        assert!(tree.set_attribute("/d", "x", AttributeValue::Int(1)).is_err());
    }

    #[test]
    fn test_attributes_overwrite_by_name() {
        let mut tree = NodeTree::new();
        tree.set_attribute("/", "a", AttributeValue::Int(1)).unwrap();
        tree.set_attribute("/", "b", AttributeValue::Double(2.0)).unwrap();
        tree.set_attribute("/", "a", AttributeValue::String("x".into())).unwrap();

        let attrs = tree.attributes("/").unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(tree.attribute("/", "a").unwrap(), Some(AttributeValue::String("x".into())));
        assert_eq!(tree.attribute("/", "missing").unwrap(), None);
    }

    #[test]
    fn test_remove_is_recursive() {
        let mut tree = NodeTree::new();
        tree.create_group("/a").unwrap();
        tree.create_group("/a/b").unwrap();
        tree.write_dataset("/a/b/0", ints(&[1], vec![1])).unwrap();
        tree.create_group("/ab").unwrap();

        tree.remove("/a").unwrap();
        assert_eq!(tree.kind("/a"), None);
        assert_eq!(tree.kind("/a/b/0"), None);
        assert_eq!(tree.kind("/ab"), Some(NodeKind::Group));
        assert_eq!(tree.children("/").unwrap().len(), 1);
        assert!(tree.remove("/").is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let mut tree = NodeTree::new();
        tree.create_group("/a").unwrap();
        tree.set_attribute("/a", "DataType", AttributeValue::UInt(3)).unwrap();
        tree.write_dataset("/a/0", ints(&[2, 2], vec![1, 2, 3, 4])).unwrap();

        let json = serde_json::to_string(&tree).unwrap();
        let back: NodeTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back.attribute("/a", "DataType").unwrap(), Some(AttributeValue::UInt(3)));
        assert_eq!(back.read_dataset("/a/0").unwrap(), tree.read_dataset("/a/0").unwrap());
        assert_eq!(back.children("/a").unwrap(), tree.children("/a").unwrap());
    }
}
