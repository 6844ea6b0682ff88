use crate::node::{ContentTree, NodeId};
use crate::path::{Component, Path};

/// A location in the content tree: the child at `index` within `container`,
/// or the container itself when `index` is negative.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Pointer {
    pub container: Option<NodeId>,
    pub index: i32,
}

pub const NULL: Pointer = Pointer {
    container: None,
    index: -1,
};

impl Pointer {
    pub fn new(container: Option<NodeId>, index: i32) -> Pointer {
        Pointer { container, index }
    }

    pub fn start_of(container: NodeId) -> Pointer {
        Pointer {
            container: Some(container),
            index: 0,
        }
    }

    pub fn is_null(&self) -> bool {
        self.container.is_none()
    }

    /// The node this pointer refers to: the container itself when the index
    /// is negative or the container is empty, nothing when the index is out
    /// of range of non-empty content.
    pub fn resolve(&self, tree: &ContentTree) -> Option<NodeId> {
        let container = self.container?;

        if self.index < 0 {
            return Some(container);
        }

        let data = tree.container(container)?;

        if data.content.is_empty() {
            return Some(container);
        }

        data.content.get(self.index as usize).copied()
    }

    /// The absolute path of the pointed-to position.
    pub fn get_path(&self, tree: &ContentTree) -> Option<Path> {
        let container = self.container?;

        if self.index >= 0 {
            Some(
                tree.path_of(container)
                    .path_by_appending_component(Component::Index(self.index as usize)),
            )
        } else {
            Some(tree.path_of(container).clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ContainerData, ContentTree, NodeKind};
    use crate::value_type::ValueType;

    #[test]
    fn resolve_rules() {
        let mut tree = ContentTree::new();
        let root = tree.add(None, NodeKind::Container(ContainerData::new(None, 0)));
        let text = tree.add(Some(root), NodeKind::Value(ValueType::new_string("x")));
        tree.container_mut(root).unwrap().content.push(text);

        assert_eq!(Some(text), Pointer::start_of(root).resolve(&tree));
        assert_eq!(Some(root), Pointer::new(Some(root), -1).resolve(&tree));
        assert_eq!(None, Pointer::new(Some(root), 5).resolve(&tree));
        assert!(NULL.resolve(&tree).is_none());

        let empty = tree.add(Some(root), NodeKind::Container(ContainerData::new(None, 0)));
        assert_eq!(Some(empty), Pointer::start_of(empty).resolve(&tree));
    }
}
