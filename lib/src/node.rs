//! The story content tree: an append-only arena of nodes built once from the
//! compiled JSON and immutable afterwards. Nodes address each other by
//! [`NodeId`] and keep a parent link for path computation and relative-path
//! resolution.
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt::Write;

use crate::control_command::CommandType;
use crate::native_function_call::Op;
use crate::path::{Component, Path};
use crate::push_pop::PushPopType;
use crate::story_error::StoryError;
use crate::value_type::ValueType;

/// Stable index of a node in the content arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub u32);

/// The root container of a story is always the first node loaded.
pub const ROOT: NodeId = NodeId(0);

/// An ordered list of children plus a name map for named children. A child
/// may live in both, or only in the name map (containers the compiler hoists
/// for reuse).
#[derive(Debug)]
pub struct ContainerData {
    pub name: Option<String>,
    pub content: Vec<NodeId>,
    pub named_content: HashMap<String, NodeId>,
    pub visits_should_be_counted: bool,
    pub turn_index_should_be_counted: bool,
    pub counting_at_start_only: bool,
}

impl ContainerData {
    pub fn new(name: Option<String>, count_flags: i32) -> ContainerData {
        ContainerData {
            name,
            content: Vec::new(),
            named_content: HashMap::new(),
            visits_should_be_counted: (count_flags & 1) > 0,
            turn_index_should_be_counted: (count_flags & 2) > 0,
            counting_at_start_only: (count_flags & 4) > 0,
        }
    }

    pub fn has_valid_name(&self) -> bool {
        self.name.as_ref().map(|n| !n.is_empty()).unwrap_or(false)
    }

    pub fn get_count_flags(&self) -> i32 {
        let mut flags = 0;
        if self.visits_should_be_counted {
            flags |= 1;
        }
        if self.turn_index_should_be_counted {
            flags |= 2;
        }
        if self.counting_at_start_only {
            flags |= 4;
        }
        flags
    }
}

/// A jump instruction, optionally pushing a call-stack frame or calling an
/// external host function.
#[derive(Debug)]
pub struct DivertData {
    pub target_path: Option<Path>,
    pub variable_divert_name: Option<String>,
    pub pushes_to_stack: bool,
    pub stack_push_type: PushPopType,
    pub is_external: bool,
    pub external_args: usize,
    pub is_conditional: bool,
}

impl DivertData {
    pub fn has_variable_target(&self) -> bool {
        self.variable_divert_name.is_some()
    }
}

/// The compiled representation of one offered choice, flag bits per the
/// bytecode format.
#[derive(Debug)]
pub struct ChoicePointData {
    pub path_on_choice: Path,
    pub has_condition: bool,
    pub has_start_content: bool,
    pub has_choice_only_content: bool,
    pub is_invisible_default: bool,
    pub once_only: bool,
}

impl ChoicePointData {
    pub fn new(flags: i32, path_string_on_choice: &str) -> ChoicePointData {
        ChoicePointData {
            path_on_choice: Path::from_components_string(path_string_on_choice),
            has_condition: (flags & 1) > 0,
            has_start_content: (flags & 2) > 0,
            has_choice_only_content: (flags & 4) > 0,
            is_invisible_default: (flags & 8) > 0,
            once_only: (flags & 16) > 0,
        }
    }
}

#[derive(Debug)]
pub struct VariableAssignmentData {
    pub variable_name: String,
    pub is_new_declaration: bool,
    pub is_global: bool,
}

/// Reads either a variable by name or a visit count by path.
#[derive(Debug)]
pub struct VariableReferenceData {
    pub name: Option<String>,
    pub path_for_count: Option<Path>,
}

/// The closed set of content-node kinds, matched exhaustively by the
/// stepper.
#[derive(Debug)]
pub enum NodeKind {
    Container(ContainerData),
    Value(ValueType),
    Glue,
    Command(CommandType),
    NativeCall(Op),
    Divert(DivertData),
    ChoicePoint(ChoicePointData),
    VariableAssignment(VariableAssignmentData),
    VariableReference(VariableReferenceData),
    Tag(String),
    Void,
}

pub struct Node {
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    path: OnceCell<Path>,
}

/// The result of path resolution: the deepest node reached, and whether the
/// resolution stopped early (`approximate`) because a component was out of
/// range or missing. Callers loading old saves may accept an approximate
/// result with a warning; exact callers must not.
#[derive(Clone, Copy)]
pub struct SearchResult {
    pub node: Option<NodeId>,
    pub approximate: bool,
}

impl SearchResult {
    pub fn correct_node(&self) -> Option<NodeId> {
        if self.approximate {
            None
        } else {
            self.node
        }
    }
}

#[derive(Default)]
pub struct ContentTree {
    nodes: Vec<Node>,
}

impl ContentTree {
    pub fn new() -> ContentTree {
        ContentTree::default()
    }

    pub fn add(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            parent,
            kind,
            path: OnceCell::new(),
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0 as usize].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0 as usize].parent
    }

    pub fn set_parent(&mut self, id: NodeId, parent: NodeId) {
        self.nodes[id.0 as usize].parent = Some(parent);
    }

    pub fn container(&self, id: NodeId) -> Option<&ContainerData> {
        match &self.nodes[id.0 as usize].kind {
            NodeKind::Container(data) => Some(data),
            _ => None,
        }
    }

    pub fn container_mut(&mut self, id: NodeId) -> Option<&mut ContainerData> {
        match &mut self.nodes[id.0 as usize].kind {
            NodeKind::Container(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_container(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0 as usize].kind, NodeKind::Container(_))
    }

    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.container(id).and_then(|c| c.name.as_deref())
    }

    /// The absolute path of a node, computed by walking the parent chain and
    /// cached on first access. Named containers are addressed by name,
    /// everything else by its index within its parent's ordered content.
    pub fn path_of(&self, id: NodeId) -> &Path {
        self.nodes[id.0 as usize].path.get_or_init(|| {
            let mut components: Vec<Component> = Vec::new();
            let mut child = id;

            while let Some(parent) = self.parent(child) {
                let parent_data = self
                    .container(parent)
                    .expect("non-container node owns children");

                let named = self
                    .container(child)
                    .filter(|c| c.has_valid_name())
                    .and_then(|c| c.name.clone());

                match named {
                    Some(name) => components.push(Component::Name(name)),
                    None => {
                        let index = parent_data
                            .content
                            .iter()
                            .position(|c| *c == child)
                            .unwrap_or(0);
                        components.push(Component::Index(index));
                    }
                }

                child = parent;
            }

            components.reverse();
            Path::new(components, false)
        })
    }

    fn content_with_path_component(&self, id: NodeId, component: &Component) -> Option<NodeId> {
        match component {
            Component::Index(index) => self.container(id).and_then(|c| c.content.get(*index).copied()),
            Component::Name(name) => self.container(id).and_then(|c| c.named_content.get(name).copied()),
            Component::Parent => self.parent(id),
        }
    }

    /// Walks `path` starting from `start`, stopping early with
    /// `approximate = true` when a component cannot be followed. The node of
    /// an approximate result is the deepest one reached.
    pub fn content_at_path_range(
        &self,
        start: NodeId,
        path: &Path,
        partial_start: usize,
        partial_length: usize,
    ) -> SearchResult {
        let mut approximate = false;
        let mut current = start;

        for component in &path.components()[partial_start..partial_length] {
            match self.content_with_path_component(current, component) {
                Some(next) => current = next,
                None => {
                    approximate = true;
                    break;
                }
            }
        }

        SearchResult {
            node: Some(current),
            approximate,
        }
    }

    pub fn content_at_path(&self, path: &Path) -> SearchResult {
        self.content_at_path_range(ROOT, path, 0, path.len())
    }

    /// Resolves a possibly-relative path against the node it appears in.
    pub fn resolve_path(&self, from: NodeId, path: &Path) -> SearchResult {
        if !path.is_relative() {
            return self.content_at_path(path);
        }

        // A relative path resolves against the nearest container: the node
        // itself if it is one, else its parent with one leading parent
        // marker consumed.
        if self.is_container(from) {
            self.content_at_path_range(from, path, 0, path.len())
        } else {
            match self.parent(from) {
                Some(parent) => self.content_at_path_range(parent, path, 1, path.len()),
                None => SearchResult {
                    node: None,
                    approximate: true,
                },
            }
        }
    }

    /// Turns an absolute path into a pointer, approximating to the nearest
    /// found content where the exact location no longer exists.
    pub fn pointer_at_path(&self, path: &Path) -> Result<crate::pointer::Pointer, StoryError> {
        if path.len() == 0 {
            return Ok(crate::pointer::NULL);
        }

        let last_is_index = path.last_component().map(|c| c.is_index()).unwrap_or(false);

        let (result, pointer) = if last_is_index {
            let result = self.content_at_path_range(ROOT, path, 0, path.len() - 1);
            let container = result.node.filter(|n| self.is_container(*n));
            let index = path
                .last_component()
                .and_then(|c| c.index())
                .unwrap_or(0) as i32;
            (result, crate::pointer::Pointer::new(container, index))
        } else {
            let result = self.content_at_path(path);
            let container = result.node.filter(|n| self.is_container(*n));
            (result, crate::pointer::Pointer::new(container, -1))
        };

        let path_length_used = if last_is_index {
            path.len() - 1
        } else {
            path.len()
        };

        if result.node.is_none() || (result.node == Some(ROOT) && path_length_used > 0) {
            return Err(StoryError::InvalidStoryState(format!(
                "Failed to find content at path '{}', and no approximation of it was possible.",
                path.get_components_string()
            )));
        }

        Ok(pointer)
    }

    /// Dumps the container hierarchy for debugging, marking the node the
    /// given pointer target sits on.
    pub fn build_string_of_hierarchy(&self, current: Option<NodeId>) -> String {
        let mut sb = String::new();
        self.write_hierarchy(ROOT, current, 0, &mut sb);
        sb
    }

    fn write_hierarchy(
        &self,
        id: NodeId,
        current: Option<NodeId>,
        indent: usize,
        sb: &mut String,
    ) {
        let pad = "  ".repeat(indent);
        let marker = if current == Some(id) { "  <---" } else { "" };

        match self.kind(id) {
            NodeKind::Container(data) => {
                let name = data.name.as_deref().unwrap_or("");
                let _ = writeln!(sb, "{pad}[{name}]{marker}");
                for child in &data.content {
                    self.write_hierarchy(*child, current, indent + 1, sb);
                }
                for (name, child) in &data.named_content {
                    if !data.content.contains(child) {
                        let _ = writeln!(sb, "{pad}  -- named: {name} --");
                        self.write_hierarchy(*child, current, indent + 1, sb);
                    }
                }
            }
            NodeKind::Value(value) => {
                let _ = writeln!(sb, "{pad}{value:?}{marker}");
            }
            kind => {
                let _ = writeln!(sb, "{pad}{kind:?}{marker}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> ContentTree {
        // root { "hello": [Value("hi"), inner { Value(1) }] }
        let mut tree = ContentTree::new();
        let root = tree.add(None, NodeKind::Container(ContainerData::new(None, 0)));
        assert_eq!(ROOT, root);

        let hello = tree.add(
            Some(root),
            NodeKind::Container(ContainerData::new(Some("hello".to_string()), 0)),
        );
        let text = tree.add(Some(hello), NodeKind::Value(ValueType::new_string("hi")));
        let inner = tree.add(Some(hello), NodeKind::Container(ContainerData::new(None, 0)));
        let one = tree.add(Some(inner), NodeKind::Value(ValueType::Int(1)));

        tree.container_mut(inner).unwrap().content.push(one);
        tree.container_mut(hello).unwrap().content.push(text);
        tree.container_mut(hello).unwrap().content.push(inner);

        let hello_data = tree.container_mut(root).unwrap();
        hello_data.content.push(hello);
        hello_data.named_content.insert("hello".to_string(), hello);

        tree
    }

    #[test]
    fn path_round_trip() {
        let tree = sample_tree();
        let path = Path::from_components_string("hello.1.0");
        let found = tree.content_at_path(&path);
        assert!(!found.approximate);

        let node = found.correct_node().unwrap();
        assert_eq!(&path, tree.path_of(node));
        assert_eq!(
            node,
            tree.content_at_path(tree.path_of(node)).correct_node().unwrap()
        );
    }

    #[test]
    fn missing_name_is_approximate() {
        let tree = sample_tree();
        let result = tree.content_at_path(&Path::from_components_string("hello.nothere"));
        assert!(result.approximate);
        assert!(result.correct_node().is_none());
        // The deepest container reached is still reported.
        assert!(result.node.is_some());
    }

    #[test]
    fn out_of_range_index_is_approximate() {
        let tree = sample_tree();
        let result = tree.content_at_path(&Path::from_components_string("hello.9"));
        assert!(result.approximate);
    }

    #[test]
    fn relative_resolution_from_leaf() {
        let tree = sample_tree();
        let leaf = tree
            .content_at_path(&Path::from_components_string("hello.1.0"))
            .correct_node()
            .unwrap();

        let rel = Path::from_components_string(".^.^.0");
        let resolved = tree.resolve_path(leaf, &rel);
        assert!(!resolved.approximate);
        assert_eq!(
            "hello.0",
            tree.path_of(resolved.node.unwrap()).get_components_string()
        );
    }
}
