//! Addresses of content nodes within the story tree.
use std::cell::OnceCell;
use std::fmt;
use std::hash::{Hash, Hasher};

/// One step of a [`Path`]: a child index, a named child, or the parent marker
/// `^`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Component {
    Index(usize),
    Name(String),
    Parent,
}

impl Component {
    fn parse(text: &str) -> Component {
        if let Ok(index) = text.parse::<usize>() {
            Component::Index(index)
        } else if text == "^" {
            Component::Parent
        } else {
            Component::Name(text.to_string())
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Component::Index(i) => Some(*i),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Component::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Component::Index(_))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Index(i) => write!(f, "{i}"),
            Component::Name(n) => write!(f, "{n}"),
            Component::Parent => write!(f, "^"),
        }
    }
}

/// An absolute (root-relative) or relative address of a node in the content
/// tree. Paths are immutable once built; the dotted string form is computed
/// lazily and cached.
#[derive(Clone, Debug)]
pub struct Path {
    components: Vec<Component>,
    relative: bool,
    components_string: OnceCell<String>,
}

impl Path {
    pub fn new(components: Vec<Component>, relative: bool) -> Path {
        Path {
            components,
            relative,
            components_string: OnceCell::new(),
        }
    }

    /// Parses a dotted components string, e.g. `hello.1.world` or the
    /// relative form `.^.^.hello`.
    pub fn from_components_string(text: &str) -> Path {
        let mut components = Vec::new();
        let mut relative = false;

        let mut rest = text;
        if let Some(stripped) = rest.strip_prefix('.') {
            relative = true;
            rest = stripped;
        }

        if !rest.is_empty() {
            for part in rest.split('.') {
                components.push(Component::parse(part));
            }
        }

        Path::new(components, relative)
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get_component(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    pub fn last_component(&self) -> Option<&Component> {
        self.components.last()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// The path formed by this path followed by `to_append`, collapsing any
    /// leading parent markers of a relative `to_append` into upward moves.
    pub fn path_by_appending_path(&self, to_append: &Path) -> Path {
        let mut upward_moves = 0;
        for component in &to_append.components {
            if matches!(component, Component::Parent) {
                upward_moves += 1;
            } else {
                break;
            }
        }

        let mut components: Vec<Component> = self
            .components
            .iter()
            .take(self.components.len().saturating_sub(upward_moves))
            .cloned()
            .collect();

        for component in to_append.components.iter().skip(upward_moves) {
            components.push(component.clone());
        }

        Path::new(components, self.relative)
    }

    pub fn path_by_appending_component(&self, component: Component) -> Path {
        let mut components = self.components.clone();
        components.push(component);
        Path::new(components, self.relative)
    }

    pub fn get_components_string(&self) -> &str {
        self.components_string.get_or_init(|| {
            let joined = self
                .components
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<String>>()
                .join(".");

            if self.relative {
                format!(".{joined}")
            } else {
                joined
            }
        })
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.relative == other.relative && self.components == other.components
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.relative.hash(state);
        self.components.hash(state);
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_components_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_absolute() {
        let path = Path::from_components_string("hello.1.world");
        assert!(!path.is_relative());
        assert_eq!(3, path.len());
        assert_eq!(Some(1), path.get_component(1).unwrap().index());
        assert_eq!("hello.1.world", path.get_components_string());
    }

    #[test]
    fn parse_relative() {
        let path = Path::from_components_string(".^.^.hello.5");
        assert!(path.is_relative());
        assert_eq!(4, path.len());
        assert_eq!(&Component::Parent, path.get_component(0).unwrap());
        assert_eq!(".^.^.hello.5", path.get_components_string());
    }

    #[test]
    fn append_collapses_parent_markers() {
        let base = Path::from_components_string("knot.stitch.3");
        let rel = Path::from_components_string(".^.^.other");
        let joined = base.path_by_appending_path(&rel);
        assert_eq!("knot.other", joined.get_components_string());
    }

    #[test]
    fn structural_equality() {
        let a = Path::from_components_string("a.0.b");
        let b = Path::from_components_string("a.0.b");
        let c = Path::from_components_string(".a.0.b");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
