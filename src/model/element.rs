use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_TREE: AtomicU32 = AtomicU32::new(0);

/// Handle to a node of an [`ElementTree`]. Handles of removed nodes are never
/// reused: the slot generation is bumped on removal. A handle only resolves in
/// the tree that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementId {
    tree: u32,
    index: u32,
    generation: u32,
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ElementKind {
    FlowGraph,
    Block,
    Port,
    Param,
    Variable,
    Connection,
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::FlowGraph => "flow graph",
            ElementKind::Block => "block",
            ElementKind::Port => "port",
            ElementKind::Param => "param",
            ElementKind::Variable => "variable",
            ElementKind::Connection => "connection",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
struct Node {
    kind: ElementKind,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena holding the ownership tree of a flow graph.
///
/// Every node has exactly one parent, fixed at insertion. Removing a node
/// removes its whole subtree.
#[derive(Debug)]
pub struct ElementTree {
    token: u32,
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementTree {
    pub fn new() -> Self {
        Self {
            token: NEXT_TREE.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert_root(&mut self, kind: ElementKind) -> ElementId {
        self.allocate(Node {
            kind,
            parent: None,
            children: Vec::new(),
        })
    }

    /// Appends a new child to `parent`. Returns `None` if the parent is gone.
    pub fn insert(&mut self, kind: ElementKind, parent: ElementId) -> Option<ElementId> {
        if !self.contains(parent) {
            return None;
        }
        let id = self.allocate(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.node_mut(parent)?.children.push(id);
        Some(id)
    }

    /// Removes `id` and all of its descendants, returning the removed handles
    /// with `id` first.
    pub fn remove(&mut self, id: ElementId) -> Vec<ElementId> {
        let Some(parent) = self.node(id).map(|n| n.parent) else {
            return Vec::new();
        };
        if let Some(parent) = parent.and_then(|p| self.node_mut(p)) {
            parent.children.retain(|c| *c != id);
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
                stack.extend(node.children.into_iter().rev());
                removed.push(current);
            }
        }
        removed
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.node(id).is_some()
    }

    pub fn kind(&self, id: ElementId) -> Option<ElementKind> {
        self.node(id).map(|n| n.kind)
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Nearest strict ancestor of `id` with the given kind.
    pub fn ancestor_of_kind(&self, id: ElementId, kind: ElementKind) -> Option<ElementId> {
        let mut current = self.parent(id);
        while let Some(candidate) = current {
            if self.kind(candidate) == Some(kind) {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    /// Handles from the root down to `id`, inclusive.
    pub fn path(&self, id: ElementId) -> Vec<ElementId> {
        let mut path = Vec::new();
        let mut current = self.contains(id).then_some(id);
        while let Some(node) = current {
            path.push(node);
            current = self.parent(node);
        }
        path.reverse();
        path
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn allocate(&mut self, node: Node) -> ElementId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            ElementId {
                tree: self.token,
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            ElementId {
                tree: self.token,
                index,
                generation: 0,
            }
        }
    }

    fn node(&self, id: ElementId) -> Option<&Node> {
        if id.tree != self.token {
            return None;
        }
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    fn node_mut(&mut self, id: ElementId) -> Option<&mut Node> {
        if id.tree != self.token {
            return None;
        }
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }
}
