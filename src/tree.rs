use indextree::{Arena, NodeId};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::area::SpatialArea;
use crate::config::{NodeOptions, Visibility};
use crate::open_state::OpenState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A file.
    Leaf,
    /// A directory that may be expanded.
    Branch,
    /// A directory closed by configuration or by the child cap.
    LockedBranch,
}

impl NodeKind {
    /// Kind of a directory node: locked when configuration closes it.
    pub fn directory(options: &NodeOptions) -> Self {
        if options.visibility == Visibility::Closed {
            NodeKind::LockedBranch
        } else {
            NodeKind::Branch
        }
    }
}

/// Progress of a directory's child listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unchecked,
    Loading,
    Loaded,
    Failed(String),
}

/// One tile on the map
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Path relative to the mapped root; empty for the root itself
    pub path: PathBuf,
    pub label: String,
    pub kind: NodeKind,
    pub area: Arc<SpatialArea>,
    pub load: LoadState,
    pub open: OpenState,
    pub options: NodeOptions,
    /// Bumped whenever the children are discarded, so a listing started
    /// before the discard can be recognised as stale.
    pub generation: u64,
}

impl TreeNode {
    pub fn new(path: PathBuf, label: String, kind: NodeKind, area: SpatialArea, options: NodeOptions) -> Self {
        // Only expandable directories ever list children.
        let load = match kind {
            NodeKind::Branch => LoadState::Unchecked,
            NodeKind::Leaf | NodeKind::LockedBranch => LoadState::Loaded,
        };
        Self {
            path,
            label,
            kind,
            area: Arc::new(area),
            load,
            open: OpenState::default(),
            options,
            generation: 0,
        }
    }
}

/// The visualized hierarchy, stored in an arena.
///
/// Only the parts of the tree that are currently loaded exist here; children
/// are materialised by the loader and removed again on unload.
pub struct MapTree {
    arena: Arena<TreeNode>,
    root: NodeId,
}

impl MapTree {
    pub fn new(root: TreeNode) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(root);
        Self { arena, root }
    }

    /// Root directory node spanning `area`. A root closed by configuration
    /// is locked like any other closed directory.
    pub fn with_root_dir(label: String, area: SpatialArea, options: NodeOptions) -> Self {
        let kind = NodeKind::directory(&options);
        Self::new(TreeNode::new(PathBuf::new(), label, kind, area, options))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        if id.is_removed(&self.arena) {
            return None;
        }
        self.arena.get(id).map(|n| n.get())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        if id.is_removed(&self.arena) {
            return None;
        }
        self.arena.get_mut(id).map(|n| n.get_mut())
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        if id.is_removed(&self.arena) {
            return Vec::new();
        }
        id.children(&self.arena).collect()
    }

    pub fn append_child(&mut self, parent: NodeId, node: TreeNode) -> NodeId {
        let child = self.arena.new_node(node);
        parent.append(child, &mut self.arena);
        child
    }

    /// Discard the children of a branch and reset it to `Unchecked`.
    ///
    /// Leaves and locked branches are untouched. Returns true if the node
    /// had any load progress to discard.
    pub fn unload_children(&mut self, id: NodeId) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        if node.kind != NodeKind::Branch || node.load == LoadState::Unchecked {
            return false;
        }

        for child in self.children(id) {
            child.remove_subtree(&mut self.arena);
        }
        if let Some(node) = self.get_mut(id) {
            node.load = LoadState::Unchecked;
            node.generation = node.generation.wrapping_add(1);
        }
        true
    }

    /// Number of nodes currently materialised, root included.
    pub fn live_count(&self) -> usize {
        self.arena.iter().filter(|n| !n.is_removed()).count()
    }

    /// Find a loaded node by its root-relative path.
    pub fn find(&self, path: &Path) -> Option<NodeId> {
        self.root
            .descendants(&self.arena)
            .find(|&id| self.get(id).map(|n| n.path == path).unwrap_or(false))
    }
}
