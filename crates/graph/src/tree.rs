use glam::Vec2;
use marionette_common::{NodeId, Tiling, Transform2D};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::graph::SceneGraph;

/// Errors from structural edits to a [`NodeTree`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {0:?} not found")]
    UnknownNode(NodeId),
    #[error("the root node cannot be removed or reparented")]
    RootImmutable,
    #[error("reparenting {node:?} under {parent:?} would create a cycle")]
    Cycle { node: NodeId, parent: NodeId },
}

/// Per-node data held by the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    pub transform: Transform2D,
    pub visible: bool,
    pub label: Option<String>,
    pub tiling: Option<Tiling>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn new(parent: Option<NodeId>, transform: Transform2D) -> Self {
        Self {
            transform,
            visible: true,
            label: None,
            tiling: None,
            parent,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// In-memory host scene graph.
///
/// Stands in for an external renderer's display tree: headless hosts, the
/// CLI and tests drive the runtime against it. Child order is insertion
/// order, which is also render order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTree {
    root: NodeId,
    nodes: BTreeMap<NodeId, NodeData>,
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTree {
    /// Create a tree holding only a root node at the origin.
    pub fn new() -> Self {
        let root = NodeId::new();
        let mut nodes = BTreeMap::new();
        nodes.insert(root, NodeData::new(None, Transform2D::default()));
        Self {
            root,
            nodes,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(&id)
    }

    /// Append a new node as the last child of `parent`.
    pub fn spawn(&mut self, parent: NodeId, transform: Transform2D) -> Result<NodeId, GraphError> {
        let id = NodeId::new();
        let parent_data = self
            .nodes
            .get_mut(&parent)
            .ok_or(GraphError::UnknownNode(parent))?;
        parent_data.children.push(id);
        self.nodes.insert(id, NodeData::new(Some(parent), transform));
        Ok(id)
    }

    /// Spawn a node backed by a tiling visual with the given tile size.
    pub fn spawn_tiling(
        &mut self,
        parent: NodeId,
        transform: Transform2D,
        tile_size: Vec2,
    ) -> Result<NodeId, GraphError> {
        let id = self.spawn(parent, transform)?;
        if let Some(data) = self.nodes.get_mut(&id) {
            data.tiling = Some(Tiling::new(tile_size));
        }
        Ok(id)
    }

    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) -> bool {
        match self.nodes.get_mut(&id) {
            Some(data) => {
                data.label = Some(label.into());
                true
            }
            None => false,
        }
    }

    /// Remove a node and its whole subtree. Returns the removed ids, the
    /// node itself first.
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        if id == self.root {
            return Err(GraphError::RootImmutable);
        }
        let parent = self
            .nodes
            .get(&id)
            .ok_or(GraphError::UnknownNode(id))?
            .parent
            .unwrap_or(self.root);

        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != id);
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(data) = self.nodes.remove(&current) {
                stack.extend(data.children.iter().rev());
                removed.push(current);
            }
        }
        tracing::debug!(
            node = %id.short(),
            parent = %parent.short(),
            count = removed.len(),
            "subtree removed"
        );
        Ok(removed)
    }

    /// Move `id` to be the last child of `new_parent`.
    pub fn reparent(&mut self, id: NodeId, new_parent: NodeId) -> Result<(), GraphError> {
        if id == self.root {
            return Err(GraphError::RootImmutable);
        }
        if !self.nodes.contains_key(&new_parent) {
            return Err(GraphError::UnknownNode(new_parent));
        }
        let old = self
            .nodes
            .get(&id)
            .ok_or(GraphError::UnknownNode(id))?
            .parent
            .unwrap_or(self.root);

        // Walk up from the new parent; meeting `id` means a cycle.
        let mut cursor = Some(new_parent);
        while let Some(c) = cursor {
            if c == id {
                return Err(GraphError::Cycle {
                    node: id,
                    parent: new_parent,
                });
            }
            cursor = self.nodes.get(&c).and_then(|d| d.parent);
        }

        if let Some(p) = self.nodes.get_mut(&old) {
            p.children.retain(|c| *c != id);
        }
        if let Some(p) = self.nodes.get_mut(&new_parent) {
            p.children.push(id);
        }
        if let Some(d) = self.nodes.get_mut(&id) {
            d.parent = Some(new_parent);
        }
        tracing::debug!(
            node = %id.short(),
            old = %old.short(),
            new = %new_parent.short(),
            "node reparented"
        );
        Ok(())
    }

    /// Ids in pre-order, root first.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    /// Deterministic hash of the visible state, independent of node ids.
    ///
    /// Two trees with the same shape and transforms hash equal even though
    /// their ids were generated independently.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325; // FNV offset basis
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        for id in self.walk() {
            let Some(data) = self.nodes.get(&id) else {
                continue;
            };
            let t = data.transform;
            mix(&mut h, &(data.children.len() as u64).to_le_bytes());
            mix(&mut h, &t.position.x.to_le_bytes());
            mix(&mut h, &t.position.y.to_le_bytes());
            mix(&mut h, &t.rotation.to_le_bytes());
            mix(&mut h, &t.scale.x.to_le_bytes());
            mix(&mut h, &t.scale.y.to_le_bytes());
            mix(&mut h, &[data.visible as u8]);
            if let Some(tiling) = data.tiling {
                mix(&mut h, &tiling.offset.x.to_le_bytes());
                mix(&mut h, &tiling.offset.y.to_le_bytes());
            }
        }
        h
    }
}

impl SceneGraph for NodeTree {
    fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|d| d.parent)
    }

    fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|d| d.children.as_slice())
            .unwrap_or(&[])
    }

    fn transform(&self, id: NodeId) -> Option<Transform2D> {
        self.nodes.get(&id).map(|d| d.transform)
    }

    fn set_transform(&mut self, id: NodeId, transform: Transform2D) -> bool {
        match self.nodes.get_mut(&id) {
            Some(d) => {
                d.transform = transform;
                true
            }
            None => false,
        }
    }

    fn visible(&self, id: NodeId) -> Option<bool> {
        self.nodes.get(&id).map(|d| d.visible)
    }

    fn set_visible(&mut self, id: NodeId, visible: bool) -> bool {
        match self.nodes.get_mut(&id) {
            Some(d) => {
                d.visible = visible;
                true
            }
            None => false,
        }
    }

    fn tiling(&self, id: NodeId) -> Option<Tiling> {
        self.nodes.get(&id).and_then(|d| d.tiling)
    }

    fn set_tiling_offset(&mut self, id: NodeId, offset: Vec2) -> bool {
        match self.nodes.get_mut(&id).and_then(|d| d.tiling.as_mut()) {
            Some(tiling) => {
                tiling.offset = offset;
                true
            }
            None => false,
        }
    }

    fn label(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).and_then(|d| d.label.as_deref())
    }
}
