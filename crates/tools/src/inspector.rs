use marionette_common::{EventBus, NodeId};
use marionette_entity::{BehaviorKind, BehaviorState, ControllerState};
use marionette_graph::SceneGraph;
use marionette_scene::Scene;
use serde::Serialize;
use std::fmt;

/// Scene inspector for developer tooling.
///
/// Read-only queries against a scene and the host graph it drives, for
/// debugging output and the CLI.
pub struct SceneInspector;

impl SceneInspector {
    /// Produce a summary of the scene state.
    pub fn summary(scene: &Scene, graph: &dyn SceneGraph, events: &EventBus) -> SceneSummary {
        let mut summary = SceneSummary {
            frame: scene.frame(),
            initialized: scene.is_initialized(),
            reachable_nodes: 0,
            controllers: scene.registry().len(),
            pending: 0,
            faulted: 0,
            detached: 0,
            behaviors: 0,
            listeners: events.listener_count(),
        };
        for controller in scene.registry().controllers() {
            summary.behaviors += controller.len();
            match controller.state() {
                ControllerState::Pending => summary.pending += 1,
                ControllerState::Faulted => summary.faulted += 1,
                ControllerState::Initialized => {}
            }
            if !graph.contains(controller.node()) {
                summary.detached += 1;
            }
        }
        summary.reachable_nodes = preorder(graph, scene.root()).len();
        summary
    }

    /// Details for one node, `None` if the graph does not know it.
    pub fn inspect_node(scene: &Scene, graph: &dyn SceneGraph, id: NodeId) -> Option<NodeInfo> {
        let t = graph.transform(id)?;
        let controller = scene.registry().get(id);
        Some(NodeInfo {
            id,
            label: graph.label(id).map(str::to_owned),
            position: [t.position.x, t.position.y],
            rotation: t.rotation,
            scale: [t.scale.x, t.scale.y],
            visible: graph.visible(id).unwrap_or(false),
            tiling_offset: graph.tiling(id).map(|tl| [tl.offset.x, tl.offset.y]),
            controller: controller.map(|c| c.state()),
            behaviors: controller
                .map(|c| c.behavior_states())
                .unwrap_or_default(),
        })
    }

    /// The reachable tree in update order, with depth for indentation.
    pub fn outline(scene: &Scene, graph: &dyn SceneGraph) -> Vec<OutlineEntry> {
        preorder(graph, scene.root())
            .into_iter()
            .map(|(id, depth)| {
                let kinds = scene
                    .registry()
                    .get(id)
                    .map(|c| c.kinds().collect())
                    .unwrap_or_default();
                OutlineEntry {
                    id,
                    depth,
                    label: graph.label(id).map(str::to_owned),
                    kinds,
                }
            })
            .collect()
    }

    /// Indented text dump of [`SceneInspector::outline`].
    pub fn outline_text(scene: &Scene, graph: &dyn SceneGraph) -> String {
        let mut out = String::new();
        for entry in Self::outline(scene, graph) {
            out.push_str(&format!("{entry}\n"));
        }
        out
    }
}

fn preorder(graph: &dyn SceneGraph, root: NodeId) -> Vec<(NodeId, usize)> {
    let mut out = Vec::new();
    if !graph.contains(root) {
        return out;
    }
    let mut stack = vec![(root, 0)];
    while let Some((id, depth)) = stack.pop() {
        out.push((id, depth));
        stack.extend(graph.children(id).iter().rev().map(|c| (*c, depth + 1)));
    }
    out
}

/// Summary of scene state for the inspector.
#[derive(Debug, Clone, Serialize)]
pub struct SceneSummary {
    pub frame: u64,
    pub initialized: bool,
    pub reachable_nodes: usize,
    pub controllers: usize,
    pub pending: usize,
    pub faulted: usize,
    /// Controllers whose node is gone from the graph.
    pub detached: usize,
    pub behaviors: usize,
    pub listeners: usize,
}

impl fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scene: frame={} initialized={} nodes={} controllers={} behaviors={} pending={} faulted={} detached={} listeners={}",
            self.frame,
            self.initialized,
            self.reachable_nodes,
            self.controllers,
            self.behaviors,
            self.pending,
            self.faulted,
            self.detached,
            self.listeners
        )
    }
}

/// Detailed info about a single node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub label: Option<String>,
    pub position: [f32; 2],
    pub rotation: f32,
    pub scale: [f32; 2],
    pub visible: bool,
    pub tiling_offset: Option<[f32; 2]>,
    pub controller: Option<ControllerState>,
    pub behaviors: Vec<(BehaviorKind, BehaviorState)>,
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Node [{}] {} pos=({:.2}, {:.2}) scale=({:.2}, {:.2})",
            self.id.short(),
            self.label.as_deref().unwrap_or("-"),
            self.position[0],
            self.position[1],
            self.scale[0],
            self.scale[1],
        )?;
        if let Some([x, y]) = self.tiling_offset {
            write!(f, " tiling=({x:.2}, {y:.2})")?;
        }
        for (kind, state) in &self.behaviors {
            write!(f, " {kind}:{state:?}")?;
        }
        Ok(())
    }
}

/// One row of the update-order outline.
#[derive(Debug, Clone, Serialize)]
pub struct OutlineEntry {
    pub id: NodeId,
    pub depth: usize,
    pub label: Option<String>,
    pub kinds: Vec<BehaviorKind>,
}

impl fmt::Display for OutlineEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:indent$}{} [{}]",
            "",
            self.label.as_deref().unwrap_or("node"),
            self.id.short(),
            indent = self.depth * 2
        )?;
        if !self.kinds.is_empty() {
            let kinds: Vec<String> = self.kinds.iter().map(ToString::to_string).collect();
            write!(f, " <{}>", kinds.join(", "))?;
        }
        Ok(())
    }
}
