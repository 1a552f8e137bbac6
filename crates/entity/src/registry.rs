use marionette_common::{EventBus, NodeId};
use marionette_graph::SceneGraph;
use std::collections::BTreeMap;

use crate::controller::EntityController;

/// Side table from host nodes to their controllers.
///
/// A node gets at most one controller. Controllers are never dropped
/// implicitly when the host removes their node: call [`detach`] for a node
/// you are discarding, or [`prune`] to sweep every controller whose node is
/// gone. Until then such a controller is inert, since traversal never
/// reaches it.
///
/// [`detach`]: EntityRegistry::detach
/// [`prune`]: EntityRegistry::prune
#[derive(Debug, Default)]
pub struct EntityRegistry {
    controllers: BTreeMap<NodeId, EntityController>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller for `node`, created empty on first use.
    ///
    /// Adapting the same node again returns the existing controller.
    pub fn adapt(&mut self, node: NodeId) -> &mut EntityController {
        self.controllers.entry(node).or_insert_with(|| {
            tracing::debug!(node = %node.short(), "entity adapted");
            EntityController::new(node)
        })
    }

    pub fn get(&self, node: NodeId) -> Option<&EntityController> {
        self.controllers.get(&node)
    }

    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut EntityController> {
        self.controllers.get_mut(&node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.controllers.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Adapted nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.controllers.keys().copied()
    }

    pub fn controllers(&self) -> impl Iterator<Item = &EntityController> {
        self.controllers.values()
    }

    /// Destroy every behavior on `node` and drop its controller.
    pub fn detach(&mut self, node: NodeId, events: &mut EventBus) -> bool {
        let Some(mut controller) = self.controllers.remove(&node) else {
            return false;
        };
        controller.destroy_all(events);
        tracing::debug!(node = %node.short(), "entity detached");
        true
    }

    /// Detach every controller whose node no longer exists in `graph`.
    pub fn prune(&mut self, graph: &dyn SceneGraph, events: &mut EventBus) -> Vec<NodeId> {
        let stale: Vec<NodeId> = self
            .controllers
            .keys()
            .filter(|id| !graph.contains(**id))
            .copied()
            .collect();
        for id in &stale {
            self.detach(*id, events);
        }
        if !stale.is_empty() {
            tracing::debug!(count = stale.len(), "pruned stale controllers");
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{Behavior, BehaviorContext, BehaviorError, BehaviorKind};
    use marionette_common::{HostEventKind, ListenerHandle, Transform2D};
    use marionette_graph::NodeTree;

    /// Subscribes in init and releases in destroy.
    #[derive(Default)]
    struct Listening {
        handle: Option<ListenerHandle>,
    }

    impl Behavior for Listening {
        fn kind(&self) -> BehaviorKind {
            BehaviorKind::Named("listening")
        }

        fn init(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
            self.handle = Some(ctx.events.subscribe(HostEventKind::Key));
            Ok(())
        }

        fn update(&mut self, _ctx: &mut BehaviorContext<'_>, _dt: f64) -> Result<(), BehaviorError> {
            Ok(())
        }

        fn destroy(&mut self, events: &mut EventBus) {
            if let Some(handle) = self.handle.take() {
                events.unsubscribe(handle);
            }
        }
    }

    #[test]
    fn adapt_is_idempotent() {
        let mut registry = EntityRegistry::new();
        let node = NodeId::new();

        registry.adapt(node).add_behavior(Listening::default());
        let again = registry.adapt(node);
        assert_eq!(again.node(), node);
        assert_eq!(again.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn detach_releases_listeners() {
        let mut tree = NodeTree::new();
        let render = marionette_common::RenderContext::default();
        let mut events = EventBus::new();
        let mut registry = EntityRegistry::new();
        let node = tree.spawn(tree.root(), Transform2D::default()).unwrap();

        let controller = registry.adapt(node);
        controller.add_behavior(Listening::default());
        controller.add_behavior(Listening::default());
        controller
            .init_pending(&mut tree, &render, &mut events)
            .unwrap();
        assert_eq!(events.listener_count(), 2);

        assert!(registry.detach(node, &mut events));
        assert_eq!(events.listener_count(), 0);
        assert!(!registry.contains(node));
        assert!(!registry.detach(node, &mut events));
    }

    #[test]
    fn prune_drops_controllers_of_removed_nodes() {
        let mut tree = NodeTree::new();
        let mut events = EventBus::new();
        let mut registry = EntityRegistry::new();
        let root = tree.root();
        let keep = tree.spawn(root, Transform2D::default()).unwrap();
        let gone = tree.spawn(root, Transform2D::default()).unwrap();
        let gone_child = tree.spawn(gone, Transform2D::default()).unwrap();
        registry.adapt(keep);
        registry.adapt(gone);
        registry.adapt(gone_child);

        tree.remove(gone).unwrap();
        let mut pruned = registry.prune(&tree, &mut events);
        pruned.sort();
        let mut expected = vec![gone, gone_child];
        expected.sort();

        assert_eq!(pruned, expected);
        assert!(registry.contains(keep));
        assert_eq!(registry.len(), 1);
    }
}
