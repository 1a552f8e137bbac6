use glam::Vec2;
use marionette_common::{NodeId, Tiling, Transform2D};

/// Access the runtime needs to a host-owned scene graph.
///
/// The host creates, destroys and reparents nodes; implementations only
/// expose the transform subset behaviors are allowed to touch plus the child
/// lists used for traversal. Setters return false when the node is unknown.
pub trait SceneGraph {
    fn contains(&self, id: NodeId) -> bool;

    fn parent(&self, id: NodeId) -> Option<NodeId>;

    /// Children in host order (left to right). Empty for unknown nodes.
    fn children(&self, id: NodeId) -> &[NodeId];

    fn transform(&self, id: NodeId) -> Option<Transform2D>;

    fn set_transform(&mut self, id: NodeId, transform: Transform2D) -> bool;

    fn visible(&self, id: NodeId) -> Option<bool>;

    fn set_visible(&mut self, id: NodeId, visible: bool) -> bool;

    /// Tiling state for nodes backed by a tiling visual, `None` otherwise.
    fn tiling(&self, id: NodeId) -> Option<Tiling>;

    fn set_tiling_offset(&mut self, id: NodeId, offset: Vec2) -> bool;

    /// Debug name, if the host keeps one.
    fn label(&self, _id: NodeId) -> Option<&str> {
        None
    }

    fn position(&self, id: NodeId) -> Option<Vec2> {
        self.transform(id).map(|t| t.position)
    }

    fn set_position(&mut self, id: NodeId, position: Vec2) -> bool {
        match self.transform(id) {
            Some(t) => self.set_transform(id, Transform2D { position, ..t }),
            None => false,
        }
    }

    fn set_scale(&mut self, id: NodeId, scale: Vec2) -> bool {
        match self.transform(id) {
            Some(t) => self.set_transform(id, Transform2D { scale, ..t }),
            None => false,
        }
    }

    fn set_rotation(&mut self, id: NodeId, rotation: f32) -> bool {
        match self.transform(id) {
            Some(t) => self.set_transform(id, Transform2D { rotation, ..t }),
            None => false,
        }
    }
}
