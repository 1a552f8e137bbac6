use marionette_common::{EventBus, NodeId, RenderContext};
use marionette_graph::SceneGraph;
use serde::Serialize;
use std::fmt;

use crate::behavior::{
    Behavior, BehaviorContext, BehaviorError, BehaviorKind, BehaviorState, KindedBehavior,
    downcast_mut, downcast_ref,
};

/// Lifecycle phase a fault happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Init,
    Update,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::Update => f.write_str("update"),
        }
    }
}

/// Errors from controller lifecycle calls.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error("controller for node {0:?} is already initialized")]
    AlreadyInitialized(NodeId),
    #[error("controller for node {0:?} is not initialized")]
    NotInitialized(NodeId),
    #[error("controller for node {0:?} is faulted and must be reset first")]
    Faulted(NodeId),
    #[error("behavior `{kind}` on node {node:?} failed during {phase}: {source}")]
    Behavior {
        node: NodeId,
        kind: BehaviorKind,
        phase: Phase,
        #[source]
        source: BehaviorError,
    },
}

/// Controller-level lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControllerState {
    /// Holds behaviors that have not been initialized yet.
    Pending,
    /// Every attached behavior has been initialized.
    Initialized,
    /// A behavior failed in `init`; skipped by updates until reset.
    Faulted,
}

struct BehaviorSlot {
    kind: BehaviorKind,
    state: BehaviorState,
    behavior: Box<dyn Behavior>,
}

/// The behaviors attached to one node, in attachment order.
///
/// Attachment order is init order and update order.
pub struct EntityController {
    node: NodeId,
    slots: Vec<BehaviorSlot>,
    state: ControllerState,
}

impl fmt::Debug for EntityController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityController")
            .field("node", &self.node)
            .field("state", &self.state)
            .field("behaviors", &self.kinds().collect::<Vec<_>>())
            .finish()
    }
}

impl EntityController {
    pub(crate) fn new(node: NodeId) -> Self {
        Self {
            node,
            slots: Vec::new(),
            state: ControllerState::Pending,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == ControllerState::Initialized
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Kinds of the attached behaviors, in attachment order.
    pub fn kinds(&self) -> impl Iterator<Item = BehaviorKind> + '_ {
        self.slots.iter().map(|s| s.kind)
    }

    /// Kind and lifecycle state of every attached behavior.
    pub fn behavior_states(&self) -> Vec<(BehaviorKind, BehaviorState)> {
        self.slots.iter().map(|s| (s.kind, s.state)).collect()
    }

    /// Append a behavior. It stays `Attached` until the next init pass.
    pub fn add_behavior<B: Behavior>(&mut self, behavior: B) -> &mut Self {
        self.add_boxed(Box::new(behavior))
    }

    pub fn add_boxed(&mut self, behavior: Box<dyn Behavior>) -> &mut Self {
        let kind = behavior.kind();
        self.slots.push(BehaviorSlot {
            kind,
            state: BehaviorState::Attached,
            behavior,
        });
        if self.state == ControllerState::Initialized {
            self.state = ControllerState::Pending;
        }
        tracing::debug!(node = %self.node.short(), %kind, "behavior attached");
        self
    }

    /// First attached behavior of type `T`, looked up by its kind tag.
    pub fn get_behavior<T: KindedBehavior>(&self) -> Option<&T> {
        self.slots
            .iter()
            .filter(|s| s.kind == T::KIND)
            .find_map(|s| downcast_ref::<T>(&*s.behavior))
    }

    pub fn get_behavior_mut<T: KindedBehavior>(&mut self) -> Option<&mut T> {
        self.slots
            .iter_mut()
            .filter(|s| s.kind == T::KIND)
            .find_map(|s| downcast_mut::<T>(&mut *s.behavior))
    }

    /// First attached behavior with the given kind.
    pub fn find(&self, kind: BehaviorKind) -> Option<&dyn Behavior> {
        self.slots
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| &*s.behavior)
    }

    pub fn has(&self, kind: BehaviorKind) -> bool {
        self.slots.iter().any(|s| s.kind == kind)
    }

    /// Destroy and remove the first behavior of `kind`. Returns false if none
    /// was attached.
    pub fn remove_behavior(&mut self, kind: BehaviorKind, events: &mut EventBus) -> bool {
        let Some(index) = self.slots.iter().position(|s| s.kind == kind) else {
            return false;
        };
        let mut slot = self.slots.remove(index);
        slot.behavior.destroy(events);
        slot.state = BehaviorState::Destroyed;
        tracing::debug!(node = %self.node.short(), %kind, "behavior destroyed");
        true
    }

    /// Run `init` on every `Attached` behavior, in attachment order.
    ///
    /// On the first failure the controller becomes `Faulted`; behaviors
    /// initialized before the failure keep their state and are not
    /// initialized again after a reset.
    pub fn init_pending(
        &mut self,
        graph: &mut dyn SceneGraph,
        render: &RenderContext,
        events: &mut EventBus,
    ) -> Result<usize, EntityError> {
        match self.state {
            ControllerState::Initialized => return Err(EntityError::AlreadyInitialized(self.node)),
            ControllerState::Faulted => return Err(EntityError::Faulted(self.node)),
            ControllerState::Pending => {}
        }

        let node = self.node;
        let mut ctx = BehaviorContext {
            node,
            graph,
            render,
            events,
        };
        let mut count = 0;
        for slot in self
            .slots
            .iter_mut()
            .filter(|s| s.state == BehaviorState::Attached)
        {
            if let Err(source) = slot.behavior.init(&mut ctx) {
                self.state = ControllerState::Faulted;
                return Err(EntityError::Behavior {
                    node,
                    kind: slot.kind,
                    phase: Phase::Init,
                    source,
                });
            }
            slot.state = BehaviorState::Initialized;
            count += 1;
        }
        self.state = ControllerState::Initialized;
        tracing::debug!(node = %node.short(), count, "controller initialized");
        Ok(count)
    }

    /// Run `update` on every behavior, in attachment order.
    ///
    /// Stops at the first failing behavior; later behaviors on this node
    /// skip the frame.
    pub fn update(
        &mut self,
        graph: &mut dyn SceneGraph,
        render: &RenderContext,
        events: &mut EventBus,
        dt: f64,
    ) -> Result<usize, EntityError> {
        if self.state != ControllerState::Initialized {
            return Err(EntityError::NotInitialized(self.node));
        }

        let node = self.node;
        let mut ctx = BehaviorContext {
            node,
            graph,
            render,
            events,
        };
        let mut count = 0;
        for slot in self
            .slots
            .iter_mut()
            .filter(|s| s.state == BehaviorState::Initialized)
        {
            slot.behavior
                .update(&mut ctx, dt)
                .map_err(|source| EntityError::Behavior {
                    node,
                    kind: slot.kind,
                    phase: Phase::Update,
                    source,
                })?;
            count += 1;
        }
        Ok(count)
    }

    /// Put the controller in the faulted state, for hosts that catch an
    /// `init` that unwound instead of returning an error.
    pub fn mark_faulted(&mut self) {
        self.state = ControllerState::Faulted;
    }

    /// Clear a fault so the next init pass retries the remaining behaviors.
    pub fn reset_fault(&mut self) -> bool {
        if self.state == ControllerState::Faulted {
            self.state = ControllerState::Pending;
            true
        } else {
            false
        }
    }

    /// Destroy every behavior and empty the controller.
    pub(crate) fn destroy_all(&mut self, events: &mut EventBus) {
        for mut slot in self.slots.drain(..) {
            slot.behavior.destroy(events);
            slot.state = BehaviorState::Destroyed;
        }
        self.state = ControllerState::Pending;
    }
}
