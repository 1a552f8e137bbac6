use marionette_common::NodeId;
use marionette_entity::{BehaviorKind, EntityError, Phase};
use serde::Serialize;

/// A behavior failure that was contained to its node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BehaviorFault {
    pub node: NodeId,
    /// `None` when the failure was a panic and the culprit is unknown.
    pub kind: Option<BehaviorKind>,
    pub phase: Phase,
    pub message: String,
}

impl BehaviorFault {
    pub(crate) fn from_entity_error(node: NodeId, err: &EntityError) -> Self {
        match err {
            EntityError::Behavior {
                node,
                kind,
                phase,
                source,
            } => Self {
                node: *node,
                kind: Some(*kind),
                phase: *phase,
                message: source.to_string(),
            },
            other => Self {
                node,
                kind: None,
                phase: Phase::Update,
                message: other.to_string(),
            },
        }
    }

    pub(crate) fn from_panic(
        node: NodeId,
        phase: Phase,
        payload: &(dyn std::any::Any + Send),
    ) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "behavior panicked".to_string()
        };
        Self {
            node,
            kind: None,
            phase,
            message,
        }
    }
}

/// What one update pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameReport {
    /// 1-based index of the pass.
    pub frame: u64,
    pub nodes_visited: usize,
    /// Controllers whose update ran to completion.
    pub entities_updated: usize,
    pub behaviors_updated: usize,
    /// Behaviors initialized on the catch-up path during this pass.
    pub catch_up_inits: usize,
    /// Faulted controllers skipped this pass.
    pub skipped_faulted: usize,
    pub faults: Vec<BehaviorFault>,
}

impl FrameReport {
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}
