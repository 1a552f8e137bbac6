use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// An input or window event produced by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostEvent {
    /// The canvas was resized to the given pixel size.
    Resize { width: f32, height: f32 },
    KeyDown(String),
    KeyUp(String),
    /// Pointer moved to a canvas-space position.
    PointerMove(Vec2),
}

impl HostEvent {
    pub fn kind(&self) -> HostEventKind {
        match self {
            Self::Resize { .. } => HostEventKind::Resize,
            Self::KeyDown(_) | Self::KeyUp(_) => HostEventKind::Key,
            Self::PointerMove(_) => HostEventKind::Pointer,
        }
    }
}

/// Filter a listener subscribes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostEventKind {
    Resize,
    Key,
    Pointer,
}

/// Registration returned by [`EventBus::subscribe`].
///
/// Not `Clone`: exactly one owner hands it back through
/// [`EventBus::unsubscribe`].
#[derive(Debug, PartialEq, Eq)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct Listener {
    kind: HostEventKind,
    queue: VecDeque<HostEvent>,
}

/// Injected host event source.
///
/// Behaviors subscribe during `init`, poll during `update` and release their
/// handles in `destroy`. Nothing registers against host globals directly, so
/// `listener_count` is the complete picture of live registrations.
#[derive(Debug, Default)]
pub struct EventBus {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: HostEventKind) -> ListenerHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.listeners.insert(
            id,
            Listener {
                kind,
                queue: VecDeque::new(),
            },
        );
        tracing::trace!(id, ?kind, "listener subscribed");
        ListenerHandle(id)
    }

    /// Release a registration. Returns false if the handle was already gone.
    pub fn unsubscribe(&mut self, handle: ListenerHandle) -> bool {
        let removed = self.listeners.remove(&handle.0).is_some();
        tracing::trace!(id = handle.0, removed, "listener released");
        removed
    }

    /// Queue an event for every listener whose filter matches.
    pub fn publish(&mut self, event: HostEvent) {
        let kind = event.kind();
        for listener in self.listeners.values_mut().filter(|l| l.kind == kind) {
            listener.queue.push_back(event.clone());
        }
    }

    /// Pop the oldest pending event for this listener.
    pub fn poll(&mut self, handle: &ListenerHandle) -> Option<HostEvent> {
        self.listeners
            .get_mut(&handle.0)
            .and_then(|l| l.queue.pop_front())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_subscribed(&self, handle: &ListenerHandle) -> bool {
        self.listeners.contains_key(&handle.0)
    }
}
