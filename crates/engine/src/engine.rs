use marionette_common::{EventBus, RenderContext};
use marionette_graph::SceneGraph;
use marionette_scene::{Scene, SceneError};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::stats::EngineStats;
use crate::ticker::{Subscription, TickSource};

/// Errors from driving frames or loading engine config.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("config parse error: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("invalid engine config: {0}")]
    Invalid(String),
        #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
}

/// Lets code running inside a frame ask the engine to stop.
///
/// The request is honored once the in-flight update pass has finished; no
/// further tick is driven after it.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Rc<Cell<bool>>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.set(true);
    }

    pub fn is_requested(&self) -> bool {
        self.0.get()
    }

    fn take(&self) -> bool {
        self.0.replace(false)
    }
}

/// Drives a [`Scene`] from a host tick source.
///
/// `Stopped ⇄ Running`. The engine holds a subscription only while
/// running; each tick it pulls is converted to seconds and handed to
/// `Scene::update`.
pub struct Engine<S: TickSource> {
    scene: Scene,
    source: S,
    config: EngineConfig,
    subscription: Option<Subscription>,
    stop: StopHandle,
    stats: EngineStats,
}

impl<S: TickSource> Engine<S> {
    pub fn new(scene: Scene, source: S, config: EngineConfig) -> Self {
        Self {
            scene,
            source,
            config,
            subscription: None,
            stop: StopHandle::default(),
            stats: EngineStats::default(),
        }
    }

    pub fn state(&self) -> EngineState {
        if self.subscription.is_some() {
            EngineState::Running
        } else {
            EngineState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Subscribe to the tick source. Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.subscription.is_some() {
            return false;
        }
        // A stale request from before this run must not stop it.
        self.stop.take();
        self.subscription = Some(self.source.subscribe());
        tracing::info!("engine started");
        true
    }

    /// Release the tick subscription. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        let Some(sub) = self.subscription.take() else {
            return false;
        };
        self.source.unsubscribe(sub);
        tracing::info!(frames = self.stats.frames, "engine stopped");
        true
    }

    /// Drive one scene update per pending tick. Returns the number of
    /// frames driven; zero while stopped.
    pub fn pump(
        &mut self,
        graph: &mut dyn SceneGraph,
        render: &RenderContext,
        events: &mut EventBus,
    ) -> Result<usize, EngineError> {
        let mut frames = 0;
        while let Some(sub) = self.subscription {
            let Some(raw) = self.source.next_tick(sub) else {
                break;
            };
            let dt = self.config.delta_seconds(raw);
            let started = Instant::now();
            let report = self.scene.update(graph, render, events, dt)?;
            self.stats.record(report, started.elapsed());
            frames += 1;

            if self.stop.take() {
                tracing::debug!("stop requested during frame");
                self.stop();
            }
        }
        Ok(frames)
    }
}
