mod demo;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use marionette_common::{EventBus, HostEvent, RenderContext};
use marionette_engine::{Engine, EngineConfig, ManualTicker};
use marionette_scene::BehaviorFault;
use marionette_tools::{NodeInfo, SceneInspector, SceneSummary};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::demo::{DemoScene, frame_delta};

#[derive(Parser)]
#[command(name = "marionette-cli", about = "Headless driver for marionette scenes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Run the camera + parallax demo headlessly
    Demo {
        /// Number of frames to drive
        #[arg(short, long, default_value = "120")]
        frames: usize,
        /// Camera smoothing factor in [0, 1]
        #[arg(short, long, default_value = "0.1")]
        speed: f32,
        /// Engine config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the demo tree in update order
    Inspect {
        /// Frames to run before inspecting
        #[arg(short, long, default_value = "0")]
        frames: usize,
    },
}

#[derive(Serialize)]
struct DemoOutput {
    summary: SceneSummary,
    frames: u64,
    faults: u64,
    behaviors_updated: u64,
    avg_frame_us: u64,
    max_frame_us: u64,
    behaviors_per_pass: f64,
    per_behavior_ns: u64,
    last_faults: Vec<BehaviorFault>,
    nodes: Vec<NodeInfo>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info => {
            println!("marionette-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", marionette_common::crate_info());
            println!("graph: {}", marionette_graph::crate_info());
            println!("entity: {}", marionette_entity::crate_info());
            println!("scene: {}", marionette_scene::crate_info());
            println!("engine: {}", marionette_engine::crate_info());
            println!("behaviors: {}", marionette_behaviors::crate_info());
            println!("tools: {}", marionette_tools::crate_info());
        }
        Commands::Demo {
            frames,
            speed,
            config,
            json,
        } => {
            let config = match config {
                Some(path) => EngineConfig::load(&path)?,
                None => EngineConfig::default(),
            };
            run_demo(frames, speed, config, json)?;
        }
        Commands::Inspect { frames } => {
            let config = EngineConfig::default();
            let mut demo = DemoScene::build(0.1, &config)?;
            let render = RenderContext::default();
            let mut events = EventBus::new();
            demo.scene.init(&mut demo.tree, &render, &mut events)?;
            for _ in 0..frames {
                demo.scene
                    .update(&mut demo.tree, &render, &mut events, 1.0 / 60.0)?;
            }
            println!("{}", SceneInspector::summary(&demo.scene, &demo.tree, &events));
            print!("{}", SceneInspector::outline_text(&demo.scene, &demo.tree));
        }
    }

    Ok(())
}

fn run_demo(frames: usize, speed: f32, config: EngineConfig, json: bool) -> anyhow::Result<()> {
    let raw = frame_delta(config.delta_unit);
    let mut demo = DemoScene::build(speed, &config)?;
    let render = RenderContext::default();
    let mut events = EventBus::new();

    demo.scene.init(&mut demo.tree, &render, &mut events)?;
    let mut engine = Engine::new(demo.scene, ManualTicker::new(), config);
    engine.start();

    // Half the frames at the default viewport, then a resize.
    let first = frames / 2;
    engine.source_mut().push_many(raw, first);
    engine.pump(&mut demo.tree, &render, &mut events)?;
    events.publish(HostEvent::Resize {
        width: 1920.0,
        height: 1080.0,
    });
    let render = RenderContext::new(1920.0, 1080.0);
    engine.source_mut().push_many(raw, frames - first);
    engine.pump(&mut demo.tree, &render, &mut events)?;
    engine.stop();

    let stats = engine.stats();
    let scene = engine.scene();
    let ids = [demo.player, demo.camera, demo.layers[0], demo.layers[1]];
    let output = DemoOutput {
        summary: SceneInspector::summary(scene, &demo.tree, &events),
        frames: stats.frames,
        faults: stats.faults,
        behaviors_updated: stats.behaviors_updated,
        avg_frame_us: stats.timer.average().as_micros() as u64,
        max_frame_us: stats.timer.max().as_micros() as u64,
        behaviors_per_pass: stats.timer.behaviors_per_pass(),
        per_behavior_ns: stats.timer.per_behavior().as_nanos() as u64,
        last_faults: stats
            .last_frame
            .as_ref()
            .map(|r| r.faults.clone())
            .unwrap_or_default(),
        nodes: ids
            .iter()
            .filter_map(|id| SceneInspector::inspect_node(scene, &demo.tree, *id))
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", output.summary);
    println!(
        "Frames: {} faults={} behavior updates={} avg={}us max={}us",
        output.frames,
        output.faults,
        output.behaviors_updated,
        output.avg_frame_us,
        output.max_frame_us
    );
    println!(
        "Load: {:.1} behaviors/pass, {}ns per behavior",
        output.behaviors_per_pass, output.per_behavior_ns
    );
    for node in &output.nodes {
        println!("  {node}");
    }
    for fault in &output.last_faults {
        tracing::warn!(node = %fault.node.short(), message = %fault.message, "fault in last frame");
    }
    Ok(())
}
