// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless free-camera session.
//!
//! Records a scripted orbit flight against the simulated host, plays it back
//! in loop mode and exports the result into the data directory.

use anyhow::{Context, Result};
use clap::Parser;
use freecam_runtime::{
    FrameworkSettings, FreeLookCamera, HostServices, MessageBus, PlaybackOptions, PluginHandle,
    ReceiverHandle, RecordingOptions, SimulatedHost, TimelineEvent, TimelineManager,
    SETTINGS_FILE_NAME,
};
use freecam_sequencer::{PlaybackMode, Point3, Rotation, DEFAULT_FOV};
use std::f32::consts::TAU;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const PLUGIN: PluginHandle = PluginHandle(1);
const RECEIVER: ReceiverHandle = ReceiverHandle(0xFF00_0001);

#[derive(Parser)]
#[command(name = "freecam-headless")]
#[command(about = "Record and replay a scripted free-camera flight without an engine")]
#[command(version)]
struct Cli {
    /// Settings file
    #[arg(long, default_value = SETTINGS_FILE_NAME)]
    settings: PathBuf,

    /// Output timeline, relative to the data directory
    #[arg(short, long, default_value = "headless_flight.ron")]
    output: PathBuf,

    /// Ticks to record
    #[arg(long, default_value = "240")]
    record_ticks: u32,

    /// Ticks to play back
    #[arg(long, default_value = "600")]
    play_ticks: u32,

    /// Seconds between recorded samples
    #[arg(long, default_value = "0.5")]
    interval: f32,

    /// Playback speed multiplier
    #[arg(long, default_value = "1.0")]
    speed: f32,

    /// Orbit radius
    #[arg(long, default_value = "500.0")]
    radius: f32,
}

/// Logs every timeline event before handing it to the simulated bus
struct LoggingBus(Arc<SimulatedHost>);

impl MessageBus for LoggingBus {
    fn dispatch(&self, event: &TimelineEvent) {
        tracing::info!("Timeline event: {}", event);
        self.0.dispatch(event);
    }
}

fn init_tracing(settings: &FrameworkSettings) {
    let directives = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(env) if !env.is_empty() => format!("{},{}", settings.log_filter, env),
        _ => settings.log_filter.clone(),
    };
    let env_filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Camera on a rising orbit around the origin, looking at the centre
fn orbit(radius: f32, progress: f32) -> FreeLookCamera {
    let angle = progress * TAU;
    let translation = Point3::new(
        radius * angle.sin(),
        radius * angle.cos(),
        200.0 + progress * 100.0,
    );
    FreeLookCamera {
        translation,
        rotation: Rotation::looking_at(translation, Point3::ZERO),
        fov: DEFAULT_FOV,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = FrameworkSettings::load_or_default(&cli.settings)
        .with_context(|| format!("Failed to load settings from {}", cli.settings.display()))?;
    init_tracing(&settings);

    tracing::info!("Starting freecam headless v{}", env!("CARGO_PKG_VERSION"));

    let host = Arc::new(SimulatedHost::new());
    let services = HostServices {
        bus: Arc::new(LoggingBus(host.clone())),
        ..host.services()
    };
    let manager = TimelineManager::new(settings, services);
    manager.register_plugin(PLUGIN)?;
    manager.register_event_receiver(RECEIVER);
    let id = manager.register_timeline(PLUGIN)?;

    // Record
    host.set_live_camera(orbit(cli.radius, 0.0));
    let options = RecordingOptions {
        interval: cli.interval,
        ..RecordingOptions::default()
    };
    manager.start_recording(PLUGIN, id, options)?;
    for tick in 1..=cli.record_ticks {
        host.move_free_look(orbit(cli.radius, tick as f32 / cli.record_ticks.max(1) as f32));
        manager.update();
    }
    manager.stop_recording(PLUGIN, id)?;
    tracing::info!(
        "Recorded {} translation points over {:.2}s",
        manager.translation_point_count(PLUGIN, id)?,
        manager.timeline_duration(PLUGIN, id)?
    );

    // Play back
    manager.set_playback_mode(PLUGIN, id, PlaybackMode::Loop, 0.0)?;
    let options = PlaybackOptions::at_speed(cli.speed).with_easing(true, true);
    manager.start_playback(PLUGIN, id, options)?;
    for _ in 0..cli.play_ticks {
        manager.update();
    }
    if let Some(camera) = host.free_look_camera() {
        tracing::info!(
            "Camera after {} ticks at ({:.1}, {:.1}, {:.1})",
            cli.play_ticks,
            camera.translation.x,
            camera.translation.y,
            camera.translation.z
        );
    }
    manager.stop_playback(PLUGIN, id)?;

    // Export
    let written = manager.export_timeline(PLUGIN, id, &cli.output)?;
    tracing::info!(
        "Wrote {} ({} events, {} receiver callbacks)",
        written.display(),
        host.events().len(),
        host.notifications().len()
    );

    manager.shutdown();
    Ok(())
}
