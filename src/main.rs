// src/main.rs - Headless run: simulated hand, synthetic depth scene and remote pad touches
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use nalgebra::Vector3;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hud_anchor::trace::AnchorTrace;
use hud_anchor::tracker::AnchorUpdate;
use hud_anchor::wire::{decode_touch, PadMessage};
use hud_anchor::{
    CameraPose, ConfidenceBuffer, DepthBuffer, Frame, HandAnchorTracker, InterfaceOrientation,
    SessionStatus, SimulatedDetector, TouchSample, TrackerConfig, TrackerContext, ViewportSize,
};

const TICKS: u32 = 300;
const TICK: Duration = Duration::from_micros(16_667);
const DETECTOR_FAIL_EVERY: u64 = 11;
const SETTLE: Duration = Duration::from_millis(100);

/// Static synthetic scene: a wall about 60 cm out, tilted left to right.
struct Scene {
    image: Arc<RgbImage>,
    depth: Arc<DepthBuffer>,
    confidence: Arc<ConfidenceBuffer>,
    camera: CameraPose,
    viewport: ViewportSize,
}

impl Scene {
    fn new() -> Self {
        // 4:3 sensor, landscape native, like a phone's back camera
        let image = RgbImage::from_fn(192, 144, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 96]));
        let depth = DepthBuffer::from_fn(256, 192, |x, _| 0.55 + 0.1 * x as f32 / 255.0);
        let confidence = ConfidenceBuffer::from_fn(256, 192, |x, y| {
            if x < 8 || y < 8 || x > 247 || y > 183 {
                0
            } else if x < 32 || x > 223 {
                1
            } else {
                2
            }
        });
        let viewport = ViewportSize::new(390.0, 844.0);
        let aspect = (viewport.width / viewport.height) as f32;

        Self {
            image: Arc::new(image),
            depth: Arc::new(depth),
            confidence: Arc::new(confidence),
            camera: CameraPose::perspective(aspect, 1.1, 0.01, 100.0),
            viewport,
        }
    }

    fn frame(&self, t: f64) -> Frame {
        // slight handheld sway
        let sway = Vector3::new(0.01 * (t * 1.3).sin() as f32, 0.005 * (t * 0.7).cos() as f32, 0.0);
        Frame::new(
            Arc::clone(&self.image),
            self.camera.with_position(sway),
            InterfaceOrientation::Portrait,
            self.viewport,
            t,
        )
        .with_depth(Arc::clone(&self.depth))
        .with_confidence(Arc::clone(&self.confidence))
    }
}

fn record(trace: &mut AnchorTrace, update: &AnchorUpdate) {
    let p = update.applied.position;
    trace.record(
        update.frame_timestamp,
        update.generation,
        [p.x, p.y, p.z],
        update.world.source,
        update.markers,
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => TrackerConfig::load(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => TrackerConfig::default(),
    };
    let output_dir = config.output_directory.clone();

    let detector = SimulatedDetector::new(config.inference.max_hands)
        .failing_every(DETECTOR_FAIL_EVERY);
    let detector = Arc::new(detector);
    let context = TrackerContext::new(config, detector, tokio::runtime::Handle::current());
    let mut tracker = HandAnchorTracker::new(context).context("creating tracker")?;
    let touches = tracker.touch_sender();
    let mut trace = AnchorTrace::new(&output_dir, None);
    let scene = Scene::new();

    tracker.set_session_status(SessionStatus::Ready);

    let start = Instant::now();
    let mut ticker = tokio::time::interval(TICK);
    for tick in 0..TICKS {
        ticker.tick().await;
        let now = Instant::now();
        let t = now.duration_since(start).as_secs_f64();

        if tick == 30 {
            tracker.set_session_status(SessionStatus::Tracking);
        }

        // the pad sends faster than we render; the tracker keeps the latest
        for k in 0..2 {
            let phase = t + k as f64 * 0.008;
            let sample = TouchSample::new(0.5 + 0.4 * phase.cos(), 0.5 + 0.4 * phase.sin(), phase);
            let packet = PadMessage::touch(&sample).encode()?;
            match decode_touch(&packet) {
                Ok(sample) => touches.send(sample),
                Err(e) => warn!(error = %e, "bad pad packet"),
            }
        }

        tracker.on_frame(now, Arc::new(scene.frame(t)));
        if let Some(update) = tracker.tick(now).anchor_update {
            record(&mut trace, &update);
        }

        if tick % 60 == 0 {
            if let Some(anchor) = tracker.hud().anchor() {
                info!(
                    tick,
                    generation = anchor.generation,
                    x = anchor.position.x,
                    y = anchor.position.y,
                    z = anchor.position.z,
                    markers = tracker.markers().len(),
                    "anchor"
                );
            }
        }
    }

    // let the last in-flight job land
    if let Ok(Some(update)) = tokio::time::timeout(SETTLE, tracker.next_update()).await {
        record(&mut trace, &update);
    }

    let stats = tracker.stats();
    trace.note_skipped(stats.skipped_frames);
    trace.note_stale(stats.stale_completions);
    info!(
        submitted = stats.submitted,
        skipped = stats.skipped_frames,
        stale = stats.stale_completions,
        last_generation = ?stats.last_generation,
        updates = trace.len(),
        "run finished"
    );
    tracker.set_session_status(SessionStatus::Interrupted);

    if trace.is_empty() {
        warn!("no anchor updates recorded");
    }
    let csv = trace.export_csv()?;
    let summary = trace.export_summary()?;
    info!(csv = %csv.display(), summary = %summary.display(), "exported anchor trace");
    Ok(())
}
