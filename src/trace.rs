// src/trace.rs - Records applied anchor updates and exports them per session
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use uuid::Uuid;

use crate::projector::DepthSource;
use crate::scheduler::Generation;

#[derive(Debug, Clone, Serialize)]
struct AnchorRecord {
    timestamp: f64,
    generation: Generation,
    x: f32,
    y: f32,
    z: f32,
    depth_m: f32,
    sensor_depth: bool,
    markers: usize,
}

#[derive(Debug, Serialize)]
struct SessionSummary<'a> {
    session_id: String,
    session_name: &'a str,
    updates: usize,
    sensor_depth_updates: usize,
    fallback_updates: usize,
    skipped_frames: u64,
    stale_completions: u64,
    first_timestamp: Option<f64>,
    last_timestamp: Option<f64>,
}

pub struct AnchorTrace {
    output_dir: PathBuf,
    session_name: String,
    session_id: Uuid,
    records: Vec<AnchorRecord>,
    skipped_frames: u64,
    stale_completions: u64,
}

impl AnchorTrace {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            session_id: Uuid::new_v4(),
            records: Vec::new(),
            skipped_frames: 0,
            stale_completions: 0,
        }
    }

    pub fn record(
        &mut self,
        timestamp: f64,
        generation: Generation,
        position: [f32; 3],
        source: DepthSource,
        markers: usize,
    ) {
        self.records.push(AnchorRecord {
            timestamp,
            generation,
            x: position[0],
            y: position[1],
            z: position[2],
            depth_m: source.distance(),
            sensor_depth: source.is_sensor(),
            markers,
        });
    }

    pub fn note_skipped(&mut self, frames: u64) {
        self.skipped_frames += frames;
    }

    pub fn note_stale(&mut self, completions: u64) {
        self.stale_completions += completions;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.session_dir().join("anchor_trace.csv");
        std::fs::create_dir_all(self.session_dir())
            .with_context(|| format!("creating {}", self.session_dir().display()))?;

        let file = File::create(&csv_path)
            .with_context(|| format!("creating {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(csv_path)
    }

    pub fn export_summary(&self) -> Result<PathBuf> {
        let path = self.session_dir().join("summary.json");
        std::fs::create_dir_all(self.session_dir())?;

        let sensor = self.records.iter().filter(|r| r.sensor_depth).count();
        let summary = SessionSummary {
            session_id: self.session_id.to_string(),
            session_name: &self.session_name,
            updates: self.records.len(),
            sensor_depth_updates: sensor,
            fallback_updates: self.records.len() - sensor,
            skipped_frames: self.skipped_frames,
            stale_completions: self.stale_completions,
            first_timestamp: self.records.first().map(|r| r.timestamp),
            last_timestamp: self.records.last().map(|r| r.timestamp),
        };
        std::fs::write(&path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}
