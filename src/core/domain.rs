//! Domain models for the on-the-fly scan pipeline.
//!
//! These types flow through the pipeline in one direction:
//! `ScanPoint` (pixel grid) → `SkyPath` (equatorial, time-tagged) →
//! `HorizonPath` (topocentric, time-tagged) → `ProgramTrack` (mount table).
//! Paths are transient: they are recomputed per execution attempt and never
//! cached across a slew, because wall-clock time elapses while slewing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single source to be observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub flux_jy: f64,
    pub ra_deg: f64,
    pub dec_deg: f64,
}

/// Per-run gate parameters applied to every source.
#[derive(Debug, Clone, Copy)]
pub struct RunGates {
    /// Sources fainter than this are skipped before any planning happens.
    pub min_flux_jy: f64,
    /// Minimum safe elevation; a single path sample below it skips the source.
    pub min_el_deg: f64,
}

/// Geometry of the raster scan pattern.
///
/// Lengths and separation are in degrees on the tangent plane; the rotation
/// is the position angle of the scan, applied about the pattern origin.
#[derive(Debug, Clone, Copy)]
pub struct ScanGeometry {
    pub time_step_s: f64,
    pub rotation_deg: f64,
    pub x_length_deg: f64,
    pub y_length_deg: f64,
    pub separation_deg: f64,
    pub slow_down_time_s: f64,
    pub turn_speed_factor: f64,
}

/// Fixed observing site.
#[derive(Debug, Clone, Copy)]
pub struct SiteLocation {
    pub latitude_deg: f64,
    /// East-positive longitude.
    pub longitude_deg: f64,
    pub height_m: f64,
}

/// A single point of the raster pattern, in units of the scan separation.
///
/// Row-boundary and turnaround points carry `on_source = false`; the mount
/// still traverses them but the capture backend treats them as off-source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanPoint {
    pub x: f64,
    pub y: f64,
    pub on_source: bool,
}

/// One time-tagged equatorial sample of the scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkySample {
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub time: DateTime<Utc>,
    pub on_source: bool,
}

/// Ordered equatorial samples. Timestamps strictly increase by the scan's
/// time step; the length equals the raster trajectory length.
#[derive(Debug, Clone, Default)]
pub struct SkyPath {
    pub samples: Vec<SkySample>,
}

impl SkyPath {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// One time-tagged horizon-frame sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizonSample {
    pub az_deg: f64,
    pub alt_deg: f64,
    pub time: DateTime<Utc>,
    pub on_source: bool,
    pub parallactic_deg: f64,
}

/// Ordered horizon-frame samples, same length as the `SkyPath` they came
/// from, each transformed at its own timestamp.
#[derive(Debug, Clone, Default)]
pub struct HorizonPath {
    pub samples: Vec<HorizonSample>,
}

impl HorizonPath {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Lowest altitude along the path, used for the elevation safety gate.
    pub fn min_altitude_deg(&self) -> Option<f64> {
        self.samples
            .iter()
            .map(|s| s.alt_deg)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// First pointing of the path, the slew target before track upload.
    pub fn first_position(&self) -> Option<(f64, f64)> {
        self.samples.first().map(|s| (s.az_deg, s.alt_deg))
    }

    /// Timestamp of the final sample; the track wait runs until it passes.
    pub fn stop_time(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|s| s.time)
    }
}

/// Serialized program track, one ASCII line per scan sample:
/// `<mjd> <az:.8f> <alt:.8f> <flag> <parallactic_deg>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramTrack(String);

impl ProgramTrack {
    pub fn new(table: String) -> Self {
        Self(table)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn line_count(&self) -> usize {
        self.0.lines().count()
    }
}

/// Terminal outcome of one per-source observation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Flux below the configured minimum; nothing was planned.
    SkippedFlux,
    /// Some path sample fell below the minimum elevation; no motion issued.
    SkippedElevation,
    /// Planned and validated, but mount control was disabled for this run.
    Planned,
    /// Observed end to end.
    Executed,
}

impl ScanOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanOutcome::SkippedFlux => "skipped (flux below minimum)",
            ScanOutcome::SkippedElevation => "skipped (below minimum elevation)",
            ScanOutcome::Planned => "planned (mount control disabled)",
            ScanOutcome::Executed => "executed",
        }
    }
}
