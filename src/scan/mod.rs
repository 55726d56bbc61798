//! On-the-fly trajectory generation.
//!
//! [`generate`] synthesizes the full raster scan around a source: the
//! boustrophedon grid with turnarounds, rotated by the scan position angle,
//! scaled to the configured separation and projected onto the sky through a
//! tangent-plane projection centered on the source, with one timestamp per
//! sample.

pub mod projection;
pub mod raster;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::core::{ScanGeometry, SkyPath, SkySample};
use crate::error::{Error, Result};
use projection::TangentPoint;
use raster::RasterShape;

impl ScanGeometry {
    /// Integer raster shape implied by this geometry.
    pub fn raster_shape(&self) -> Result<RasterShape> {
        if self.separation_deg <= 0.0 {
            return Err(Error::Config("scan separation must be positive".into()));
        }
        if self.time_step_s <= 0.0 {
            return Err(Error::Config("scan time step must be positive".into()));
        }
        Ok(RasterShape {
            x_steps: (self.x_length_deg / self.separation_deg).ceil().max(1.0) as usize,
            rows: (self.y_length_deg / self.separation_deg).ceil().max(1.0) as usize,
            slow_down_steps: (self.slow_down_time_s / self.time_step_s).round().max(1.0) as usize,
            turn_bulge: 0.5 * self.turn_speed_factor,
        })
    }
}

/// Generate the time-tagged equatorial scan path around `(ra_deg, dec_deg)`.
///
/// Sample *i* is stamped `start_time + i * time_step`. The origin pixel of
/// the pattern projects back to the source position exactly, and the output
/// length is fully determined by the geometry.
///
/// The path must be regenerated immediately before each execution attempt:
/// wall-clock time elapses during slews, so a path computed before a slew
/// would start in the past.
pub fn generate(
    ra_deg: f64,
    dec_deg: f64,
    geometry: &ScanGeometry,
    start_time: DateTime<Utc>,
) -> Result<SkyPath> {
    let shape = geometry.raster_shape()?;
    let points = raster::build_raster(&shape);
    debug!(
        samples = points.len(),
        rows = shape.rows,
        "synthesized raster trajectory"
    );

    let center = TangentPoint { ra_deg, dec_deg };
    let step_ms = (geometry.time_step_s * 1000.0).round() as i64;

    let samples = points
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let (rx, ry) = raster::rotate(p.x, p.y, geometry.rotation_deg);
            let (ra, dec) = projection::plane_to_equatorial(
                center,
                rx * geometry.separation_deg,
                ry * geometry.separation_deg,
            );
            SkySample {
                ra_deg: ra,
                dec_deg: dec,
                time: start_time + Duration::milliseconds(i as i64 * step_ms),
                on_source: p.on_source,
            }
        })
        .collect();

    Ok(SkyPath { samples })
}
