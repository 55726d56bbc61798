//! Per-source observation orchestration.
//!
//! One source at a time: gate on flux, plan and safety-check the scan, then
//! drive the mount and capture backend through the execution sequence. The
//! pre-check path is thrown away after the slew and the schedule is
//! re-anchored to the current time, because slew duration is unpredictable
//! and an uploaded track must not start in the past.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::backend::BackendControl;
use crate::core::{
    HorizonPath, RunGates, ScanGeometry, ScanOutcome, SiteLocation, SkyPath, Source,
};
use crate::error::{Error, Result};
use crate::mount::{MountController, MoveMode};
use crate::shipper::LogShipper;
use crate::{scan, transform};

/// A planned scan: the equatorial path and its horizon-frame counterpart.
#[derive(Debug, Clone)]
pub struct PlannedScan {
    pub sky: SkyPath,
    pub horizon: HorizonPath,
}

/// Seam between orchestration and trajectory synthesis.
///
/// The flux gate must reject a source before any planning happens, which is
/// exactly what this trait makes testable.
pub trait TrackPlanner: Send + Sync {
    fn plan(&self, source: &Source, start_time: DateTime<Utc>) -> Result<PlannedScan>;
}

/// Production planner: OTF raster generation plus horizon transform.
pub struct OtfPlanner {
    pub geometry: ScanGeometry,
    pub site: SiteLocation,
}

impl TrackPlanner for OtfPlanner {
    fn plan(&self, source: &Source, start_time: DateTime<Utc>) -> Result<PlannedScan> {
        let sky = scan::generate(source.ra_deg, source.dec_deg, &self.geometry, start_time)?;
        let horizon = transform::transform(&sky, &self.site);
        Ok(PlannedScan { sky, horizon })
    }
}

/// Drives one observation per call; owns no connection, borrows them all.
pub struct ScanOrchestrator<'a> {
    planner: &'a dyn TrackPlanner,
    gates: RunGates,
    geometry: ScanGeometry,
    start_lead: Duration,
    mount: Option<&'a mut MountController>,
    backend: Option<&'a mut dyn BackendControl>,
    shipper: Option<&'a dyn LogShipper>,
}

impl<'a> ScanOrchestrator<'a> {
    pub fn new(
        planner: &'a dyn TrackPlanner,
        gates: RunGates,
        geometry: ScanGeometry,
        start_lead: std::time::Duration,
    ) -> Self {
        Self {
            planner,
            gates,
            geometry,
            start_lead: Duration::milliseconds(start_lead.as_millis() as i64),
            mount: None,
            backend: None,
            shipper: None,
        }
    }

    /// Enable mount control; without it the orchestrator plans only.
    pub fn with_mount(mut self, mount: &'a mut MountController) -> Self {
        self.mount = Some(mount);
        self
    }

    /// Enable backend capture around the track execution.
    pub fn with_backend(mut self, backend: &'a mut dyn BackendControl) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Enable server-side session shipping on export.
    pub fn with_shipper(mut self, shipper: &'a dyn LogShipper) -> Self {
        self.shipper = Some(shipper);
        self
    }

    /// Observe one source to a terminal outcome.
    ///
    /// Flux-gate and elevation-gate rejections are outcomes, not errors: the
    /// batch driver proceeds to the next source. Errors are reserved for
    /// device/protocol failures that the command policy did not absorb.
    pub async fn observe(&mut self, source: &Source) -> Result<ScanOutcome> {
        info!(
            source = %source.name,
            flux_jy = source.flux_jy,
            ra_deg = source.ra_deg,
            dec_deg = source.dec_deg,
            "observing source"
        );

        if source.flux_jy < self.gates.min_flux_jy {
            info!(source = %source.name, "flux below minimum, observation skipped");
            return Ok(ScanOutcome::SkippedFlux);
        }

        info!("calculating schedule");
        let precheck = self.planner.plan(source, Utc::now() + self.start_lead)?;
        if let Err(e) =
            transform::ensure_above_min_elevation(&precheck.horizon, self.gates.min_el_deg)
        {
            warn!(source = %source.name, reason = %e, "observation skipped");
            return Ok(ScanOutcome::SkippedElevation);
        }

        let Some(mount) = self.mount.as_deref_mut() else {
            info!(
                samples = precheck.horizon.len(),
                "mount control disabled, plan validated only"
            );
            return Ok(ScanOutcome::Planned);
        };

        mount.start_data_logging().await?;

        let (az, alt) = precheck
            .horizon
            .first_position()
            .ok_or_else(|| Error::Safety("planned scan is empty".into()))?;
        info!(az_deg = az, alt_deg = alt, "moving to start position");
        mount.move_pos(az, alt, MoveMode::Absolute).await?;
        mount.wait_for_pos_reached().await?;

        // The slew took an unpredictable amount of wall-clock time; the
        // schedule is re-anchored to now and the pre-check path discarded.
        info!("recalculating schedule");
        let plan = self.planner.plan(source, Utc::now() + self.start_lead)?;
        if let Err(e) =
            transform::ensure_above_min_elevation(&plan.horizon, self.gates.min_el_deg)
        {
            warn!(source = %source.name, reason = %e, "observation skipped after slew");
            mount.stop_data_logging().await?;
            return Ok(ScanOutcome::SkippedElevation);
        }

        if let Some(backend) = self.backend.as_deref_mut() {
            info!("preparing measurement");
            backend
                .measurement_prepare(json!({"new_file": "True"}))
                .await?;
            info!("starting measurement");
            backend.measurement_start().await?;
        }

        let track = transform::program_track(&plan.horizon);
        let stop_time = plan
            .horizon
            .stop_time()
            .ok_or_else(|| Error::Safety("planned scan is empty".into()))?;
        mount.run_table(&track, stop_time).await?;

        if let Some(backend) = self.backend.as_deref_mut() {
            info!("stopping measurement");
            backend.measurement_stop().await?;
        }

        mount.stop_data_logging().await?;
        let header = export_header(source, &self.gates, &self.geometry);
        mount.export(&header, self.shipper).await?;

        info!(source = %source.name, "observation executed");
        Ok(ScanOutcome::Executed)
    }
}

/// Header tagged onto the exported session: source identity plus the run
/// parameters that produced the scan.
pub fn export_header(source: &Source, gates: &RunGates, geometry: &ScanGeometry) -> String {
    format!(
        "# source={} flux_jy={} ra_deg={} dec_deg={} min_flux_jy={} min_el_deg={} \
         rotation_deg={} x_length_deg={} y_length_deg={} separation_deg={} time_step_s={}",
        source.name,
        source.flux_jy,
        source.ra_deg,
        source.dec_deg,
        gates.min_flux_jy,
        gates.min_el_deg,
        geometry.rotation_deg,
        geometry.x_length_deg,
        geometry.y_length_deg,
        geometry.separation_deg,
        geometry.time_step_s,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_carries_source_and_run_parameters() {
        let source = Source {
            name: "3C286".to_string(),
            flux_jy: 14.9,
            ra_deg: 202.78,
            dec_deg: 30.51,
        };
        let gates = RunGates {
            min_flux_jy: 5.0,
            min_el_deg: 20.0,
        };
        let geometry = ScanGeometry {
            time_step_s: 1.0,
            rotation_deg: 15.0,
            x_length_deg: 4.0,
            y_length_deg: 2.0,
            separation_deg: 1.0,
            slow_down_time_s: 4.0,
            turn_speed_factor: 1.0,
        };
        let header = export_header(&source, &gates, &geometry);
        assert!(header.starts_with("# source=3C286 "));
        assert!(header.contains("flux_jy=14.9"));
        assert!(header.contains("min_el_deg=20"));
        assert!(header.contains("separation_deg=1"));
    }
}
