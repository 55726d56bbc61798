//! Mount control: a device-control state machine over the ACU webserver.
//!
//! The controller owns all mount state for the process lifetime. Commands go
//! through one structured encoder and one checked request path, so the
//! failure policy (best-effort or bounded retry) applies uniformly. The two
//! long waits, position reached and track completion, share the
//! [`poll::poll_until`] primitive.

pub mod command;
pub mod poll;
pub mod session;
pub mod transport;

pub use transport::{DeviceResponse, DeviceTransport, HttpTransport};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::ProgramTrack;
use crate::error::{Error, Result};
use crate::shipper::LogShipper;
use command::DeviceCommand;

/// Mount axes with a position readout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Azimuth,
    Elevation,
    FeedIndexer,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Azimuth, Axis::Elevation, Axis::FeedIndexer];

    /// Device-tree node of this axis.
    pub fn device(&self) -> &'static str {
        match self {
            Axis::Azimuth => "acu.azimuth",
            Axis::Elevation => "acu.elevation",
            Axis::FeedIndexer => "acu.feed_indexer",
        }
    }
}

/// Slew addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMode {
    Absolute,
    Relative,
}

impl MoveMode {
    fn command_name(&self) -> &'static str {
        match self {
            MoveMode::Absolute => "slew_to_abs_pos",
            MoveMode::Relative => "slew_to_rel_pos",
        }
    }

    fn position_param(&self) -> &'static str {
        match self {
            MoveMode::Absolute => "new_axis_absolute_position_set_point",
            MoveMode::Relative => "new_axis_relative_position_set_point",
        }
    }
}

/// Main control phase of the mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountPhase {
    Unconfigured,
    Arbitrating,
    Ready,
    Slewing,
    OnTrack,
}

/// Orthogonal data-logging substate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingState {
    Inactive,
    Active,
}

/// Failure policy for device commands.
///
/// `BestEffort` reproduces the historical behavior: a non-OK reply or an
/// unreachable device is logged and execution proceeds as if the command
/// succeeded, with no rollback. `Retry` bounds the attempts and aborts once
/// they are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPolicy {
    BestEffort,
    Retry { attempts: u32 },
}

/// Static tuning of the controller.
#[derive(Debug, Clone)]
pub struct MountTuning {
    /// Fixed delay after activation and slew commands.
    pub settle_delay: Duration,
    /// |actual - commanded| below this counts as in position, per axis.
    pub position_tolerance_deg: f64,
    pub max_velocity_az_deg_s: f64,
    pub max_velocity_el_deg_s: f64,
    /// Interval of both polling waits.
    pub poll_interval: Duration,
    /// Poll guard: some axes may never converge.
    pub max_poll_attempts: u32,
    /// Where exported session artifacts are written.
    pub artifact_dir: PathBuf,
}

/// Device-control state machine for the mount.
///
/// Guarded transitions reject out-of-order commands instead of attempting
/// them silently: every operation demands command authority first.
pub struct MountController {
    transport: Arc<dyn DeviceTransport>,
    tuning: MountTuning,
    policy: CommandPolicy,
    phase: MountPhase,
    logging: LoggingState,
    session_name: Option<String>,
}

impl MountController {
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        tuning: MountTuning,
        policy: CommandPolicy,
    ) -> Self {
        Self {
            transport,
            tuning,
            policy,
            phase: MountPhase::Unconfigured,
            logging: LoggingState::Inactive,
            session_name: None,
        }
    }

    pub fn phase(&self) -> MountPhase {
        self.phase
    }

    pub fn logging_state(&self) -> LoggingState {
        self.logging
    }

    /// Checked PUT applying the command policy.
    async fn checked_put(
        &self,
        route: &str,
        query: &[(&str, String)],
        body: Option<String>,
        what: &str,
    ) -> Result<()> {
        let attempts = match self.policy {
            CommandPolicy::BestEffort => 1,
            CommandPolicy::Retry { attempts } => attempts.max(1),
        };
        let mut last_failure = String::new();
        for attempt in 1..=attempts {
            match self.transport.put(route, query, body.clone()).await {
                Ok(response) if response.ok() => {
                    debug!(what, "device request accepted");
                    return Ok(());
                }
                Ok(response) => {
                    last_failure = format!(
                        "{what} replied {}: {}",
                        response.status,
                        response.body.trim()
                    );
                }
                Err(Error::Connectivity(e)) | Err(Error::Timeout(e)) => last_failure = e,
                Err(other) => return Err(other),
            }
            if attempt < attempts {
                warn!(what, attempt, failure = %last_failure, "device request failed, retrying");
            }
        }
        match self.policy {
            CommandPolicy::BestEffort => {
                warn!(what, failure = %last_failure, "device request failed, continuing best-effort");
                Ok(())
            }
            CommandPolicy::Retry { attempts } => Err(Error::Connectivity(format!(
                "{last_failure} (after {attempts} attempts)"
            ))),
        }
    }

    async fn command(&self, cmd: DeviceCommand) -> Result<()> {
        let what = cmd.path.clone();
        let body = cmd.encode()?;
        self.checked_put("/devices/command", &[], Some(body), &what)
            .await
    }

    fn require_authority(&self) -> Result<()> {
        match self.phase {
            MountPhase::Unconfigured | MountPhase::Arbitrating => Err(Error::State(
                "command authority has not been acquired".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Acquire command authority; one-shot precondition for everything else.
    pub async fn acquire_authority(&mut self) -> Result<()> {
        if self.phase != MountPhase::Unconfigured {
            return Err(Error::State(format!(
                "authority can only be acquired once (phase {:?})",
                self.phase
            )));
        }
        self.phase = MountPhase::Arbitrating;
        self.command(DeviceCommand::new("acu.command_arbiter.authority").param("action", 1))
            .await?;
        self.phase = MountPhase::Ready;
        info!("command authority acquired");
        Ok(())
    }

    /// Move to a named stow preset.
    pub async fn stow(&mut self, position: &str) -> Result<()> {
        self.require_authority()?;
        self.command(
            DeviceCommand::new("acu.general_management_and_controller.stow")
                .param("action", 1)
                .param("position", position),
        )
        .await
    }

    pub async fn unstow(&mut self) -> Result<()> {
        self.require_authority()?;
        self.command(
            DeviceCommand::new("acu.general_management_and_controller.unstow").param("action", 1),
        )
        .await
    }

    /// Activate azimuth then elevation, with a settle delay after each.
    pub async fn activate(&mut self) -> Result<()> {
        self.require_authority()?;
        for axis in [Axis::Azimuth, Axis::Elevation] {
            self.command(
                DeviceCommand::new(format!("{}.activate", axis.device())).param("action", 1),
            )
            .await?;
            tokio::time::sleep(self.tuning.settle_delay).await;
        }
        info!("both axes activated");
        Ok(())
    }

    /// One-shot on-source detection setup.
    pub async fn configure_on_source(
        &mut self,
        threshold_deg: f64,
        averaging_window_s: f64,
    ) -> Result<()> {
        self.require_authority()?;
        self.command(
            DeviceCommand::new("acu.tracking_controller.set_on_source_threshold")
                .param("threshold", threshold_deg)
                .param("averaging_time", averaging_window_s),
        )
        .await
    }

    /// One-shot data-logging setup from a collaborator-provided path list.
    pub async fn configure_data_logging(&mut self, paths: &[String]) -> Result<()> {
        self.require_authority()?;
        let body = serde_json::to_string(paths)
            .map_err(|e| Error::Protocol(format!("failed to encode logging paths: {e}")))?;
        self.checked_put("/datalogging/config", &[], Some(body), "datalogging config")
            .await
    }

    /// Issue independent slews for azimuth then elevation, each at the
    /// configured max velocity with a settle delay.
    pub async fn move_pos(&mut self, az_deg: f64, alt_deg: f64, mode: MoveMode) -> Result<()> {
        self.require_authority()?;
        self.phase = MountPhase::Slewing;
        let legs = [
            (Axis::Azimuth, az_deg, self.tuning.max_velocity_az_deg_s),
            (Axis::Elevation, alt_deg, self.tuning.max_velocity_el_deg_s),
        ];
        for (axis, position, speed) in legs {
            self.command(
                DeviceCommand::new(format!("{}.{}", axis.device(), mode.command_name()))
                    .param(mode.position_param(), position)
                    .param("new_axis_speed_set_point_for_this_run", speed),
            )
            .await?;
            tokio::time::sleep(self.tuning.settle_delay).await;
        }
        debug!(az_deg, alt_deg, ?mode, "slew commands issued");
        Ok(())
    }

    /// Command the feed indexer to a band preset.
    pub async fn move_band(&mut self, band: &str) -> Result<()> {
        self.require_authority()?;
        self.command(
            DeviceCommand::new("acu.general_management_and_controller.move_to_band")
                .param("action", band),
        )
        .await?;
        tokio::time::sleep(self.tuning.settle_delay).await;
        Ok(())
    }

    /// Block until azimuth, elevation and indexer all report in-position.
    ///
    /// The loop terminates only when every axis's |actual − commanded| is
    /// simultaneously below tolerance; a single settled axis while others
    /// have not started moving keeps the wait alive. Guarded by the
    /// configured max poll attempts, since some axes may never converge.
    pub async fn wait_for_pos_reached(&mut self) -> Result<()> {
        self.require_authority()?;
        let transport = Arc::clone(&self.transport);
        let tolerance = self.tuning.position_tolerance_deg;
        let polls = poll::poll_until(
            move || -> BoxFuture<'static, Result<bool>> {
                let transport = Arc::clone(&transport);
                Box::pin(async move { all_axes_in_position(transport, tolerance).await })
            },
            self.tuning.poll_interval,
            self.tuning.max_poll_attempts,
            "position-reached wait",
        )
        .await?;
        self.phase = MountPhase::Ready;
        info!(polls, "all axes in position");
        Ok(())
    }

    /// Upload the full program track in one request, then wait until wall
    /// clock passes `stop_time`.
    ///
    /// The wait is a fixed-duration countdown, not an acknowledgement that
    /// the mount actually completed the track. An already-elapsed stop time
    /// returns immediately without a single wait iteration.
    pub async fn run_table(
        &mut self,
        track: &ProgramTrack,
        stop_time: DateTime<Utc>,
    ) -> Result<()> {
        self.require_authority()?;
        self.checked_put(
            "/devices/programTrack",
            &[],
            Some(track.as_str().to_string()),
            "program track upload",
        )
        .await?;
        self.phase = MountPhase::OnTrack;
        info!(lines = track.line_count(), %stop_time, "program track uploaded");

        if Utc::now() < stop_time {
            let interval = self.tuning.poll_interval;
            let remaining = (stop_time - Utc::now()).num_seconds().max(0) as u32;
            let max_attempts = remaining / interval.as_secs().max(1) as u32 + 60;
            poll::poll_until(
                move || -> BoxFuture<'static, Result<bool>> {
                    let now = Utc::now();
                    let left = (stop_time - now).num_seconds();
                    if left > 0 {
                        info!(remaining_s = left, "tracking in progress");
                    }
                    Box::pin(async move { Ok(now >= stop_time) })
                },
                interval,
                max_attempts,
                "track completion wait",
            )
            .await?;
        }
        self.phase = MountPhase::Ready;
        Ok(())
    }

    /// Begin a named data-logging session.
    pub async fn start_data_logging(&mut self) -> Result<()> {
        self.require_authority()?;
        if self.logging == LoggingState::Active {
            return Err(Error::State("data logging is already active".into()));
        }
        let name = format!("otf-{}", Uuid::new_v4());
        self.checked_put(
            "/datalogging/start",
            &[("name", name.clone())],
            None,
            "datalogging start",
        )
        .await?;
        self.logging = LoggingState::Active;
        self.session_name = Some(name);
        Ok(())
    }

    pub async fn stop_data_logging(&mut self) -> Result<()> {
        self.require_authority()?;
        if self.logging == LoggingState::Inactive {
            return Err(Error::State("data logging is not active".into()));
        }
        self.checked_put("/datalogging/stop", &[], None, "datalogging stop")
            .await?;
        self.logging = LoggingState::Inactive;
        debug!(session = ?self.session_name, "data logging stopped");
        Ok(())
    }

    /// Export the most recently started session, tagged with `header`.
    ///
    /// Selects the newest session by comparing parsed start instants, hands
    /// it to the shipper for server-side fetch-and-tag, then retrieves the
    /// export locally and writes a timestamped artifact with the same
    /// header. Shipping failures are logged, not fatal; the local artifact
    /// is always attempted.
    pub async fn export(
        &self,
        header: &str,
        shipper: Option<&dyn LogShipper>,
    ) -> Result<PathBuf> {
        self.require_authority()?;
        let listing = self.transport.get("/datalogging/sessions", &[]).await?;
        if !listing.ok() {
            return Err(Error::Connectivity(format!(
                "session listing replied {}",
                listing.status
            )));
        }
        let sessions = session::parse_sessions(&listing.body)?;
        let latest = session::latest_session(&sessions)?;

        if let Some(shipper) = shipper {
            if let Err(e) = shipper.send_session(&latest.id, header).await {
                warn!(session = %latest.id, error = %e, "session shipping failed");
            }
        }

        let export = self
            .transport
            .get(
                "/datalogging/exportSession",
                &[("id", latest.id.clone())],
            )
            .await?;
        if !export.ok() {
            return Err(Error::Connectivity(format!(
                "session export replied {}",
                export.status
            )));
        }
        let path = session::write_artifact(&self.tuning.artifact_dir, header, &export.body)?;
        info!(session = %latest.id, artifact = %path.display(), "session exported");
        Ok(path)
    }
}

/// Read commanded and actual positions of every axis; true only when all
/// three deltas are within tolerance.
async fn all_axes_in_position(
    transport: Arc<dyn DeviceTransport>,
    tolerance_deg: f64,
) -> Result<bool> {
    for axis in Axis::ALL {
        let commanded = status_value(transport.as_ref(), &format!("{}.p_set", axis.device())).await?;
        let actual = status_value(transport.as_ref(), &format!("{}.p_act", axis.device())).await?;
        let delta = (actual - commanded).abs();
        if delta > tolerance_deg {
            debug!(axis = axis.device(), delta, "axis not yet in position");
            return Ok(false);
        }
    }
    Ok(true)
}

/// Read one status value from the device tree.
async fn status_value(transport: &dyn DeviceTransport, path: &str) -> Result<f64> {
    let response = transport
        .get("/devices/statusValue", &[("path", path.to_string())])
        .await?;
    if !response.ok() {
        return Err(Error::Connectivity(format!(
            "status read of {path} replied {}",
            response.status
        )));
    }
    parse_status_value(&response.body)
        .ok_or_else(|| Error::Protocol(format!("unparsable status value for {path}: {:?}", response.body)))
}

/// Status bodies are either a bare number or `{"value": <number>}`.
fn parse_status_value(body: &str) -> Option<f64> {
    let value: serde_json::Value = serde_json::from_str(body.trim()).ok()?;
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::Object(map) => map.get("value")?.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use transport::DeviceResponse;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct RecordedCall {
        method: &'static str,
        route: String,
        query: Vec<(String, String)>,
        body: Option<String>,
    }

    /// Scripted transport: records every exchange and answers from a fixed
    /// table of status values.
    struct Scripted {
        calls: Mutex<Vec<RecordedCall>>,
        put_status: u16,
        p_set: f64,
        p_act: f64,
    }

    impl Scripted {
        fn in_position() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                put_status: 200,
                p_set: 123.4,
                p_act: 123.4,
            }
        }

        fn failing_puts() -> Self {
            Self {
                put_status: 500,
                ..Self::in_position()
            }
        }

        fn puts(&self) -> Vec<RecordedCall> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.method == "PUT")
                .cloned()
                .collect()
        }

        fn record(&self, method: &'static str, route: &str, query: &[(&str, String)], body: Option<String>) {
            self.calls.lock().unwrap().push(RecordedCall {
                method,
                route: route.to_string(),
                query: query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                body,
            });
        }
    }

    #[async_trait]
    impl DeviceTransport for Scripted {
        async fn put(
            &self,
            route: &str,
            query: &[(&str, String)],
            body: Option<String>,
        ) -> crate::error::Result<DeviceResponse> {
            self.record("PUT", route, query, body);
            Ok(DeviceResponse {
                status: self.put_status,
                body: String::new(),
            })
        }

        async fn get(
            &self,
            route: &str,
            query: &[(&str, String)],
        ) -> crate::error::Result<DeviceResponse> {
            self.record("GET", route, query, None);
            let body = match route {
                "/devices/statusValue" => {
                    let path = &query[0].1;
                    if path.ends_with(".p_set") {
                        format!("{}", self.p_set)
                    } else {
                        format!("{}", self.p_act)
                    }
                }
                "/datalogging/sessions" => {
                    r#"[{"id": "s-1", "start_time": "2021-01-11T08:30:00Z"}]"#.to_string()
                }
                "/datalogging/exportSession" => "col1 col2\n1 2\n".to_string(),
                _ => String::new(),
            };
            Ok(DeviceResponse { status: 200, body })
        }
    }

    fn tuning(dir: &std::path::Path) -> MountTuning {
        MountTuning {
            settle_delay: Duration::from_millis(0),
            position_tolerance_deg: 0.01,
            max_velocity_az_deg_s: 3.0,
            max_velocity_el_deg_s: 1.0,
            poll_interval: Duration::from_millis(1),
            max_poll_attempts: 5,
            artifact_dir: dir.to_path_buf(),
        }
    }

    fn controller(transport: Arc<Scripted>, dir: &std::path::Path) -> MountController {
        MountController::new(transport, tuning(dir), CommandPolicy::BestEffort)
    }

    #[tokio::test]
    async fn move_before_authority_is_rejected() {
        let transport = Arc::new(Scripted::in_position());
        let mut mount = controller(Arc::clone(&transport), std::path::Path::new("/tmp"));
        let err = mount.move_pos(10.0, 45.0, MoveMode::Absolute).await.unwrap_err();
        assert!(matches!(err, Error::State(_)));
        assert!(transport.puts().is_empty());
    }

    #[tokio::test]
    async fn authority_is_one_shot() {
        let transport = Arc::new(Scripted::in_position());
        let mut mount = controller(Arc::clone(&transport), std::path::Path::new("/tmp"));
        mount.acquire_authority().await.unwrap();
        assert_eq!(mount.phase(), MountPhase::Ready);
        assert!(mount.acquire_authority().await.is_err());
    }

    #[tokio::test]
    async fn wait_returns_after_one_poll_when_in_position() {
        let transport = Arc::new(Scripted::in_position());
        let mut mount = controller(Arc::clone(&transport), std::path::Path::new("/tmp"));
        mount.acquire_authority().await.unwrap();
        mount.wait_for_pos_reached().await.unwrap();
        // One poll reads p_set and p_act for each of the three axes.
        let gets = transport
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.route == "/devices/statusValue")
            .count();
        assert_eq!(gets, 6);
    }

    #[tokio::test]
    async fn wait_times_out_when_an_axis_never_converges() {
        let transport = Arc::new(Scripted {
            p_act: 10.0,
            ..Scripted::in_position()
        });
        let mut mount = controller(Arc::clone(&transport), std::path::Path::new("/tmp"));
        mount.acquire_authority().await.unwrap();
        let err = mount.wait_for_pos_reached().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn run_table_with_elapsed_stop_time_skips_the_wait() {
        let transport = Arc::new(Scripted::in_position());
        let mut mount = controller(Arc::clone(&transport), std::path::Path::new("/tmp"));
        mount.acquire_authority().await.unwrap();
        let track = ProgramTrack::new("59580 10.0 45.0 1 0.0\n".to_string());
        let stop = Utc::now() - chrono::Duration::seconds(5);
        mount.run_table(&track, stop).await.unwrap();
        assert_eq!(mount.phase(), MountPhase::Ready);
        let uploads: Vec<_> = transport
            .puts()
            .into_iter()
            .filter(|c| c.route == "/devices/programTrack")
            .collect();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].body.as_deref(), Some("59580 10.0 45.0 1 0.0\n"));
    }

    #[tokio::test]
    async fn best_effort_swallows_non_ok_replies() {
        let transport = Arc::new(Scripted::failing_puts());
        let mut mount = controller(Arc::clone(&transport), std::path::Path::new("/tmp"));
        mount.acquire_authority().await.unwrap();
        mount.unstow().await.unwrap();
        assert_eq!(transport.puts().len(), 2);
    }

    #[tokio::test]
    async fn retry_policy_bounds_attempts_then_fails() {
        let transport = Arc::new(Scripted::failing_puts());
        let mut mount = MountController::new(
            transport.clone(),
            tuning(std::path::Path::new("/tmp")),
            CommandPolicy::Retry { attempts: 3 },
        );
        let err = mount.acquire_authority().await.unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)));
        assert_eq!(transport.puts().len(), 3);
    }

    #[tokio::test]
    async fn logging_substate_guards() {
        let transport = Arc::new(Scripted::in_position());
        let mut mount = controller(Arc::clone(&transport), std::path::Path::new("/tmp"));
        mount.acquire_authority().await.unwrap();
        assert!(mount.stop_data_logging().await.is_err());
        mount.start_data_logging().await.unwrap();
        assert_eq!(mount.logging_state(), LoggingState::Active);
        assert!(mount.start_data_logging().await.is_err());
        mount.stop_data_logging().await.unwrap();
        assert_eq!(mount.logging_state(), LoggingState::Inactive);
    }

    #[tokio::test]
    async fn export_writes_artifact_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(Scripted::in_position());
        let mut mount = controller(Arc::clone(&transport), dir.path());
        mount.acquire_authority().await.unwrap();
        let path = mount.export("# 3C286 flux=14.9", None).await.unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("# 3C286 flux=14.9\n"));
        assert!(content.contains("col1 col2"));
    }

    #[test]
    fn status_bodies_parse_both_shapes() {
        assert_eq!(parse_status_value("123.5"), Some(123.5));
        assert_eq!(parse_status_value(r#"{"value": -7.25}"#), Some(-7.25));
        assert_eq!(parse_status_value("not json"), None);
        assert_eq!(parse_status_value(r#"{"other": 1}"#), None);
    }
}
