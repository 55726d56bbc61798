//! Run configuration.
//!
//! One immutable [`Config`] value is constructed once from a TOML file and
//! passed explicitly to every component; nothing re-reads configuration
//! behind the caller's back. Defaults follow the historical parameter file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{RunGates, ScanGeometry, SiteLocation, Source};
use crate::error::{Error, Result};
use crate::mount::{CommandPolicy, MountTuning};

/// Complete, immutable run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub connection: ConnectionSettings,
    pub site: SiteSettings,
    pub scan: ScanSettings,
    #[serde(default)]
    pub run: RunSettings,
    #[serde(default)]
    pub mount: MountSettings,
}

/// Endpoints of the external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub telescope_host: String,
    pub telescope_port: u16,
    #[serde(default)]
    pub backend_host: String,
    #[serde(default)]
    pub backend_port: u16,
    #[serde(default = "default_request_timeout_s")]
    pub request_timeout_s: u64,
}

/// Antenna position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSettings {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub height_m: f64,
}

/// OTF scan geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    pub x_length_deg: f64,
    pub y_length_deg: f64,
    pub separation_deg: f64,
    #[serde(default = "default_time_step_s")]
    pub time_step_s: f64,
    #[serde(default)]
    pub rotation_deg: f64,
    #[serde(default = "default_slow_down_time_s")]
    pub slow_down_time_s: f64,
    #[serde(default = "default_turn_speed_factor")]
    pub turn_speed_factor: f64,
}

/// Per-run gates and mode switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default)]
    pub min_flux_jy: f64,
    #[serde(default = "default_min_el_deg")]
    pub min_el_deg: f64,
    /// Seconds of lead between planning and the first track timestamp.
    #[serde(default = "default_start_lead_s")]
    pub start_lead_s: u64,
    /// Steer the mount; when false the run plans and validates only.
    #[serde(default)]
    pub control_mount: bool,
    /// Arm the capture backend around each track execution.
    #[serde(default)]
    pub control_backend: bool,
    #[serde(default = "default_band")]
    pub band: String,
    #[serde(default = "default_stow_position")]
    pub stow_position: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            min_flux_jy: 0.0,
            min_el_deg: default_min_el_deg(),
            start_lead_s: default_start_lead_s(),
            control_mount: false,
            control_backend: false,
            band: default_band(),
            stow_position: default_stow_position(),
        }
    }
}

/// Mount controller tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountSettings {
    #[serde(default = "default_settle_delay_s")]
    pub settle_delay_s: f64,
    #[serde(default = "default_position_tolerance_deg")]
    pub position_tolerance_deg: f64,
    #[serde(default = "default_max_velocity_az")]
    pub max_velocity_az_deg_s: f64,
    #[serde(default = "default_max_velocity_el")]
    pub max_velocity_el_deg_s: f64,
    #[serde(default = "default_poll_interval_s")]
    pub poll_interval_s: f64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    #[serde(default = "default_on_source_threshold_deg")]
    pub on_source_threshold_deg: f64,
    #[serde(default = "default_on_source_averaging_s")]
    pub on_source_averaging_s: f64,
    /// File listing the device paths to record, one per line.
    #[serde(default)]
    pub datalogging_paths_file: Option<PathBuf>,
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    /// 0 keeps the historical best-effort behavior; N > 0 retries each
    /// command up to N times and aborts when they are exhausted.
    #[serde(default)]
    pub command_retries: u32,
}

impl Default for MountSettings {
    fn default() -> Self {
        Self {
            settle_delay_s: default_settle_delay_s(),
            position_tolerance_deg: default_position_tolerance_deg(),
            max_velocity_az_deg_s: default_max_velocity_az(),
            max_velocity_el_deg_s: default_max_velocity_el(),
            poll_interval_s: default_poll_interval_s(),
            max_poll_attempts: default_max_poll_attempts(),
            on_source_threshold_deg: default_on_source_threshold_deg(),
            on_source_averaging_s: default_on_source_averaging_s(),
            datalogging_paths_file: None,
            artifact_dir: default_artifact_dir(),
            command_retries: 0,
        }
    }
}

fn default_request_timeout_s() -> u64 {
    10
}

fn default_time_step_s() -> f64 {
    1.0
}

fn default_slow_down_time_s() -> f64 {
    4.0
}

fn default_turn_speed_factor() -> f64 {
    1.0
}

fn default_min_el_deg() -> f64 {
    15.0
}

fn default_start_lead_s() -> u64 {
    10
}

fn default_band() -> String {
    "Band_2".to_string()
}

fn default_stow_position() -> String {
    "zenith".to_string()
}

fn default_settle_delay_s() -> f64 {
    1.0
}

fn default_position_tolerance_deg() -> f64 {
    0.01
}

fn default_max_velocity_az() -> f64 {
    3.0
}

fn default_max_velocity_el() -> f64 {
    1.0
}

fn default_poll_interval_s() -> f64 {
    1.0
}

fn default_max_poll_attempts() -> u32 {
    600
}

fn default_on_source_threshold_deg() -> f64 {
    0.005
}

fn default_on_source_averaging_s() -> f64 {
    2.0
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("exports")
}

impl Config {
    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Config = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid configuration {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.scan.separation_deg <= 0.0 {
            return Err(Error::Config("scan.separation_deg must be positive".into()));
        }
        if self.scan.time_step_s <= 0.0 {
            return Err(Error::Config("scan.time_step_s must be positive".into()));
        }
        if !(-90.0..=90.0).contains(&self.site.latitude_deg) {
            return Err(Error::Config("site.latitude_deg out of range".into()));
        }
        if self.mount.position_tolerance_deg <= 0.0 {
            return Err(Error::Config(
                "mount.position_tolerance_deg must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn gates(&self) -> RunGates {
        RunGates {
            min_flux_jy: self.run.min_flux_jy,
            min_el_deg: self.run.min_el_deg,
        }
    }

    pub fn geometry(&self) -> ScanGeometry {
        ScanGeometry {
            time_step_s: self.scan.time_step_s,
            rotation_deg: self.scan.rotation_deg,
            x_length_deg: self.scan.x_length_deg,
            y_length_deg: self.scan.y_length_deg,
            separation_deg: self.scan.separation_deg,
            slow_down_time_s: self.scan.slow_down_time_s,
            turn_speed_factor: self.scan.turn_speed_factor,
        }
    }

    pub fn site_location(&self) -> SiteLocation {
        SiteLocation {
            latitude_deg: self.site.latitude_deg,
            longitude_deg: self.site.longitude_deg,
            height_m: self.site.height_m,
        }
    }

    pub fn mount_tuning(&self) -> MountTuning {
        MountTuning {
            settle_delay: Duration::from_secs_f64(self.mount.settle_delay_s),
            position_tolerance_deg: self.mount.position_tolerance_deg,
            max_velocity_az_deg_s: self.mount.max_velocity_az_deg_s,
            max_velocity_el_deg_s: self.mount.max_velocity_el_deg_s,
            poll_interval: Duration::from_secs_f64(self.mount.poll_interval_s),
            max_poll_attempts: self.mount.max_poll_attempts,
            artifact_dir: self.mount.artifact_dir.clone(),
        }
    }

    pub fn command_policy(&self) -> CommandPolicy {
        match self.mount.command_retries {
            0 => CommandPolicy::BestEffort,
            attempts => CommandPolicy::Retry { attempts },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.request_timeout_s)
    }

    pub fn start_lead(&self) -> Duration {
        Duration::from_secs(self.run.start_lead_s)
    }
}

/// Load a JSON source list: `[{"name", "flux_jy", "ra_deg", "dec_deg"}]`.
pub fn load_sources(path: &Path) -> anyhow::Result<Vec<Source>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read source list {}", path.display()))?;
    let sources: Vec<Source> = serde_json::from_str(&text)
        .with_context(|| format!("invalid source list {}", path.display()))?;
    Ok(sources)
}

/// Read a data-logging path list, one device path per line, ignoring blanks
/// and `#` comments.
pub fn load_logging_paths(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read logging path list {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
        [connection]
        telescope_host = "10.96.64.10"
        telescope_port = 8080

        [site]
        latitude_deg = -30.7
        longitude_deg = 21.4
        height_m = 1050.0

        [scan]
        x_length_deg = 4.0
        y_length_deg = 2.0
        separation_deg = 1.0
    "#;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let f = write_temp(MINIMAL);
        let config = Config::from_file(f.path()).unwrap();
        assert_eq!(config.scan.time_step_s, 1.0);
        assert_eq!(config.run.min_el_deg, 15.0);
        assert_eq!(config.mount.max_poll_attempts, 600);
        assert!(!config.run.control_mount);
        assert_eq!(config.command_policy(), CommandPolicy::BestEffort);
    }

    #[test]
    fn retry_setting_selects_policy() {
        let f = write_temp(&format!("{MINIMAL}\n[mount]\ncommand_retries = 3\n"));
        let config = Config::from_file(f.path()).unwrap();
        assert_eq!(config.command_policy(), CommandPolicy::Retry { attempts: 3 });
    }

    #[test]
    fn invalid_separation_is_rejected() {
        let bad = MINIMAL.replace("separation_deg = 1.0", "separation_deg = 0.0");
        let f = write_temp(&bad);
        assert!(matches!(Config::from_file(f.path()), Err(Error::Config(_))));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = Config::from_file(Path::new("/nonexistent/observer.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn source_list_parses() {
        let f = write_temp(
            r#"[{"name": "3C286", "flux_jy": 14.9, "ra_deg": 202.78, "dec_deg": 30.51}]"#,
        );
        let sources = load_sources(f.path()).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "3C286");
    }

    #[test]
    fn logging_paths_skip_comments_and_blanks() {
        let f = write_temp("# header\nacu.azimuth.p_act\n\n  acu.elevation.p_act\n");
        let paths = load_logging_paths(f.path()).unwrap();
        assert_eq!(paths, vec!["acu.azimuth.p_act", "acu.elevation.p_act"]);
    }
}
