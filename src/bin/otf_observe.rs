//! OTF Observation Runner
//!
//! Batch entry point: loads the run configuration and a source list, performs
//! the one-time mount initiation sequence, then observes each source in turn.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin otf-observe -- observer.toml sources.json
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use otf_observer::backend::{BackendControl, NullBackend};
use otf_observer::config::{load_logging_paths, load_sources};
use otf_observer::mount::{HttpTransport, MountController};
use otf_observer::observe::{OtfPlanner, ScanOrchestrator};
use otf_observer::shipper::NullShipper;
use otf_observer::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .init();

    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("observer.toml"));
    let sources_path = env::args()
        .nth(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sources.json"));

    let config = Config::from_file(&config_path)
        .with_context(|| format!("loading configuration {}", config_path.display()))?;
    let sources = load_sources(&sources_path)?;
    info!(
        sources = sources.len(),
        config = %config_path.display(),
        "starting observation run"
    );

    let mut backend = NullBackend;
    if config.run.control_backend {
        if !backend.ping().await {
            bail!("capture backend is unreachable, refusing to start the run");
        }
        info!("capture backend reachable");
    }

    let mut mount = if config.run.control_mount {
        let transport = HttpTransport::new(
            &config.connection.telescope_host,
            config.connection.telescope_port,
            config.request_timeout(),
        )?;
        let mut mount = MountController::new(
            Arc::new(transport),
            config.mount_tuning(),
            config.command_policy(),
        );
        initiate(&mut mount, &config).await?;
        Some(mount)
    } else {
        info!("mount control disabled, planning only");
        None
    };

    let planner = OtfPlanner {
        geometry: config.geometry(),
        site: config.site_location(),
    };
    let shipper = NullShipper;

    let mut failures = 0usize;
    for source in &sources {
        let mut orchestrator = ScanOrchestrator::new(
            &planner,
            config.gates(),
            config.geometry(),
            config.start_lead(),
        )
        .with_shipper(&shipper);
        if let Some(mount) = mount.as_mut() {
            orchestrator = orchestrator.with_mount(mount);
        }
        if config.run.control_backend {
            orchestrator = orchestrator.with_backend(&mut backend);
        }

        match orchestrator.observe(source).await {
            Ok(outcome) => {
                info!(source = %source.name, outcome = outcome.as_str(), "source finished")
            }
            Err(e) => {
                failures += 1;
                error!(source = %source.name, error = %e, "source failed, continuing");
            }
        }
    }

    if let Some(mount) = mount.as_mut() {
        if let Err(e) = mount.stow(&config.run.stow_position).await {
            warn!(error = %e, "stow at end of run failed");
        }
    }

    if failures > 0 {
        bail!("{failures} of {} sources failed", sources.len());
    }
    info!("observation run complete");
    Ok(())
}

/// One-time mount initiation: authority, unstow, axis activation, on-source
/// detection, data logging configuration, band selection.
async fn initiate(mount: &mut MountController, config: &Config) -> anyhow::Result<()> {
    mount
        .acquire_authority()
        .await
        .context("acquiring command authority")?;
    mount.unstow().await.context("unstowing")?;
    mount.activate().await.context("activating axes")?;
    mount
        .configure_on_source(
            config.mount.on_source_threshold_deg,
            config.mount.on_source_averaging_s,
        )
        .await
        .context("configuring on-source detection")?;
    if let Some(paths_file) = config.mount.datalogging_paths_file.as_deref() {
        let paths = load_logging_paths(paths_file)?;
        mount
            .configure_data_logging(&paths)
            .await
            .context("configuring data logging")?;
    }
    mount
        .move_band(&config.run.band)
        .await
        .context("selecting band")?;
    info!(band = %config.run.band, "mount initiated");
    Ok(())
}
