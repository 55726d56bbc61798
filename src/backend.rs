//! Capture-backend collaborator interface.
//!
//! The backend is a remote product controller reached over its own RPC
//! protocol; this crate only depends on the call surface. Every call must
//! reply OK or is treated as failed. Implementations are expected to bound
//! each call with the timeout of its class (see [`timeouts`]) and to map a
//! bounded timeout to [`Error::Timeout`](crate::error::Error::Timeout) so
//! the liveness probe can distinguish "inactive" from "broken".

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// Per-operation request timeouts of the backend protocol.
pub mod timeouts {
    use std::time::Duration;

    /// Configuration-class calls: configure, deconfigure, capture control,
    /// set, provision, deprovision, measurement_prepare.
    pub const CONFIGURE: Duration = Duration::from_secs(120);
    /// Measurement start/stop.
    pub const MEASUREMENT: Duration = Duration::from_secs(20);
    /// Sensor reads.
    pub const SENSOR: Duration = Duration::from_secs(3);
    /// Liveness probe synchronization.
    pub const PING: Duration = Duration::from_secs(30);
}

/// Control surface of the data-capture backend.
#[async_trait]
pub trait BackendControl: Send + Sync {
    async fn deconfigure(&mut self) -> Result<()>;
    async fn configure(&mut self, config: Value) -> Result<()>;
    async fn capture_start(&mut self) -> Result<()>;
    async fn capture_stop(&mut self) -> Result<()>;
    async fn measurement_prepare(&mut self, config: Value) -> Result<()>;
    async fn measurement_start(&mut self) -> Result<()>;
    async fn measurement_stop(&mut self) -> Result<()>;
    async fn set(&mut self, config: Value) -> Result<()>;
    async fn provision(&mut self, name: &str) -> Result<()>;
    async fn deprovision(&mut self) -> Result<()>;
    /// Read the backend's current configuration sensor.
    async fn current_config(&mut self) -> Result<Value>;

    /// Liveness probe: swallows every error and reports reachability.
    ///
    /// A bounded timeout or any request failure surfaces as `false`, never
    /// as an error.
    async fn ping(&mut self) -> bool {
        match self.current_config().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "backend liveness probe failed");
                false
            }
        }
    }
}

/// Stand-in backend for runs where no product controller is wired in.
///
/// Acknowledges every call without doing anything, so the orchestration
/// sequence can be exercised end to end. Deployments replace this with a
/// client for their product-control protocol.
#[derive(Debug, Default)]
pub struct NullBackend;

#[async_trait]
impl BackendControl for NullBackend {
    async fn deconfigure(&mut self) -> Result<()> {
        Ok(())
    }

    async fn configure(&mut self, config: Value) -> Result<()> {
        debug!(%config, "null backend: configure acknowledged");
        Ok(())
    }

    async fn capture_start(&mut self) -> Result<()> {
        Ok(())
    }

    async fn capture_stop(&mut self) -> Result<()> {
        Ok(())
    }

    async fn measurement_prepare(&mut self, config: Value) -> Result<()> {
        debug!(%config, "null backend: measurement_prepare acknowledged");
        Ok(())
    }

    async fn measurement_start(&mut self) -> Result<()> {
        Ok(())
    }

    async fn measurement_stop(&mut self) -> Result<()> {
        Ok(())
    }

    async fn set(&mut self, config: Value) -> Result<()> {
        debug!(%config, "null backend: set acknowledged");
        Ok(())
    }

    async fn provision(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn deprovision(&mut self) -> Result<()> {
        Ok(())
    }

    async fn current_config(&mut self) -> Result<Value> {
        Ok(Value::Object(serde_json::Map::new()))
    }
}
