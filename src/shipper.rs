//! Log-artifact transfer collaborator interface.
//!
//! The transfer service accepts either a whole file wrapped with a textual
//! payload, or a (session id, header) pair that it resolves server-side by
//! fetching the session and tagging it with the header. Callers block up to
//! the implementation's acknowledgement timeout.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

/// Push-side interface of the file/session transfer service.
#[async_trait]
pub trait LogShipper: Send + Sync {
    /// Ship a whole file, wrapped with its textual payload.
    async fn send_file(&self, filename: &str, payload: &str) -> Result<()>;

    /// Ask the service to fetch session `session_id` itself and tag it with
    /// `header` before processing.
    async fn send_session(&self, session_id: &str, header: &str) -> Result<()>;
}

/// Stand-in shipper that acknowledges without transferring anything.
#[derive(Debug, Default)]
pub struct NullShipper;

#[async_trait]
impl LogShipper for NullShipper {
    async fn send_file(&self, filename: &str, payload: &str) -> Result<()> {
        debug!(filename, bytes = payload.len(), "null shipper: file drop");
        Ok(())
    }

    async fn send_session(&self, session_id: &str, header: &str) -> Result<()> {
        debug!(session_id, header, "null shipper: session drop");
        Ok(())
    }
}
