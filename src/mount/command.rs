//! Structured device commands for the mount's path-addressed device tree.
//!
//! Every command is a target path plus a string parameter map, serialized by
//! one encoder. Hand-built JSON bodies are what this replaces; a typed
//! command cannot produce quoting errors and can be validated before send.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Error, Result};

/// A single command addressed to a node of the device tree.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeviceCommand {
    pub path: String,
    pub params: BTreeMap<String, String>,
}

impl DeviceCommand {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter; values are carried as strings on the wire.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Encode as the JSON request body the device webserver expects.
    pub fn encode(&self) -> Result<String> {
        if self.path.is_empty() {
            return Err(Error::Protocol("device command with empty path".into()));
        }
        serde_json::to_string(self)
            .map_err(|e| Error::Protocol(format!("failed to encode device command: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_path_and_params() {
        let body = DeviceCommand::new("acu.command_arbiter.authority")
            .param("action", 1)
            .encode()
            .unwrap();
        assert_eq!(
            body,
            r#"{"path":"acu.command_arbiter.authority","params":{"action":"1"}}"#
        );
    }

    #[test]
    fn params_encode_in_deterministic_order() {
        let body = DeviceCommand::new("acu.azimuth.slew_to_abs_pos")
            .param("new_axis_absolute_position_set_point", 123.5)
            .param("new_axis_speed_set_point_for_this_run", 3.0)
            .encode()
            .unwrap();
        assert_eq!(
            body,
            r#"{"path":"acu.azimuth.slew_to_abs_pos","params":{"new_axis_absolute_position_set_point":"123.5","new_axis_speed_set_point_for_this_run":"3"}}"#
        );
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(DeviceCommand::new("").encode().is_err());
    }
}
