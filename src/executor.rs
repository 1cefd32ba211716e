//! Volume command executor
//!
//! Resolves a symbolic target through the registry and applies the volume to
//! every live object carrying that name.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::pulse::{AudioBackend, BackendError, ObjectHandle, TargetKind, VOLUME_NORM};
use crate::registry::TargetRegistry;

/// Volume change for every object named `target_name`
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeCommand {
    pub target_kind: TargetKind,
    pub target_name: String,
    /// Nominally 0.0..=1.0. Out-of-range values are passed through as-is.
    pub normalized_volume: f64,
}

/// A volume-set call failed. Handles updated before the failure stay updated.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("failed to set volume of {handle}: {source}")]
    SetVolume {
        handle: ObjectHandle,
        #[source]
        source: BackendError,
    },
}

/// Convert a normalized volume to the backend scale (65535 = 100%).
///
/// Truncates. Values above 1.0 map above 100%; negative or NaN map to 0.
pub fn to_backend_volume(normalized: f64) -> u32 {
    (normalized * f64::from(VOLUME_NORM)) as u32
}

/// Applies volume commands through the audio backend
pub struct VolumeCommandExecutor {
    registry: Arc<TargetRegistry>,
    backend: Arc<dyn AudioBackend>,
}

impl VolumeCommandExecutor {
    pub fn new(registry: Arc<TargetRegistry>, backend: Arc<dyn AudioBackend>) -> Self {
        Self { registry, backend }
    }

    /// Apply `cmd` to every handle currently named by it.
    ///
    /// An unknown target is logged and reported as success.
    pub async fn execute(&self, cmd: &VolumeCommand) -> Result<(), ExecutionError> {
        let handles = self.registry.resolve(cmd.target_kind, &cmd.target_name);

        if handles.is_empty() {
            warn!(
                "Could not find {} by name [{}] to set its volume",
                cmd.target_kind, cmd.target_name
            );
            return Ok(());
        }

        let volume = to_backend_volume(cmd.normalized_volume);

        for handle in handles {
            self.backend
                .set_volume(handle, volume, volume)
                .await
                .map_err(|source| ExecutionError::SetVolume { handle, source })?;

            debug!(
                "Set {} [{}] volume to {} ({:.1}%)",
                handle,
                cmd.target_name,
                volume,
                cmd.normalized_volume * 100.0
            );
        }

        Ok(())
    }
}
