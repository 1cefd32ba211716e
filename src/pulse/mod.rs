//! Audio-server capability interface
//!
//! The core never talks to PulseAudio directly. It holds an `Arc<dyn AudioBackend>`
//! exposing only what it needs: enumerate objects, read their property lists,
//! set a stereo volume, and subscribe to add/remove notifications.

pub mod pactl;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

pub use pactl::PactlBackend;

/// Backend volume value representing 100%
pub const VOLUME_NORM: u32 = 65535;

/// Property holding the human-readable name of a stream
pub const APPLICATION_NAME_PROPERTY: &str = "application.name";

/// Property holding the human-readable name of a sink or source
pub const DEVICE_DESCRIPTION_PROPERTY: &str = "device.description";

/// The four kinds of audio object an action can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum TargetKind {
    Sink,
    Source,
    PlaybackStream,
    RecordStream,
}

impl TargetKind {
    /// All kinds, in the order a refresh enumerates them
    pub const ALL: [TargetKind; 4] = [
        TargetKind::Sink,
        TargetKind::Source,
        TargetKind::PlaybackStream,
        TargetKind::RecordStream,
    ];

    /// Property whose value is used as the object's symbolic name
    pub fn naming_property(self) -> &'static str {
        match self {
            TargetKind::Sink | TargetKind::Source => DEVICE_DESCRIPTION_PROPERTY,
            TargetKind::PlaybackStream | TargetKind::RecordStream => APPLICATION_NAME_PROPERTY,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TargetKind::Sink => "sink",
            TargetKind::Source => "source",
            TargetKind::PlaybackStream => "playback stream",
            TargetKind::RecordStream => "record stream",
        };
        f.write_str(label)
    }
}

/// Opaque reference to one live audio object.
///
/// The index is only meaningful until the object disappears; the server may
/// hand the same number to an unrelated object later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle {
    pub kind: TargetKind,
    pub index: u32,
}

impl ObjectHandle {
    pub fn new(kind: TargetKind, index: u32) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind, self.index)
    }
}

/// Property list of an audio object
pub type PropertyMap = HashMap<String, String>;

/// Object lifecycle change reported by the audio server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectChange {
    Added,
    Removed,
}

/// Notification delivered by [`AudioBackend::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendEvent {
    pub kind: TargetKind,
    pub change: ObjectChange,
    pub index: u32,
}

/// Failures reported by an audio backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("malformed output from `{command}`: {source}")]
    Parse {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown audio object {0}")]
    UnknownObject(ObjectHandle),

    #[error("{0}")]
    Other(String),
}

/// Narrow view of the audio server used by the registry and executor.
///
/// All calls are treated as blocking relative to the caller: they are awaited
/// in place, never fired and forgotten.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Enumerate every live object of the given kind
    async fn list(&self, kind: TargetKind) -> Result<Vec<ObjectHandle>, BackendError>;

    /// Read the property list of one object
    async fn properties(&self, handle: ObjectHandle) -> Result<PropertyMap, BackendError>;

    /// Set the left and right channel volume of one object
    async fn set_volume(&self, handle: ObjectHandle, left: u32, right: u32)
        -> Result<(), BackendError>;

    /// Start delivering add/remove notifications
    async fn subscribe(&self) -> Result<mpsc::Receiver<BackendEvent>, BackendError>;
}
