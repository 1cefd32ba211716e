//! Target registry - name-indexed view of the live audio objects
//!
//! The registry maps the human-readable name of every sink, source, playback
//! stream and record stream to the handles currently carrying that name.
//! Handles are reassigned by the audio server whenever objects come and go, so
//! the registry is rebuilt wholesale on every refresh and never patched.
//!
//! Lifecycle: `TargetRegistry::new` (empty) → `refresh` → `resolve`*, with
//! further refreshes driven by [`run_refresh_worker`].

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::pulse::{AudioBackend, BackendError, BackendEvent, ObjectHandle, TargetKind};

/// Name → handles for one target kind. Handles keep enumeration order.
pub type NameIndex = HashMap<String, Vec<ObjectHandle>>;

/// Refresh failure. The previously installed snapshot stays in place.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("failed to enumerate {kind}s: {source}")]
    Enumerate {
        kind: TargetKind,
        #[source]
        source: BackendError,
    },

    #[error("failed to read properties of {handle}: {source}")]
    Properties {
        handle: ObjectHandle,
        #[source]
        source: BackendError,
    },
}

/// One complete, immutable result of a refresh pass
#[derive(Debug, Default, Clone)]
pub struct RegistrySnapshot {
    generation: u64,
    sinks: NameIndex,
    sources: NameIndex,
    playback_streams: NameIndex,
    record_streams: NameIndex,
}

impl RegistrySnapshot {
    /// Refresh pass that produced this snapshot (0 = never refreshed)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Name index for one kind
    pub fn index(&self, kind: TargetKind) -> &NameIndex {
        match kind {
            TargetKind::Sink => &self.sinks,
            TargetKind::Source => &self.sources,
            TargetKind::PlaybackStream => &self.playback_streams,
            TargetKind::RecordStream => &self.record_streams,
        }
    }

    fn index_mut(&mut self, kind: TargetKind) -> &mut NameIndex {
        match kind {
            TargetKind::Sink => &mut self.sinks,
            TargetKind::Source => &mut self.sources,
            TargetKind::PlaybackStream => &mut self.playback_streams,
            TargetKind::RecordStream => &mut self.record_streams,
        }
    }

    /// Handles currently named `name`, empty when unknown
    pub fn handles(&self, kind: TargetKind, name: &str) -> &[ObjectHandle] {
        self.index(kind).get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of handles of one kind
    pub fn handle_count(&self, kind: TargetKind) -> usize {
        self.index(kind).values().map(Vec::len).sum()
    }
}

/// Process-wide registry shared by the notification path and the command path
pub struct TargetRegistry {
    backend: Arc<dyn AudioBackend>,
    /// Installed snapshot. Writers only ever swap the `Arc`.
    current: RwLock<Arc<RegistrySnapshot>>,
    /// Serialises refresh passes
    refresh_lock: Mutex<()>,
}

impl TargetRegistry {
    /// Create an empty registry. Call [`refresh`](Self::refresh) to populate it.
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            current: RwLock::new(Arc::new(RegistrySnapshot::default())),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.read().clone()
    }

    /// Handles currently carrying `name`; empty when the name is unknown
    pub fn resolve(&self, kind: TargetKind, name: &str) -> Vec<ObjectHandle> {
        self.snapshot().handles(kind, name).to_vec()
    }

    /// Rebuild all four name indexes from the backend and install them together.
    ///
    /// Any backend failure aborts the pass before anything is installed.
    pub async fn refresh(&self) -> Result<Arc<RegistrySnapshot>, RefreshError> {
        let _guard = self.refresh_lock.lock().await;

        let mut fresh = RegistrySnapshot {
            generation: self.snapshot().generation + 1,
            ..RegistrySnapshot::default()
        };

        for kind in TargetKind::ALL {
            let handles = self
                .backend
                .list(kind)
                .await
                .map_err(|source| RefreshError::Enumerate { kind, source })?;

            let property = kind.naming_property();
            for handle in handles {
                let props = self
                    .backend
                    .properties(handle)
                    .await
                    .map_err(|source| RefreshError::Properties { handle, source })?;

                match props.get(property) {
                    Some(name) => fresh
                        .index_mut(kind)
                        .entry(name.clone())
                        .or_default()
                        .push(handle),
                    None => debug!("{} has no '{}' property, skipping", handle, property),
                }
            }
        }

        let fresh = Arc::new(fresh);
        *self.current.write() = fresh.clone();

        debug!(
            generation = fresh.generation,
            sinks = fresh.handle_count(TargetKind::Sink),
            sources = fresh.handle_count(TargetKind::Source),
            playback_streams = fresh.handle_count(TargetKind::PlaybackStream),
            record_streams = fresh.handle_count(TargetKind::RecordStream),
            "Registry refreshed"
        );

        Ok(fresh)
    }
}

/// Refresh the registry whenever the backend reports an object added or removed.
///
/// Notifications already queued when a refresh starts are folded into it.
/// Runs until the notification stream closes.
pub async fn run_refresh_worker(
    registry: Arc<TargetRegistry>,
    mut events: mpsc::Receiver<BackendEvent>,
) {
    info!("Registry refresh worker started");

    while let Some(event) = events.recv().await {
        let mut coalesced = 0usize;
        while events.try_recv().is_ok() {
            coalesced += 1;
        }

        debug!(
            "{} #{} {:?}, refreshing registry ({} more notification(s) folded in)",
            event.kind, event.index, event.change, coalesced
        );

        if let Err(e) = registry.refresh().await {
            warn!("Registry refresh failed (keeping previous snapshot): {}", e);
        }
    }

    warn!("Audio server notification stream closed, registry will no longer refresh");
}
