//! In-memory audio backend for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

use crate::pulse::{
    AudioBackend, BackendError, BackendEvent, ObjectHandle, PropertyMap, TargetKind,
};

/// Pause point inside `list`, used to hold a refresh half-way through
pub struct ListPause {
    pub kind: TargetKind,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Default)]
pub struct MockBackend {
    objects: Mutex<HashMap<TargetKind, Vec<(ObjectHandle, PropertyMap)>>>,
    failing_lists: Mutex<HashSet<TargetKind>>,
    failing_properties: Mutex<HashSet<ObjectHandle>>,
    failing_volumes: Mutex<HashSet<ObjectHandle>>,
    volume_calls: Mutex<Vec<(ObjectHandle, u32, u32)>>,
    list_pause: Mutex<Option<ListPause>>,
    subscriber: Mutex<Option<mpsc::Sender<BackendEvent>>>,
    next_index: Mutex<u32>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add an object carrying the kind's naming property
    pub fn add_named(&self, kind: TargetKind, name: &str) -> ObjectHandle {
        let mut props = PropertyMap::new();
        props.insert(kind.naming_property().to_string(), name.to_string());
        self.add_with_properties(kind, props)
    }

    /// Add an object with an arbitrary property list
    pub fn add_with_properties(&self, kind: TargetKind, props: PropertyMap) -> ObjectHandle {
        let mut next = self.next_index.lock();
        let handle = ObjectHandle::new(kind, *next);
        *next += 1;
        self.objects.lock().entry(kind).or_default().push((handle, props));
        handle
    }

    pub fn remove(&self, handle: ObjectHandle) {
        if let Some(list) = self.objects.lock().get_mut(&handle.kind) {
            list.retain(|(h, _)| *h != handle);
        }
    }

    pub fn clear(&self) {
        self.objects.lock().clear();
    }

    pub fn fail_list(&self, kind: TargetKind) {
        self.failing_lists.lock().insert(kind);
    }

    pub fn heal_list(&self, kind: TargetKind) {
        self.failing_lists.lock().remove(&kind);
    }

    pub fn fail_properties(&self, handle: ObjectHandle) {
        self.failing_properties.lock().insert(handle);
    }

    pub fn fail_set_volume(&self, handle: ObjectHandle) {
        self.failing_volumes.lock().insert(handle);
    }

    pub fn pause_list(&self, pause: ListPause) {
        *self.list_pause.lock() = Some(pause);
    }

    pub fn volume_calls(&self) -> Vec<(ObjectHandle, u32, u32)> {
        self.volume_calls.lock().clone()
    }

    /// Push a notification to the current subscriber
    pub async fn emit(&self, event: BackendEvent) {
        let tx = self.subscriber.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }
}

#[async_trait]
impl AudioBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list(&self, kind: TargetKind) -> Result<Vec<ObjectHandle>, BackendError> {
        let pause = {
            let mut slot = self.list_pause.lock();
            if slot.as_ref().map_or(false, |p| p.kind == kind) {
                slot.take()
            } else {
                None
            }
        };
        if let Some(pause) = pause {
            pause.entered.notify_one();
            pause.release.notified().await;
        }

        if self.failing_lists.lock().contains(&kind) {
            return Err(BackendError::Other(format!("listing {} failed", kind)));
        }

        Ok(self
            .objects
            .lock()
            .get(&kind)
            .map(|list| list.iter().map(|(h, _)| *h).collect())
            .unwrap_or_default())
    }

    async fn properties(&self, handle: ObjectHandle) -> Result<PropertyMap, BackendError> {
        if self.failing_properties.lock().contains(&handle) {
            return Err(BackendError::Other(format!("properties of {} failed", handle)));
        }

        self.objects
            .lock()
            .get(&handle.kind)
            .and_then(|list| list.iter().find(|(h, _)| *h == handle))
            .map(|(_, props)| props.clone())
            .ok_or(BackendError::UnknownObject(handle))
    }

    async fn set_volume(
        &self,
        handle: ObjectHandle,
        left: u32,
        right: u32,
    ) -> Result<(), BackendError> {
        if self.failing_volumes.lock().contains(&handle) {
            return Err(BackendError::Other(format!("set volume on {} failed", handle)));
        }
        self.volume_calls.lock().push((handle, left, right));
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<BackendEvent>, BackendError> {
        let (tx, rx) = mpsc::channel(64);
        *self.subscriber.lock() = Some(tx);
        Ok(rx)
    }
}
