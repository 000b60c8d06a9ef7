//! Per-camera notification queues
//!
//! - notify: one `SyncMessage` per completed match, bounded, oldest entry
//!   overwritten when full
//! - removal: frames the selector dropped, so the owning pipeline can recycle
//!   them
//!
//! The selector keeps its own sender/receiver pair for every queue. Consumers
//! get receiver clones; draining through the selector's receiver empties the
//! queue for everyone.

use std::collections::BTreeMap;

use async_channel::{Receiver, Sender};
use contracts::{CameraId, ContractError, FrameRef, SyncMessage, MESSAGE_MAX};
use ringbuf::{traits::*, HeapRb};
use tracing::trace;

struct Channel<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Channel<T> {
    fn bounded(capacity: usize) -> Self {
        let (tx, rx) = async_channel::bounded(capacity);
        Self { tx, rx }
    }

    fn unbounded() -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self { tx, rx }
    }

    fn drain(&self) -> usize {
        let mut drained = 0;
        while self.rx.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }
}

/// Notify and removal queues of every camera plus the message history.
pub(crate) struct NotificationChannels {
    notify: BTreeMap<CameraId, Channel<SyncMessage>>,
    removal: BTreeMap<CameraId, Channel<FrameRef>>,
    history: HeapRb<SyncMessage>,
}

impl NotificationChannels {
    pub(crate) fn new() -> Self {
        Self {
            notify: BTreeMap::new(),
            removal: BTreeMap::new(),
            history: HeapRb::new(MESSAGE_MAX),
        }
    }

    pub(crate) fn register_notify(
        &mut self,
        camera: CameraId,
    ) -> Result<Receiver<SyncMessage>, ContractError> {
        register(&mut self.notify, camera, "notify", || {
            Channel::bounded(MESSAGE_MAX)
        })
    }

    pub(crate) fn register_removal(
        &mut self,
        camera: CameraId,
    ) -> Result<Receiver<FrameRef>, ContractError> {
        register(&mut self.removal, camera, "removal", Channel::unbounded)
    }

    /// Send `message` to every notify queue and record it in the history.
    ///
    /// Returns how many queues had to drop their oldest message.
    pub(crate) fn broadcast(&mut self, message: SyncMessage) -> usize {
        let mut overwritten = 0;
        for (camera, channel) in &self.notify {
            match channel.tx.force_send(message) {
                Ok(Some(old)) => {
                    overwritten += 1;
                    trace!(%camera, dropped_sync_id = old.sync_id, "notify queue full, oldest overwritten");
                }
                Ok(None) => {}
                Err(_) => trace!(%camera, "notify queue closed"),
            }
        }
        self.history.push_overwrite(message);
        overwritten
    }

    /// Push a dropped frame to `camera`'s removal queue. False when the camera
    /// has no removal queue.
    pub(crate) fn notify_removal(&self, camera: CameraId, frame: FrameRef) -> bool {
        match self.removal.get(&camera) {
            Some(channel) => channel.tx.try_send(frame).is_ok(),
            None => false,
        }
    }

    /// Empty both queues of `camera`, returning `(notify, removal)` counts.
    pub(crate) fn drain(&self, camera: CameraId) -> (usize, usize) {
        let notify = self.notify.get(&camera).map_or(0, Channel::drain);
        let removal = self.removal.get(&camera).map_or(0, Channel::drain);
        (notify, removal)
    }

    pub(crate) fn drain_all(&self) {
        for channel in self.notify.values() {
            channel.drain();
        }
        for channel in self.removal.values() {
            channel.drain();
        }
    }

    /// Drop the selector's ends of `camera`'s queues. Consumers see the
    /// channels close once they hold the last handles.
    pub(crate) fn unregister(&mut self, camera: CameraId) {
        self.notify.remove(&camera);
        self.removal.remove(&camera);
    }

    pub(crate) fn notify_len(&self, camera: CameraId) -> usize {
        self.notify.get(&camera).map_or(0, |channel| channel.rx.len())
    }

    pub(crate) fn removal_len(&self, camera: CameraId) -> usize {
        self.removal.get(&camera).map_or(0, |channel| channel.rx.len())
    }

    /// Oldest first.
    pub(crate) fn recent_messages(&self) -> Vec<SyncMessage> {
        self.history.iter().copied().collect()
    }

    pub(crate) fn clear_history(&mut self) {
        self.history.pop_iter().count();
    }
}

fn register<T>(
    channels: &mut BTreeMap<CameraId, Channel<T>>,
    camera: CameraId,
    kind: &str,
    make: impl FnOnce() -> Channel<T>,
) -> Result<Receiver<T>, ContractError> {
    if let Some(existing) = channels.get(&camera) {
        if !existing.rx.is_empty() {
            return Err(ContractError::invalid_operation(format!(
                "{camera} {kind} queue still holds {} entries",
                existing.rx.len()
            )));
        }
        return Ok(existing.rx.clone());
    }

    let channel = channels.entry(camera).or_insert_with(make);
    Ok(channel.rx.clone())
}
