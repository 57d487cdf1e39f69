//! Table of registered consumer objects.

use crate::envelope::Envelope;
use crate::object::ObjectHandle;
use crate::types::ObjectId;
use crossbeam_channel::TryRecvError;
use std::collections::HashMap;

/// A command read from an object's outbound queue.
#[derive(Debug)]
pub struct PendingCommand {
    pub from: ObjectHandle,
    pub command: Envelope,
}

struct ObjectEntry {
    handle: ObjectHandle,
    /// Consumer dropped its endpoint; the command queue is no longer polled.
    detached: bool,
}

/// Registered objects in registration order.
///
/// Entries are only ever added; the whole table is released at once when
/// the broker stops.
#[derive(Default)]
pub struct ObjectTable {
    entries: Vec<ObjectEntry>,
    index: HashMap<ObjectId, usize>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `handle` if its id is unknown. Returns true if inserted.
    pub fn insert(&mut self, handle: ObjectHandle) -> bool {
        if self.index.contains_key(&handle.id()) {
            return false;
        }
        self.index.insert(handle.id(), self.entries.len());
        self.entries.push(ObjectEntry {
            handle,
            detached: false,
        });
        true
    }

    pub fn get(&self, id: ObjectId) -> Option<&ObjectHandle> {
        self.index.get(&id).map(|&i| &self.entries[i].handle)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handles whose command queues are still connected.
    pub fn live(&self) -> impl Iterator<Item = &ObjectHandle> {
        self.entries
            .iter()
            .filter(|e| !e.detached)
            .map(|e| &e.handle)
    }

    /// Take at most one command from every live object, without blocking.
    ///
    /// Objects whose command queue has been disconnected are marked
    /// detached and skipped from then on.
    pub fn poll_commands(&mut self) -> Vec<PendingCommand> {
        let mut pending = Vec::new();
        for entry in self.entries.iter_mut().filter(|e| !e.detached) {
            match entry.handle.commands().try_recv() {
                Ok(command) => pending.push(PendingCommand {
                    from: entry.handle.clone(),
                    command,
                }),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    tracing::debug!(object = %entry.handle.id(), "object detached");
                    entry.detached = true;
                }
            }
        }
        pending
    }

    /// Remove and return every handle.
    pub fn drain(&mut self) -> Vec<ObjectHandle> {
        self.index.clear();
        self.entries.drain(..).map(|e| e.handle).collect()
    }
}
