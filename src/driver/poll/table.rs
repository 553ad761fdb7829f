use std::{collections::BTreeMap, os::fd::RawFd};

use super::{op::OpsKey, request::IoRequest};
use crate::{Error, Result};

/// A request waiting for its descriptor to become ready.
pub(super) struct Parked {
    /// Key of the operation's lifecycle in the driver's slab
    pub(super) key: OpsKey,

    pub(super) request: IoRequest,
}

/// Descriptor to parked request, at most one per descriptor.
///
/// Ordered so that a pump scans, retries and resumes in ascending descriptor order.
#[derive(Default)]
pub(super) struct ReadinessTable {
    slots: BTreeMap<RawFd, Parked>,
}

impl ReadinessTable {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(super) fn contains(&self, fd: RawFd) -> bool {
        self.slots.contains_key(&fd)
    }

    /// Parks `request` under its descriptor.
    ///
    /// Fails without touching the table if the descriptor already has a parked request.
    pub(super) fn insert(&mut self, key: OpsKey, request: IoRequest) -> Result<()> {
        use std::collections::btree_map::Entry;

        match self.slots.entry(request.fd()) {
            Entry::Occupied(entry) => Err(Error::ConflictingRequest { fd: *entry.key() }),
            Entry::Vacant(entry) => {
                entry.insert(Parked { key, request });
                Ok(())
            }
        }
    }

    pub(super) fn get_mut(&mut self, fd: RawFd) -> Option<&mut Parked> {
        self.slots.get_mut(&fd)
    }

    pub(super) fn remove(&mut self, fd: RawFd) -> Option<Parked> {
        self.slots.remove(&fd)
    }

    /// Returns `true` if the entry for `fd` belongs to the operation `key`.
    pub(super) fn is_owned(&self, fd: RawFd, key: OpsKey) -> bool {
        matches!(self.slots.get(&fd), Some(parked) if parked.key == key)
    }

    /// Removes the entry for `fd` only if it still belongs to the operation `key`.
    pub(super) fn remove_if_owned(&mut self, fd: RawFd, key: OpsKey) -> bool {
        if self.is_owned(fd, key) {
            self.slots.remove(&fd);
            true
        } else {
            false
        }
    }

    pub(super) fn descriptors(&self) -> impl Iterator<Item = RawFd> + '_ {
        self.slots.keys().copied()
    }

    /// The `poll(2)` set for every parked descriptor, in ascending order.
    pub(super) fn interests(&self) -> Vec<libc::pollfd> {
        self.slots
            .iter()
            .map(|(&fd, parked)| libc::pollfd {
                fd,
                events: parked.request.interest().poll_events(),
                revents: 0,
            })
            .collect()
    }
}
