//! Identity-keyed server registry.
//!
//! Records live in an insertion-ordered arena with an identity index
//! (`IndexMap`), so lookups are O(1) and listings come out in the order the
//! servers first registered. Removal shifts later records down to keep that
//! order stable.

use indexmap::map::Entry;
use indexmap::IndexMap;
use std::net::{IpAddr, SocketAddr};

use crate::record::ServerRecord;
use crate::types::{ConnectionId, Timestamp};

/// The set of server records known to one role.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    records: IndexMap<ConnectionId, ServerRecord>,
}

impl Registry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a record by identity
    #[must_use]
    pub fn find(&self, identity: ConnectionId) -> Option<&ServerRecord> {
        self.records.get(&identity)
    }

    /// Look up a record by identity for mutation
    pub fn find_mut(&mut self, identity: ConnectionId) -> Option<&mut ServerRecord> {
        self.records.get_mut(&identity)
    }

    /// Position of a record in listing order
    #[must_use]
    pub fn index_of(&self, identity: ConnectionId) -> Option<usize> {
        self.records.get_index_of(&identity)
    }

    /// Look up a record by its advertised game address (exact ip and port)
    #[must_use]
    pub fn find_by_address(&self, address: SocketAddr) -> Option<&ServerRecord> {
        self.records.values().find(|record| record.address == address)
    }

    /// Insert a new record or merge into the existing one with the same identity.
    ///
    /// With `overwrite_existing` the merge is a full replace: rules missing
    /// from `candidate` are dropped. Without it, rules are only added or
    /// updated. Reserved rules already on the record survive both modes.
    /// Returns the stored record and whether it was newly added.
    pub fn upsert(
        &mut self,
        candidate: &ServerRecord,
        overwrite_existing: bool,
        now: Timestamp,
    ) -> (&mut ServerRecord, bool) {
        match self.records.entry(candidate.identity) {
            Entry::Vacant(slot) => {
                let mut record = candidate.clone();
                record.rules.retain(|rule| !rule.is_reserved());
                record.last_update = now;
                (slot.insert(record), true)
            }
            Entry::Occupied(slot) => {
                let existing = slot.into_mut();
                for rule in &candidate.rules {
                    existing
                        .rules
                        .set_rule(&rule.key, rule.text.as_deref(), rule.int);
                }
                if overwrite_existing {
                    existing
                        .rules
                        .retain(|rule| rule.is_reserved() || candidate.rules.contains(&rule.key));
                }
                existing.address = candidate.address;
                existing.last_update = now;
                (existing, false)
            }
        }
    }

    /// Remove a record, returning it if present
    pub fn remove(&mut self, identity: ConnectionId) -> Option<ServerRecord> {
        self.records.shift_remove(&identity)
    }

    /// Drop every record whose `last_update` is strictly before `cutoff`.
    ///
    /// Returns the number of records removed.
    pub fn sweep_stale(&mut self, cutoff: Timestamp) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.last_update >= cutoff);
        before - self.records.len()
    }

    /// Drop every record advertised from `ip`, on any port.
    ///
    /// Returns the identities removed.
    pub fn purge_ip(&mut self, ip: IpAddr) -> Vec<ConnectionId> {
        let mut purged = Vec::new();
        self.records.retain(|identity, record| {
            if record.address.ip() == ip {
                purged.push(*identity);
                false
            } else {
                true
            }
        });
        purged
    }

    /// Clear the missed-probe counter of the record at `address`
    pub fn record_pong(&mut self, address: SocketAddr) -> Option<&mut ServerRecord> {
        let record = self
            .records
            .values_mut()
            .find(|record| record.address == address)?;
        record.failed_pings = 0;
        Some(record)
    }

    /// Iterate records in listing order
    pub fn iter(&self) -> impl Iterator<Item = &ServerRecord> {
        self.records.values()
    }

    /// Identities in listing order
    #[must_use]
    pub fn identities(&self) -> Vec<ConnectionId> {
        self.records.keys().copied().collect()
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
