//! Settings replay store.
//!
//! Remembers the last set command issued for each property so the
//! configuration can be restored after the NCP resets. Entries keep
//! the position of their first insertion; overwriting replaces the
//! command in place and only an explicit unset removes an entry.

use bytes::Bytes;

use crate::spinel::{Capability, CommandId, Property, SpinelCommand};

/// One remembered property setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingEntry {
    /// Capability the NCP must advertise for the replay to be attempted.
    pub capability: Option<Capability>,
    /// Encoded command body (without header), replayed as-is.
    pub command: Bytes,
}

/// Insertion-ordered map from property to its last set command.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    entries: Vec<(Property, SettingEntry)>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `property`.
    pub fn insert(&mut self, property: Property, entry: SettingEntry) {
        match self.entries.iter_mut().find(|(p, _)| *p == property) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((property, entry)),
        }
    }

    /// Store a property-set command for replay.
    ///
    /// Returns `false` when `command` is not a property set.
    pub fn remember(&mut self, command: &SpinelCommand, capability: Option<Capability>) -> bool {
        let Some(property) = command.property else {
            return false;
        };
        if command.command != CommandId::PropValueSet {
            return false;
        }
        self.insert(
            property,
            SettingEntry {
                capability,
                command: command.encode_body(),
            },
        );
        true
    }

    /// Explicit unset.
    pub fn remove(&mut self, property: Property) -> Option<SettingEntry> {
        let index = self.entries.iter().position(|(p, _)| *p == property)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, property: Property) -> Option<&SettingEntry> {
        self.entries
            .iter()
            .find(|(p, _)| *p == property)
            .map(|(_, e)| e)
    }

    /// The entry at replay position `index`.
    pub fn entry_at(&self, index: usize) -> Option<(Property, &SettingEntry)> {
        self.entries.get(index).map(|(p, e)| (*p, e))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Property, &SettingEntry)> {
        self.entries.iter().map(|(p, e)| (*p, e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────
