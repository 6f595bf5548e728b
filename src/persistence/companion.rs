use std::collections::HashMap;

use blake3::Hash;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Bundle, RetainedScope};

/// Identity of a companion record: node type plus node key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompanionKey {
    pub type_name: String,
    pub key: String,
}

impl CompanionKey {
    pub fn new(type_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for CompanionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.type_name, self.key)
    }
}

/// State kept on behalf of one node identity across node instances.
#[derive(Debug, Clone, Default)]
pub struct CompanionRecord {
    pub args: Option<Value>,
    data: Bundle,
    hash: Option<Hash>,
    retained: RetainedScope,
}

impl CompanionRecord {
    pub fn data(&self) -> &Bundle {
        &self.data
    }

    pub fn retained(&self) -> &RetainedScope {
        &self.retained
    }

    /// Replace the persisted blob; returns whether its content changed.
    pub fn update_data(&mut self, data: Bundle) -> bool {
        let new_hash = data.fingerprint();
        if self.hash.map(|h| h != new_hash).unwrap_or(true) {
            self.data = data;
            self.hash = Some(new_hash);
            return true;
        }
        false
    }
}

/// Serializable form of a companion record. Retained objects are in-memory
/// only and are not part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionSnapshot {
    #[serde(flatten)]
    pub key: CompanionKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    #[serde(default)]
    pub data: Bundle,
}

/// Registry of companion records keyed by [`CompanionKey`].
#[derive(Debug, Default)]
pub struct CompanionStore {
    entries: HashMap<CompanionKey, CompanionRecord>,
}

impl CompanionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CompanionKey) -> Option<&CompanionRecord> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &CompanionKey) -> Option<&mut CompanionRecord> {
        self.entries.get_mut(key)
    }

    pub fn get_or_create(&mut self, key: &CompanionKey) -> &mut CompanionRecord {
        self.entries.entry(key.clone()).or_default()
    }

    pub fn contains(&self, key: &CompanionKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop the record and everything it retains.
    pub fn release(&mut self, key: &CompanionKey) -> bool {
        match self.entries.remove(key) {
            Some(record) => {
                record.retained.clear();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every record in key order.
    pub fn snapshot(&self) -> Vec<CompanionSnapshot> {
        let mut out: Vec<_> = self
            .entries
            .iter()
            .map(|(key, record)| CompanionSnapshot {
                key: key.clone(),
                args: record.args.clone(),
                data: record.data.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    /// Load records that are not already present; returns how many were added.
    pub fn restore(&mut self, snapshots: Vec<CompanionSnapshot>) -> usize {
        use std::collections::hash_map::Entry;

        let mut added = 0;
        for snapshot in snapshots {
            if let Entry::Vacant(vacant) = self.entries.entry(snapshot.key) {
                let record = vacant.insert(CompanionRecord {
                    args: snapshot.args,
                    ..CompanionRecord::default()
                });
                record.update_data(snapshot.data);
                added += 1;
            }
        }
        added
    }
}
