use crate::model::RemoteFileRecord;
use std::collections::HashSet;
use std::hash::Hash;

/// Signatures seen so far in one pipeline run. The first sighting of a
/// signature is canonical; later sightings are duplicates.
#[derive(Debug, Clone)]
pub struct DedupeSet<S> {
    seen: HashSet<S>,
}

impl<S: Eq + Hash> DedupeSet<S> {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    /// Register `signature`. Returns `true` on first sighting.
    pub fn observe(&mut self, signature: S) -> bool {
        self.seen.insert(signature)
    }

    pub fn contains(&self, signature: &S) -> bool {
        self.seen.contains(signature)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl<S: Eq + Hash> Default for DedupeSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Records split by content checksum. Records without a checksum land in
/// `unsigned` and are never flagged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub canonical: Vec<RemoteFileRecord>,
    pub duplicates: Vec<RemoteFileRecord>,
    pub unsigned: Vec<RemoteFileRecord>,
}

/// Partition with a fresh signature set. Input order decides which record of
/// a group is canonical.
pub fn find_duplicates(records: &[RemoteFileRecord]) -> Partition {
    let mut seen = DedupeSet::new();
    partition_by_checksum(records, &mut seen)
}

pub fn partition_by_checksum(
    records: &[RemoteFileRecord],
    seen: &mut DedupeSet<String>,
) -> Partition {
    let mut partition = Partition::default();
    for record in records {
        match record.signature() {
            None => partition.unsigned.push(record.clone()),
            Some(signature) => {
                if seen.observe(signature.to_string()) {
                    partition.canonical.push(record.clone());
                } else {
                    partition.duplicates.push(record.clone());
                }
            }
        }
    }
    partition
}
