//! Pure diff between a listing and the tracked state.

use std::collections::{HashMap, HashSet};

use crate::resource::Resource;

/// Operations needed to turn the tracked state into the listing.
///
/// The three buckets are disjoint by name.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffResult<T> {
    pub created: Vec<T>,
    pub updated: Vec<T>,
    pub deleted: Vec<T>,
}

impl<T> DiffResult<T> {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

impl<T> Default for DiffResult<T> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

/// Compare `remote` (the authoritative listing) against `local` (what is
/// tracked).
///
/// Returns `None` when both sides are empty. Updated entries carry the
/// remote copy, deleted entries the local one. If the listing names a
/// resource twice, the later entry wins.
pub fn diff<T: Resource>(remote: &[T], local: &[T]) -> Option<DiffResult<T>> {
    if remote.is_empty() && local.is_empty() {
        return None;
    }

    let tracked: HashMap<&str, &T> = local.iter().map(|r| (r.name(), r)).collect();

    let mut last_index: HashMap<&str, usize> = HashMap::with_capacity(remote.len());
    for (i, r) in remote.iter().enumerate() {
        last_index.insert(r.name(), i);
    }

    let mut result = DiffResult::default();
    for (i, r) in remote.iter().enumerate() {
        if last_index.get(r.name()) != Some(&i) {
            continue;
        }
        match tracked.get(r.name()) {
            None => result.created.push(r.clone()),
            Some(existing) if *existing != r => result.updated.push(r.clone()),
            Some(_) => {}
        }
    }

    let mut seen = HashSet::with_capacity(local.len());
    for l in local {
        if !seen.insert(l.name()) {
            continue;
        }
        if !last_index.contains_key(l.name()) {
            result.deleted.push(l.clone());
        }
    }

    Some(result)
}
