use crate::tls::entry::{Entry, EntryHash};
use certcache_domain::Hostname;
use lru::LruCache;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::SystemTime;

/// Entries serving one name. Usually one, two while a certificate rotates.
type EntryList = SmallVec<[Arc<Entry>; 2]>;

/// Result of linking an entry into the index.
pub(crate) enum Linked {
    Inserted,
    /// A content-identical entry was already resident and is kept instead.
    Existing(Arc<Entry>),
}

/// Lookup structures of the cache, guarded as a whole by the cache mutex.
///
/// `entries` is both the hash map of live entries and the eviction queue
/// (least recently touched first). An entry is in `entries` iff it is in the
/// `names`/`suffixes` list of every key it carries.
pub(crate) struct Index {
    entries: LruCache<EntryHash, Arc<Entry>>,
    names: FxHashMap<String, EntryList>,
    suffixes: FxHashMap<String, EntryList>,
    size: usize,
}

impl Index {
    pub fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            names: FxHashMap::default(),
            suffixes: FxHashMap::default(),
            size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Exact match first, then the one-level wildcard for `name`.
    ///
    /// Entries found invalid during the scans are unlinked and pushed to
    /// `expired`. The returned entry is moved to the back of the queue.
    pub fn lookup(
        &mut self,
        name: &Hostname,
        now: SystemTime,
        expired: &mut Vec<Arc<Entry>>,
    ) -> Option<Arc<Entry>> {
        if let Some(found) = self.scan(ListKind::Names, name.as_str(), now, expired) {
            return Some(found);
        }
        let suffix = name.wildcard_suffix()?;
        self.scan(ListKind::Suffixes, suffix, now, expired)
    }

    fn scan(
        &mut self,
        kind: ListKind,
        key: &str,
        now: SystemTime,
        expired: &mut Vec<Arc<Entry>>,
    ) -> Option<Arc<Entry>> {
        let list = match kind {
            ListKind::Names => self.names.get(key),
            ListKind::Suffixes => self.suffixes.get(key),
        }?;

        let mut found = None;
        let mut stale = Vec::new();
        for entry in list {
            if entry.is_valid_at(now) {
                found = Some(Arc::clone(entry));
                break;
            }
            stale.push(entry.hash());
        }

        expired.extend(stale.iter().filter_map(|hash| self.unlink(hash)));

        if let Some(entry) = &found {
            self.touch(&entry.hash());
        }
        found
    }

    /// Move an entry to the most recently used end of the queue.
    pub fn touch(&mut self, hash: &EntryHash) {
        self.entries.promote(hash);
    }

    pub fn link(&mut self, entry: Arc<Entry>) -> Linked {
        // same hash means same leaf DER, so the names are already indexed
        if let Some(existing) = self.entries.peek(&entry.hash()) {
            return Linked::Existing(Arc::clone(existing));
        }

        for name in entry.names() {
            self.names
                .entry(name.clone())
                .or_default()
                .push(Arc::clone(&entry));
        }
        for suffix in entry.suffixes() {
            self.suffixes
                .entry(suffix.clone())
                .or_default()
                .push(Arc::clone(&entry));
        }

        self.size += entry.size();
        self.entries.put(entry.hash(), entry);
        Linked::Inserted
    }

    /// Remove an entry from every structure. No-op if it is not linked.
    pub fn unlink(&mut self, hash: &EntryHash) -> Option<Arc<Entry>> {
        let entry = self.entries.pop(hash)?;

        for name in entry.names() {
            remove_from(&mut self.names, name, hash);
        }
        for suffix in entry.suffixes() {
            remove_from(&mut self.suffixes, suffix, hash);
        }

        self.size -= entry.size();
        Some(entry)
    }

    /// Unlink every entry keyed under the exact name `name`.
    pub fn unlink_name(&mut self, name: &str) -> Vec<Arc<Entry>> {
        let hashes: Vec<EntryHash> = self
            .names
            .get(name)
            .map(|list| list.iter().map(|entry| entry.hash()).collect())
            .unwrap_or_default();

        hashes.iter().filter_map(|hash| self.unlink(hash)).collect()
    }

    /// Unlink every entry no longer valid at `now`, oldest touched first.
    pub fn pop_expired(&mut self, now: SystemTime) -> Vec<Arc<Entry>> {
        let expired: Vec<EntryHash> = self
            .entries
            .iter()
            .rev()
            .filter(|(_, entry)| !entry.is_valid_at(now))
            .map(|(hash, _)| *hash)
            .collect();

        expired.iter().filter_map(|hash| self.unlink(hash)).collect()
    }

    /// Unlink the least recently touched entry, unless it is `keep`.
    pub fn pop_lru(&mut self, keep: Option<&EntryHash>) -> Option<Arc<Entry>> {
        let (hash, _) = self.entries.peek_lru()?;
        if keep == Some(hash) {
            return None;
        }
        let hash = *hash;
        self.unlink(&hash)
    }

    /// Hashes from least to most recently touched.
    #[cfg(test)]
    pub fn eviction_order(&self) -> Vec<EntryHash> {
        self.entries.iter().rev().map(|(hash, _)| *hash).collect()
    }

    #[cfg(test)]
    pub fn assert_consistent(&self) {
        let mut size = 0;
        for (hash, entry) in self.entries.iter() {
            size += entry.size();
            for name in entry.names() {
                let list = self.names.get(name).expect("name list missing");
                assert_eq!(list.iter().filter(|e| e.hash() == *hash).count(), 1);
            }
            for suffix in entry.suffixes() {
                let list = self.suffixes.get(suffix).expect("suffix list missing");
                assert_eq!(list.iter().filter(|e| e.hash() == *hash).count(), 1);
            }
        }
        for list in self.names.values().chain(self.suffixes.values()) {
            assert!(!list.is_empty());
            for entry in list {
                assert!(self.entries.contains(&entry.hash()));
            }
        }
        assert_eq!(size, self.size);
    }
}

#[derive(Clone, Copy)]
enum ListKind {
    Names,
    Suffixes,
}

fn remove_from(map: &mut FxHashMap<String, EntryList>, key: &str, hash: &EntryHash) {
    if let Some(list) = map.get_mut(key) {
        list.retain(|entry| entry.hash() != *hash);
        if list.is_empty() {
            map.remove(key);
        }
    }
}
