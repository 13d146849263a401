use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::capabilities::Document;
use crate::model::City;

/// A mirrored record and the document key it lives under. The key is what
/// writes address; `city.name` is only what the document says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityEntry {
    pub key: String,
    pub city: City,
}

impl CityEntry {
    #[must_use]
    pub fn from_document(doc: &Document) -> Self {
        Self {
            key: doc.key.clone(),
            city: City::from_document(doc),
        }
    }
}

/// The local mirror of the remote collection, in snapshot order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CityList {
    entries: Vec<CityEntry>,
    revision: u64,
}

impl CityList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> &[CityEntry] {
        &self.entries
    }

    pub fn cities(&self) -> impl Iterator<Item = &City> {
        self.entries.iter().map(|e| &e.city)
    }

    /// Bumped on every applied snapshot, including empty ones.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks a record up by document key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&City> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.city)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Clears the list and refills it from `docs`. The returned diff is
    /// informational; the list is always rebuilt in full.
    #[instrument(skip(self, docs), fields(docs = docs.len(), revision = self.revision))]
    pub fn apply_snapshot(&mut self, docs: &[Document]) -> SnapshotDiff {
        let incoming: Vec<CityEntry> = docs.iter().map(CityEntry::from_document).collect();
        let changes = diff(&self.entries, &incoming);

        self.entries.clear();
        self.entries.extend(incoming);
        self.revision = self.revision.wrapping_add(1);

        debug!(
            added = changes.added.len(),
            removed = changes.removed.len(),
            changed = changes.changed.len(),
            "snapshot applied"
        );
        changes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl SnapshotDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Keyed diff by document key. Keys come back sorted.
#[must_use]
pub fn diff(old: &[CityEntry], new: &[CityEntry]) -> SnapshotDiff {
    let before: BTreeMap<&str, &City> = old.iter().map(|e| (e.key.as_str(), &e.city)).collect();
    let after: BTreeMap<&str, &City> = new.iter().map(|e| (e.key.as_str(), &e.city)).collect();

    let mut changes = SnapshotDiff::default();
    for (key, city) in &after {
        match before.get(key) {
            None => changes.added.push((*key).to_string()),
            Some(prev) if prev != city => changes.changed.push((*key).to_string()),
            Some(_) => {}
        }
    }
    changes.removed = before
        .keys()
        .filter(|key| !after.contains_key(*key))
        .map(|key| (*key).to_string())
        .collect();
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc(name: &str, province: &str) -> Document {
        let city = City::new(name, province);
        Document::new(name, city.to_fields())
    }

    fn entry(name: &str, province: &str) -> CityEntry {
        CityEntry {
            key: name.to_string(),
            city: City::new(name, province),
        }
    }

    #[test]
    fn empty_snapshot_clears_and_bumps_revision() {
        let mut list = CityList::new();
        list.apply_snapshot(&[doc("Kelowna", "BC")]);
        assert_eq!(list.len(), 1);

        let changes = list.apply_snapshot(&[]);
        assert!(list.is_empty());
        assert_eq!(list.revision(), 2);
        assert_eq!(changes.removed, vec!["Kelowna".to_string()]);
    }

    #[test]
    fn unchanged_snapshot_still_bumps_revision() {
        let mut list = CityList::new();
        list.apply_snapshot(&[doc("Kelowna", "BC")]);
        let changes = list.apply_snapshot(&[doc("Kelowna", "BC")]);
        assert!(changes.is_empty());
        assert_eq!(list.revision(), 2);
    }

    #[test]
    fn keeps_snapshot_order() {
        let mut list = CityList::new();
        list.apply_snapshot(&[doc("Victoria", "BC"), doc("Calgary", "AB"), doc("Banff", "AB")]);
        let names: Vec<&str> = list.cities().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Victoria", "Calgary", "Banff"]);
    }

    #[test]
    fn diff_reports_each_kind() {
        let old = vec![entry("A", "x"), entry("B", "y")];
        let new = vec![entry("B", "z"), entry("C", "w")];
        let changes = diff(&old, &new);
        assert_eq!(changes.added, vec!["C".to_string()]);
        assert_eq!(changes.removed, vec!["A".to_string()]);
        assert_eq!(changes.changed, vec!["B".to_string()]);
    }

    #[test]
    fn malformed_documents_are_mirrored_with_defaults() {
        let mut list = CityList::new();
        list.apply_snapshot(&[Document::new("broken", serde_json::Map::new())]);
        assert_eq!(list.cities().collect::<Vec<_>>(), [&City::default()]);
        assert!(list.contains("broken"));
        assert!(!list.contains(""));
    }

    #[test]
    fn lookup_uses_document_key_not_name_field() {
        let mut list = CityList::new();
        let stray = Document::new("Kelowna", City::new("Penticton", "BC").to_fields());
        list.apply_snapshot(&[stray]);
        assert_eq!(list.get("Kelowna").map(|c| c.name.as_str()), Some("Penticton"));
        assert!(list.get("Penticton").is_none());
    }

    fn arb_city() -> impl Strategy<Value = City> {
        ("[A-Z][a-z]{0,8}", "[A-Z]{2}").prop_map(|(name, province)| City::new(name, province))
    }

    proptest! {
        #[test]
        fn list_matches_latest_snapshot(
            snapshots in proptest::collection::vec(proptest::collection::vec(arb_city(), 0..8), 1..6)
        ) {
            let mut list = CityList::new();
            for snapshot in &snapshots {
                let docs: Vec<Document> = snapshot
                    .iter()
                    .map(|c| Document::new(c.name.clone(), c.to_fields()))
                    .collect();
                list.apply_snapshot(&docs);
            }
            let last = snapshots.last().unwrap();
            let mirrored: Vec<City> = list.cities().cloned().collect();
            prop_assert_eq!(&mirrored, last);
            prop_assert_eq!(list.revision(), snapshots.len() as u64);
        }

        #[test]
        fn diff_of_identical_lists_is_empty(cities in proptest::collection::vec(arb_city(), 0..8)) {
            let entries: Vec<CityEntry> = cities
                .iter()
                .map(|c| CityEntry { key: c.name.clone(), city: c.clone() })
                .collect();
            prop_assert!(diff(&entries, &entries).is_empty());
        }
    }
}
