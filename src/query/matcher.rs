use std::collections::{HashMap, HashSet};
use crate::document::{Document, StoredDocument};
use crate::engine::converter::{canonical, values_equal};

/// Equality search over a loaded collection.
///
/// For every field named in the query a hash index `value -> positions` is
/// built over the loaded documents; candidate positions are then intersected
/// across fields. Results come back in scan order.
pub struct HashmapSearch<'a> {
    entries: &'a [StoredDocument],
}

type FieldIndex = HashMap<String, Vec<usize>>;

impl<'a> HashmapSearch<'a> {
    pub fn new(entries: &'a [StoredDocument]) -> Self {
        Self { entries }
    }

    fn index_field(&self, field: &str) -> FieldIndex {
        let mut index: FieldIndex = HashMap::new();
        for (pos, entry) in self.entries.iter().enumerate() {
            if let Some(value) = entry.document.get(field) {
                index.entry(canonical(value)).or_default().push(pos);
            }
        }
        index
    }

    /// Positions of the documents matching every `field == value` pair.
    pub fn positions(&self, query: &Document) -> Vec<usize> {
        if query.is_empty() {
            return (0..self.entries.len()).collect();
        }

        let mut candidates: Option<Vec<usize>> = None;
        for (field, expected) in query {
            let index = self.index_field(field);
            let hits = index.get(&canonical(expected)).cloned().unwrap_or_default();

            candidates = Some(match candidates {
                None => hits,
                Some(current) => {
                    let hits: HashSet<usize> = hits.into_iter().collect();
                    current.into_iter().filter(|pos| hits.contains(pos)).collect()
                }
            });
            if candidates.as_ref().is_some_and(|c| c.is_empty()) {
                break;
            }
        }
        candidates.unwrap_or_default()
    }

    /// Matching documents, in scan order.
    pub fn find(&self, query: &Document) -> Vec<Document> {
        self.positions(query)
            .into_iter()
            .map(|pos| self.entries[pos].document.clone())
            .collect()
    }

    /// Matching documents paired with their backing file names, in scan order.
    pub fn find_with_identity(&self, query: &Document) -> Vec<StoredDocument> {
        self.positions(query)
            .into_iter()
            .map(|pos| self.entries[pos].clone())
            .collect()
    }
}

/// Whether `document` satisfies every equality predicate in `query`.
pub fn matches(document: &Document, query: &Document) -> bool {
    query.iter().all(|(field, expected)| {
        document
            .get(field)
            .is_some_and(|actual| values_equal(actual, expected))
    })
}
