//! Batch planning for identifier lookups.

use crate::models::{Field, Query, WorkUnit, PAGE_CAP};
use crate::utils::dedup_preserving_order;

/// One planned batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 0-based position
    pub index: usize,
    /// Number of batches in the job
    pub total: usize,
    pub identifiers: Vec<String>,
    /// `field:a OR field:b OR ...`
    pub query: Query,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.total
    }

    pub fn unit(&self) -> WorkUnit {
        WorkUnit::Batch {
            index: self.index,
            total: self.total,
            identifiers: self.identifiers.clone(),
        }
    }
}

/// An ordered, deduplicated identifier list split into fixed-size batches.
///
/// No identifier lands in two batches and batch order follows first-seen
/// input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    identifiers: Vec<String>,
    batch_size: usize,
    field: Field,
    duplicates_removed: usize,
}

impl BatchJob {
    /// Plan bibcode batches. Returns `None` when `batch_size` is outside `1..=PAGE_CAP`.
    pub fn new<I, S>(identifiers: I, batch_size: usize) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::for_field(Field::Bibcode, identifiers, batch_size)
    }

    /// Plan batches matching `field` instead of bibcode.
    ///
    /// Returns `None` unless `batch_size` is within `1..=PAGE_CAP`.
    pub fn for_field<I, S>(field: Field, identifiers: I, batch_size: usize) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !(1..=PAGE_CAP).contains(&batch_size) {
            return None;
        }

        let raw: Vec<String> = identifiers
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        let raw_len = raw.len();
        let identifiers = dedup_preserving_order(raw);

        Some(Self {
            duplicates_removed: raw_len - identifiers.len(),
            identifiers,
            batch_size,
            field,
        })
    }

    /// Unique identifiers, first-seen order
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn duplicates_removed(&self) -> usize {
        self.duplicates_removed
    }

    /// `ceil(identifiers / batch_size)`
    pub fn batch_count(&self) -> usize {
        self.identifiers.len().div_ceil(self.batch_size)
    }

    /// Build every batch with its query
    pub fn batches(&self) -> Vec<Batch> {
        let total = self.batch_count();
        self.identifiers
            .chunks(self.batch_size)
            .enumerate()
            .filter_map(|(index, chunk)| {
                Query::field_any(self.field.clone(), chunk).map(|query| Batch {
                    index,
                    total,
                    identifiers: chunk.to_vec(),
                    query,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("ID{:03}", i)).collect()
    }

    #[test]
    fn test_batch_count_and_sizes() {
        for (n, size) in [(1, 1), (10, 3), (100, 50), (101, 50), (7, 10)] {
            let job = BatchJob::new(ids(n), size).unwrap();
            let batches = job.batches();

            assert_eq!(batches.len(), n.div_ceil(size), "n={} size={}", n, size);
            assert!(batches.iter().all(|b| b.len() <= size && !b.is_empty()));

            let flattened: Vec<String> = batches.iter().flat_map(|b| b.identifiers.clone()).collect();
            assert_eq!(flattened, ids(n));
        }
    }

    #[test]
    fn test_duplicates_removed_first_seen_order() {
        let job = BatchJob::new(["c", "a", "c", " b ", "a", ""], 2).unwrap();

        assert_eq!(job.identifiers(), &["c", "a", "b"]);
        assert_eq!(job.duplicates_removed(), 2);

        let batches = job.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].query.as_str(), "bibcode:c OR bibcode:a");
        assert_eq!(batches[1].query.as_str(), "bibcode:b");
        assert_eq!(batches[1].total, 2);
        assert!(batches[1].is_last());
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        let job = BatchJob::new(Vec::<String>::new(), 50).unwrap();
        assert_eq!(job.batch_count(), 0);
        assert!(job.batches().is_empty());
    }

    #[test]
    fn test_batch_size_outside_page_cap_is_rejected() {
        assert!(BatchJob::new(["a"], 0).is_none());
        assert!(BatchJob::new(ids(2500), PAGE_CAP + 1).is_none());

        let job = BatchJob::new(ids(2500), PAGE_CAP).unwrap();
        let sizes: Vec<usize> = job.batches().iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![2000, 500]);
    }

    #[test]
    fn test_custom_field() {
        let job = BatchJob::for_field(Field::Other("doi".into()), ["10.1/x"], 5).unwrap();
        assert_eq!(job.batches()[0].query.as_str(), "doi:10.1/x");
    }
}
