use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::PartitionKey;

/// Aggregate skew metrics for per-partition row counts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionSkew {
    /// Rows across all partitions.
    pub total: usize,
    /// Number of partitions.
    pub partitions: usize,
    /// Smallest partition size.
    pub min: usize,
    /// Largest partition size.
    pub max: usize,
    /// Average partition size.
    pub mean: f64,
    /// Share of all rows held by the largest partition.
    pub max_share: f64,
    /// Largest over smallest partition size.
    pub ratio: f64,
    /// Largest partition first; ties by key.
    pub per_partition: Vec<PartitionShare>,
}

/// One partition's share of all mapped rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionShare {
    /// Partition key.
    pub key: PartitionKey,
    /// Rows in the partition.
    pub count: usize,
    /// Fraction of all rows, between 0 and 1.
    pub share: f64,
}

/// Compute skew metrics from per-partition row counts.
///
/// A single dominant partition (often `admin` when many customers lack a
/// representative) shows up as a high `max_share`.
pub fn partition_skew(counts: &IndexMap<PartitionKey, usize>) -> Option<PartitionSkew> {
    let min = *counts.values().min()?;
    let max = *counts.values().max()?;
    let total: usize = counts.values().sum();
    let partitions = counts.len();
    let share_of = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    };
    let ratio = if min == 0 {
        f64::INFINITY
    } else {
        max as f64 / min as f64
    };
    let mut per_partition: Vec<PartitionShare> = counts
        .iter()
        .map(|(key, count)| PartitionShare {
            key: key.clone(),
            count: *count,
            share: share_of(*count),
        })
        .collect();
    per_partition.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    Some(PartitionSkew {
        total,
        partitions,
        min,
        max,
        mean: total as f64 / partitions as f64,
        max_share: share_of(max),
        ratio,
        per_partition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_skew_reports_imbalance() {
        let mut counts = IndexMap::new();
        counts.insert("admin".to_string(), 6);
        counts.insert("rep1".to_string(), 2);
        counts.insert("rep2".to_string(), 2);
        let skew = partition_skew(&counts).expect("skew");
        assert_eq!(skew.total, 10);
        assert_eq!(skew.partitions, 3);
        assert_eq!(skew.min, 2);
        assert_eq!(skew.max, 6);
        assert!((skew.max_share - 0.6).abs() < 1e-9);
        assert!((skew.ratio - 3.0).abs() < 1e-9);
        assert_eq!(skew.per_partition[0].key, "admin");
        assert_eq!(skew.per_partition[1].key, "rep1");
    }

    #[test]
    fn empty_counts_have_no_skew() {
        assert!(partition_skew(&IndexMap::new()).is_none());
    }
}
