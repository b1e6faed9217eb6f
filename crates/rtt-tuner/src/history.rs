//! Append-only evaluation history and its per-instance cohort registry.

use std::collections::BTreeMap;

use rtt_types::InstanceId;

/// Every completed evaluation of the run, in submission order.
///
/// Rows are never pruned; the surrogate is refit on the full table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    rows: Vec<Vec<f64>>,
    values: Vec<f64>,
    cohorts: BTreeMap<InstanceId, Vec<usize>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one evaluation and register its row with the instance cohort.
    /// Returns the new row index.
    pub fn push(&mut self, instance_id: InstanceId, encoded: Vec<f64>, value: f64) -> usize {
        let row = self.rows.len();
        self.rows.push(encoded);
        self.values.push(value);
        self.cohorts.entry(instance_id).or_default().push(row);
        row
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Encoded configurations.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Raw objective values, aligned with [`History::rows`].
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Row indices contributed by one instance.
    pub fn cohort(&self, instance_id: InstanceId) -> &[usize] {
        self.cohorts
            .get(&instance_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn cohorts(&self) -> impl Iterator<Item = (InstanceId, &[usize])> {
        self.cohorts.iter().map(|(id, rows)| (*id, rows.as_slice()))
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.values.clear();
        self.cohorts.clear();
    }
}
