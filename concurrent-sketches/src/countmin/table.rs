// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The `depth x width` counter matrix.

use crate::error::Error;

/// One row of counters, indexed by bucket.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct Row(Box<[u64]>);

impl Row {
    fn new(width: usize) -> Self {
        Self(vec![0; width].into_boxed_slice())
    }

    fn get(&self, bucket: usize) -> u64 {
        self.0[bucket]
    }

    fn add(&mut self, bucket: usize, weight: u64) {
        let counter = &mut self.0[bucket];
        *counter = counter.saturating_add(weight);
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nonzero = self.0.iter().filter(|c| **c != 0).count();
        f.debug_struct("Row")
            .field("width", &self.0.len())
            .field("nonzero", &nonzero)
            .finish()
    }
}

/// Counter matrix plus the running total of applied weight.
///
/// Counters only ever grow. Callers serialize access through the sketch's
/// table lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Table {
    rows: Vec<Row>,
    total_weight: u64,
}

impl Table {
    /// Allocates a zeroed `depth x width` matrix.
    pub(crate) fn try_new(depth: usize, width: usize) -> Result<Self, Error> {
        if depth == 0 {
            return Err(
                Error::invalid_config("depth must be at least 1").with_context("depth", depth)
            );
        }
        if width == 0 {
            return Err(
                Error::invalid_config("width must be at least 1").with_context("width", width)
            );
        }
        let bytes = depth
            .checked_mul(width)
            .and_then(|cells| cells.checked_mul(size_of::<u64>()));
        if !bytes.is_some_and(|b| b <= isize::MAX as usize) {
            return Err(Error::invalid_config("counter matrix does not fit in memory")
                .with_context("depth", depth)
                .with_context("width", width));
        }

        Ok(Self {
            rows: (0..depth).map(|_| Row::new(width)).collect(),
            total_weight: 0,
        })
    }

    pub(crate) fn depth(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Adds `weight` to a single cell.
    pub(crate) fn increment(&mut self, row: usize, bucket: usize, weight: u64) {
        self.rows[row].add(bucket, weight);
    }

    /// Current value of a single cell.
    pub(crate) fn read(&self, row: usize, bucket: usize) -> u64 {
        self.rows[row].get(bucket)
    }

    /// Applies one observation: `buckets[i]` is the term's bucket in row `i`.
    pub(crate) fn apply(&mut self, buckets: &[usize], weight: u64) {
        debug_assert_eq!(buckets.len(), self.depth());
        for (row, &bucket) in buckets.iter().enumerate() {
            self.increment(row, bucket, weight);
        }
        self.total_weight = self.total_weight.saturating_add(weight);
    }

    /// Minimum over rows of the cells named by `buckets`.
    pub(crate) fn min_count(&self, buckets: &[usize]) -> u64 {
        debug_assert_eq!(buckets.len(), self.depth());
        buckets
            .iter()
            .enumerate()
            .map(|(row, &bucket)| self.read(row, bucket))
            .min()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_new_table_is_zeroed() {
        let table = Table::try_new(3, 8).unwrap();
        assert_eq!(table.depth(), 3);
        assert_eq!(table.total_weight(), 0);
        for row in 0..3 {
            for bucket in 0..8 {
                assert_eq!(table.read(row, bucket), 0);
            }
        }
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        let err = Table::try_new(0, 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(err.context("depth"), Some("0"));

        let err = Table::try_new(5, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(err.context("width"), Some("0"));
    }

    #[test]
    fn test_rejects_oversized_matrix() {
        let err = Table::try_new(2, usize::MAX / 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn test_apply_and_min_count() {
        let mut table = Table::try_new(2, 4).unwrap();
        table.apply(&[1, 3], 2);
        table.apply(&[1, 0], 5);

        assert_eq!(table.read(0, 1), 7);
        assert_eq!(table.read(1, 3), 2);
        assert_eq!(table.read(1, 0), 5);
        assert_eq!(table.total_weight(), 7);

        // row 0 is polluted by the collision, row 1 is not
        assert_eq!(table.min_count(&[1, 3]), 2);
        assert_eq!(table.min_count(&[1, 0]), 5);
        assert_eq!(table.min_count(&[2, 2]), 0);
    }

    #[test]
    fn test_counters_saturate() {
        let mut table = Table::try_new(1, 1).unwrap();
        table.apply(&[0], u64::MAX);
        table.apply(&[0], 1);
        assert_eq!(table.read(0, 0), u64::MAX);
        assert_eq!(table.total_weight(), u64::MAX);
    }
}
