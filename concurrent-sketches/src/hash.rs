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

//! Seeded row hashing.
//!
//! Every row of a sketch hashes terms with MurmurHash3 x64/128 under its own
//! 32-bit seed. Row seeds are derived from the sketch seed, so two sketches
//! built with the same seed place every term in the same buckets.

use std::collections::HashSet;

use crate::common::random::RandomSource;
use crate::common::random::XorShift64;

/// Hash function of a single sketch row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RowHasher {
    seed: u32,
}

impl RowHasher {
    pub(crate) fn new(seed: u32) -> Self {
        Self { seed }
    }

    /// Returns the 64-bit hash of `bytes` under this row's seed.
    pub(crate) fn hash(&self, bytes: &[u8]) -> u64 {
        let (h1, _) = mur3::murmurhash3_x64_128(bytes, self.seed);
        h1
    }

    /// Reduces the hash of `bytes` into `[0, width)`.
    pub(crate) fn bucket(&self, bytes: &[u8], width: usize) -> usize {
        debug_assert!(width > 0, "width must be positive");
        (self.hash(bytes) % width as u64) as usize
    }
}

/// Derives `depth` pairwise distinct row hashers from the sketch seed.
pub(crate) fn derive_row_hashers(seed: u64, depth: usize) -> Vec<RowHasher> {
    let mut rng = XorShift64::seeded(seed);
    let mut drawn = HashSet::with_capacity(depth);
    let mut hashers = Vec::with_capacity(depth);
    while hashers.len() < depth {
        let candidate = rng.next_u32();
        // equal seeds would make two rows collide on exactly the same terms
        if drawn.insert(candidate) {
            hashers.push(RowHasher::new(candidate));
        }
    }
    hashers
}
