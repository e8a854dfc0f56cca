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

use std::fmt;
use std::sync::Arc;

use crate::common::random::entropy_seed;
use crate::countmin::CountMinSketch;
use crate::countmin::validate::NonEmpty;
use crate::countmin::validate::TermValidator;
use crate::error::Error;

pub(super) const DEFAULT_DEPTH: usize = 5;
pub(super) const DEFAULT_WIDTH: usize = 2048;

/// Builder for creating Count-Min sketches.
///
/// # Examples
///
/// ```
/// use concurrent_sketches::countmin::CountMinSketch;
///
/// let sketch = CountMinSketch::builder()
///     .depth(4)
///     .width(1 << 16)
///     .seed(42)
///     .build()
///     .unwrap();
///
/// assert_eq!(sketch.depth(), 4);
/// assert_eq!(sketch.width(), 1 << 16);
/// assert_eq!(sketch.seed(), 42);
/// ```
#[derive(Clone)]
pub struct CountMinSketchBuilder {
    depth: usize,
    width: usize,
    seed: Option<u64>,
    accuracy: Option<(f64, f64)>,
    validator: Option<Arc<dyn TermValidator>>,
}

impl Default for CountMinSketchBuilder {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            width: DEFAULT_WIDTH,
            seed: None,
            accuracy: None,
            validator: None,
        }
    }
}

impl fmt::Debug for CountMinSketchBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountMinSketchBuilder")
            .field("depth", &self.depth)
            .field("width", &self.width)
            .field("seed", &self.seed)
            .field("accuracy", &self.accuracy)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl CountMinSketchBuilder {
    /// Sets the number of rows (independent hash functions).
    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Sets the number of buckets per row.
    pub fn width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Sets the seed the row hash functions are derived from.
    ///
    /// Without a seed, one is drawn when the sketch is built. Sketches built
    /// with the same seed map every term to the same buckets.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sizes the sketch from an error target instead of explicit dimensions.
    ///
    /// With probability `confidence`, estimates exceed the true count by at most
    /// `relative_error` times the total recorded weight. Overrides
    /// [`depth`](Self::depth) and [`width`](Self::width); the values are
    /// validated by [`build`](Self::build).
    ///
    /// # Examples
    ///
    /// ```
    /// use concurrent_sketches::countmin::CountMinSketch;
    ///
    /// let sketch = CountMinSketch::builder().accuracy(0.01, 0.99).build().unwrap();
    /// assert_eq!(sketch.width(), CountMinSketch::suggest_width(0.01));
    /// assert_eq!(sketch.depth(), CountMinSketch::suggest_depth(0.99));
    /// ```
    pub fn accuracy(mut self, relative_error: f64, confidence: f64) -> Self {
        self.accuracy = Some((relative_error, confidence));
        self
    }

    /// Installs the validator consulted by `try_record` and `try_count`.
    pub fn term_validator<V>(mut self, validator: V) -> Self
    where
        V: TermValidator + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Makes `try_record` and `try_count` reject the empty term.
    pub fn reject_empty_terms(self) -> Self {
        self.term_validator(NonEmpty)
    }

    /// Builds the sketch.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidConfiguration`](crate::error::ErrorKind::InvalidConfiguration)
    /// if depth or width is zero, if the matrix cannot be addressed, or if the
    /// accuracy parameters are outside `(0, 1)`.
    pub fn build(self) -> Result<CountMinSketch, Error> {
        let (depth, width) = match self.accuracy {
            Some((relative_error, confidence)) => {
                if !(relative_error > 0.0 && relative_error < 1.0) {
                    return Err(Error::invalid_config("relative error must be in (0, 1)")
                        .with_context("relative_error", relative_error));
                }
                if !(confidence > 0.0 && confidence < 1.0) {
                    return Err(Error::invalid_config("confidence must be in (0, 1)")
                        .with_context("confidence", confidence));
                }
                (
                    CountMinSketch::suggest_depth(confidence),
                    CountMinSketch::suggest_width(relative_error),
                )
            }
            None => (self.depth, self.width),
        };
        let seed = self.seed.unwrap_or_else(entropy_seed);
        CountMinSketch::from_parts(depth, width, seed, self.validator)
    }
}
