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

use std::f64::consts::E;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::countmin::CountMinSketchBuilder;
use crate::countmin::inflight::InFlight;
use crate::countmin::table::Table;
use crate::countmin::validate;
use crate::countmin::validate::TermValidator;
use crate::error::Error;
use crate::hash::RowHasher;
use crate::hash::derive_row_hashers;

const RECORD_THREAD_NAME: &str = "countmin-record";
// the worker only locks the table and adds to `depth` counters
const RECORD_THREAD_STACK_SIZE: usize = 64 * 1024;

type RecordingJob = Box<dyn FnOnce() + Send + 'static>;

fn spawn_recording_thread(job: RecordingJob) -> io::Result<()> {
    thread::Builder::new()
        .name(RECORD_THREAD_NAME.to_string())
        .stack_size(RECORD_THREAD_STACK_SIZE)
        .spawn(job)
        .map(drop)
}

/// State reachable from recording threads.
#[derive(Debug)]
struct Shared {
    hashers: Vec<RowHasher>,
    width: usize,
    table: Mutex<Table>,
    in_flight: Arc<InFlight>,
}

impl Shared {
    fn buckets(&self, term: &[u8]) -> Vec<usize> {
        self.hashers
            .iter()
            .map(|hasher| hasher.bucket(term, self.width))
            .collect()
    }

    /// Runs `f` on the table once every recording dispatched so far is applied.
    fn settled<R>(&self, f: impl FnOnce(&Table) -> R) -> R {
        let pending = self.in_flight.wait_idle();
        if pending > 0 {
            debug!(pending, "waited for in-flight recordings");
        }
        f(&*self.table.lock())
    }
}

/// Count-Min sketch whose recordings are applied on background threads.
///
/// [`record`](Self::record) hands each observation to its own thread and
/// returns at once. [`count`](Self::count) first waits until every recording
/// dispatched before it has been applied, then reads the table, so an
/// estimate never misses an observation made earlier by any thread.
///
/// Estimates never undercount. They overcount only when the term shares a
/// bucket with other terms in every row.
///
/// # Examples
///
/// ```
/// use concurrent_sketches::countmin::CountMinSketch;
///
/// let sketch = CountMinSketch::new(5, 1_000_000).unwrap();
/// sketch.record("test");
/// for _ in 0..6 {
///     sketch.record("test333");
/// }
///
/// assert!(sketch.count("test333") >= 6);
/// assert!(sketch.count("test") >= 1);
/// ```
pub struct CountMinSketch {
    shared: Arc<Shared>,
    seed: u64,
    validator: Option<Arc<dyn TermValidator>>,
}

impl CountMinSketch {
    /// Creates a sketch with `depth` rows of `width` buckets and a random seed.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidConfiguration`](crate::error::ErrorKind::InvalidConfiguration)
    /// if `depth` or `width` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use concurrent_sketches::countmin::CountMinSketch;
    /// use concurrent_sketches::error::ErrorKind;
    ///
    /// let err = CountMinSketch::new(0, 100).unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    /// ```
    pub fn new(depth: usize, width: usize) -> Result<Self, Error> {
        Self::builder().depth(depth).width(width).build()
    }

    /// Returns a builder for creating a sketch.
    pub fn builder() -> CountMinSketchBuilder {
        CountMinSketchBuilder::default()
    }

    pub(super) fn from_parts(
        depth: usize,
        width: usize,
        seed: u64,
        validator: Option<Arc<dyn TermValidator>>,
    ) -> Result<Self, Error> {
        let table = Table::try_new(depth, width)?;
        let hashers = derive_row_hashers(seed, depth);
        debug!(depth, width, seed, "created count-min sketch");

        Ok(Self {
            shared: Arc::new(Shared {
                hashers,
                width,
                table: Mutex::new(table),
                in_flight: Arc::new(InFlight::default()),
            }),
            seed,
            validator,
        })
    }

    /// Suggests the width that keeps the overcount within `relative_error`
    /// times the total recorded weight.
    ///
    /// # Panics
    ///
    /// Panics if `relative_error` is not in `(0, 1)`.
    pub fn suggest_width(relative_error: f64) -> usize {
        assert!(
            relative_error > 0.0 && relative_error < 1.0,
            "relative error must be in (0, 1), got {relative_error}"
        );
        (E / relative_error).ceil() as usize
    }

    /// Suggests the depth that makes the error bound hold with probability
    /// `confidence`.
    ///
    /// # Panics
    ///
    /// Panics if `confidence` is not in `(0, 1)`.
    pub fn suggest_depth(confidence: f64) -> usize {
        assert!(
            confidence > 0.0 && confidence < 1.0,
            "confidence must be in (0, 1), got {confidence}"
        );
        ((1.0 / (1.0 - confidence)).ln().ceil() as usize).max(1)
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Records one observation of `term`.
    ///
    /// Returns without waiting for the counters to be updated.
    pub fn record<T: AsRef<[u8]>>(&self, term: T) {
        self.record_with_weight(term, 1);
    }

    /// Records `weight` observations of `term` at once.
    ///
    /// A zero weight records nothing.
    pub fn record_with_weight<T: AsRef<[u8]>>(&self, term: T, weight: u64) {
        if weight == 0 {
            return;
        }
        self.dispatch(term.as_ref(), weight, spawn_recording_thread);
    }

    /// Registers one recording and hands its increments to `spawn`.
    ///
    /// If `spawn` fails, the increments are applied on the calling thread.
    fn dispatch<S>(&self, term: &[u8], weight: u64, spawn: S)
    where
        S: FnOnce(RecordingJob) -> io::Result<()>,
    {
        let buckets = self.shared.buckets(term);

        // `held` covers the window in which a failed spawn has already
        // dropped the worker's ticket but the inline update has not run.
        let held = self.shared.in_flight.register();
        let ticket = self.shared.in_flight.register();
        let shared = Arc::clone(&self.shared);
        trace!(len = term.len(), weight, "dispatching recording");

        let spawned = spawn(Box::new(move || {
            shared.table.lock().apply(&buckets, weight);
            drop(ticket);
        }));
        if let Err(err) = spawned {
            warn!(error = %err, "cannot spawn recording thread; applying inline");
            let buckets = self.shared.buckets(term);
            self.shared.table.lock().apply(&buckets, weight);
        }
        drop(held);
    }

    /// Validates `term` with the configured validator, then records it.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidTerm`](crate::error::ErrorKind::InvalidTerm)
    /// if the validator rejects the term; nothing is recorded in that case.
    pub fn try_record<T: AsRef<[u8]>>(&self, term: T) -> Result<(), Error> {
        validate::check(self.validator.as_deref(), term.as_ref())?;
        self.record(term);
        Ok(())
    }

    // ========================================================================
    // Estimation
    // ========================================================================

    /// Returns the estimated number of observations of `term`.
    ///
    /// Blocks until every recording dispatched before this call has been
    /// applied. Recordings dispatched while waiting may or may not be
    /// included. The result is never below the true count.
    pub fn count<T: AsRef<[u8]>>(&self, term: T) -> u64 {
        let buckets = self.shared.buckets(term.as_ref());
        let estimate = self.shared.settled(|table| table.min_count(&buckets));
        trace!(estimate, "estimated count");
        estimate
    }

    /// Validates `term` with the configured validator, then estimates it.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidTerm`](crate::error::ErrorKind::InvalidTerm)
    /// if the validator rejects the term.
    pub fn try_count<T: AsRef<[u8]>>(&self, term: T) -> Result<u64, Error> {
        validate::check(self.validator.as_deref(), term.as_ref())?;
        Ok(self.count(term))
    }

    /// Returns a lower bound on the true count of `term`.
    ///
    /// The true count lies in `[lower_bound(term), count(term)]` with
    /// probability [`confidence`](Self::confidence).
    ///
    /// # Examples
    ///
    /// ```
    /// use concurrent_sketches::countmin::CountMinSketch;
    ///
    /// let sketch = CountMinSketch::new(3, 16).unwrap();
    /// for i in 0..100 {
    ///     sketch.record(format!("key-{i}"));
    /// }
    /// assert!(sketch.lower_bound("key-7") <= sketch.count("key-7"));
    /// ```
    pub fn lower_bound<T: AsRef<[u8]>>(&self, term: T) -> u64 {
        let buckets = self.shared.buckets(term.as_ref());
        let relative_error = self.relative_error();
        self.shared.settled(|table| {
            let slack = (relative_error * table.total_weight() as f64) as u64;
            table.min_count(&buckets).saturating_sub(slack)
        })
    }

    /// Returns the total weight recorded so far.
    ///
    /// Waits for in-flight recordings like [`count`](Self::count).
    pub fn total_weight(&self) -> u64 {
        self.shared.settled(|table| table.total_weight())
    }

    /// Returns whether nothing has been recorded.
    ///
    /// Waits for in-flight recordings like [`count`](Self::count).
    pub fn is_empty(&self) -> bool {
        self.total_weight() == 0
    }

    // ========================================================================
    // Synchronization
    // ========================================================================

    /// Blocks until every recording dispatched so far has been applied.
    pub fn wait_idle(&self) {
        self.shared.in_flight.wait_idle();
    }

    /// Returns the number of dispatched recordings not yet applied.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.pending()
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Returns the number of rows.
    pub fn depth(&self) -> usize {
        self.shared.hashers.len()
    }

    /// Returns the number of buckets per row.
    pub fn width(&self) -> usize {
        self.shared.width
    }

    /// Returns the seed the row hash functions were derived from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the relative error `e / width` of the estimates.
    pub fn relative_error(&self) -> f64 {
        E / self.width() as f64
    }

    /// Returns the probability `1 - e^-depth` that the error bound holds.
    pub fn confidence(&self) -> f64 {
        1.0 - (-(self.depth() as f64)).exp()
    }

    /// Returns the bucket `term` maps to in `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= depth()`.
    pub fn bucket_for<T: AsRef<[u8]>>(&self, row: usize, term: T) -> usize {
        let depth = self.depth();
        assert!(row < depth, "row index {row} out of range for depth {depth}");
        self.shared.hashers[row].bucket(term.as_ref(), self.shared.width)
    }
}

impl fmt::Debug for CountMinSketch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountMinSketch")
            .field("depth", &self.depth())
            .field("width", &self.width())
            .field("seed", &self.seed)
            .field("in_flight", &self.in_flight())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(depth: usize, width: usize) -> CountMinSketch {
        CountMinSketch::builder()
            .depth(depth)
            .width(width)
            .seed(9001)
            .build()
            .unwrap()
    }

    #[test]
    fn test_suggest_width() {
        assert_eq!(CountMinSketch::suggest_width(0.01), 272);
        assert_eq!(CountMinSketch::suggest_width(0.5), 6);
    }

    #[test]
    fn test_suggest_depth() {
        assert_eq!(CountMinSketch::suggest_depth(0.99), 5);
        assert_eq!(CountMinSketch::suggest_depth(0.5), 1);
        assert_eq!(CountMinSketch::suggest_depth(0.01), 1);
    }

    #[test]
    #[should_panic(expected = "relative error must be in (0, 1)")]
    fn test_suggest_width_rejects_zero() {
        CountMinSketch::suggest_width(0.0);
    }

    #[test]
    #[should_panic(expected = "confidence must be in (0, 1)")]
    fn test_suggest_depth_rejects_one() {
        CountMinSketch::suggest_depth(1.0);
    }

    #[test]
    fn test_zero_weight_dispatches_nothing() {
        let sketch = seeded(3, 64);
        sketch.record_with_weight("idle", 0);
        assert_eq!(sketch.in_flight(), 0);
        assert!(sketch.is_empty());
    }

    #[test]
    fn test_buckets_match_bucket_for() {
        let sketch = seeded(4, 1024);
        let buckets = sketch.shared.buckets(b"test333");
        for (row, bucket) in buckets.into_iter().enumerate() {
            assert_eq!(sketch.bucket_for(row, "test333"), bucket);
        }
    }

    #[test]
    #[should_panic(expected = "row index 4 out of range for depth 4")]
    fn test_bucket_for_out_of_range() {
        seeded(4, 16).bucket_for(4, "x");
    }

    #[test]
    fn test_single_bucket_counts_everything() {
        let sketch = seeded(2, 1);
        sketch.record("a");
        sketch.record_with_weight("b", 4);
        assert_eq!(sketch.count("a"), 5);
        assert_eq!(sketch.count("never"), 5);
        assert_eq!(sketch.total_weight(), 5);
    }

    #[test]
    fn test_error_bounds() {
        let sketch = seeded(5, 272);
        assert!((sketch.relative_error() - E / 272.0).abs() < 1e-12);
        assert!((sketch.confidence() - (1.0 - (-5.0f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_recording_thread_runs_on_small_stack() {
        let (tx, rx) = std::sync::mpsc::channel();
        spawn_recording_thread(Box::new(move || {
            // a small frame plus the table apply path must fit
            let scratch = [0u8; RECORD_THREAD_STACK_SIZE / 4];
            let name = thread::current().name().map(str::to_owned);
            tx.send((name, scratch.len())).unwrap();
        }))
        .unwrap();

        let (name, used) = rx.recv().unwrap();
        assert_eq!(name.as_deref(), Some(RECORD_THREAD_NAME));
        assert_eq!(used, RECORD_THREAD_STACK_SIZE / 4);

        let sketch = seeded(5, 1 << 10);
        for _ in 0..2_000 {
            sketch.record("burst");
        }
        assert_eq!(sketch.count("burst"), 2_000);
    }

    #[test]
    fn test_failed_spawn_applies_inline() {
        let sketch = seeded(4, 1 << 12);
        sketch.record("steady");
        sketch.dispatch(b"refused", 3, |job| {
            drop(job);
            Err(io::Error::new(io::ErrorKind::WouldBlock, "thread limit reached"))
        });

        assert_eq!(sketch.in_flight(), 0);
        assert_eq!(sketch.count("refused"), 3);
        assert_eq!(sketch.count("steady"), 1);
        assert_eq!(sketch.total_weight(), 4);
    }

    #[test]
    fn test_failed_spawn_keeps_unit_in_flight_until_applied() {
        let sketch = seeded(2, 64);
        sketch.dispatch(b"refused", 1, |job| {
            // the worker's ticket is gone, the held one still counts
            drop(job);
            assert_eq!(sketch.in_flight(), 1);
            Err(io::Error::other("no threads"))
        });
        assert_eq!(sketch.in_flight(), 0);
        assert_eq!(sketch.count("refused"), 1);
    }

    #[test]
    fn test_debug_output() {
        let sketch = seeded(2, 8);
        let dbg = format!("{sketch:?}");
        assert!(dbg.contains("depth: 2"));
        assert!(dbg.contains("width: 8"));
        assert!(dbg.contains("seed: 9001"));
    }
}
