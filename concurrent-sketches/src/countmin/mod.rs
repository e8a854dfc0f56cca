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

//! Count-Min sketch with asynchronous recording.
//!
//! The Count-Min sketch provides approximate frequency counts for streaming
//! data in `depth x width` counters, whatever the number of distinct terms.
//! Recording is fire-and-forget: each observation is applied on its own
//! thread. Counting is a synchronization point: it waits for every recording
//! dispatched before it, then takes the minimum over the term's buckets.
//!
//! # Usage
//!
//! ```rust
//! use concurrent_sketches::countmin::CountMinSketch;
//!
//! let sketch = CountMinSketch::new(5, 256).unwrap();
//!
//! sketch.record("apple");
//! sketch.record_with_weight("banana", 3);
//!
//! let banana = sketch.count("banana");
//! assert!(banana >= 3);
//!
//! let lower = sketch.lower_bound("banana");
//! assert!(lower <= banana);
//! ```
//!
//! # Configuration Helpers
//!
//! ```rust
//! use concurrent_sketches::countmin::CountMinSketch;
//!
//! let width = CountMinSketch::suggest_width(0.01);
//! let depth = CountMinSketch::suggest_depth(0.99);
//!
//! let _sketch = CountMinSketch::new(depth, width).unwrap();
//! ```
//!
//! # Term Validation
//!
//! ```rust
//! use concurrent_sketches::countmin::CountMinSketch;
//! use concurrent_sketches::error::ErrorKind;
//!
//! let sketch = CountMinSketch::builder().reject_empty_terms().build().unwrap();
//!
//! let err = sketch.try_record("").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::InvalidTerm);
//! assert_eq!(sketch.try_count("").unwrap_err().kind(), ErrorKind::InvalidTerm);
//! ```

mod builder;
mod inflight;
mod table;
mod validate;

mod sketch;
pub use self::builder::CountMinSketchBuilder;
pub use self::sketch::CountMinSketch;
pub use self::validate::NonEmpty;
pub use self::validate::TermValidator;
