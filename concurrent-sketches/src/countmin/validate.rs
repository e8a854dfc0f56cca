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

//! Caller-defined term validation for the `try_*` entry points.

use crate::error::Error;
use crate::error::ErrorKind;

/// A precondition on the bytes of a term.
///
/// Implemented for any `Fn(&[u8]) -> bool` closure that is `Send + Sync`.
///
/// # Examples
///
/// ```
/// use concurrent_sketches::countmin::CountMinSketch;
///
/// let sketch = CountMinSketch::builder()
///     .seed(7)
///     .term_validator(|term: &[u8]| term.is_ascii())
///     .build()
///     .unwrap();
///
/// assert!(sketch.try_record("plain").is_ok());
/// assert!(sketch.try_record("naïve").is_err());
/// ```
pub trait TermValidator: Send + Sync {
    /// Returns whether `term` may be recorded or counted.
    fn is_valid(&self, term: &[u8]) -> bool;
}

impl<F> TermValidator for F
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn is_valid(&self, term: &[u8]) -> bool {
        self(term)
    }
}

/// Rejects the empty term.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmpty;

impl TermValidator for NonEmpty {
    fn is_valid(&self, term: &[u8]) -> bool {
        !term.is_empty()
    }
}

pub(super) fn check(validator: Option<&dyn TermValidator>, term: &[u8]) -> Result<(), Error> {
    match validator {
        Some(v) if !v.is_valid(term) => {
            Err(Error::new(ErrorKind::InvalidTerm, "term rejected by validator")
                .with_context("len", term.len()))
        }
        _ => Ok(()),
    }
}
