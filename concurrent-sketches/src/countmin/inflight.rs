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

//! Tracking of recordings that were dispatched but not yet applied.

use std::sync::Arc;

use parking_lot::Condvar;
use parking_lot::Mutex;

/// Counter of in-flight recordings with blocking wait-for-zero.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    pending: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    /// Registers one unit of work; it stays in flight until the ticket drops.
    pub(crate) fn register(self: &Arc<Self>) -> InFlightTicket {
        *self.pending.lock() += 1;
        InFlightTicket {
            tracker: Arc::clone(self),
        }
    }

    /// Number of registered units whose tickets have not dropped yet.
    pub(crate) fn pending(&self) -> usize {
        *self.pending.lock()
    }

    /// Blocks until no unit is in flight.
    ///
    /// Returns the number of units that were pending on entry.
    pub(crate) fn wait_idle(&self) -> usize {
        let mut pending = self.pending.lock();
        let on_entry = *pending;
        while *pending > 0 {
            self.idle.wait(&mut pending);
        }
        on_entry
    }

    fn complete(&self) {
        let mut pending = self.pending.lock();
        debug_assert!(*pending > 0, "in-flight counter underflow");
        *pending -= 1;
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

/// Registration of one in-flight unit.
///
/// Dropping the ticket deregisters it, including when the owning worker
/// unwinds.
#[derive(Debug)]
#[must_use = "dropping the ticket immediately marks the work as complete"]
pub(crate) struct InFlightTicket {
    tracker: Arc<InFlight>,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.tracker.complete();
    }
}
