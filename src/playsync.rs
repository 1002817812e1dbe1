// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// A cancel handle is attached to every scheduled playback source. The
/// mixer drops a source on the next block after its handle is cancelled;
/// cancelling a source that already finished is a no-op.
#[derive(Clone)]
pub struct CancelHandle {
    /// Set once when the operation should stop.
    cancelled: Arc<AtomicBool>,
    /// Completion flag plus the condvar that announces it.
    finished: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelHandle {
    /// Creates a new, untouched cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle {
            cancelled: Arc::new(AtomicBool::new(false)),
            finished: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Requests cancellation. Idempotent: repeated calls and calls after
    /// completion have no further effect.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            let (_, condvar) = &*self.finished;
            condvar.notify_all();
        }
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Marks the underlying operation as finished and wakes any waiters.
    pub fn mark_finished(&self) {
        let (finished, condvar) = &*self.finished;
        let mut finished = finished.lock();
        *finished = true;
        condvar.notify_all();
    }

    /// Returns true once the underlying operation finished.
    pub fn is_finished(&self) -> bool {
        *self.finished.0.lock()
    }

    /// Blocks until the operation finishes or is cancelled.
    pub fn wait(&self) {
        let (finished, condvar) = &*self.finished;
        let mut finished = finished.lock();
        while !*finished && !self.is_cancelled() {
            condvar.wait(&mut finished);
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::*;

    #[test]
    fn test_cancel_unblocks_waiters() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.is_cancelled());

        let join = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || cancel_handle.wait())
        };

        cancel_handle.cancel();
        assert!(join.join().is_ok());
        assert!(cancel_handle.is_cancelled());
    }

    #[test]
    fn test_finish_unblocks_waiters() {
        let cancel_handle = CancelHandle::new();

        let join = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || cancel_handle.wait())
        };

        cancel_handle.mark_finished();
        assert!(join.join().is_ok());
        assert!(!cancel_handle.is_cancelled());
        assert!(cancel_handle.is_finished());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let cancel_handle = CancelHandle::new();
        cancel_handle.mark_finished();

        // Cancelling a finished operation is a silent no-op.
        cancel_handle.cancel();
        cancel_handle.cancel();
        assert!(cancel_handle.is_finished());
    }
}
