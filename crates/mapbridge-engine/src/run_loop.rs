// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-thread execution context.

use std::cell::Cell;
use std::marker::PhantomData;

use tracing::debug;

use crate::{EngineError, LOG_TARGET};

thread_local! {
    static ACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// The engine's per-thread event loop.
///
/// At most one run loop exists per thread. It marks the thread as ready for
/// engine work for as long as it lives and cannot be moved to another thread.
#[derive(Debug)]
pub struct RunLoop {
    _thread_bound: PhantomData<*const ()>,
}

impl RunLoop {
    /// Creates the run loop for the calling thread.
    pub fn new() -> Result<Self, EngineError> {
        if Self::is_active() {
            return Err(EngineError::RunLoopExists);
        }
        ACTIVE.with(|active| active.set(true));
        debug!(target: LOG_TARGET, thread = ?std::thread::current().id(), "run loop created");
        Ok(Self {
            _thread_bound: PhantomData,
        })
    }

    /// Whether the calling thread currently owns a run loop.
    pub fn is_active() -> bool {
        ACTIVE.try_with(Cell::get).unwrap_or(false)
    }

    /// Fails with [`EngineError::NoRunLoop`] unless the calling thread has a run loop.
    pub fn require() -> Result<(), EngineError> {
        if Self::is_active() {
            Ok(())
        } else {
            Err(EngineError::NoRunLoop)
        }
    }
}

impl Drop for RunLoop {
    fn drop(&mut self) {
        // May run during thread-local teardown.
        let _ = ACTIVE.try_with(|active| active.set(false));
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn run_loop_is_thread_confined() {
        std::thread::spawn(|| {
            assert!(!RunLoop::is_active());
            assert_eq!(RunLoop::require(), Err(EngineError::NoRunLoop));
            let run_loop = RunLoop::new().unwrap();
            assert!(RunLoop::is_active());
            assert_eq!(RunLoop::new().err(), Some(EngineError::RunLoopExists));

            std::thread::spawn(|| assert!(!RunLoop::is_active()))
                .join()
                .unwrap();

            drop(run_loop);
            assert!(!RunLoop::is_active());
        })
        .join()
        .unwrap();
    }
}
