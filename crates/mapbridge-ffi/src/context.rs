// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Execution context: the process-wide init flag and per-thread run loops.

use std::cell::RefCell;
use std::sync::Mutex;

use mapbridge_engine::RunLoop;
use tracing::debug;

use crate::error::BridgeError;

static INITIALIZED: Mutex<bool> = Mutex::new(false);

thread_local! {
    static RUN_LOOP: RefCell<Option<RunLoop>> = const { RefCell::new(None) };
}

/// Makes sure the calling thread has an engine run loop, creating it on first use.
///
/// The run loop lives until the thread exits.
pub fn ensure_run_loop() -> Result<(), BridgeError> {
    RUN_LOOP
        .try_with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.is_some() || RunLoop::is_active() {
                return Ok(());
            }
            let run_loop = RunLoop::new().map_err(|err| BridgeError::Unknown(err.to_string()))?;
            *slot = Some(run_loop);
            debug!(thread = ?std::thread::current().id(), "run loop attached");
            Ok(())
        })
        .unwrap_or_else(|_| Err(BridgeError::Unknown("thread is shutting down".into())))
}

/// One-time library initialization. Idempotent and thread-safe.
///
/// Also attaches a run loop to the calling thread. If that fails the library
/// stays uninitialized.
pub fn initialize() -> Result<(), BridgeError> {
    let mut initialized = INITIALIZED.lock().unwrap_or_else(|e| e.into_inner());
    ensure_run_loop()?;
    if !*initialized {
        *initialized = true;
        debug!("bridge initialized");
    }
    Ok(())
}

/// Clears the process-wide flag. Existing handles and run loops are untouched.
pub fn cleanup() {
    *INITIALIZED.lock().unwrap_or_else(|e| e.into_inner()) = false;
    debug!("bridge cleaned up");
}

/// Whether [`initialize`] has run since the last [`cleanup`].
pub fn is_initialized() -> bool {
    *INITIALIZED.lock().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn require_initialized() -> Result<(), BridgeError> {
    if is_initialized() {
        Ok(())
    } else {
        Err(BridgeError::not_initialized())
    }
}
