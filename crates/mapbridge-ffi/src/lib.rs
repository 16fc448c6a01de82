// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! C-compatible bindings for the headless map engine.
//!
//! The crate has two layers. [`bridge`] is the safe Rust surface: render
//! targets, map state, still rendering and buffer hand-off, all returning
//! `Result<_, BridgeError>`. The `mb_*` functions (see `include/mapbridge.h`)
//! are thin shims over it that translate handles and pointers, catch panics,
//! and record failures in a per-thread last-error slot.
//!
//! Every engine-touching call establishes the calling thread's run loop first.
//! Handles are not synchronized; touching one handle from two threads at once
//! is undefined.
#![allow(unsafe_code)]
#![allow(non_camel_case_types)]

mod abi;
mod buffer;
mod context;
mod error;
mod images;
mod loader;
mod logging;
mod map;
mod render;
mod settings;
mod target;
mod types;

/// Safe Rust surface of the bridge.
pub mod bridge {
    pub use crate::buffer::{EncodedFormat, ImageBuffer};
    pub use crate::context::{cleanup, ensure_run_loop, initialize, is_initialized};
    pub use crate::error::{BridgeError, ErrorCode};
    pub use crate::loader::{CallbackFileSource, ResourceResponse};
    pub use crate::logging::init_logging;
    pub use crate::map::{map_mode_from_raw, CameraPose, DebugFlags, MapState};
    pub use crate::render::{render_still, render_still_async, render_tile, tile_camera, RenderOptions};
    pub use crate::settings::{
        apply_prefs, load_settings, load_settings_from, resource_options, set_api_key,
        set_base_path, set_fetch_timeout,
    };
    pub use crate::target::RenderTarget;
    pub use mapbridge_engine::{MapMode, Size};
}

pub use abi::*;
pub use types::*;
