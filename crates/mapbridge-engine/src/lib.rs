// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! mapbridge-engine: the headless map engine object model.
//!
//! This crate is the engine side of the bridge. It defines the objects a host
//! drives (a per-thread [`RunLoop`], an off-screen [`HeadlessFrontend`], a
//! [`Map`] with its [`Style`], and the [`FileSource`] used to fetch resources)
//! and ships a small software reference implementation behind them. The
//! reference renderer only fills the style's background layer and draws debug
//! overlays; it exists so the bridge can be exercised end to end without a GPU.
//!
//! Engine objects are not thread-safe. Every constructor and every rendering or
//! loading entry point requires a [`RunLoop`] on the calling thread.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless
)]

mod error;
mod frontend;
mod geometry;
mod image;
mod map;
mod raster;
mod resource;
mod run_loop;
mod style;

/// Engine error type shared by every fallible engine call.
pub use error::EngineError;
/// Off-screen rendering surface and its frame result.
pub use frontend::{HeadlessFrontend, RenderResult};
/// Sizes, camera and mode types.
pub use geometry::{CameraOptions, LatLng, MapDebugOptions, MapMode, Size};
/// Raster images and alpha conversions.
pub use image::{
    premultiply, unpremultiply, AlphaMode, Image, Premultiplied, PremultipliedImage, Unassociated,
    UnassociatedImage,
};
/// Map instance, its options and its observer port.
pub use map::{Map, MapObserver, MapOptions, NullObserver};
/// Resource fetching interfaces.
pub use resource::{FileSource, LocalFileSource, Resource, ResourceKind, ResourceOptions};
/// Per-thread execution context.
pub use run_loop::RunLoop;
/// Style document and its image registry.
pub use style::{Rgba, Style, StyleImage};

/// Logging target used by every event the engine emits.
///
/// Hosts that want the engine quiet can filter this target out.
pub const LOG_TARGET: &str = "mapbridge_engine";

/// Edge length, in logical pixels, of one Web Mercator tile.
pub const TILE_SIZE: f64 = 512.0;
