// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared services for the map bridge: the persisted settings document and the
//! storage port it is loaded through. Storage adapters live in their own crates.

pub mod config;
pub mod memory;
pub mod prefs;
