// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Plugins shipped with the crate.
//!
//! Each backend pairs a context type with a plugin for it.  Applications with their own
//! graphics stack implement [`crate::plugin::Plugin`] for their context instead.

pub mod software;

#[cfg(feature = "backend_wgpu")]
pub mod wgpu;
