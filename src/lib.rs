/*! plugins_and_uploads picks and drives the fastest available plugin for moving a host buffer
into a GPU destination.

Transfer implementations are discovered at runtime and differ in which layouts they read and
write, which capability bits they offer, and which graphics contexts they work with.  Callers
describe what they need and get back an [`Uploader`] bound to the best match, or an empty one if
nothing fits.

# Pieces

| Type                                  | Role                                                         |
|---------------------------------------|--------------------------------------------------------------|
| [`compressor::Descriptor`]            | One format/capability combination advertised by a plugin     |
| [`plugin::Plugin`]                    | A loaded implementation; creates and drives native instances |
| [`registry::PluginRegistry`]          | Owns plugins; walks (plugin, descriptor) pairs for visitors  |
| [`selector::choose`]                  | Fastest compatible descriptor for a request                  |
| [`Uploader`]                          | Owns one native instance bound to one context                |

# Two kinds of failure

Finding no plugin is expected and shows up as an empty, invalid uploader.  Breaking a contract,
such as uploading through an invalid uploader, dropping one that is still bound, or touching it
from another thread, panics.  Failures inside a transfer are the plugin's business and come back
as [`TransferError`].

# Backends

The [`backends::software`] backend is always available.  The wgpu backend is behind the
`backend_wgpu` feature.
*/

// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

pub mod backends;
pub mod compressor;
pub mod plugin;
pub mod registry;
pub mod selector;
pub mod uploader;
mod affinity;
mod error;

pub use compressor::{Capabilities, Descriptor, DestinationHandle, Identifier, TokenType};
pub use error::TransferError;
pub use registry::{PluginRegistry, RegistryError};
pub use uploader::Uploader;
