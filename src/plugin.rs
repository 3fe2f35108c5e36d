// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The contract a transfer plugin implements.
//!
//! A plugin is a loaded implementation that advertises zero or more [`Descriptor`]s and knows
//! how to create, drive, and destroy the native instances behind them.  Plugins are owned by a
//! [`crate::registry::PluginRegistry`]; everything else only borrows them.
//!
//! The trait is generic over the graphics context type `C`, which is opaque to this crate.

use std::any::Any;

use crate::compressor::{Capabilities, Descriptor, DestinationHandle, Identifier};
use crate::error::TransferError;

/// Per-use state created by a plugin.
///
/// Exclusively owned by the uploader that asked for it, and handed back to the
/// same plugin for [`Plugin::transfer`] and [`Plugin::destroy`].  Plugins downcast it
/// to their own type.
pub type NativeInstance = Box<dyn Any + Send>;

pub trait Plugin<C: ?Sized>: Send + Sync {
    /// Everything this plugin can do, one entry per format/capability combination.
    fn descriptors(&self) -> &[Descriptor];

    /// The descriptor advertised for `identifier`, or [`Descriptor::EMPTY`].
    fn find_descriptor(&self, identifier: Identifier) -> Descriptor {
        self.descriptors()
            .iter()
            .find(|d| d.identifier == identifier)
            .copied()
            .unwrap_or(Descriptor::EMPTY)
    }

    fn implements(&self, identifier: Identifier) -> bool {
        self.descriptors().iter().any(|d| d.identifier == identifier)
    }

    /// Creates the native instance for `identifier`.
    ///
    /// Returning `None` for an identifier this plugin advertises is a plugin bug.
    fn instantiate(&self, identifier: Identifier) -> Option<NativeInstance>;

    /// Releases an instance previously returned by [`Plugin::instantiate`].
    ///
    /// The context the instance was used with is still alive when this is called.
    fn destroy(&self, instance: NativeInstance);

    /// Whether `identifier` may be used with `context` right now.
    ///
    /// This may change over the lifetime of a context, so callers do not cache it.
    fn is_compatible(&self, identifier: Identifier, context: &C) -> bool;

    /// Moves `buffer` into `destination`.
    ///
    /// `in_dims` and `out_dims` are `(x, width, y, height)`.
    #[allow(clippy::too_many_arguments)]
    fn transfer(
        &self,
        instance: &mut NativeInstance,
        identifier: Identifier,
        context: &C,
        buffer: &[u8],
        in_dims: &[u64; 4],
        flags: Capabilities,
        out_dims: &[u64; 4],
        destination: DestinationHandle,
    ) -> Result<(), TransferError>;
}
