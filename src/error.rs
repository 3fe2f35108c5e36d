// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Recoverable errors.
//!
//! Contract violations (using an invalid uploader, dropping a bound one, wrong thread, ...)
//! are not represented here; they panic.

use crate::compressor::{DestinationHandle, Identifier, TokenType};

/// A transfer failed inside the plugin.
///
/// The uploader forwards this unchanged; retry policy, if any, belongs to the plugin.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Buffer holds {actual} bytes but the input dimensions need {required}")]
    BufferTooSmall { required: usize, actual: usize },
    #[error("No destination {0:?} in this context")]
    UnknownDestination(DestinationHandle),
    #[error("Input region {input:?} and output region {output:?} differ in size")]
    DimensionMismatch { input: [u64; 4], output: [u64; 4] },
    #[error("Destination region {0:?} lies outside the destination")]
    OutOfBounds([u64; 4]),
    #[error("Plugin {identifier} can't transfer {token_type:?}")]
    UnsupportedFormat {
        identifier: Identifier,
        token_type: TokenType,
    },
    #[error("The context was lost")]
    ContextLost,
    #[error("Device error {0}")]
    Device(String),
}
