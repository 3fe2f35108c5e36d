// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Plugin-advertised value types.
//!
//! Every plugin advertises one [`Descriptor`] per format/capability combination it supports.
//! Descriptors are plain `Copy` values; an [`crate::uploader::Uploader`] keeps its own snapshot
//! of the descriptor it was built from.
//!
//! # Reserved identifiers
//!
//! [`Identifier::NONE`] is used in three places:
//!
//! * a caller asking for "no plugin" when constructing an uploader by identifier,
//! * [`crate::selector::choose`] reporting that no descriptor matched,
//! * an uploader that is empty (never bound, or cleared).
//!
//! Every raw value up to and including `NONE` is reserved, and
//! [`crate::registry::PluginRegistry::add`] refuses plugins advertising one, so a live registry
//! never hands out an identifier that could be confused with "no plugin".

use std::fmt::{Debug, Display, Formatter};
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Names one plugin implementation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(u32);

impl Identifier {
    /// Never a valid plugin.
    pub const INVALID: Identifier = Identifier(0);
    /// No plugin chosen, or no plugin matched.
    pub const NONE: Identifier = Identifier(1);

    pub const fn new(raw: u32) -> Self {
        Identifier(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// True for every identifier in the reserved range.
    pub const fn is_none(self) -> bool {
        self.0 <= Self::NONE.0
    }
}

impl Default for Identifier {
    fn default() -> Self {
        Identifier::NONE
    }
}

impl Debug for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            write!(f, "Identifier::NONE")
        } else {
            write!(f, "Identifier(0x{:x})", self.0)
        }
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Pixel/data layout on one side of a transfer.
///
/// Tokens are compared exactly; there is no coercion between layouts.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct TokenType(u32);

impl TokenType {
    pub const UNKNOWN: TokenType = TokenType(0);
    pub const RGBA8: TokenType = TokenType(0x1000);
    pub const BGRA8: TokenType = TokenType(0x1001);
    pub const RGB8: TokenType = TokenType(0x1002);
    pub const BGR8: TokenType = TokenType(0x1003);
    pub const RGBA16: TokenType = TokenType(0x1100);
    pub const RGBA16F: TokenType = TokenType(0x1200);
    pub const RGBA32F: TokenType = TokenType(0x1300);
    pub const DEPTH24_STENCIL8: TokenType = TokenType(0x1400);

    pub const fn new(raw: u32) -> Self {
        TokenType(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Size of one element of this layout, if the crate knows it.
    pub const fn bytes_per_pixel(self) -> Option<u8> {
        match self {
            TokenType::RGBA8 | TokenType::BGRA8 | TokenType::DEPTH24_STENCIL8 => Some(4),
            TokenType::RGB8 | TokenType::BGR8 => Some(3),
            TokenType::RGBA16 | TokenType::RGBA16F => Some(8),
            TokenType::RGBA32F => Some(16),
            _ => None,
        }
    }
}

impl Debug for TokenType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match *self {
            TokenType::UNKNOWN => "UNKNOWN",
            TokenType::RGBA8 => "RGBA8",
            TokenType::BGRA8 => "BGRA8",
            TokenType::RGB8 => "RGB8",
            TokenType::BGR8 => "BGR8",
            TokenType::RGBA16 => "RGBA16",
            TokenType::RGBA16F => "RGBA16F",
            TokenType::RGBA32F => "RGBA32F",
            TokenType::DEPTH24_STENCIL8 => "DEPTH24_STENCIL8",
            _ => return write!(f, "TokenType(0x{:x})", self.0),
        };
        f.write_str(name)
    }
}

/// Bitmask of operations a plugin supports.
///
/// Also used for the `flags` argument of an upload, which selects among the
/// data-dimension and destination-kind bits.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u64);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    /// Compresses in place.
    pub const INPLACE: Capabilities = Capabilities(1 << 0);
    pub const DATA_1D: Capabilities = Capabilities(1 << 1);
    pub const DATA_2D: Capabilities = Capabilities(1 << 2);
    pub const IGNORE_ALPHA: Capabilities = Capabilities(1 << 3);
    /// Moves data between host memory and the device. Every uploader requires this bit.
    pub const TRANSFER: Capabilities = Capabilities(1 << 4);
    pub const USE_TEXTURE_RECT: Capabilities = Capabilities(1 << 5);
    pub const USE_FRAMEBUFFER: Capabilities = Capabilities(1 << 6);
    pub const USE_TEXTURE_2D: Capabilities = Capabilities(1 << 7);
    pub const COMPRESS: Capabilities = Capabilities(1 << 8);

    pub const fn from_bits(bits: u64) -> Self {
        Capabilities(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Superset test: every bit of `other` is set in `self`.
    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;
    fn bitor(self, rhs: Self) -> Self::Output {
        Capabilities(self.0 | rhs.0)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Capabilities {
    type Output = Capabilities;
    fn bitand(self, rhs: Self) -> Self::Output {
        Capabilities(self.0 & rhs.0)
    }
}

impl Debug for Capabilities {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Capabilities(0x{:x})", self.0)
    }
}

/// A destination resource inside a graphics context, such as a texture name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationHandle(pub u32);

/// One format/capability combination advertised by a plugin.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Descriptor {
    pub identifier: Identifier,
    /// Layout the transfer writes into the destination.
    pub output_token_type: TokenType,
    /// Layout of the host buffer.
    pub token_type: TokenType,
    pub capabilities: Capabilities,
    /// Relative speed score; higher is faster.
    pub speed: f32,
}

impl Descriptor {
    /// The snapshot held by an empty uploader.
    pub const EMPTY: Descriptor = Descriptor {
        identifier: Identifier::NONE,
        output_token_type: TokenType::UNKNOWN,
        token_type: TokenType::UNKNOWN,
        capabilities: Capabilities::NONE,
        speed: 0.0,
    };

    /// True if this descriptor converts `token_type` to `output_token_type` exactly and
    /// supports at least `capabilities`.
    pub fn satisfies(
        &self,
        output_token_type: TokenType,
        token_type: TokenType,
        capabilities: Capabilities,
    ) -> bool {
        self.output_token_type == output_token_type
            && self.token_type == token_type
            && self.capabilities.contains(capabilities)
    }
}

impl Default for Descriptor {
    fn default() -> Self {
        Descriptor::EMPTY
    }
}
