// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! A CPU-memory backend.
//!
//! [`SoftwareContext`] stands in for a graphics context: it owns textures as plain byte vectors
//! and can be marked lost, which makes every plugin incompatible with it.  [`SoftwarePlugin`]
//! copies host buffers into those textures row by row.
//!
//! This backend is always compiled.  It is what the crate's own tests run against, and it
//! works on targets without a GPU.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::compressor::{Capabilities, Descriptor, DestinationHandle, Identifier, TokenType};
use crate::error::TransferError;
use crate::plugin::{NativeInstance, Plugin};

pub const SOFTWARE_RGBA8: Identifier = Identifier::new(0x100);
pub const SOFTWARE_BGRA8: Identifier = Identifier::new(0x101);
pub const SOFTWARE_RGBA32F: Identifier = Identifier::new(0x102);

#[derive(Debug)]
struct SoftwareTexture {
    width: u64,
    height: u64,
    token_type: TokenType,
    data: Vec<u8>,
}

/// Textures in host memory.
#[derive(Debug)]
pub struct SoftwareContext {
    textures: Mutex<HashMap<DestinationHandle, SoftwareTexture>>,
    next_handle: AtomicU32,
    lost: AtomicBool,
}

impl SoftwareContext {
    pub fn new() -> Self {
        SoftwareContext {
            textures: Mutex::new(HashMap::new()),
            //0 is never a texture name
            next_handle: AtomicU32::new(1),
            lost: AtomicBool::new(false),
        }
    }

    /// Allocates a zeroed texture.
    ///
    /// # Panics
    ///
    /// If the crate doesn't know the size of `token_type`.
    pub fn create_texture(
        &self,
        width: u32,
        height: u32,
        token_type: TokenType,
    ) -> DestinationHandle {
        let Some(bytes_per_pixel) = token_type.bytes_per_pixel() else {
            panic!("Can't allocate a texture of {token_type:?}");
        };
        let handle = DestinationHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let len = width as usize * height as usize * bytes_per_pixel as usize;
        self.textures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                handle,
                SoftwareTexture {
                    width: width as u64,
                    height: height as u64,
                    token_type,
                    data: vec![0; len],
                },
            );
        handle
    }

    /// A copy of the texture's bytes, rows tightly packed.
    pub fn read_texture(&self, handle: DestinationHandle) -> Option<Vec<u8>> {
        self.textures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle)
            .map(|texture| texture.data.clone())
    }

    pub fn destroy_texture(&self, handle: DestinationHandle) -> bool {
        self.textures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle)
            .is_some()
    }

    /// Simulates losing (or restoring) the device behind this context.
    pub fn set_lost(&self, lost: bool) {
        self.lost.store(lost, Ordering::Release);
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }
}

impl Default for SoftwareContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct SoftwareInstance {
    identifier: Identifier,
    uploads: u64,
}

/// Copies host buffers into [`SoftwareContext`] textures.
#[derive(Debug)]
pub struct SoftwarePlugin {
    descriptors: Vec<Descriptor>,
    live: Arc<AtomicUsize>,
}

impl SoftwarePlugin {
    /// A plugin advertising exactly `descriptors`.
    ///
    /// Only descriptors whose input and output layouts agree can actually transfer.
    pub fn new(descriptors: Vec<Descriptor>) -> Self {
        SoftwarePlugin {
            descriptors,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Same-layout copies for RGBA8, BGRA8 and RGBA32F.
    pub fn standard() -> Self {
        let caps = Capabilities::TRANSFER | Capabilities::DATA_2D | Capabilities::USE_TEXTURE_2D;
        Self::new(vec![
            Descriptor {
                identifier: SOFTWARE_RGBA8,
                output_token_type: TokenType::RGBA8,
                token_type: TokenType::RGBA8,
                capabilities: caps,
                speed: 1.0,
            },
            Descriptor {
                identifier: SOFTWARE_BGRA8,
                output_token_type: TokenType::BGRA8,
                token_type: TokenType::BGRA8,
                capabilities: caps,
                speed: 1.0,
            },
            Descriptor {
                identifier: SOFTWARE_RGBA32F,
                output_token_type: TokenType::RGBA32F,
                token_type: TokenType::RGBA32F,
                capabilities: caps,
                speed: 0.25,
            },
        ])
    }

    /// Counts instances created and not yet destroyed.
    pub fn instance_counter(&self) -> Arc<AtomicUsize> {
        self.live.clone()
    }
}

impl Plugin<SoftwareContext> for SoftwarePlugin {
    fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    fn instantiate(&self, identifier: Identifier) -> Option<NativeInstance> {
        if !self.implements(identifier) {
            return None;
        }
        self.live.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(SoftwareInstance {
            identifier,
            uploads: 0,
        }))
    }

    fn destroy(&self, instance: NativeInstance) {
        match instance.downcast::<SoftwareInstance>() {
            Ok(instance) => {
                self.live.fetch_sub(1, Ordering::SeqCst);
                logwise::trace_sync!(
                    "software instance {identifier} destroyed after {uploads} uploads",
                    identifier = logwise::privacy::LogIt(&instance.identifier),
                    uploads = instance.uploads
                );
            }
            Err(_) => {
                logwise::warn_sync!("SoftwarePlugin asked to destroy a foreign instance");
            }
        }
    }

    fn is_compatible(&self, identifier: Identifier, context: &SoftwareContext) -> bool {
        self.implements(identifier) && !context.is_lost()
    }

    fn transfer(
        &self,
        instance: &mut NativeInstance,
        identifier: Identifier,
        context: &SoftwareContext,
        buffer: &[u8],
        in_dims: &[u64; 4],
        _flags: Capabilities,
        out_dims: &[u64; 4],
        destination: DestinationHandle,
    ) -> Result<(), TransferError> {
        if context.is_lost() {
            return Err(TransferError::ContextLost);
        }
        let Some(instance) = instance.downcast_mut::<SoftwareInstance>() else {
            return Err(TransferError::Device(
                "instance was not created by SoftwarePlugin".to_string(),
            ));
        };
        let descriptor = self.find_descriptor(identifier);
        let unsupported = TransferError::UnsupportedFormat {
            identifier,
            token_type: descriptor.token_type,
        };
        if descriptor.output_token_type != descriptor.token_type {
            return Err(unsupported);
        }
        let Some(bytes_per_pixel) = descriptor.token_type.bytes_per_pixel() else {
            return Err(unsupported);
        };
        let bytes_per_pixel = bytes_per_pixel as usize;

        //the buffer holds exactly the input region, rows tightly packed
        let [_, width, _, height] = *in_dims;
        let [out_x, out_width, out_y, out_height] = *out_dims;
        if (width, height) != (out_width, out_height) {
            return Err(TransferError::DimensionMismatch {
                input: *in_dims,
                output: *out_dims,
            });
        }
        let out_of_bounds = || TransferError::OutOfBounds(*out_dims);
        let row_len = usize::try_from(width)
            .ok()
            .and_then(|width| width.checked_mul(bytes_per_pixel))
            .ok_or_else(out_of_bounds)?;
        let required = usize::try_from(height)
            .ok()
            .and_then(|height| height.checked_mul(row_len))
            .ok_or_else(out_of_bounds)?;
        if buffer.len() < required {
            return Err(TransferError::BufferTooSmall {
                required,
                actual: buffer.len(),
            });
        }

        let mut textures = context
            .textures
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(texture) = textures.get_mut(&destination) else {
            return Err(TransferError::UnknownDestination(destination));
        };
        if texture.token_type != descriptor.output_token_type {
            return Err(unsupported);
        }
        let fits = |offset: u64, len: u64, limit: u64| {
            offset.checked_add(len).is_some_and(|end| end <= limit)
        };
        if !fits(out_x, out_width, texture.width) || !fits(out_y, out_height, texture.height) {
            return Err(out_of_bounds());
        }

        //in bounds, so every offset below indexes into texture.data
        let texture_row_len = texture.width as usize * bytes_per_pixel;
        let (out_x, out_y) = (out_x as usize, out_y as usize);
        for (row, source) in buffer[..required].chunks_exact(row_len.max(1)).enumerate() {
            let start = (out_y + row) * texture_row_len + out_x * bytes_per_pixel;
            texture.data[start..start + row_len].copy_from_slice(source);
        }
        instance.uploads += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(
        plugin: &SoftwarePlugin,
        context: &SoftwareContext,
        buffer: &[u8],
        in_dims: [u64; 4],
        out_dims: [u64; 4],
        destination: DestinationHandle,
    ) -> Result<(), TransferError> {
        let mut instance = plugin.instantiate(SOFTWARE_RGBA8).unwrap();
        let result = plugin.transfer(
            &mut instance,
            SOFTWARE_RGBA8,
            context,
            buffer,
            &in_dims,
            Capabilities::DATA_2D,
            &out_dims,
            destination,
        );
        plugin.destroy(instance);
        result
    }

    #[test]
    fn copies_into_subregion() {
        let plugin = SoftwarePlugin::standard();
        let context = SoftwareContext::new();
        let texture = context.create_texture(3, 2, TokenType::RGBA8);
        let pixel = [1u8, 2, 3, 4];
        upload(&plugin, &context, &pixel, [0, 1, 0, 1], [2, 1, 1, 1], texture).unwrap();

        let data = context.read_texture(texture).unwrap();
        //row 1, column 2
        assert_eq!(&data[20..24], &pixel);
        assert_eq!(data.iter().filter(|b| **b != 0).count(), 4);
    }

    #[test]
    fn rejects_bad_requests() {
        let plugin = SoftwarePlugin::standard();
        let context = SoftwareContext::new();
        let texture = context.create_texture(2, 2, TokenType::RGBA8);

        let short = upload(&plugin, &context, &[0; 4], [0, 2, 0, 2], [0, 2, 0, 2], texture);
        assert!(matches!(
            short,
            Err(TransferError::BufferTooSmall {
                required: 16,
                actual: 4
            })
        ));

        let outside = upload(&plugin, &context, &[0; 16], [0, 2, 0, 2], [1, 2, 0, 2], texture);
        assert!(matches!(outside, Err(TransferError::OutOfBounds(_))));

        let missing = upload(
            &plugin,
            &context,
            &[0; 4],
            [0, 1, 0, 1],
            [0, 1, 0, 1],
            DestinationHandle(999),
        );
        assert!(matches!(missing, Err(TransferError::UnknownDestination(_))));

        let wrong_format = context.create_texture(2, 2, TokenType::BGRA8);
        let mismatch = upload(&plugin, &context, &[0; 4], [0, 1, 0, 1], [0, 1, 0, 1], wrong_format);
        assert!(matches!(mismatch, Err(TransferError::UnsupportedFormat { .. })));

        context.set_lost(true);
        let lost = upload(&plugin, &context, &[0; 4], [0, 1, 0, 1], [0, 1, 0, 1], texture);
        assert!(matches!(lost, Err(TransferError::ContextLost)));
    }

    #[test]
    fn huge_regions_are_out_of_bounds() {
        let plugin = SoftwarePlugin::standard();
        let context = SoftwareContext::new();
        let texture = context.create_texture(2, 2, TokenType::RGBA8);

        let far = upload(&plugin, &context, &[0; 4], [0, 1, 0, 1], [u64::MAX, 1, 0, 1], texture);
        assert!(matches!(far, Err(TransferError::OutOfBounds(_))));
        let far = upload(&plugin, &context, &[0; 4], [0, 1, 0, 1], [0, 1, u64::MAX, 1], texture);
        assert!(matches!(far, Err(TransferError::OutOfBounds(_))));

        let huge = [0, u64::MAX, 0, u64::MAX];
        let wide = upload(&plugin, &context, &[0; 4], huge, huge, texture);
        assert!(matches!(wide, Err(TransferError::OutOfBounds(_))));

        assert_eq!(context.read_texture(texture).unwrap(), vec![0; 16]);
    }

    #[test]
    fn counts_live_instances() {
        let plugin = SoftwarePlugin::standard();
        let live = plugin.instance_counter();
        let a = plugin.instantiate(SOFTWARE_BGRA8).unwrap();
        let b = plugin.instantiate(SOFTWARE_RGBA32F).unwrap();
        assert!(plugin.instantiate(Identifier::new(0x999)).is_none());
        assert_eq!(live.load(Ordering::SeqCst), 2);
        plugin.destroy(a);
        plugin.destroy(b);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
