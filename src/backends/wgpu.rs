// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
wgpu backend.

[`WgpuContext`] wraps a device/queue pair together with a table of textures addressed by
[`DestinationHandle`], which plays the role of a texture name.  [`WgpuPlugin`] uploads with
[`wgpu::Queue::write_texture`], which has no row alignment requirement.
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::compressor::{Capabilities, Descriptor, DestinationHandle, Identifier, TokenType};
use crate::error::TransferError;
use crate::plugin::{NativeInstance, Plugin};

pub const WGPU_RGBA8: Identifier = Identifier::new(0x200);
pub const WGPU_BGRA8: Identifier = Identifier::new(0x201);
pub const WGPU_RGBA16: Identifier = Identifier::new(0x202);
pub const WGPU_RGBA16F: Identifier = Identifier::new(0x203);
pub const WGPU_RGBA32F: Identifier = Identifier::new(0x204);

/// The texture format a token uploads into, if this backend supports it.
fn texture_format(token_type: TokenType) -> Option<::wgpu::TextureFormat> {
    match token_type {
        TokenType::RGBA8 => Some(::wgpu::TextureFormat::Rgba8Unorm),
        TokenType::BGRA8 => Some(::wgpu::TextureFormat::Bgra8Unorm),
        TokenType::RGBA16 => Some(::wgpu::TextureFormat::Rgba16Unorm),
        TokenType::RGBA16F => Some(::wgpu::TextureFormat::Rgba16Float),
        TokenType::RGBA32F => Some(::wgpu::TextureFormat::Rgba32Float),
        _ => None,
    }
}

#[derive(Debug)]
pub struct WgpuContext {
    device: ::wgpu::Device,
    queue: ::wgpu::Queue,
    textures: Mutex<HashMap<DestinationHandle, ::wgpu::Texture>>,
    next_handle: AtomicU32,
}

impl WgpuContext {
    pub fn new(device: ::wgpu::Device, queue: ::wgpu::Queue) -> Self {
        WgpuContext {
            device,
            queue,
            textures: Mutex::new(HashMap::new()),
            next_handle: AtomicU32::new(1),
        }
    }

    pub fn device(&self) -> &::wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &::wgpu::Queue {
        &self.queue
    }

    /// Makes `texture` addressable as an upload destination.
    ///
    /// The texture needs `TextureUsages::COPY_DST`.
    pub fn register_texture(&self, texture: ::wgpu::Texture) -> DestinationHandle {
        let handle = DestinationHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.textures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, texture);
        handle
    }

    pub fn remove_texture(&self, handle: DestinationHandle) -> Option<::wgpu::Texture> {
        self.textures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle)
    }
}

#[derive(Debug)]
struct WgpuInstance {
    identifier: Identifier,
}

/// Uploads same-layout 2D data into textures of a [`WgpuContext`].
#[derive(Debug)]
pub struct WgpuPlugin {
    descriptors: Vec<Descriptor>,
}

impl WgpuPlugin {
    pub fn new() -> Self {
        let caps = Capabilities::TRANSFER | Capabilities::DATA_2D | Capabilities::USE_TEXTURE_2D;
        let descriptor = |identifier, token_type, speed| Descriptor {
            identifier,
            output_token_type: token_type,
            token_type,
            capabilities: caps,
            speed,
        };
        WgpuPlugin {
            descriptors: vec![
                descriptor(WGPU_RGBA8, TokenType::RGBA8, 4.0),
                descriptor(WGPU_BGRA8, TokenType::BGRA8, 4.0),
                descriptor(WGPU_RGBA16, TokenType::RGBA16, 2.0),
                descriptor(WGPU_RGBA16F, TokenType::RGBA16F, 2.0),
                descriptor(WGPU_RGBA32F, TokenType::RGBA32F, 1.0),
            ],
        }
    }
}

impl Default for WgpuPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin<WgpuContext> for WgpuPlugin {
    fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    fn instantiate(&self, identifier: Identifier) -> Option<NativeInstance> {
        if !self.implements(identifier) {
            return None;
        }
        Some(Box::new(WgpuInstance { identifier }))
    }

    fn destroy(&self, instance: NativeInstance) {
        if let Ok(instance) = instance.downcast::<WgpuInstance>() {
            logwise::trace_sync!(
                "wgpu instance {identifier} destroyed",
                identifier = logwise::privacy::LogIt(&instance.identifier)
            );
        }
    }

    fn is_compatible(&self, identifier: Identifier, context: &WgpuContext) -> bool {
        let descriptor = self.find_descriptor(identifier);
        if descriptor.identifier.is_none() {
            return false;
        }
        texture_format(descriptor.output_token_type)
            .is_some_and(|format| context.device.features().contains(format.required_features()))
    }

    fn transfer(
        &self,
        _instance: &mut NativeInstance,
        identifier: Identifier,
        context: &WgpuContext,
        buffer: &[u8],
        in_dims: &[u64; 4],
        _flags: Capabilities,
        out_dims: &[u64; 4],
        destination: DestinationHandle,
    ) -> Result<(), TransferError> {
        let descriptor = self.find_descriptor(identifier);
        let unsupported = || TransferError::UnsupportedFormat {
            identifier,
            token_type: descriptor.token_type,
        };
        let format = texture_format(descriptor.output_token_type).ok_or_else(unsupported)?;
        let bytes_per_pixel = descriptor
            .token_type
            .bytes_per_pixel()
            .ok_or_else(unsupported)? as u64;

        let [_, width, _, height] = *in_dims;
        let [out_x, out_width, out_y, out_height] = *out_dims;
        if (width, height) != (out_width, out_height) {
            return Err(TransferError::DimensionMismatch {
                input: *in_dims,
                output: *out_dims,
            });
        }
        let out_of_bounds = || TransferError::OutOfBounds(*out_dims);
        let row_len = width
            .checked_mul(bytes_per_pixel)
            .and_then(|row_len| u32::try_from(row_len).ok())
            .ok_or_else(out_of_bounds)?;
        let required = u64::from(row_len)
            .checked_mul(height)
            .and_then(|required| usize::try_from(required).ok())
            .ok_or_else(out_of_bounds)?;
        if buffer.len() < required {
            return Err(TransferError::BufferTooSmall {
                required,
                actual: buffer.len(),
            });
        }

        let textures = context
            .textures
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(texture) = textures.get(&destination) else {
            return Err(TransferError::UnknownDestination(destination));
        };
        if texture.format() != format {
            return Err(unsupported());
        }
        let fits = |offset: u64, len: u64, limit: u32| {
            offset
                .checked_add(len)
                .is_some_and(|end| end <= u64::from(limit))
        };
        if !fits(out_x, out_width, texture.width()) || !fits(out_y, out_height, texture.height()) {
            return Err(out_of_bounds());
        }
        //in bounds, so everything fits the texture's u32 extent
        let [out_x, out_width, out_y, out_height] = [out_x, out_width, out_y, out_height]
            .map(|value| u32::try_from(value).unwrap_or(u32::MAX));

        context.queue.write_texture(
            ::wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: ::wgpu::Origin3d {
                    x: out_x,
                    y: out_y,
                    z: 0,
                },
                aspect: ::wgpu::TextureAspect::All,
            },
            &buffer[..required],
            ::wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(row_len),
                rows_per_image: Some(out_height),
            },
            ::wgpu::Extent3d {
                width: out_width,
                height: out_height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_descriptor_has_a_format() {
        let plugin = WgpuPlugin::new();
        for descriptor in plugin.descriptors() {
            assert!(texture_format(descriptor.output_token_type).is_some());
            assert!(descriptor.token_type.bytes_per_pixel().is_some());
            assert!(descriptor.capabilities.contains(Capabilities::TRANSFER));
        }
    }

    #[test]
    fn rgba16_needs_a_feature() {
        let format = texture_format(TokenType::RGBA16).unwrap();
        assert!(
            format
                .required_features()
                .contains(::wgpu::Features::TEXTURE_FORMAT_16BIT_NORM)
        );
        assert!(texture_format(TokenType::RGB8).is_none());
    }
}
