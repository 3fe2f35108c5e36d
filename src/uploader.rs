// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Uploaders move host buffers into destinations owned by a graphics context.

An [`Uploader`] owns at most one native instance, created by the plugin that advertises the
chosen identifier.  The plugin and the context are borrowed for `'a`; the registry stays the
sole owner of plugins and the caller stays the sole owner of the context.

# Teardown

The native instance must be released while the context is still usable, so dropping a bound
uploader is a contract violation and panics.  Call [`Uploader::clear`] first:

```
use plugins_and_uploads::backends::software::{SoftwareContext, SoftwarePlugin};
use plugins_and_uploads::compressor::{Capabilities, TokenType};
use plugins_and_uploads::registry::PluginRegistry;
use plugins_and_uploads::uploader::Uploader;

let mut registry = PluginRegistry::<SoftwareContext>::new();
registry.add(Box::new(SoftwarePlugin::standard())).unwrap();
let context = SoftwareContext::new();

let mut uploader = Uploader::with_constraint(
    &registry,
    TokenType::RGBA8,
    TokenType::RGBA8,
    Capabilities::TRANSFER,
    Some(&context),
);
assert!(uploader.is_valid());
uploader.clear();
```

A bound uploader dropped while its thread is already unwinding does not panic again.  Its
native instance is dropped without [`Plugin::destroy`], so whatever the plugin tracks per
instance is never released.

# Threading

Every uploader remembers the thread that created it.  Using it from any other thread panics.
*/

use std::fmt::{Debug, Formatter};

use crate::affinity::ThreadAffinity;
use crate::compressor::{Capabilities, Descriptor, DestinationHandle, Identifier, TokenType};
use crate::error::TransferError;
use crate::plugin::{NativeInstance, Plugin};
use crate::registry::PluginRegistry;
use crate::selector;

/// A live native instance and the plugin that created it.
struct Binding<'a, C: ?Sized> {
    plugin: &'a dyn Plugin<C>,
    instance: NativeInstance,
    descriptor: Descriptor,
}

pub struct Uploader<'a, C: ?Sized> {
    binding: Option<Binding<'a, C>>,
    context: Option<&'a C>,
    affinity: ThreadAffinity,
}

impl<'a, C: ?Sized> Uploader<'a, C> {
    /// An uploader with no plugin.  Never valid; always safe to drop.
    pub fn empty() -> Self {
        Uploader {
            binding: None,
            context: None,
            affinity: ThreadAffinity::current(),
        }
    }

    /**
    Instantiates the plugin providing `identifier`.

    A reserved identifier such as [`Identifier::NONE`] yields an empty uploader.

    # Panics

    For any other identifier, if `context` is `None`, if no plugin in `registry` provides
    `identifier`, or if the plugin misreports its descriptor or fails to instantiate.
    */
    pub fn with_identifier(
        registry: &'a PluginRegistry<C>,
        identifier: Identifier,
        context: Option<&'a C>,
    ) -> Self {
        if identifier.is_none() {
            return Self::empty();
        }
        assert!(
            context.is_some(),
            "Uploader {identifier} needs a context"
        );
        let Some(plugin) = registry.find_plugin(identifier) else {
            panic!("No plugin provides uploader {identifier}");
        };

        let descriptor = plugin.find_descriptor(identifier);
        assert_eq!(
            descriptor.identifier, identifier,
            "Plugin returned the wrong descriptor"
        );
        assert!(
            descriptor.capabilities.contains(Capabilities::TRANSFER),
            "Uploader {identifier} has no transfer capability"
        );
        let Some(instance) = plugin.instantiate(identifier) else {
            panic!("Plugin failed to instantiate uploader {identifier}");
        };

        logwise::info_sync!(
            "Instantiated uploader of type {identifier}",
            identifier = logwise::privacy::LogIt(&identifier)
        );
        Uploader {
            binding: Some(Binding {
                plugin,
                instance,
                descriptor,
            }),
            context,
            affinity: ThreadAffinity::current(),
        }
    }

    /**
    Instantiates the fastest plugin converting `token_type` into `output_token_type` with at
    least `capabilities` that is compatible with `context`.

    If nothing matches, the uploader is empty.  This is not an error; check [`Self::is_valid`].
    */
    pub fn with_constraint(
        registry: &'a PluginRegistry<C>,
        output_token_type: TokenType,
        token_type: TokenType,
        capabilities: Capabilities,
        context: Option<&'a C>,
    ) -> Self {
        let identifier =
            selector::choose(registry, output_token_type, token_type, capabilities, context);
        Self::with_identifier(registry, identifier, context)
    }

    /// True if bound and the plugin still accepts the bound context.
    ///
    /// Compatibility is asked fresh on every call.
    pub fn is_valid(&self) -> bool {
        self.affinity.verify();
        match (&self.binding, self.context) {
            (Some(binding), Some(context)) => binding
                .plugin
                .is_compatible(binding.descriptor.identifier, context),
            _ => false,
        }
    }

    /// True if bound to `identifier`.  Does not consult the context.
    pub fn matches_identifier(&self, identifier: Identifier) -> bool {
        self.affinity.verify();
        self.binding
            .as_ref()
            .is_some_and(|binding| binding.descriptor.identifier == identifier)
    }

    /// True if valid and the bound descriptor meets the request exactly (tokens) or better
    /// (capabilities).
    pub fn satisfies(
        &self,
        output_token_type: TokenType,
        token_type: TokenType,
        capabilities: Capabilities,
    ) -> bool {
        self.is_valid()
            && self
                .descriptor()
                .satisfies(output_token_type, token_type, capabilities)
    }

    /// The bound descriptor, or [`Descriptor::EMPTY`].
    pub fn descriptor(&self) -> Descriptor {
        self.affinity.verify();
        self.binding
            .as_ref()
            .map_or(Descriptor::EMPTY, |binding| binding.descriptor)
    }

    /// Exchanges everything, including the thread tag, with `other`.
    pub fn swap(&mut self, other: &mut Self) {
        self.affinity.verify();
        other.affinity.verify();
        std::mem::swap(self, other);
    }

    /// Destroys the native instance, if any, and returns to the empty state.
    pub fn clear(&mut self) {
        self.affinity.verify();
        if let Some(binding) = self.binding.take() {
            let identifier = binding.descriptor.identifier;
            binding.plugin.destroy(binding.instance);
            logwise::info_sync!(
                "Destroyed uploader of type {identifier}",
                identifier = logwise::privacy::LogIt(&identifier)
            );
        }
        self.context = None;
    }

    /**
    Transfers `buffer` into `destination` through the bound plugin.

    `in_dims` and `out_dims` are `(x, width, y, height)`.  Errors come from the plugin and are
    returned as-is.

    # Panics

    If the uploader is not [valid](Self::is_valid).
    */
    pub fn upload(
        &mut self,
        buffer: &[u8],
        in_dims: &[u64; 4],
        flags: Capabilities,
        out_dims: &[u64; 4],
        destination: DestinationHandle,
    ) -> Result<(), TransferError> {
        self.affinity.verify();
        match (self.binding.as_mut(), self.context) {
            (Some(binding), Some(context))
                if binding
                    .plugin
                    .is_compatible(binding.descriptor.identifier, context) =>
            {
                let plugin = binding.plugin;
                let result = plugin.transfer(
                    &mut binding.instance,
                    binding.descriptor.identifier,
                    context,
                    buffer,
                    in_dims,
                    flags,
                    out_dims,
                    destination,
                );
                if let Err(e) = &result {
                    logwise::warn_sync!(
                        "Upload through {identifier} failed: {err}",
                        identifier = logwise::privacy::LogIt(&binding.descriptor.identifier),
                        err = logwise::privacy::LogIt(&e)
                    );
                }
                result
            }
            _ => panic!("Uploader::upload called on an invalid uploader"),
        }
    }
}

impl<'a, C: ?Sized> Default for Uploader<'a, C> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a, C: ?Sized> Drop for Uploader<'a, C> {
    fn drop(&mut self) {
        //already unwinding; don't turn it into an abort
        if self.binding.is_some() && !std::thread::panicking() {
            self.affinity.verify();
            panic!("Clear uploader while the context is still active");
        }
    }
}

impl<'a, C: ?Sized> Debug for Uploader<'a, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field(
                "descriptor",
                &self
                    .binding
                    .as_ref()
                    .map_or(Descriptor::EMPTY, |binding| binding.descriptor),
            )
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::software::{SoftwareContext, SoftwarePlugin};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> PluginRegistry<SoftwareContext> {
        registry_counting().0
    }

    fn registry_counting() -> (PluginRegistry<SoftwareContext>, Arc<AtomicUsize>) {
        let plugin = SoftwarePlugin::new(vec![
            Descriptor {
                identifier: Identifier::new(7),
                output_token_type: TokenType::RGBA8,
                token_type: TokenType::RGBA8,
                capabilities: Capabilities::TRANSFER,
                speed: 2.0,
            },
            Descriptor {
                identifier: Identifier::new(11),
                output_token_type: TokenType::RGBA8,
                token_type: TokenType::RGBA8,
                capabilities: Capabilities::COMPRESS,
                speed: 9.0,
            },
        ]);
        let live = plugin.instance_counter();
        let mut registry = PluginRegistry::<SoftwareContext>::new();
        registry.add(Box::new(plugin)).unwrap();
        (registry, live)
    }

    #[test]
    fn empty_is_never_valid() {
        let uploader = Uploader::<SoftwareContext>::empty();
        assert!(!uploader.is_valid());
        assert!(!uploader.matches_identifier(Identifier::NONE));
        assert_eq!(uploader.descriptor(), Descriptor::EMPTY);
    }

    #[test]
    fn none_identifier_yields_empty_without_context() {
        let registry = registry();
        let uploader = Uploader::with_identifier(&registry, Identifier::NONE, None);
        assert!(!uploader.is_valid());
    }

    #[test]
    #[should_panic(expected = "needs a context")]
    fn missing_context_is_fatal() {
        let registry = registry();
        let _uploader = Uploader::with_identifier(&registry, Identifier::new(7), None);
    }

    #[test]
    #[should_panic(expected = "No plugin provides")]
    fn unknown_identifier_is_fatal() {
        let registry = registry();
        let context = SoftwareContext::new();
        let _uploader = Uploader::with_identifier(&registry, Identifier::new(99), Some(&context));
    }

    #[test]
    #[should_panic(expected = "no transfer capability")]
    fn identifier_without_transfer_is_fatal() {
        let registry = registry();
        let context = SoftwareContext::new();
        let _uploader = Uploader::with_identifier(&registry, Identifier::new(11), Some(&context));
    }

    /// Advertises one transferring descriptor and then misbehaves about it.
    struct Scripted {
        descriptors: [Descriptor; 1],
        reports: Descriptor,
        instantiates: bool,
    }

    fn advertised() -> Descriptor {
        Descriptor {
            identifier: Identifier::new(7),
            output_token_type: TokenType::RGBA8,
            token_type: TokenType::RGBA8,
            capabilities: Capabilities::TRANSFER,
            speed: 1.0,
        }
    }

    fn scripted(reports: Descriptor, instantiates: bool) -> PluginRegistry<SoftwareContext> {
        let mut registry = PluginRegistry::<SoftwareContext>::new();
        registry
            .add(Box::new(Scripted {
                descriptors: [advertised()],
                reports,
                instantiates,
            }))
            .unwrap();
        registry
    }

    impl Plugin<SoftwareContext> for Scripted {
        fn descriptors(&self) -> &[Descriptor] {
            &self.descriptors
        }
        fn find_descriptor(&self, _identifier: Identifier) -> Descriptor {
            self.reports
        }
        fn instantiate(&self, _identifier: Identifier) -> Option<NativeInstance> {
            self.instantiates.then(|| Box::new(()) as NativeInstance)
        }
        fn destroy(&self, _instance: NativeInstance) {}
        fn is_compatible(&self, identifier: Identifier, _context: &SoftwareContext) -> bool {
            self.implements(identifier)
        }
        fn transfer(
            &self,
            _instance: &mut NativeInstance,
            _identifier: Identifier,
            _context: &SoftwareContext,
            _buffer: &[u8],
            _in_dims: &[u64; 4],
            _flags: Capabilities,
            _out_dims: &[u64; 4],
            _destination: DestinationHandle,
        ) -> Result<(), TransferError> {
            Ok(())
        }
    }

    #[test]
    #[should_panic(expected = "Plugin returned the wrong descriptor")]
    fn misreported_descriptor_is_fatal() {
        let reports = Descriptor {
            identifier: Identifier::new(8),
            ..advertised()
        };
        let registry = scripted(reports, true);
        let context = SoftwareContext::new();
        let _uploader = Uploader::with_identifier(&registry, Identifier::new(7), Some(&context));
    }

    #[test]
    #[should_panic(expected = "Plugin failed to instantiate")]
    fn failed_instantiation_is_fatal() {
        let registry = scripted(advertised(), false);
        let context = SoftwareContext::new();
        let _uploader = Uploader::with_identifier(&registry, Identifier::new(7), Some(&context));
    }

    #[test]
    #[should_panic(expected = "Clear uploader")]
    fn dropping_bound_uploader_is_fatal() {
        let registry = registry();
        let context = SoftwareContext::new();
        let _uploader = Uploader::with_identifier(&registry, Identifier::new(7), Some(&context));
    }

    #[test]
    #[should_panic(expected = "invalid uploader")]
    fn upload_on_empty_is_fatal() {
        let mut uploader = Uploader::<SoftwareContext>::empty();
        let _ = uploader.upload(
            &[],
            &[0, 0, 0, 0],
            Capabilities::DATA_2D,
            &[0, 0, 0, 0],
            DestinationHandle(1),
        );
    }

    #[test]
    fn validity_follows_context() {
        let registry = registry();
        let context = SoftwareContext::new();
        let mut uploader = Uploader::with_identifier(&registry, Identifier::new(7), Some(&context));
        assert!(uploader.is_valid());
        context.set_lost(true);
        assert!(!uploader.is_valid());
        //still bound, just not usable
        assert!(uploader.matches_identifier(Identifier::new(7)));
        context.set_lost(false);
        assert!(uploader.is_valid());
        uploader.clear();
    }

    #[test]
    fn unwinding_past_bound_uploader_skips_destroy() {
        let (registry, live) = registry_counting();
        let context = SoftwareContext::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _uploader =
                Uploader::with_identifier(&registry, Identifier::new(7), Some(&context));
            panic!("unrelated failure");
        }));
        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"unrelated failure"));
        assert_eq!(live.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_destroys_through_plugin() {
        let (registry, live) = registry_counting();
        let context = SoftwareContext::new();
        let mut uploader = Uploader::with_identifier(&registry, Identifier::new(7), Some(&context));
        assert_eq!(live.load(Ordering::SeqCst), 1);
        uploader.clear();
        assert_eq!(live.load(Ordering::SeqCst), 0);
        uploader.clear();
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert_eq!(uploader.descriptor(), Descriptor::EMPTY);
    }
}
