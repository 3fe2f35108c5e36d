// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Holds every known plugin and lets visitors walk their descriptors.

use crate::compressor::{Descriptor, Identifier};
use crate::plugin::Plugin;

/// Returned by a visitor after each visit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VisitorResult {
    Continue,
    Terminate,
}

/// A strategy run over every (plugin, descriptor) pair in a registry.
pub trait PluginVisitor<C: ?Sized> {
    fn visit(&mut self, plugin: &dyn Plugin<C>, descriptor: &Descriptor) -> VisitorResult;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Identifier {0:?} is reserved")]
    ReservedIdentifier(Identifier),
    #[error("Identifier {0} is already provided by another plugin")]
    DuplicateIdentifier(Identifier),
    #[error("Identifier {0} advertises a speed that is not a finite number")]
    InvalidSpeed(Identifier),
}

/// Sole owner of the loaded plugins.
///
/// Plugins are visited in the order they were added, and each plugin's descriptors in the
/// order the plugin lists them.  That order is the tie-break for selection.
pub struct PluginRegistry<C: ?Sized> {
    plugins: Vec<Box<dyn Plugin<C>>>,
}

impl<C: ?Sized> PluginRegistry<C> {
    pub fn new() -> Self {
        PluginRegistry {
            plugins: Vec::new(),
        }
    }

    /// Registers a plugin.
    ///
    /// Fails if any advertised identifier is reserved or already provided by a registered plugin,
    /// or if a descriptor's speed is NaN or infinite.
    pub fn add(&mut self, plugin: Box<dyn Plugin<C>>) -> Result<(), RegistryError> {
        for descriptor in plugin.descriptors() {
            let identifier = descriptor.identifier;
            let rejection = if identifier.is_none() {
                Some(RegistryError::ReservedIdentifier(identifier))
            } else if self.find_plugin(identifier).is_some() {
                Some(RegistryError::DuplicateIdentifier(identifier))
            } else if !descriptor.speed.is_finite() {
                Some(RegistryError::InvalidSpeed(identifier))
            } else {
                None
            };
            if let Some(rejection) = rejection {
                logwise::warn_sync!(
                    "Rejected plugin: {err}",
                    err = logwise::privacy::LogIt(&rejection)
                );
                return Err(rejection);
            }
        }
        logwise::info_sync!(
            "Registered plugin with {count} descriptors",
            count = logwise::privacy::LogIt(&plugin.descriptors().len())
        );
        self.plugins.push(plugin);
        Ok(())
    }

    /// The plugin advertising `identifier`, if any.
    pub fn find_plugin(&self, identifier: Identifier) -> Option<&dyn Plugin<C>> {
        self.plugins
            .iter()
            .find(|p| p.implements(identifier))
            .map(|p| p.as_ref())
    }

    /// Visits every (plugin, descriptor) pair until the visitor asks to stop.
    ///
    /// Returns [`VisitorResult::Terminate`] if the visitor stopped early.
    pub fn accept(&self, visitor: &mut dyn PluginVisitor<C>) -> VisitorResult {
        for plugin in &self.plugins {
            for descriptor in plugin.descriptors() {
                if visitor.visit(plugin.as_ref(), descriptor) == VisitorResult::Terminate {
                    return VisitorResult::Terminate;
                }
            }
        }
        VisitorResult::Continue
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl<C: ?Sized> Default for PluginRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> std::fmt::Debug for PluginRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.len())
            .finish()
    }
}
