// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Best-match selection over a [`PluginRegistry`].

use crate::compressor::{Capabilities, Descriptor, Identifier, TokenType};
use crate::plugin::Plugin;
use crate::registry::{PluginRegistry, PluginVisitor, VisitorResult};

/// Remembers the fastest descriptor seen so far that meets the request.
struct Finder<'c, C: ?Sized> {
    output_token_type: TokenType,
    token_type: TokenType,
    capabilities: Capabilities,
    context: Option<&'c C>,
    current: Option<Descriptor>,
}

impl<'c, C: ?Sized> PluginVisitor<C> for Finder<'c, C> {
    fn visit(&mut self, plugin: &dyn Plugin<C>, descriptor: &Descriptor) -> VisitorResult {
        //NaN never compares greater, so it could never be displaced
        let faster = !descriptor.speed.is_nan()
            && self
                .current
                .as_ref()
                .is_none_or(|current| current.speed < descriptor.speed);
        if faster
            && descriptor.satisfies(self.output_token_type, self.token_type, self.capabilities)
            && self
                .context
                .is_some_and(|context| plugin.is_compatible(descriptor.identifier, context))
        {
            self.current = Some(*descriptor);
        }
        //a later descriptor may always be faster
        VisitorResult::Continue
    }
}

/**
Finds the fastest plugin converting `token_type` into `output_token_type` with at least
`capabilities`, usable with `context`.

Returns [`Identifier::NONE`] if nothing matches, which is an ordinary outcome.  Among equally
fast candidates the first one visited wins, so the result is stable for an unchanged registry.
*/
pub fn choose<C: ?Sized>(
    registry: &PluginRegistry<C>,
    output_token_type: TokenType,
    token_type: TokenType,
    capabilities: Capabilities,
    context: Option<&C>,
) -> Identifier {
    let mut finder = Finder {
        output_token_type,
        token_type,
        capabilities,
        context,
        current: None,
    };
    registry.accept(&mut finder);
    let chosen = finder
        .current
        .map_or(Identifier::NONE, |descriptor| descriptor.identifier);
    logwise::trace_sync!(
        "choose {output} <- {input} picked {chosen}",
        output = logwise::privacy::LogIt(&output_token_type),
        input = logwise::privacy::LogIt(&token_type),
        chosen = logwise::privacy::LogIt(&chosen)
    );
    chosen
}
