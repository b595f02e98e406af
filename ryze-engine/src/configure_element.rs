//! Configure elements: named, mergeable protocol configuration

use crate::node::ElementMeta;
use ryze_core::{ConfigureItem, Context};
use std::fmt;
use tracing::debug;

/// Anything that can place configuration into the current scope
pub trait ConfigureNode: Send + Sync + fmt::Debug {
    fn meta(&self) -> &ElementMeta;

    /// Register into the innermost scope of `ctx`
    fn register(&self, ctx: &mut Context);
}

/// Holds one protocol configure item under its reference name
///
/// The item is stored unevaluated; templates are resolved by the sampler
/// that finally uses it.
#[derive(Debug, Clone)]
pub struct ConfigureElement<C: ConfigureItem> {
    meta: ElementMeta,
    item: C,
}

impl<C: ConfigureItem> ConfigureElement<C> {
    pub fn new(title: impl Into<String>, item: C) -> Self {
        Self {
            meta: ElementMeta::new(title),
            item,
        }
    }

    /// Build the item from its default value through a configurator
    pub fn configure(title: impl Into<String>, configurator: impl FnOnce(&mut C)) -> Self
    where
        C: Default,
    {
        let mut item = C::default();
        configurator(&mut item);
        Self::new(title, item)
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.meta.disabled = disabled;
        self
    }

    pub fn item(&self) -> &C {
        &self.item
    }
}

impl<C: ConfigureItem> ConfigureNode for ConfigureElement<C> {
    fn meta(&self) -> &ElementMeta {
        &self.meta
    }

    fn register(&self, ctx: &mut Context) {
        if self.meta.disabled {
            debug!("Configure element '{}' is disabled", self.meta.title);
            return;
        }
        debug!(
            "Registering configure element '{}' as '{}'",
            self.meta.title,
            self.item.effective_ref()
        );
        ctx.register_config(self.item.clone());
    }
}
