//! Fluent builders for samplers and suites

use crate::assertion::Assertion;
use crate::configure_element::ConfigureNode;
use crate::extractor::Extractor;
use crate::node::{ElementMeta, Node};
use crate::processor::Processor;
use crate::sampler::Sampler;
use crate::suite::Suite;
use ryze_interfaces::ProtocolAdapter;
use serde_json::Value;
use std::sync::Arc;

impl<A: ProtocolAdapter> Sampler<A> {
    pub fn builder(adapter: Arc<A>) -> SamplerBuilder<A>
    where
        A::Config: Default,
    {
        SamplerBuilder::new(adapter)
    }
}

/// Builder for [`Sampler`]
///
/// Extractors and assertions are validated when the sampler runs, so a bad
/// definition surfaces as a broken result rather than a builder error.
pub struct SamplerBuilder<A: ProtocolAdapter> {
    meta: ElementMeta,
    adapter: Arc<A>,
    config: A::Config,
    configure_elements: Vec<Arc<dyn ConfigureNode>>,
    preprocessors: Vec<Processor>,
    postprocessors: Vec<Processor>,
    extractors: Vec<Extractor>,
    assertions: Vec<Assertion>,
}

impl<A: ProtocolAdapter> SamplerBuilder<A> {
    pub fn new(adapter: Arc<A>) -> Self
    where
        A::Config: Default,
    {
        Self::with_config(adapter, A::Config::default())
    }

    pub fn with_config(adapter: Arc<A>, config: A::Config) -> Self {
        Self {
            meta: ElementMeta::new(adapter.protocol()),
            adapter,
            config,
            configure_elements: Vec::new(),
            preprocessors: Vec::new(),
            postprocessors: Vec::new(),
            extractors: Vec::new(),
            assertions: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.meta.title = title.into();
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.meta.disabled = disabled;
        self
    }

    /// Edit the local configuration in place
    pub fn config(mut self, configurator: impl FnOnce(&mut A::Config)) -> Self {
        configurator(&mut self.config);
        self
    }

    pub fn configure_element(mut self, element: impl ConfigureNode + 'static) -> Self {
        self.configure_elements.push(Arc::new(element));
        self
    }

    pub fn preprocessor(mut self, processor: Processor) -> Self {
        self.preprocessors.push(processor);
        self
    }

    pub fn postprocessor(mut self, processor: Processor) -> Self {
        self.postprocessors.push(processor);
        self
    }

    pub fn extractor(mut self, extractor: Extractor) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn build(self) -> Sampler<A> {
        Sampler {
            meta: self.meta,
            adapter: self.adapter,
            config: self.config,
            configure_elements: self.configure_elements,
            preprocessors: self.preprocessors,
            postprocessors: self.postprocessors,
            extractors: self.extractors,
            assertions: self.assertions,
        }
    }
}

impl Suite {
    pub fn builder(title: impl Into<String>) -> SuiteBuilder {
        SuiteBuilder::new(title)
    }
}

/// Builder for [`Suite`]
#[derive(Debug)]
pub struct SuiteBuilder {
    meta: ElementMeta,
    variables: Vec<(String, Value)>,
    configure_elements: Vec<Arc<dyn ConfigureNode>>,
    preprocessors: Vec<Processor>,
    children: Vec<Arc<dyn Node>>,
    postprocessors: Vec<Processor>,
}

impl SuiteBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            meta: ElementMeta::new(title),
            variables: Vec::new(),
            configure_elements: Vec::new(),
            preprocessors: Vec::new(),
            children: Vec::new(),
            postprocessors: Vec::new(),
        }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.meta.disabled = disabled;
        self
    }

    /// Variable defined in the suite's scope; templates resolve on entry
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.push((name.into(), value.into()));
        self
    }

    pub fn configure_element(mut self, element: impl ConfigureNode + 'static) -> Self {
        self.configure_elements.push(Arc::new(element));
        self
    }

    pub fn preprocessor(mut self, processor: Processor) -> Self {
        self.preprocessors.push(processor);
        self
    }

    pub fn postprocessor(mut self, processor: Processor) -> Self {
        self.postprocessors.push(processor);
        self
    }

    pub fn child(mut self, node: impl Node + 'static) -> Self {
        self.children.push(Arc::new(node));
        self
    }

    pub fn child_arc(mut self, node: Arc<dyn Node>) -> Self {
        self.children.push(node);
        self
    }

    pub fn build(self) -> Suite {
        Suite {
            meta: self.meta,
            variables: self.variables,
            configure_elements: self.configure_elements,
            preprocessors: self.preprocessors,
            children: self.children,
            postprocessors: self.postprocessors,
        }
    }
}
