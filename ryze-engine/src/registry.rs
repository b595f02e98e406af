//! Keyword registry: builds executable elements from a document tree
//!
//! A document node is a JSON object whose `testclass` field names a
//! registered keyword. Loading the tree from YAML or JSON files is left to
//! the caller; the registry only binds already-parsed values.
//!
//! ```yaml
//! testclass: suite
//! title: users
//! variables: { name: alice }
//! configelements:
//!   - { testclass: http, config: { host: api.local } }
//! children:
//!   - testclass: http
//!     title: create ${name}
//!     config: { method: POST, path: /user, body: { name: "${name}" } }
//!     extractors: [ { type: json, ref_name: id, path: $.data.id } ]
//!     validators: [ { type: status, rule: "==", expected: 201 } ]
//! ```

use crate::assertion::Assertion;
use crate::configure_element::{ConfigureElement, ConfigureNode};
use crate::error::{RegistryError, RegistryResult};
use crate::extractor::Extractor;
use crate::node::{ElementMeta, Node};
use crate::processor::Processor;
use crate::sampler::Sampler;
use crate::suite::Suite;
use ryze_interfaces::ProtocolAdapter;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Keywords bound to the built-in suite element
pub const SUITE_KEYWORDS: &[&str] = &["suite", "test_suite", "testsuite"];

/// Builds a runnable node from a parsed document
pub type NodeFactory = Arc<dyn Fn(&ElementRegistry, &NodeDocument) -> RegistryResult<Arc<dyn Node>> + Send + Sync>;

/// Builds a configure element from a parsed document
pub type ConfigureFactory = Arc<dyn Fn(&NodeDocument) -> RegistryResult<Arc<dyn ConfigureNode>> + Send + Sync>;

/// Fields shared by every document node
#[derive(Debug, Clone, Deserialize)]
pub struct NodeDocument {
    pub testclass: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default, alias = "configureelements", alias = "configure_elements")]
    pub configelements: Vec<Value>,
    #[serde(default)]
    pub preprocessors: Vec<Value>,
    #[serde(default)]
    pub postprocessors: Vec<Value>,
    #[serde(default)]
    pub extractors: Vec<Extractor>,
    #[serde(default, alias = "assertions")]
    pub validators: Vec<Assertion>,
    #[serde(default)]
    pub children: Vec<Value>,
    #[serde(default)]
    pub variables: Map<String, Value>,
    /// Only meaningful on processors
    #[serde(default)]
    pub condition: Option<String>,
    /// Only meaningful on processors
    #[serde(default, rename = "async")]
    pub run_async: bool,
    #[serde(default)]
    pub disabled: bool,
}

impl NodeDocument {
    pub fn keyword(&self) -> String {
        normalize(&self.testclass)
    }

    fn meta(&self) -> ElementMeta {
        let mut meta = ElementMeta::new(self.title.clone().unwrap_or_else(|| self.keyword()));
        meta.disabled = self.disabled;
        meta
    }

    /// Protocol configuration with the node-level `ref` folded in
    pub fn protocol_config<C: DeserializeOwned>(&self) -> RegistryResult<C> {
        let mut value = self.config.clone().unwrap_or_else(|| Value::Object(Map::new()));
        match (&self.reference, &mut value) {
            (Some(reference), Value::Object(map)) => {
                map.entry("ref")
                    .or_insert_with(|| Value::String(reference.clone()));
            }
            (_, Value::Object(_)) => {}
            _ => return Err(RegistryError::malformed(&self.testclass, "config must be an object")),
        }
        serde_json::from_value(value).map_err(|e| RegistryError::malformed(&self.testclass, e))
    }

    fn validate_checks(&self) -> RegistryResult<()> {
        for extractor in &self.extractors {
            extractor.validate()?;
        }
        for assertion in &self.validators {
            assertion.validate()?;
        }
        Ok(())
    }
}

fn normalize(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// Maps `testclass` keywords to element factories
#[derive(Clone)]
pub struct ElementRegistry {
    nodes: HashMap<String, NodeFactory>,
    configure: HashMap<String, ConfigureFactory>,
}

impl ElementRegistry {
    /// Registry with the built-in suite keywords
    pub fn new() -> Self {
        let mut registry = Self {
            nodes: HashMap::new(),
            configure: HashMap::new(),
        };
        let suite: NodeFactory = Arc::new(build_suite);
        registry.register_node(SUITE_KEYWORDS, suite);
        registry
    }

    pub fn register_node(&mut self, keywords: &[&str], factory: NodeFactory) {
        for keyword in keywords {
            debug!("Registering node keyword '{}'", keyword);
            self.nodes.insert(normalize(keyword), Arc::clone(&factory));
        }
    }

    pub fn register_configure(&mut self, keywords: &[&str], factory: ConfigureFactory) {
        for keyword in keywords {
            debug!("Registering configure keyword '{}'", keyword);
            self.configure.insert(normalize(keyword), Arc::clone(&factory));
        }
    }

    /// Bind protocol keywords to both a sampler and a configure element
    /// backed by `adapter`
    pub fn register_protocol<A>(&mut self, keywords: &[&str], adapter: Arc<A>)
    where
        A: ProtocolAdapter,
        A::Config: DeserializeOwned,
    {
        let sampler: NodeFactory = Arc::new(move |registry: &ElementRegistry, document: &NodeDocument| {
            build_sampler(&adapter, registry, document)
        });

        let configure: ConfigureFactory =
            Arc::new(|document: &NodeDocument| -> RegistryResult<Arc<dyn ConfigureNode>> {
                let item = document.protocol_config::<A::Config>()?;
                let element = ConfigureElement::new(document.meta().title, item).disabled(document.disabled);
                Ok(Arc::new(element))
            });

        self.register_node(keywords, sampler);
        self.register_configure(keywords, configure);
    }

    pub fn contains(&self, keyword: &str) -> bool {
        let keyword = normalize(keyword);
        self.nodes.contains_key(&keyword) || self.configure.contains_key(&keyword)
    }

    /// Registered node keywords, sorted
    pub fn keywords(&self) -> Vec<&str> {
        let mut keywords: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        keywords.sort_unstable();
        keywords
    }

    /// Build a runnable element from a document node
    pub fn build(&self, document: &Value) -> RegistryResult<Arc<dyn Node>> {
        let document = parse(document)?;
        self.build_document(&document)
    }

    pub fn build_document(&self, document: &NodeDocument) -> RegistryResult<Arc<dyn Node>> {
        let keyword = document.keyword();
        match self.nodes.get(&keyword) {
            Some(factory) => factory(self, document),
            None if self.configure.contains_key(&keyword) => Err(RegistryError::WrongRole {
                keyword,
                expected: "runnable element",
            }),
            None => Err(RegistryError::UnknownKeyword(keyword)),
        }
    }

    /// Build a configure element from a document node
    pub fn build_configure(&self, document: &Value) -> RegistryResult<Arc<dyn ConfigureNode>> {
        let document = parse(document)?;
        let keyword = document.keyword();
        match self.configure.get(&keyword) {
            Some(factory) => factory(&document),
            None if self.nodes.contains_key(&keyword) => Err(RegistryError::WrongRole {
                keyword,
                expected: "configure element",
            }),
            None => Err(RegistryError::UnknownKeyword(keyword)),
        }
    }

    pub(crate) fn configure_elements(&self, documents: &[Value]) -> RegistryResult<Vec<Arc<dyn ConfigureNode>>> {
        documents.iter().map(|d| self.build_configure(d)).collect()
    }

    pub(crate) fn processors(&self, documents: &[Value]) -> RegistryResult<Vec<Processor>> {
        documents
            .iter()
            .map(|value| {
                let document = parse(value)?;
                let mut processor = Processor::new(self.build_document(&document)?).run_async(document.run_async);
                if let Some(condition) = document.condition.as_deref() {
                    processor = processor.when(condition);
                }
                Ok(processor)
            })
            .collect()
    }
}

impl Default for ElementRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ElementRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut configure: Vec<&str> = self.configure.keys().map(String::as_str).collect();
        configure.sort_unstable();
        f.debug_struct("ElementRegistry")
            .field("nodes", &self.keywords())
            .field("configure", &configure)
            .finish()
    }
}

fn parse(value: &Value) -> RegistryResult<NodeDocument> {
    let keyword = match value.get("testclass") {
        Some(Value::String(keyword)) if !keyword.trim().is_empty() => keyword.clone(),
        _ => return Err(RegistryError::MissingKeyword),
    };
    NodeDocument::deserialize(value).map_err(|e| RegistryError::malformed(&keyword, e))
}

fn build_sampler<A>(
    adapter: &Arc<A>,
    registry: &ElementRegistry,
    document: &NodeDocument,
) -> RegistryResult<Arc<dyn Node>>
where
    A: ProtocolAdapter,
    A::Config: DeserializeOwned,
{
    if !document.children.is_empty() {
        return Err(RegistryError::malformed(
            &document.testclass,
            "samplers cannot have children",
        ));
    }
    document.validate_checks()?;
    let sampler = Sampler {
        meta: document.meta(),
        adapter: Arc::clone(adapter),
        config: document.protocol_config::<A::Config>()?,
        configure_elements: registry.configure_elements(&document.configelements)?,
        preprocessors: registry.processors(&document.preprocessors)?,
        postprocessors: registry.processors(&document.postprocessors)?,
        extractors: document.extractors.clone(),
        assertions: document.validators.clone(),
    };
    Ok(Arc::new(sampler))
}

fn build_suite(registry: &ElementRegistry, document: &NodeDocument) -> RegistryResult<Arc<dyn Node>> {
    if !document.extractors.is_empty() || !document.validators.is_empty() {
        return Err(RegistryError::malformed(
            &document.testclass,
            "suites do not accept extractors or validators",
        ));
    }
    let suite = Suite {
        meta: document.meta(),
        variables: document
            .variables
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        configure_elements: registry.configure_elements(&document.configelements)?,
        preprocessors: registry.processors(&document.preprocessors)?,
        children: document
            .children
            .iter()
            .map(|child| registry.build(child))
            .collect::<RegistryResult<_>>()?,
        postprocessors: registry.processors(&document.postprocessors)?,
    };
    Ok(Arc::new(suite))
}
