//! # Ryze Engine
//!
//! Runs trees of test elements: suites, protocol samplers with their
//! processors, extractors and assertions.
//!
//! ## Quick start
//!
//! ```ignore
//! let adapter = Arc::new(HttpAdapter::new(HttpConfig::default())?);
//! let sampler = Sampler::builder(adapter)
//!     .title("get user")
//!     .config(|c| c.path = Some("/user/${id}".into()))
//!     .assertion(Assertion::status(Rule::Equals, 200))
//!     .build();
//!
//! let mut session = Session::builder().variable("id", 1).build();
//! let result = session.run(&sampler).await;
//! ```

pub mod assertion;
pub mod builder;
pub mod comparator;
pub mod configure_element;
pub mod error;
pub mod extractor;
pub mod lifecycle;
pub mod listener;
pub mod node;
pub mod processor;
pub mod registry;
pub mod sampler;
pub mod session;
pub mod suite;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use assertion::{Accessor, Assertion, Rule};
pub use builder::{SamplerBuilder, SuiteBuilder};
pub use configure_element::{ConfigureElement, ConfigureNode};
pub use error::{RegistryError, RegistryResult};
pub use extractor::Extractor;
pub use lifecycle::Lifecycle;
pub use listener::TracingListener;
pub use node::{ElementMeta, Invocation, Node};
pub use processor::{is_truthy, Processor};
pub use registry::{ElementRegistry, NodeDocument};
pub use sampler::Sampler;
pub use session::{Runtime, Session, SessionBuilder, SessionId};
pub use suite::Suite;
