//! Dependency injection container with type-indexed resolution.
//!
//! Objects managed by the container are called pods. Each pod has a name, a declared type and a
//! set of additional types it can be requested as (`dyn Trait` capabilities). When a pod is
//! requested, the [factory](factory::PodFactory) resolves its constructor dependencies by type,
//! optionally narrowed down by name, [qualifiers](dependency::Qualifier) or the primary flag,
//! creates missing instances recursively and stores them in the [scope](scope) matching the pod's
//! lifetime. Dependency cycles are detected and reported with the full path.
//!
//! Pods are usually declared with derive macros and registered with
//! [PodFactory::add](factory::PodFactory::add) or [PodFactory::scan](factory::PodFactory::scan):
//!
//! ```
//! use seedpod_di::factory::PodFactoryBuilder;
//! use seedpod_di::pod::PodInstancePtr;
//! use seedpod_di::{injectable, pod_alias, pod_factory, Pod};
//!
//! #[injectable]
//! trait Greeter {
//!     fn greet(&self) -> String;
//! }
//!
//! #[derive(Pod)]
//! struct EnglishGreeter;
//!
//! #[pod_alias]
//! impl Greeter for EnglishGreeter {
//!     fn greet(&self) -> String {
//!         "Hello".to_string()
//!     }
//! }
//!
//! #[injectable]
//! struct Welcome(String);
//!
//! #[pod_factory]
//! fn welcome(greeter: PodInstancePtr<dyn Greeter + Send + Sync>) -> Welcome {
//!     Welcome(format!("{}, world!", greeter.greet()))
//! }
//!
//! let factory = PodFactoryBuilder::new().build();
//! factory.add::<EnglishGreeter>().unwrap();
//! factory.add_factory(welcome).unwrap();
//!
//! assert_eq!(factory.get::<Welcome>().unwrap().0, "Hello, world!");
//! ```
//!
//! ### Features
//!
//! * `derive` - re-export the derive macros (enabled by default)

pub mod context_id;
pub mod dependency;
mod error;
pub mod factory;
pub mod instance_provider;
pub mod pod;
pub mod pod_registry;
pub mod post_processor;
pub mod resolver;
pub mod scope;

pub use error::{PodCreationError, PodInstanceProviderError, PodRegistryError};

#[cfg(feature = "derive")]
pub use seedpod_di_derive::{injectable, pod_alias, pod_factory, Pod};
