//! Application framework based on [seedpod_di] dependency injection.
//!
//! Traditional applications start in the `main()` function and often explicitly initialize and pass
//! around various services or other components. With dependency injection in place, all
//! application components can become decoupled and form a dependency graph managed by the
//! container. This, in turn, requires something which owns the container and drives its lifecycle.
//! This crate provides it in the form of
//! [ApplicationContext](application_context::ApplicationContext), which also configures supporting
//! infrastructure, e.g. logging, and runs background [services](service).
//!
//! ```
//! use seedpod::application_context::ApplicationContext;
//! use seedpod::config::ApplicationConfig;
//! use seedpod_di::factory::PodFactoryBuilder;
//! use seedpod_di::Pod;
//!
//! #[derive(Pod)]
//! struct Repository;
//!
//! let factory = PodFactoryBuilder::new().build();
//! factory.add::<Repository>().unwrap();
//!
//! let context = ApplicationContext::with_config(factory, ApplicationConfig::default());
//! context.start().unwrap();
//!
//! let repository = context.get::<Repository>().unwrap();
//! assert!(std::sync::Arc::ptr_eq(&repository, &context.get::<Repository>().unwrap()));
//!
//! context.stop().unwrap();
//! assert!(!context.contains::<Repository>());
//! ```

pub mod application_context;
pub mod aware;
pub mod config;
pub mod service;
