//! Post-processors are hooks run over every freshly created pod instance, before it's stored in its
//! scope and handed out. They can mutate the instance through interior mutability, or replace it
//! with a wrapper providing the same types.

use crate::instance_provider::{ErrorPtr, PodInstance};
use crate::pod::{Injectable, PodInstanceAnyPtr};
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;

pub type PostProcessorPtr = Arc<dyn PostProcessor + Send + Sync>;

/// Hook invoked for each created pod instance. Post-processors run in ascending order and each one
/// receives the result of the previous one.
#[cfg_attr(test, automock)]
pub trait PostProcessor {
    /// Processes given instance, returning the instance to use from now on. Returning an error
    /// aborts the instantiation of the pod.
    fn post_process(&self, pod: &PodInstance) -> Result<PodInstanceAnyPtr, ErrorPtr>;
}

impl Injectable for dyn PostProcessor + Send + Sync {}
