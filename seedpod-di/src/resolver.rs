//! Selection of pods for a requested type, name and qualifiers.

use crate::dependency::Qualifier;
use crate::error::PodInstanceProviderError;
use crate::pod::TypeKey;
use crate::pod_registry::type_index::TypeIndex;
use crate::pod_registry::{PodDefinition, PodRegistry};
use std::sync::Arc;

/// Read-only view over the registry and type index, answering which pods match a request.
#[derive(Clone, Copy)]
pub struct DependencyResolver<'a> {
    registry: &'a PodRegistry,
    type_index: &'a TypeIndex,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(registry: &'a PodRegistry, type_index: &'a TypeIndex) -> Self {
        Self {
            registry,
            type_index,
        }
    }

    /// Checks if any pod is registered under given name, regardless of type.
    #[inline]
    pub fn contains_name(&self, name: &str) -> bool {
        self.registry.contains_name(name)
    }

    /// Returns the pod with given name, if it provides the requested type.
    pub fn by_name(
        &self,
        type_key: TypeKey,
        name: &str,
    ) -> Result<&'a Arc<PodDefinition>, PodInstanceProviderError> {
        self.candidates(type_key, &[])
            .into_iter()
            .find(|definition| definition.name == name)
            .ok_or_else(|| PodInstanceProviderError::NoSuchPod {
                type_name: type_key.name(),
                name: Some(name.to_string()),
            })
    }

    /// Returns all pods providing the requested type, in registration order, narrowed down by
    /// each qualifier in turn.
    pub fn candidates(
        &self,
        type_key: TypeKey,
        qualifiers: &[Qualifier],
    ) -> Vec<&'a Arc<PodDefinition>> {
        let candidates: Vec<&'a Arc<PodDefinition>> = self
            .type_index
            .lookup(type_key)
            .iter()
            .filter_map(|index| self.registry.get(*index))
            .collect();

        qualifiers
            .iter()
            .fold(candidates, |candidates, qualifier| {
                candidates
                    .into_iter()
                    .filter(|definition| qualifier.matches(definition))
                    .collect()
            })
    }

    /// Returns the single pod for the requested type. Multiple candidates are narrowed down to the
    /// one marked as primary.
    pub fn resolve_unique(
        &self,
        type_key: TypeKey,
        qualifiers: &[Qualifier],
    ) -> Result<Option<&'a Arc<PodDefinition>>, PodInstanceProviderError> {
        let candidates = self.candidates(type_key, qualifiers);
        if candidates.len() <= 1 {
            return Ok(candidates.first().copied());
        }

        let mut primary = candidates.iter().filter(|definition| definition.is_primary);
        match (primary.next(), primary.next()) {
            (Some(definition), None) => Ok(Some(*definition)),
            _ => Err(PodInstanceProviderError::NoUniquePod {
                type_name: type_key.name(),
                candidates: candidates
                    .iter()
                    .map(|definition| definition.name.clone())
                    .collect(),
            }),
        }
    }
}
