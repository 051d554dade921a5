//! Index from requested types to registered pods.

use crate::pod::TypeKey;
use fxhash::FxHashMap;
use std::any::TypeId;

/// Maps every type in the capability sets of registered pods to the registration indices of
/// those pods. Indices for a given type are kept in ascending order, so lookups return candidates
/// in registration order.
#[derive(Default, Clone, Debug)]
pub struct TypeIndex {
    entries: FxHashMap<TypeId, Vec<usize>>,
}

impl TypeIndex {
    /// Adds given pod under every type it provides.
    pub fn register<I: IntoIterator<Item = TypeKey>>(&mut self, index: usize, capabilities: I) {
        for type_key in capabilities {
            let entries = self.entries.entry(type_key.id()).or_default();
            if let Err(position) = entries.binary_search(&index) {
                entries.insert(position, index);
            }
        }
    }

    /// Returns indices of pods providing the given type. An empty result is valid.
    #[inline]
    pub fn lookup(&self, type_key: TypeKey) -> &[usize] {
        self.entries
            .get(&type_key.id())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[inline]
    pub fn contains(&self, type_key: TypeKey) -> bool {
        !self.lookup(type_key).is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
