//! Descriptions of pod constructor parameters.

use crate::pod::TypeKey;
use crate::pod_registry::PodDefinition;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Shape of an injected parameter.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DependencyKind {
    /// Exactly one pod, after applying qualifiers and the primary tie-break.
    Single,
    /// At most one pod; nothing is injected when no candidate exists.
    Optional,
    /// All candidates, in registration order.
    List,
    /// All candidates, keyed by pod name.
    Map,
}

/// Predicate used to narrow down candidates for a dependency.
#[derive(Clone)]
pub struct Qualifier(Arc<dyn Fn(&PodDefinition) -> bool + Send + Sync>);

impl Qualifier {
    pub fn new<F: Fn(&PodDefinition) -> bool + Send + Sync + 'static>(predicate: F) -> Self {
        Self(Arc::new(predicate))
    }

    /// Qualifier matching only pods with the given name.
    pub fn named<T: ToString>(name: T) -> Self {
        let name = name.to_string();
        Self::new(move |definition| definition.name == name)
    }

    #[inline]
    pub fn matches(&self, definition: &PodDefinition) -> bool {
        (self.0)(definition)
    }
}

impl Debug for Qualifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Qualifier")
    }
}

/// Describes a single constructor parameter of a pod.
#[derive(Clone, Debug)]
pub struct DependencyDescriptor {
    /// Name of the parameter (struct field or function argument).
    pub parameter: String,

    /// Requested type.
    pub type_key: TypeKey,

    pub kind: DependencyKind,

    /// Inject the pod with this exact name, instead of searching by type.
    pub name: Option<String>,

    /// Predicates applied in order to narrow candidates.
    pub qualifiers: Vec<Qualifier>,

    /// The parameter has a fallback value, so a missing pod is not an error.
    pub has_default: bool,
}

impl DependencyDescriptor {
    pub fn new<T: ToString>(parameter: T, type_key: TypeKey, kind: DependencyKind) -> Self {
        Self {
            parameter: parameter.to_string(),
            type_key,
            kind,
            name: None,
            qualifiers: vec![],
            has_default: false,
        }
    }

    pub fn with_name<T: ToString>(mut self, name: T) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    #[inline]
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, DependencyKind::List | DependencyKind::Map)
    }

    /// Can the dependency be satisfied by nothing?
    #[inline]
    pub fn is_optional(&self) -> bool {
        self.kind == DependencyKind::Optional || self.has_default
    }
}
