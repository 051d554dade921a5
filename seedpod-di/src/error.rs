use crate::instance_provider::ErrorPtr;
use crate::pod::PodScope;
use itertools::Itertools;
use thiserror::Error;

fn describe_name(name: &Option<String>) -> String {
    name.as_ref()
        .map(|name| format!(" with name '{name}'"))
        .unwrap_or_default()
}

fn describe_candidates(candidates: &[String]) -> String {
    candidates
        .iter()
        .map(|candidate| format!("'{candidate}'"))
        .join(", ")
}

/// Errors related to resolving and creating pods.
#[derive(Error, Clone, Debug)]
pub enum PodInstanceProviderError {
    #[error("No pod found for type '{type_name}'{}", describe_name(.name))]
    NoSuchPod {
        type_name: &'static str,
        name: Option<String>,
    },
    #[error(
        "Multiple pods found for type '{type_name}': {}. Mark one as primary or provide a name/qualifier to disambiguate.",
        describe_candidates(.candidates)
    )]
    NoUniquePod {
        type_name: &'static str,
        candidates: Vec<String>,
    },
    #[error("Circular dependency detected: {}", .path.join(" -> "))]
    CircularDependencyGraphDetected { path: Vec<String> },
    #[error("Failed to instantiate pod '{pod}': {source}")]
    PodInstantiationFailed { pod: String, source: ErrorPtr },
    #[error("Pod '{pod}' requires '{type_name}' for parameter '{parameter}', but nothing can be injected")]
    UnexpectedDependencyTypeInjected {
        pod: String,
        parameter: String,
        type_name: &'static str,
    },
    #[error("Pod '{pod}' requested pod '{name}' for parameter '{parameter}', but it does not provide '{type_name}'")]
    UnexpectedNameInjected {
        pod: String,
        parameter: String,
        name: String,
        type_name: &'static str,
    },
    #[error("Post-processing of pod '{pod}' failed: {source}")]
    PostProcessingFailed { pod: String, source: ErrorPtr },
    #[error("Pod '{pod}' uses scope {scope}, which has no registered scope factory")]
    UnrecognizedScope { pod: String, scope: PodScope },
    #[error("Tried to downcast pod '{pod}' to incompatible type: {type_name}")]
    IncompatiblePod {
        pod: String,
        type_name: &'static str,
    },
}

/// Error returned by pod constructors. Dependency errors are propagated as-is, while errors from
/// user code get wrapped in [PodInstanceProviderError::PodInstantiationFailed].
#[derive(Error, Clone, Debug)]
pub enum PodCreationError {
    #[error(transparent)]
    Dependency(#[from] PodInstanceProviderError),
    #[error("{0}")]
    Constructor(ErrorPtr),
}

/// Errors related to pod registration.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum PodRegistryError {
    #[error("Cannot register a non-pod object: {0}")]
    CannotRegisterNonPodObject(String),
    #[error("Malformed pod '{name}': {reason}")]
    MalformedPod { name: String, reason: String },
    #[error("Pod name already exists: {0}")]
    DuplicatePodName(String),
}
