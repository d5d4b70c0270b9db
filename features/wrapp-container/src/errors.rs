use std::sync::Arc;

use thiserror::Error;

use crate::types::DynError;

/// Errors while registering components, returned synchronously
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// `$import` points to an id that is not registered (yet)
    #[error("'{owner}' imports '{imported}', but no such component is registered")]
    ImportMissing { owner: String, imported: String },

    /// A creator string is not of the form `<module>#<member>`
    #[error("Invalid creator reference '{0}', expected '<module>#<member>'")]
    InvalidCreator(String),

    /// A JSON config or `$import` override could not be read
    #[error("Invalid config for '{id}': {reason}")]
    InvalidConfig { id: String, reason: String },

    /// A preloaded module could not bind the creator
    #[error(transparent)]
    Bind(#[from] BindError),

    /// The container was disposed, no more registrations possible
    #[error("The container has been disposed")]
    Disposed,
}

/// Errors when turning a declared creator into something callable
#[derive(Error, Debug, Clone)]
pub enum BindError {
    #[error("Module '{module}' has no export named '{member}'")]
    MissingExport { module: String, member: String },

    /// Classes can only be constructed, never called as a factory
    #[error("'{id}' is declared as factory, but its creator is a class")]
    ClassAsFactory { id: String },
}

/// Errors while resolving components
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("The container has been disposed")]
    Disposed,

    /// The module loader failed
    #[error("Loading {modules:?} failed - error: {error}")]
    LoadFailed {
        modules: Vec<String>,
        error: Arc<DynError>,
    },

    /// The module loader did not answer with one module per requested name
    #[error("Requested {requested} modules from the loader, but got {loaded}")]
    LoaderMismatch { requested: usize, loaded: usize },

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("'{0}' has no creator")]
    NoCreator(String),

    /// The creator is still a module member reference, its module never reached the loader
    #[error("Creator of '{0}' is not bound")]
    Unbound(String),

    /// A creator returned an error
    #[error("Creator for '{id}' failed - error: {error}")]
    CreatorFailed { id: String, error: Arc<DynError> },
}
