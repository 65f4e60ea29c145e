//! Error types for kernel construction, resolution and request scoping.

use thiserror::Error;

/// Errors raised by strategies, kernels, the scope provider and the proxy.
#[derive(Error, Debug)]
pub enum KernelError {
    // Startup errors
    #[error("No resolution strategy set. Call StrategyRegistry::set_strategy during startup.")]
    UnconfiguredStrategy,

    #[error("Invalid binding configuration in module '{module}': {reason}")]
    BindingConfiguration { module: String, reason: String },

    #[error("No kernel published. ServiceProxy::configure must run before self-injecting objects are constructed.")]
    ContainerNotPublished,

    #[error("Kernel already published. ServiceProxy::configure may only run once per process.")]
    AlreadyConfigured,

    // Request-local errors
    #[error("No active request scope. Resolve request-scoped types inside a request or use an unscoped binding.")]
    NoActiveScope,

    #[error("No binding registered for {type_name}")]
    MissingBinding { type_name: String },

    #[error("Resolved instance is not a {type_name}")]
    TypeMismatch { type_name: String },

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl KernelError {
    /// Shorthand for a [`KernelError::BindingConfiguration`].
    pub fn binding(module: impl Into<String>, reason: impl Into<String>) -> Self {
        KernelError::BindingConfiguration {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error indicates a startup/configuration mistake.
    ///
    /// Fatal errors must abort initialization. The rest are local to the
    /// request that hit them and only fail that request.
    pub fn is_fatal(&self) -> bool {
        match self {
            KernelError::UnconfiguredStrategy
            | KernelError::BindingConfiguration { .. }
            | KernelError::ContainerNotPublished
            | KernelError::AlreadyConfigured
            | KernelError::Config(_) => true,
            KernelError::NoActiveScope
            | KernelError::MissingBinding { .. }
            | KernelError::TypeMismatch { .. } => false,
        }
    }
}
