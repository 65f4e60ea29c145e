//! kernel-scope - kernel resolution strategies and request-scoped injection
//!
//! Builds an object-graph kernel from composable modules through a
//! swappable, process-wide resolution strategy, and scopes resolved objects
//! to a single inbound request across async continuations.

// Lets derive-generated `::kernel_scope::...` paths resolve inside this crate
extern crate self as kernel_scope;

pub mod cli;
pub mod config;
pub mod context;
pub mod di;
pub mod error;
pub mod inject;
pub mod kernel;
pub mod layer;
pub mod proxy;
pub mod scope;
pub mod strategy;

// Re-export the DI surface at crate root for di-macros generated code
pub use di::{Construct, FromKernel, Inject, Module};
pub use error::KernelError;
pub use inject::{Injectable, Injector, SelfInjecting, Visibility};
pub use kernel::{Kernel, KernelSettings};
pub use layer::RequestScopeLayer;
pub use proxy::{ControllerCatalog, ServiceProxy};
pub use scope::{RequestScopeProvider, ScopeToken};
pub use strategy::{
    DefaultResolutionStrategy, PresetStrategy, ResolutionStrategy, ResolverSettings,
    StrategyRegistry,
};
