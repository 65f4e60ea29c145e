//! Dependency injection traits.
//!
//! This module provides the extraction traits the kernel and the derive
//! macros from `di-macros` are built on.
//!
//! # Overview
//!
//! - `FromKernel`: Trait for resolving a value out of a [`Kernel`]
//! - `Construct`: Types the kernel can build itself (`to_self()` bindings)
//! - `#[derive(Construct)]`: Generates `Construct` by resolving each field
//! - `#[derive(Inject)]`: Generates `Injectable` for post-construction injection
//! - `#[derive(Module)]`: Generates a `Module` binding each field as a constant
//!
//! # Example
//!
//! ```ignore
//! use kernel_scope::{Construct, Module};
//!
//! #[derive(Module)]
//! pub struct AppModule {
//!     pub pool: DatabasePool,
//! }
//!
//! #[derive(Construct)]
//! pub struct UserRepository {
//!     pool: Arc<DatabasePool>,  // resolved via FromKernel
//! }
//!
//! // Usage
//! let kernel = Kernel::new(settings, &[Arc::new(AppModule { pool })])?;
//! let repo = UserRepository::construct(&kernel)?;
//! ```

use std::sync::Arc;

use crate::error::KernelError;
use crate::kernel::Kernel;

/// Trait for resolving a value from a kernel.
///
/// This is the core trait for field-level dependency resolution. The derive
/// macros resolve every injected field through it.
pub trait FromKernel: Sized {
    fn from_kernel(kernel: &Kernel) -> Result<Self, KernelError>;
}

/// Required dependency: fails when no binding exists.
impl<T: Send + Sync + 'static> FromKernel for Arc<T> {
    fn from_kernel(kernel: &Kernel) -> Result<Self, KernelError> {
        kernel.get::<T>()
    }
}

/// Optional dependency: `None` when no binding exists, other errors propagate.
impl<T: Send + Sync + 'static> FromKernel for Option<Arc<T>> {
    fn from_kernel(kernel: &Kernel) -> Result<Self, KernelError> {
        kernel.try_get::<T>()
    }
}

/// Types the kernel can instantiate on its own (constructor injection).
pub trait Construct: Sized + Send + Sync + 'static {
    fn construct(kernel: &Kernel) -> Result<Self, KernelError>;
}

// Re-export derive macros
pub use di_macros::{Construct, Inject, Module};
