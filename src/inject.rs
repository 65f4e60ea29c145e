//! Member injection and the self-injecting adapter.
//!
//! Some objects are constructed by a framework that offers no constructor
//! injection hook. They are built bare (`Default`) and then populated from
//! the published kernel before first use. [`SelfInjecting`] is that adapter
//! boundary; [`Injectable`] (usually derived with `#[derive(Inject)]`) says
//! which fields to populate.

use crate::di::FromKernel;
use crate::error::KernelError;
use crate::kernel::Kernel;
use crate::proxy::ServiceProxy;

/// Declared visibility of an injected field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    NonPublic,
}

/// A value whose fields can be populated after construction.
pub trait Injectable {
    fn inject_members(&mut self, injector: &Injector<'_>) -> Result<(), KernelError>;
}

/// Resolves member values for an [`Injectable`], applying the kernel's
/// visibility policy.
#[derive(Clone, Copy)]
pub struct Injector<'k> {
    kernel: &'k Kernel,
    base: bool,
}

impl<'k> Injector<'k> {
    pub fn new(kernel: &'k Kernel) -> Self {
        Self {
            kernel,
            base: false,
        }
    }

    /// Injector for a value embedded as a base (`#[inject(base)]`).
    pub fn for_base(&self) -> Self {
        Self {
            kernel: self.kernel,
            base: true,
        }
    }

    /// Whether a field with this visibility may be injected.
    pub fn admits(&self, visibility: Visibility) -> bool {
        let settings = self.kernel.settings();
        match visibility {
            Visibility::Public => true,
            Visibility::NonPublic if self.base => {
                settings.inject_non_public && settings.inject_parent_private
            }
            Visibility::NonPublic => settings.inject_non_public,
        }
    }

    /// Resolve a member value, or `None` if the field is not admitted.
    pub fn resolve<S: FromKernel>(
        &self,
        field: &str,
        visibility: Visibility,
    ) -> Result<Option<S>, KernelError> {
        if !self.admits(visibility) {
            tracing::trace!(field, base = self.base, "Skipping non-public member");
            return Ok(None);
        }
        S::from_kernel(self.kernel).map(Some)
    }
}

/// Adapter that populates framework-constructed values from the published
/// kernel.
///
/// Fails with [`KernelError::ContainerNotPublished`] when used before
/// [`ServiceProxy::configure`]; that is a startup-ordering bug and the
/// error should abort whatever is constructing the value.
pub struct SelfInjecting;

impl SelfInjecting {
    /// Build a bare `T` and inject it from the proxy's published kernel.
    pub fn activate<T: Default + Injectable>(proxy: &ServiceProxy) -> Result<T, KernelError> {
        let mut value = T::default();
        Self::inject_into(proxy, &mut value)?;
        Ok(value)
    }

    /// Inject an already constructed value.
    pub fn inject_into<T: Injectable + ?Sized>(
        proxy: &ServiceProxy,
        target: &mut T,
    ) -> Result<(), KernelError> {
        let kernel = proxy.published().inspect_err(|_| {
            tracing::error!(
                type_name = std::any::type_name::<T>(),
                "Self-injecting value constructed before the kernel was published"
            );
        })?;
        kernel.inject(target)
    }

    /// [`activate`](Self::activate) against the process-wide proxy.
    pub fn activate_shared<T: Default + Injectable>() -> Result<T, KernelError> {
        Self::activate(&ServiceProxy::shared())
    }
}
