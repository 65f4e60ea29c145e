//! Modules: named units of binding configuration.

use std::sync::Arc;

use crate::error::KernelError;
use crate::kernel::binding::{Binding, BindingBuilder};

/// A named unit of binding configuration.
///
/// Modules are composed into a kernel in order; a later binding for the same
/// type replaces an earlier one. The kernel never mutates a module, and a
/// module name may only be loaded once per kernel.
pub trait Module: Send + Sync {
    /// Unique, non-empty module name.
    fn name(&self) -> &str;

    /// Register this module's bindings.
    fn load(&self, binder: &mut Binder) -> Result<(), KernelError>;
}

impl<M: Module + ?Sized> Module for Arc<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn load(&self, binder: &mut Binder) -> Result<(), KernelError> {
        (**self).load(binder)
    }
}

/// Collects the bindings of one module while it loads.
pub struct Binder {
    module: String,
    bindings: Vec<Binding>,
}

impl Binder {
    pub(crate) fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            bindings: Vec::new(),
        }
    }

    /// Name of the module being loaded.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Start a binding for `T`. A binding left without a target fails the load.
    pub fn bind<T: Send + Sync + 'static>(&mut self) -> BindingBuilder<'_, T> {
        self.bindings.push(Binding::pending::<T>(&self.module));
        let index = self.bindings.len() - 1;
        BindingBuilder::new(&mut self.bindings[index])
    }

    /// Finish loading, rejecting incomplete bindings.
    pub(crate) fn finish(self) -> Result<Vec<Binding>, KernelError> {
        if let Some(pending) = self.bindings.iter().find(|b| b.provider.is_none()) {
            return Err(KernelError::binding(
                &self.module,
                format!("binding for {} has no target", pending.type_name),
            ));
        }
        Ok(self.bindings)
    }
}
