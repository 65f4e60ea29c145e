//! The kernel: an object-graph factory built from modules.
//!
//! A kernel answers one question: given a type, produce an instance that
//! respects the type's registered binding and scope.
//!
//! # Architecture
//!
//! - [`Module`] / [`Binder`] - Named units of binding configuration
//! - [`Binding`] - How a type is produced and its lifetime ([`BindingScope`])
//! - [`Kernel`] - Resolution and member injection
//! - [`ScopeStore`] - Instances cached against one scope, dropped with it
//!
//! # Usage
//!
//! ```ignore
//! use kernel_scope::kernel::{Binder, Kernel, KernelSettings, Module};
//!
//! struct StorageModule;
//!
//! impl Module for StorageModule {
//!     fn name(&self) -> &str {
//!         "storage"
//!     }
//!
//!     fn load(&self, binder: &mut Binder) -> Result<(), KernelError> {
//!         binder.bind::<Pool>().to_method(|_| Pool::connect()).in_singleton_scope();
//!         binder.bind::<UserRepository>().to_self();
//!         Ok(())
//!     }
//! }
//!
//! let kernel = Kernel::new(KernelSettings::default(), &[Arc::new(StorageModule)])?;
//! let repo = kernel.get::<UserRepository>()?;
//! ```

mod binding;
mod cache;
mod module;
mod settings;

use std::any::{type_name, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

pub use binding::{
    Binding, BindingBuilder, BindingInfo, BindingScope, BindingSyntax, Instance, ScopeCallback,
    ScopeHandle, ScopeKind,
};
pub use cache::ScopeStore;
pub use module::{Binder, Module};
pub use settings::KernelSettings;

use crate::error::KernelError;
use crate::inject::{Injectable, Injector};

static NEXT_KERNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Object-graph factory.
///
/// Bindings can be added after construction with [`Kernel::load`]; lookups
/// take shared locks only.
pub struct Kernel {
    id: u64,
    settings: KernelSettings,
    bindings: RwLock<HashMap<TypeId, Arc<Binding>>>,
    modules: RwLock<Vec<String>>,
    // Singletons are cached like any scope, in one the kernel owns
    singleton_scope: ScopeHandle,
}

impl Kernel {
    /// Build a kernel from modules, loaded in order.
    pub fn new(settings: KernelSettings, modules: &[Arc<dyn Module>]) -> Result<Self, KernelError> {
        let kernel = Self {
            id: NEXT_KERNEL_ID.fetch_add(1, Ordering::Relaxed),
            settings,
            bindings: RwLock::new(HashMap::new()),
            modules: RwLock::new(Vec::new()),
            singleton_scope: Arc::new(ScopeStore::new()),
        };
        kernel.load(modules)?;
        Ok(kernel)
    }

    pub fn settings(&self) -> &KernelSettings {
        &self.settings
    }

    /// Load more modules into the kernel.
    ///
    /// All modules are validated before any binding is applied, so a failed
    /// load leaves the kernel unchanged. Later bindings replace earlier
    /// ones for the same type.
    pub fn load(&self, modules: &[Arc<dyn Module>]) -> Result<(), KernelError> {
        let mut loaded: HashSet<String> = self.module_names().into_iter().collect();
        let mut staged = Vec::new();

        for module in modules {
            let name = module.name();
            if name.trim().is_empty() {
                return Err(KernelError::binding(name, "module name must not be empty"));
            }
            if !loaded.insert(name.to_string()) {
                return Err(KernelError::binding(
                    name,
                    "a module with this name is already loaded",
                ));
            }

            let mut binder = Binder::new(name);
            module.load(&mut binder)?;
            staged.push((name.to_string(), binder.finish()?));
        }

        let mut bindings = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
        let mut names = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        for (name, module_bindings) in staged {
            tracing::debug!(module = %name, bindings = module_bindings.len(), "Loading module");
            for binding in module_bindings {
                if let Some(previous) = bindings.insert(binding.type_id, Arc::new(binding)) {
                    tracing::debug!(
                        type_name = previous.type_name,
                        replaced_from = %previous.module,
                        "Binding overridden"
                    );
                }
            }
            names.push(name);
        }

        Ok(())
    }

    /// Resolve `T`.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, KernelError> {
        self.resolve(TypeId::of::<T>(), type_name::<T>())?
            .downcast::<T>()
            .map_err(|_| KernelError::TypeMismatch {
                type_name: type_name::<T>().to_string(),
            })
    }

    /// Resolve `T`, or `None` if it has no binding.
    pub fn try_get<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, KernelError> {
        match self.get::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(KernelError::MissingBinding { type_name: missing })
                if missing == type_name::<T>() =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Untyped resolution for callers that only hold a `TypeId`.
    pub fn get_by_id(&self, type_id: TypeId) -> Result<Instance, KernelError> {
        let type_name = self
            .binding(type_id)
            .map(|b| b.type_name.to_string())
            .unwrap_or_else(|| format!("{type_id:?}"));
        self.resolve(type_id, &type_name)
    }

    /// Whether `T` has a binding.
    pub fn has_binding<T: 'static>(&self) -> bool {
        self.binding(TypeId::of::<T>()).is_some()
    }

    /// Inject dependencies into an already constructed value.
    pub fn inject<T: Injectable + ?Sized>(&self, target: &mut T) -> Result<(), KernelError> {
        target.inject_members(&Injector::new(self))
    }

    /// Names of loaded modules, in load order.
    pub fn module_names(&self) -> Vec<String> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All active bindings, sorted by type name.
    pub fn bindings(&self) -> Vec<BindingInfo> {
        let mut infos: Vec<BindingInfo> = self
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|b| b.info())
            .collect();
        infos.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        infos
    }

    fn binding(&self, type_id: TypeId) -> Option<Arc<Binding>> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .cloned()
    }

    fn resolve(&self, type_id: TypeId, type_name: &str) -> Result<Instance, KernelError> {
        let binding = self
            .binding(type_id)
            .ok_or_else(|| KernelError::MissingBinding {
                type_name: type_name.to_string(),
            })?;

        match &binding.scope {
            BindingScope::Transient => binding.activate(self),
            BindingScope::Singleton => self.resolve_in(&self.singleton_scope, &binding),
            BindingScope::Custom(callback) => {
                let scope = callback(self)?;
                self.resolve_in(&scope, &binding)
            }
        }
    }

    fn resolve_in(&self, scope: &ScopeHandle, binding: &Binding) -> Result<Instance, KernelError> {
        if let Some(instance) = scope.get(self.id, binding.type_id) {
            tracing::trace!(type_name = binding.type_name, "Scoped cache hit");
            return Ok(instance);
        }

        // Built outside the store lock; providers may resolve other scoped types
        let instance = binding.activate(self)?;
        tracing::debug!(
            type_name = binding.type_name,
            scope = ?binding.scope,
            "Activated scoped instance"
        );
        Ok(scope.insert(self.id, binding.type_id, instance))
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("settings", &self.settings)
            .field("modules", &self.module_names())
            .finish_non_exhaustive()
    }
}
