//! Startup integration: build, scope and publish the application kernel.
//!
//! [`ServiceProxy::configure`] runs once at startup. It asks the
//! [`StrategyRegistry`] for a kernel, binds every declared controller in
//! request scope, and publishes the kernel. After that,
//! [`ServiceProxy::get_instance`] and self-injecting values resolve from it.
//!
//! # Usage
//!
//! ```ignore
//! let registry = StrategyRegistry::shared();
//! registry.set_strategy(DefaultResolutionStrategy);
//!
//! let catalog = ControllerCatalog::new()
//!     .register::<HomeController>()
//!     .register::<OrdersController>();
//!
//! let proxy = ServiceProxy::shared();
//! proxy.configure(&registry, &catalog, vec![Arc::new(AppModule::new())])?;
//!
//! // Inside a request (see RequestScopeLayer)
//! let home = proxy.get::<HomeController>()?;
//! ```

use std::any::{type_name, TypeId};
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::di::Construct;
use crate::error::KernelError;
use crate::kernel::{Binder, Instance, Kernel, Module, ScopeCallback};
use crate::layer::RequestScopeLayer;
use crate::scope::RequestScopeProvider;
use crate::strategy::{ResolverSettings, StrategyRegistry};

/// Untyped resolution callback handed to framework activation hooks.
pub type Activator = Arc<dyn Fn(TypeId) -> Result<Instance, KernelError> + Send + Sync>;

/// Name of the module holding controller bindings.
pub const CONTROLLER_MODULE: &str = "controllers";

#[derive(Clone, Copy)]
struct ControllerEntry {
    type_name: &'static str,
    bind: fn(&mut Binder, ScopeCallback),
}

/// Controller types declared by the web framework.
///
/// The core never discovers controllers; the application lists them.
#[derive(Clone, Default)]
pub struct ControllerCatalog {
    controllers: Vec<ControllerEntry>,
}

impl ControllerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a controller type.
    pub fn register<C: Construct>(mut self) -> Self {
        self.controllers.push(ControllerEntry {
            type_name: type_name::<C>(),
            bind: |binder, scope| {
                binder.bind::<C>().to_self().in_scope_with(scope);
            },
        });
        self
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.controllers.iter().map(|c| c.type_name).collect()
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

/// Binds every catalog entry in request scope.
struct ControllerModule {
    catalog: ControllerCatalog,
    scope: ScopeCallback,
}

impl Module for ControllerModule {
    fn name(&self) -> &str {
        CONTROLLER_MODULE
    }

    fn load(&self, binder: &mut Binder) -> Result<(), KernelError> {
        for controller in &self.catalog.controllers {
            (controller.bind)(binder, self.scope.clone());
        }
        Ok(())
    }
}

static SHARED: Lazy<Arc<ServiceProxy>> = Lazy::new(|| Arc::new(ServiceProxy::new()));

/// Holds the published kernel and resolves through it.
///
/// The kernel is written once by [`configure`](Self::configure) and read
/// afterwards. A second `configure` fails with
/// [`KernelError::AlreadyConfigured`] instead of replacing a kernel that
/// in-flight requests may still hold.
#[derive(Default)]
pub struct ServiceProxy {
    scopes: RequestScopeProvider,
    published: RwLock<Option<Arc<Kernel>>>,
}

impl ServiceProxy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide proxy, used by self-injecting values.
    pub fn shared() -> Arc<ServiceProxy> {
        SHARED.clone()
    }

    pub fn scopes(&self) -> RequestScopeProvider {
        self.scopes
    }

    /// Build, scope and publish the application kernel.
    pub fn configure(
        &self,
        registry: &StrategyRegistry,
        catalog: &ControllerCatalog,
        extra_modules: Vec<Arc<dyn Module>>,
    ) -> Result<Arc<Kernel>, KernelError> {
        if self.is_published() {
            return Err(KernelError::AlreadyConfigured);
        }

        let settings = ResolverSettings::default().with_modules(extra_modules);
        let kernel = registry.get_container(Some(&settings))?;

        let controllers: Arc<dyn Module> = Arc::new(ControllerModule {
            catalog: catalog.clone(),
            scope: self.scopes.request_scope(),
        });
        kernel.load(&[controllers])?;

        let kernel = Arc::new(kernel);
        {
            let mut slot = self.published.write().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                return Err(KernelError::AlreadyConfigured);
            }
            *slot = Some(kernel.clone());
        }

        tracing::info!(
            controllers = catalog.len(),
            modules = ?kernel.module_names(),
            "Kernel published"
        );
        Ok(kernel)
    }

    pub fn is_published(&self) -> bool {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The published kernel.
    pub fn published(&self) -> Result<Arc<Kernel>, KernelError> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(KernelError::ContainerNotPublished)
    }

    /// Resolve by `TypeId`, applying the same scoping as direct resolution.
    pub fn get_instance(&self, type_id: TypeId) -> Result<Instance, KernelError> {
        self.published()?.get_by_id(type_id)
    }

    /// Typed [`get_instance`](Self::get_instance).
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, KernelError> {
        self.published()?.get::<T>()
    }

    /// Activation callback routing through [`get_instance`](Self::get_instance).
    pub fn activator(self: &Arc<Self>) -> Activator {
        let proxy = Arc::clone(self);
        Arc::new(move |type_id| proxy.get_instance(type_id))
    }

    /// Middleware and activation hookup from before request scoping moved
    /// to [`RequestScopeLayer`].
    #[deprecated(note = "wrap services in RequestScopeLayer and resolve through ServiceProxy::get")]
    pub fn configure_services(self: &Arc<Self>) -> (RequestScopeLayer, Activator) {
        (RequestScopeLayer::new(), self.activator())
    }

    /// Unpublish the kernel. Intended for tests that share the process-wide
    /// proxy.
    #[doc(hidden)]
    pub fn reset(&self) {
        *self.published.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
