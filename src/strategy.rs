//! Kernel resolution strategies and the registry that selects one.
//!
//! A [`ResolutionStrategy`] turns a module list into a [`Kernel`]. The
//! [`StrategyRegistry`] holds the strategy the whole process agrees on, so
//! independently wired subsystems build kernels the same way without being
//! passed the policy explicitly.
//!
//! # Usage
//!
//! ```ignore
//! let registry = StrategyRegistry::shared();
//! registry.set_strategy(DefaultResolutionStrategy);
//!
//! let settings = ResolverSettings::default().with_modules([app_module]);
//! let kernel = registry.get_container(Some(&settings))?;
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::di::Module;
use crate::error::KernelError;
use crate::kernel::{self, Kernel, KernelSettings};

/// Turns a module list into a kernel.
///
/// Implementations must have no side effects outside kernel construction;
/// equivalent module lists yield functionally equivalent kernels.
pub trait ResolutionStrategy: Send + Sync {
    fn resolve(&self, modules: &[Arc<dyn kernel::Module>]) -> Result<Kernel, KernelError>;
}

/// Built-in module loaded ahead of every caller module.
#[derive(Module, Clone)]
#[module(name = "core")]
pub struct CoreModule {
    pub settings: KernelSettings,
}

/// Always builds a fresh kernel from [`CoreModule`] plus the caller's modules,
/// with non-public and parent-private injection enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResolutionStrategy;

impl ResolutionStrategy for DefaultResolutionStrategy {
    fn resolve(&self, modules: &[Arc<dyn kernel::Module>]) -> Result<Kernel, KernelError> {
        let settings = KernelSettings::permissive();
        let mut all: Vec<Arc<dyn kernel::Module>> = Vec::with_capacity(modules.len() + 1);
        all.push(Arc::new(CoreModule { settings }));
        all.extend(modules.iter().cloned());

        Kernel::new(settings, &all)
    }
}

/// Strategy carrying application-known modules and explicit settings.
///
/// Caller modules load after [`CoreModule`] and before the preset modules,
/// so the preset's bindings take precedence.
#[derive(Clone, Default)]
pub struct PresetStrategy {
    settings: KernelSettings,
    modules: Vec<Arc<dyn kernel::Module>>,
}

impl PresetStrategy {
    pub fn new(settings: KernelSettings) -> Self {
        Self {
            settings,
            modules: Vec::new(),
        }
    }

    pub fn with_module(mut self, module: Arc<dyn kernel::Module>) -> Self {
        self.modules.push(module);
        self
    }

    pub fn with_modules<I>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn kernel::Module>>,
    {
        self.modules.extend(modules);
        self
    }
}

impl ResolutionStrategy for PresetStrategy {
    fn resolve(&self, modules: &[Arc<dyn kernel::Module>]) -> Result<Kernel, KernelError> {
        let mut all: Vec<Arc<dyn kernel::Module>> =
            Vec::with_capacity(modules.len() + self.modules.len() + 1);
        all.push(Arc::new(CoreModule {
            settings: self.settings,
        }));
        all.extend(modules.iter().cloned());
        all.extend(self.modules.iter().cloned());

        Kernel::new(self.settings, &all)
    }
}

/// Modules handed to the active strategy.
#[derive(Clone, Default)]
pub struct ResolverSettings {
    modules: Vec<Arc<dyn kernel::Module>>,
}

impl ResolverSettings {
    pub fn with_modules<I>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn kernel::Module>>,
    {
        self.modules = modules.into_iter().collect();
        self
    }

    pub fn modules(&self) -> &[Arc<dyn kernel::Module>] {
        &self.modules
    }
}

static SHARED: Lazy<Arc<StrategyRegistry>> = Lazy::new(|| Arc::new(StrategyRegistry::new()));

/// Holds the active resolution strategy.
///
/// The strategy is written once during startup and read afterwards. Swapping
/// it while other threads call [`get_container`](Self::get_container) is
/// memory-safe but gives no ordering guarantee about which strategy they see.
#[derive(Default)]
pub struct StrategyRegistry {
    strategy: RwLock<Option<Arc<dyn ResolutionStrategy>>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn shared() -> Arc<StrategyRegistry> {
        SHARED.clone()
    }

    /// Replace the active strategy.
    pub fn set_strategy<S: ResolutionStrategy + 'static>(&self, strategy: S) {
        self.set_shared_strategy(Arc::new(strategy));
    }

    /// Replace the active strategy with an already shared one.
    pub fn set_shared_strategy(&self, strategy: Arc<dyn ResolutionStrategy>) {
        let mut slot = self.strategy.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            tracing::warn!("Replacing the active resolution strategy");
        }
        *slot = Some(strategy);
    }

    pub fn has_strategy(&self) -> bool {
        self.strategy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Build a kernel with the active strategy.
    ///
    /// Uses an empty module list when `settings` is `None`.
    pub fn get_container(&self, settings: Option<&ResolverSettings>) -> Result<Kernel, KernelError> {
        let strategy = self
            .strategy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(KernelError::UnconfiguredStrategy)?;

        let modules = settings.map(ResolverSettings::modules).unwrap_or_default();
        tracing::debug!(modules = modules.len(), "Resolving kernel");
        strategy.resolve(modules)
    }

    /// Clear the active strategy. Intended for tests that share the
    /// process-wide registry.
    #[doc(hidden)]
    pub fn reset(&self) {
        *self.strategy.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
