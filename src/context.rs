//! Application context: the startup-time root that owns resolution state.
//!
//! The context carries the strategy registry and the service proxy as
//! explicit handles. [`Context::new`] builds private ones, which is what
//! tests and embedded uses want. [`Context::global`] shares the
//! process-wide instances that self-injecting values reach through
//! [`ServiceProxy::shared`].

use std::sync::Arc;

use crate::config::{Config, StrategyKind};
use crate::error::KernelError;
use crate::kernel::{Kernel, Module};
use crate::proxy::{ControllerCatalog, ServiceProxy};
use crate::strategy::{DefaultResolutionStrategy, PresetStrategy, StrategyRegistry};

/// Root application context for dependency injection.
#[derive(Clone)]
pub struct Context {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Active resolution strategy.
    pub registry: Arc<StrategyRegistry>,
    /// Published kernel holder.
    pub proxy: Arc<ServiceProxy>,
}

impl Context {
    /// Context with its own registry and proxy.
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(StrategyRegistry::new()),
            proxy: Arc::new(ServiceProxy::new()),
        }
    }

    /// Context over the process-wide registry and proxy.
    pub fn global(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            registry: StrategyRegistry::shared(),
            proxy: ServiceProxy::shared(),
        }
    }

    /// Install the configured strategy.
    ///
    /// `app_modules` are only used by the preset strategy.
    pub fn install_strategy(&self, app_modules: Vec<Arc<dyn Module>>) {
        match self.config.strategy.kind {
            StrategyKind::Default => {
                tracing::info!("Using default resolution strategy");
                self.registry.set_strategy(DefaultResolutionStrategy);
            }
            StrategyKind::Preset => {
                tracing::info!(
                    modules = app_modules.len(),
                    settings = ?self.config.kernel,
                    "Using preset resolution strategy"
                );
                self.registry
                    .set_strategy(PresetStrategy::new(self.config.kernel).with_modules(app_modules));
            }
        }
    }

    /// Build and publish the application kernel.
    pub fn configure(
        &self,
        catalog: &ControllerCatalog,
        extra_modules: Vec<Arc<dyn Module>>,
    ) -> Result<Arc<Kernel>, KernelError> {
        self.proxy.configure(&self.registry, catalog, extra_modules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyConfig;
    use crate::kernel::KernelSettings;

    #[derive(Debug, Clone, PartialEq)]
    struct Banner(&'static str);

    #[derive(crate::Module)]
    struct BannerModule {
        banner: Banner,
    }

    #[test]
    fn test_default_strategy_context() {
        let ctx = Context::new(Config::default());
        ctx.install_strategy(vec![]);

        let kernel = ctx.configure(&ControllerCatalog::new(), vec![]).unwrap();
        assert!(kernel.settings().inject_non_public);
        assert!(ctx.proxy.is_published());
    }

    #[test]
    fn test_preset_strategy_context() {
        let config = Config {
            strategy: StrategyConfig {
                kind: StrategyKind::Preset,
            },
            kernel: KernelSettings {
                inject_non_public: true,
                inject_parent_private: false,
            },
            ..Config::default()
        };
        let ctx = Context::new(config);
        ctx.install_strategy(vec![Arc::new(BannerModule {
            banner: Banner("preset"),
        })]);

        let kernel = ctx.configure(&ControllerCatalog::new(), vec![]).unwrap();
        assert_eq!(*kernel.get::<Banner>().unwrap(), Banner("preset"));
        assert!(!kernel.settings().inject_parent_private);
    }

    #[test]
    fn test_configure_without_strategy() {
        let ctx = Context::new(Config::default());
        let result = ctx.configure(&ControllerCatalog::new(), vec![]);
        assert!(matches!(result, Err(KernelError::UnconfiguredStrategy)));
    }
}
