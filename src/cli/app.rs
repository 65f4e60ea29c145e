//! Application modules and controllers served by the CLI commands.

use std::sync::{Arc, Mutex, PoisonError};

use ulid::Ulid;

use crate::config::StrategyKind;
use crate::context::Context;
use crate::di::{Construct, Inject, Module};
use crate::error::KernelError;
use crate::kernel::{self, Binder, KernelSettings};
use crate::proxy::ControllerCatalog;
use crate::scope::RequestScopeProvider;

/// Greeting text shared by every request.
#[derive(Debug, Clone)]
pub struct Greeting(pub String);

/// Application-wide constants.
#[derive(Module, Clone)]
#[module(name = "app")]
pub struct AppModule {
    pub greeting: Greeting,
}

impl Default for AppModule {
    fn default() -> Self {
        Self {
            greeting: Greeting("hello from the kernel".to_string()),
        }
    }
}

/// Per-request activity log.
pub struct RequestLog {
    scope_id: Option<Ulid>,
    entries: Mutex<Vec<String>>,
}

impl RequestLog {
    fn for_current_request() -> Self {
        Self {
            scope_id: RequestScopeProvider.current_token().ok().map(|t| t.id()),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Id of the request this log belongs to.
    pub fn scope_id(&self) -> Option<Ulid> {
        self.scope_id
    }

    pub fn record(&self, entry: String) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Binds [`RequestLog`] in request scope.
pub struct RequestModule;

impl kernel::Module for RequestModule {
    fn name(&self) -> &str {
        "request"
    }

    fn load(&self, binder: &mut Binder) -> Result<(), KernelError> {
        binder
            .bind::<RequestLog>()
            .to_method(|_| Ok(RequestLog::for_current_request()))
            .in_scope_with(RequestScopeProvider.request_scope());
        Ok(())
    }
}

/// Request-scoped controller built by the kernel.
#[derive(Construct)]
pub struct HomeController {
    greeting: Arc<Greeting>,
    log: Arc<RequestLog>,
}

impl HomeController {
    pub fn handle(&self, step: usize) -> String {
        let line = format!("{} (step {})", self.greeting.0, step);
        self.log.record(line.clone());
        line
    }

    pub fn log(&self) -> &Arc<RequestLog> {
        &self.log
    }
}

/// Controller constructed outside the kernel and populated by self-injection.
#[derive(Default, Inject)]
pub struct StatusController {
    #[inject]
    pub settings: Option<Arc<KernelSettings>>,
    #[inject]
    greeting: Option<Arc<Greeting>>,
}

impl StatusController {
    pub fn greeting(&self) -> Option<&str> {
        self.greeting.as_deref().map(|g| g.0.as_str())
    }
}

/// Modules the application contributes.
pub fn app_modules() -> Vec<Arc<dyn kernel::Module>> {
    vec![Arc::new(AppModule::default()), Arc::new(RequestModule)]
}

/// Modules still to pass to `configure`; the preset strategy already holds them.
pub(crate) fn extra_modules(ctx: &Context) -> Vec<Arc<dyn kernel::Module>> {
    match ctx.config.strategy.kind {
        StrategyKind::Default => app_modules(),
        StrategyKind::Preset => Vec::new(),
    }
}

/// Controllers the kernel binds in request scope.
pub fn controller_catalog() -> ControllerCatalog {
    ControllerCatalog::new().register::<HomeController>()
}
