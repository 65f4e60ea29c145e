//! Binding rules: how a type is produced and how long an instance lives.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;

use crate::di::Construct;
use crate::error::KernelError;
use crate::kernel::cache::ScopeStore;
use crate::kernel::Kernel;

/// A resolved object.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// The scope a scoped instance is cached in.
///
/// Cached instances live as long as some strong reference to their scope
/// handle does.
pub type ScopeHandle = Arc<ScopeStore>;

/// Produces the scope handle for the resolution in progress.
pub type ScopeCallback = Arc<dyn Fn(&Kernel) -> Result<ScopeHandle, KernelError> + Send + Sync>;

pub(crate) type Provider = Arc<dyn Fn(&Kernel) -> Result<Instance, KernelError> + Send + Sync>;

/// Lifetime policy of a binding.
#[derive(Clone, Default)]
pub enum BindingScope {
    /// New instance on every resolution.
    #[default]
    Transient,
    /// One instance per kernel.
    Singleton,
    /// One instance per live scope handle returned by the callback.
    Custom(ScopeCallback),
}

impl BindingScope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            BindingScope::Transient => ScopeKind::Transient,
            BindingScope::Singleton => ScopeKind::Singleton,
            BindingScope::Custom(_) => ScopeKind::Custom,
        }
    }
}

impl fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.kind(), f)
    }
}

/// Scope kind without the callback, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Transient,
    Singleton,
    Custom,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Transient => write!(f, "transient"),
            ScopeKind::Singleton => write!(f, "singleton"),
            ScopeKind::Custom => write!(f, "custom"),
        }
    }
}

/// A single binding rule.
#[derive(Clone)]
pub struct Binding {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) provider: Option<Provider>,
    pub(crate) scope: BindingScope,
    pub(crate) module: String,
}

impl Binding {
    /// A binding for `T` with no target yet.
    pub(crate) fn pending<T: Send + Sync + 'static>(module: &str) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            provider: None,
            scope: BindingScope::Transient,
            module: module.to_string(),
        }
    }

    /// Build a new instance, ignoring scope.
    pub(crate) fn activate(&self, kernel: &Kernel) -> Result<Instance, KernelError> {
        match &self.provider {
            Some(provider) => provider(kernel),
            // Kernel::load rejects pending bindings, so this only guards misuse
            None => Err(KernelError::binding(
                &self.module,
                format!("binding for {} has no target", self.type_name),
            )),
        }
    }

    pub(crate) fn info(&self) -> BindingInfo {
        BindingInfo {
            type_name: self.type_name.to_string(),
            scope: self.scope.kind(),
            module: self.module.clone(),
        }
    }
}

/// Serializable summary of a binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingInfo {
    pub type_name: String,
    pub scope: ScopeKind,
    pub module: String,
}

/// First step of `bind::<T>()`: choose how `T` is produced.
pub struct BindingBuilder<'a, T> {
    binding: &'a mut Binding,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Send + Sync + 'static> BindingBuilder<'a, T> {
    pub(crate) fn new(binding: &'a mut Binding) -> Self {
        Self {
            binding,
            _marker: PhantomData,
        }
    }

    /// Build `T` through its [`Construct`] implementation.
    pub fn to_self(self) -> BindingSyntax<'a>
    where
        T: Construct,
    {
        self.to_provider(Arc::new(|kernel: &Kernel| {
            T::construct(kernel).map(|value| Arc::new(value) as Instance)
        }))
    }

    /// Always resolve to the same value.
    pub fn to_constant(self, value: T) -> BindingSyntax<'a> {
        let shared: Instance = Arc::new(value);
        let syntax = self.to_provider(Arc::new(move |_: &Kernel| {
            Ok::<_, KernelError>(shared.clone())
        }));
        syntax.in_singleton_scope()
    }

    /// Build `T` with a factory that may resolve other dependencies.
    pub fn to_method<F>(self, factory: F) -> BindingSyntax<'a>
    where
        F: Fn(&Kernel) -> Result<T, KernelError> + Send + Sync + 'static,
    {
        self.to_provider(Arc::new(move |kernel: &Kernel| {
            factory(kernel).map(|value| Arc::new(value) as Instance)
        }))
    }

    fn to_provider(self, provider: Provider) -> BindingSyntax<'a> {
        self.binding.provider = Some(provider);
        BindingSyntax {
            binding: self.binding,
        }
    }
}

/// Second step of `bind::<T>()`: choose the instance lifetime.
pub struct BindingSyntax<'a> {
    binding: &'a mut Binding,
}

impl BindingSyntax<'_> {
    pub fn in_transient_scope(self) -> Self {
        self.binding.scope = BindingScope::Transient;
        self
    }

    pub fn in_singleton_scope(self) -> Self {
        self.binding.scope = BindingScope::Singleton;
        self
    }

    /// Cache one instance per scope handle the callback returns.
    pub fn in_scope<F>(self, callback: F) -> Self
    where
        F: Fn(&Kernel) -> Result<ScopeHandle, KernelError> + Send + Sync + 'static,
    {
        self.binding.scope = BindingScope::Custom(Arc::new(callback));
        self
    }

    /// Same as [`in_scope`](Self::in_scope) with an already shared callback.
    pub fn in_scope_with(self, callback: ScopeCallback) -> Self {
        self.binding.scope = BindingScope::Custom(callback);
        self
    }
}
