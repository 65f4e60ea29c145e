//! Derive macros used from outside the crate.

use std::sync::Arc;

use kernel_scope::kernel::{Kernel, ScopeKind};
use kernel_scope::{Construct, Inject, KernelError, KernelSettings, Module};

#[derive(Debug, Clone, PartialEq)]
struct Endpoint(&'static str);

#[derive(Debug, Clone, PartialEq)]
struct Retries(u32);

#[derive(Module, Clone)]
#[module(name = "network")]
struct NetworkModule {
    endpoint: Endpoint,
    retries: Retries,
}

#[derive(Module)]
struct EmptyModule;

#[derive(Construct)]
struct Client {
    endpoint: Arc<Endpoint>,
    retries: Option<Arc<Retries>>,
    #[construct(default)]
    calls: u64,
}

#[derive(Default, Inject)]
struct BaseHandler {
    #[inject]
    pub endpoint: Option<Arc<Endpoint>>,
    #[inject]
    retries: Option<Arc<Retries>>,
}

#[derive(Default, Inject)]
struct Handler {
    #[inject(base)]
    base: BaseHandler,
    #[inject]
    retries: Option<Arc<Retries>>,
    untouched: Option<Arc<Endpoint>>,
}

fn network() -> NetworkModule {
    NetworkModule {
        endpoint: Endpoint("https://api.local"),
        retries: Retries(3),
    }
}

fn kernel(settings: KernelSettings) -> Kernel {
    Kernel::new(settings, &[Arc::new(network())]).expect("kernel")
}

#[test]
fn test_module_derive_binds_fields_as_constants() {
    let kernel = kernel(KernelSettings::default());

    assert_eq!(kernel.module_names(), vec!["network".to_string()]);
    let bindings = kernel.bindings();
    assert_eq!(bindings.len(), 2);
    assert!(bindings.iter().all(|b| b.scope == ScopeKind::Singleton));
    assert!(Arc::ptr_eq(
        &kernel.get::<Endpoint>().expect("endpoint"),
        &kernel.get::<Endpoint>().expect("endpoint"),
    ));
}

#[test]
fn test_module_derive_uses_type_name_without_attribute() {
    let kernel = Kernel::new(KernelSettings::default(), &[Arc::new(EmptyModule)]).expect("kernel");

    assert_eq!(kernel.module_names(), vec!["EmptyModule".to_string()]);
    assert!(kernel.bindings().is_empty());
}

#[test]
fn test_construct_derive_resolves_fields() {
    let kernel = kernel(KernelSettings::default());

    let client = Client::construct(&kernel).expect("construct");
    assert_eq!(*client.endpoint, Endpoint("https://api.local"));
    assert_eq!(client.retries.as_deref(), Some(&Retries(3)));
    assert_eq!(client.calls, 0);
}

#[test]
fn test_construct_derive_reports_missing_binding() {
    let kernel = Kernel::new(KernelSettings::default(), &[]).expect("kernel");

    let err = Client::construct(&kernel).err().expect("must fail");
    assert!(matches!(err, KernelError::MissingBinding { .. }));
}

#[test]
fn test_inject_respects_visibility_settings() {
    let strict = kernel(KernelSettings::default());
    let mut handler = Handler::default();
    strict.inject(&mut handler).expect("inject");

    assert!(handler.base.endpoint.is_some());
    assert!(handler.base.retries.is_none());
    assert!(handler.retries.is_none());
    assert!(handler.untouched.is_none());
}

#[test]
fn test_inject_base_private_needs_both_flags() {
    let own_only = kernel(KernelSettings {
        inject_non_public: true,
        inject_parent_private: false,
    });
    let mut handler = Handler::default();
    own_only.inject(&mut handler).expect("inject");
    assert!(handler.retries.is_some());
    assert!(handler.base.retries.is_none());

    let both = kernel(KernelSettings::permissive());
    let mut handler = Handler::default();
    both.inject(&mut handler).expect("inject");
    assert!(handler.retries.is_some());
    assert!(handler.base.retries.is_some());
    assert!(handler.untouched.is_none());
}
