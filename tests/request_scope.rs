//! Integration tests for request scoping through the process-wide proxy.
//!
//! The strategy registry and service proxy are process-wide, so every test
//! resets them and the tests run serially.

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kernel_scope::kernel::{self, Binder};
use kernel_scope::{
    Construct, ControllerCatalog, DefaultResolutionStrategy, Inject, KernelError, Module,
    RequestScopeLayer, RequestScopeProvider, ScopeToken, SelfInjecting, ServiceProxy,
    StrategyRegistry,
};
use serial_test::serial;
use tower::{service_fn, Layer, ServiceExt};

#[derive(Debug, Clone, PartialEq)]
struct Motd(String);

#[derive(Module, Clone)]
#[module(name = "motd")]
struct MotdModule {
    motd: Motd,
}

/// Request-scoped marker recording which request built it.
struct Visits {
    scope: ulid::Ulid,
}

struct VisitsModule;

impl kernel::Module for VisitsModule {
    fn name(&self) -> &str {
        "visits"
    }

    fn load(&self, binder: &mut Binder) -> Result<(), KernelError> {
        binder
            .bind::<Visits>()
            .to_method(|_| {
                Ok(Visits {
                    scope: RequestScopeProvider.current_token()?.id(),
                })
            })
            .in_scope_with(RequestScopeProvider.request_scope());
        Ok(())
    }
}

static CONNECTION_DROPS: AtomicUsize = AtomicUsize::new(0);

/// Request-scoped resource whose destruction is counted.
struct Connection;

impl Drop for Connection {
    fn drop(&mut self) {
        CONNECTION_DROPS.fetch_add(1, Ordering::SeqCst);
    }
}

struct ConnectionModule;

impl kernel::Module for ConnectionModule {
    fn name(&self) -> &str {
        "connections"
    }

    fn load(&self, binder: &mut Binder) -> Result<(), KernelError> {
        binder
            .bind::<Connection>()
            .to_method(|_| Ok(Connection))
            .in_scope_with(RequestScopeProvider.request_scope());
        Ok(())
    }
}

#[derive(Construct)]
struct PageController {
    motd: Arc<Motd>,
    visits: Arc<Visits>,
}

#[derive(Default, Inject)]
struct Banner {
    #[inject]
    pub motd: Option<Arc<Motd>>,
}

fn modules() -> Vec<Arc<dyn kernel::Module>> {
    vec![
        Arc::new(MotdModule {
            motd: Motd("welcome".to_string()),
        }),
        Arc::new(VisitsModule),
        Arc::new(ConnectionModule),
    ]
}

fn reset() -> Arc<ServiceProxy> {
    StrategyRegistry::shared().reset();
    let proxy = ServiceProxy::shared();
    proxy.reset();
    proxy
}

fn publish() -> Arc<ServiceProxy> {
    let proxy = reset();
    let registry = StrategyRegistry::shared();
    registry.set_strategy(DefaultResolutionStrategy);
    proxy
        .configure(
            &registry,
            &ControllerCatalog::new().register::<PageController>(),
            modules(),
        )
        .expect("configure failed");
    proxy
}

#[serial]
mod shared_proxy {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_controller_within_request_across_pause() {
        let proxy = publish();
        let scopes = proxy.scopes();

        let (first, second) = scopes
            .within_request(async {
                let first = proxy.get::<PageController>().expect("first resolve");
                tokio::time::sleep(Duration::from_millis(20)).await;
                tokio::task::yield_now().await;
                let second = proxy.get::<PageController>().expect("second resolve");
                (first, second)
            })
            .await;

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first.visits, &second.visits));
        assert_eq!(first.motd.0, "welcome");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_get_distinct_controllers() {
        let proxy = publish();

        let handler_proxy = proxy.clone();
        let service = RequestScopeLayer::new().layer(service_fn(move |pause: u64| {
            let proxy = handler_proxy.clone();
            async move {
                let token = RequestScopeProvider.current_token()?;
                let before = proxy.get::<PageController>()?;
                tokio::time::sleep(Duration::from_millis(pause)).await;
                let after = proxy.get::<PageController>()?;
                assert!(Arc::ptr_eq(&before, &after));
                Ok::<_, KernelError>((token, after))
            }
        }));

        let (r1, r2) = tokio::join!(service.clone().oneshot(30), service.clone().oneshot(5));
        let (t1, c1) = r1.expect("request 1");
        let (t2, c2) = r2.expect("request 2");

        assert_ne!(t1, t2);
        assert!(!Arc::ptr_eq(&c1, &c2));
        assert_eq!(c1.visits.scope, t1.id());
        assert_eq!(c2.visits.scope, t2.id());
        // Constants are still shared
        assert!(Arc::ptr_eq(&c1.motd, &c2.motd));
    }

    #[tokio::test]
    async fn test_scoped_instances_are_dropped_when_request_ends() {
        let proxy = publish();
        let before = CONNECTION_DROPS.load(Ordering::SeqCst);

        let connection = proxy
            .scopes()
            .within_request(async {
                let first = proxy.get::<Connection>().expect("resolve");
                drop(first);
                tokio::task::yield_now().await;
                // Still cached for the rest of the request
                assert_eq!(CONNECTION_DROPS.load(Ordering::SeqCst), before);
                proxy.get::<Connection>().expect("resolve again")
            })
            .await;
        assert_eq!(CONNECTION_DROPS.load(Ordering::SeqCst), before);

        drop(connection);
        assert_eq!(CONNECTION_DROPS.load(Ordering::SeqCst), before + 1);
    }

    #[tokio::test]
    async fn test_scoped_instances_are_dropped_after_layered_request() {
        let proxy = publish();
        let before = CONNECTION_DROPS.load(Ordering::SeqCst);

        let handler_proxy = proxy.clone();
        let service = RequestScopeLayer::new().layer(service_fn(move |_: ()| {
            let proxy = handler_proxy.clone();
            async move {
                proxy.get::<Connection>()?;
                Ok::<_, KernelError>(())
            }
        }));
        service.oneshot(()).await.expect("request");

        assert_eq!(CONNECTION_DROPS.load(Ordering::SeqCst), before + 1);
    }

    #[tokio::test]
    async fn test_no_active_scope_outside_request() {
        let proxy = publish();

        let err = proxy.get::<PageController>().err().expect("must fail");
        assert!(matches!(err, KernelError::NoActiveScope));

        let token: Result<ScopeToken, _> = RequestScopeProvider.current_token();
        assert!(matches!(token, Err(KernelError::NoActiveScope)));
    }

    #[tokio::test]
    async fn test_self_injection_before_and_after_configure() {
        reset();
        let early = SelfInjecting::activate_shared::<Banner>();
        assert!(matches!(early, Err(KernelError::ContainerNotPublished)));

        publish();
        let banner = SelfInjecting::activate_shared::<Banner>().expect("activate");
        assert_eq!(banner.motd.as_deref(), Some(&Motd("welcome".to_string())));
    }

    #[tokio::test]
    async fn test_second_configure_is_rejected() {
        let proxy = publish();
        let first = proxy.published().expect("published");

        let again = proxy.configure(
            &StrategyRegistry::shared(),
            &ControllerCatalog::new(),
            Vec::new(),
        );
        assert!(matches!(again, Err(KernelError::AlreadyConfigured)));
        assert!(Arc::ptr_eq(&first, &proxy.published().expect("published")));
    }

    #[tokio::test]
    async fn test_configure_without_strategy_fails() {
        let proxy = reset();

        let result = proxy.configure(
            &StrategyRegistry::shared(),
            &ControllerCatalog::new(),
            modules(),
        );
        assert!(matches!(result, Err(KernelError::UnconfiguredStrategy)));
        assert!(!proxy.is_published());
    }

    #[tokio::test]
    async fn test_spawned_child_shares_request_scope() {
        let proxy = publish();

        let (parent, child) = proxy
            .scopes()
            .within_request(async {
                let parent = proxy.get::<PageController>().expect("parent");
                let child_proxy = proxy.clone();
                let child = kernel_scope::scope::spawn(async move {
                    child_proxy.get::<PageController>()
                })
                .await
                .expect("join")
                .expect("child");
                (parent, child)
            })
            .await;

        assert!(Arc::ptr_eq(&parent, &child));
    }

    #[tokio::test]
    async fn test_each_call_gets_fresh_token() {
        let service = RequestScopeLayer::new().layer(service_fn(|_: ()| async {
            Ok::<_, Infallible>(RequestScopeProvider.current_token().ok())
        }));

        let a = service.clone().oneshot(()).await.expect("a");
        let b = service.oneshot(()).await.expect("b");
        assert!(a.is_some());
        assert_ne!(a, b);
    }
}
