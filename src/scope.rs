//! Request scope tokens carried by the async task, not the thread.
//!
//! A request's token is bound with a tokio task-local, so it survives
//! suspension and resumption on a different worker thread. Task-locals do
//! not cross `tokio::spawn`; child tasks that must stay in the request use
//! [`spawn`], which re-binds the parent's token in the child.
//!
//! Each token owns the [`ScopeStore`] its request's instances are cached in,
//! so they are dropped together with the last clone of the token.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::futures::TaskLocalFuture;
use tokio::task::JoinHandle;
use tracing::Instrument;
use ulid::Ulid;

use crate::error::KernelError;
use crate::kernel::{Kernel, ScopeCallback, ScopeHandle, ScopeStore};

tokio::task_local! {
    static REQUEST_SCOPE: ScopeToken;
}

struct TokenInner {
    id: Ulid,
    store: ScopeHandle,
}

/// Identity of one in-flight request.
///
/// Cloning is cheap; clones compare equal. Tokens minted separately never do.
/// A scoped instance must not hold its own request's token (keep the
/// [`id`](Self::id) instead), or the token and its instances keep each other
/// alive.
#[derive(Clone)]
pub struct ScopeToken {
    inner: Arc<TokenInner>,
}

impl ScopeToken {
    fn mint() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                id: Ulid::new(),
                store: Arc::new(ScopeStore::new()),
            }),
        }
    }

    pub fn id(&self) -> Ulid {
        self.inner.id
    }

    /// Store holding the instances cached for this request.
    pub fn handle(&self) -> ScopeHandle {
        self.inner.store.clone()
    }
}

impl PartialEq for ScopeToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ScopeToken {}

impl fmt::Debug for ScopeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopeToken").field(&self.inner.id).finish()
    }
}

impl fmt::Display for ScopeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner.id, f)
    }
}

/// Maps the current async task to its request's [`ScopeToken`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestScopeProvider;

impl RequestScopeProvider {
    pub fn new() -> Self {
        Self
    }

    /// Mint a token for a new inbound request.
    ///
    /// The token is not active until passed to [`scope`](Self::scope).
    pub fn begin_request(&self) -> ScopeToken {
        let token = ScopeToken::mint();
        tracing::debug!(scope = %token, "Request scope started");
        token
    }

    /// Run `future` with `token` as the ambient request scope.
    pub fn scope<F: Future>(&self, token: ScopeToken, future: F) -> TaskLocalFuture<ScopeToken, F> {
        REQUEST_SCOPE.scope(token, future)
    }

    /// Run synchronous code with `token` as the ambient request scope.
    pub fn sync_scope<R>(&self, token: ScopeToken, f: impl FnOnce() -> R) -> R {
        REQUEST_SCOPE.sync_scope(token, f)
    }

    /// Mint a token and run `future` inside it.
    pub fn within_request<F: Future>(&self, future: F) -> TaskLocalFuture<ScopeToken, F> {
        let token = self.begin_request();
        self.scope(token, future)
    }

    /// Token of the request the current task belongs to.
    ///
    /// Never mints; outside a request this is [`KernelError::NoActiveScope`].
    pub fn current_token(&self) -> Result<ScopeToken, KernelError> {
        REQUEST_SCOPE
            .try_with(ScopeToken::clone)
            .map_err(|_| KernelError::NoActiveScope)
    }

    /// Scope callback for `in_scope_with` bindings.
    ///
    /// Queries the current token on every resolution.
    pub fn request_scope(&self) -> ScopeCallback {
        let provider = *self;
        Arc::new(move |_: &Kernel| provider.current_token().map(|token| token.handle()))
    }
}

/// Spawn a task that stays in the current request scope (if any).
///
/// The task's outcome is observed: an `Err` is logged and returned through
/// the handle, and a panic is logged before it propagates to the handle.
pub fn spawn<F, T, E>(future: F) -> JoinHandle<Result<T, E>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let token = RequestScopeProvider.current_token().ok();
    let span = tracing::Span::current();

    tokio::spawn(
        async move {
            let scope = token.as_ref().map(ToString::to_string);
            let outcome = match token {
                Some(token) => {
                    AssertUnwindSafe(REQUEST_SCOPE.scope(token, future))
                        .catch_unwind()
                        .await
                }
                None => AssertUnwindSafe(future).catch_unwind().await,
            };

            match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => {
                    tracing::error!(error = %err, scope = ?scope, "Spawned task failed");
                    Err(err)
                }
                Err(panic) => {
                    tracing::error!(scope = ?scope, "Spawned task panicked");
                    std::panic::resume_unwind(panic)
                }
            }
        }
        .instrument(span),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_no_scope_outside_request() {
        let provider = RequestScopeProvider::new();
        assert!(matches!(
            provider.current_token(),
            Err(KernelError::NoActiveScope)
        ));
    }

    #[test]
    fn test_minted_tokens_are_distinct() {
        let provider = RequestScopeProvider::new();
        let a = provider.begin_request();
        let b = provider.begin_request();

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a.id(), b.id());
        assert!(Arc::ptr_eq(&a.handle(), &a.clone().handle()));
        assert!(!Arc::ptr_eq(&a.handle(), &b.handle()));
    }

    #[test]
    fn test_sync_scope() {
        let provider = RequestScopeProvider::new();
        let token = provider.begin_request();

        let current = provider.sync_scope(token.clone(), || provider.current_token().unwrap());
        assert_eq!(current, token);
        assert!(provider.current_token().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_token_survives_suspension() {
        let provider = RequestScopeProvider::new();
        let token = provider.begin_request();

        let observed = provider
            .scope(token.clone(), async move {
                let before = provider.current_token().unwrap();
                for _ in 0..5 {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    tokio::task::yield_now().await;
                }
                let after = provider.current_token().unwrap();
                (before, after)
            })
            .await;

        assert_eq!(observed.0, token);
        assert_eq!(observed.1, token);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_do_not_share_tokens() {
        let provider = RequestScopeProvider::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                tokio::spawn(provider.within_request(async move {
                    let first = provider.current_token().unwrap();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    let second = provider.current_token().unwrap();
                    assert_eq!(first, second);
                    first
                }))
            })
            .collect();

        let tokens: Vec<ScopeToken> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        for (i, a) in tokens.iter().enumerate() {
            for b in &tokens[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[tokio::test]
    async fn test_spawn_inherits_scope() {
        let provider = RequestScopeProvider::new();
        let token = provider.begin_request();

        let child = provider
            .scope(token.clone(), async move {
                spawn(async move {
                    tokio::task::yield_now().await;
                    provider.current_token()
                })
                .await
                .unwrap()
            })
            .await
            .unwrap();

        assert_eq!(child, token);
    }

    #[tokio::test]
    async fn test_spawn_outside_request_has_no_scope() {
        let result = spawn(async { RequestScopeProvider.current_token() })
            .await
            .unwrap();
        assert!(matches!(result, Err(KernelError::NoActiveScope)));
    }

    #[tokio::test]
    async fn test_spawn_reports_failure() {
        let handle = spawn(async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Err::<(), _>("background work failed".to_string())
        });

        let result = handle.await.unwrap();
        assert_eq!(result.unwrap_err(), "background work failed");
    }

    #[tokio::test]
    async fn test_spawn_panic_reaches_handle() {
        let handle = spawn(async {
            if true {
                panic!("boom");
            }
            Ok::<(), String>(())
        });

        let err = handle.await.unwrap_err();
        assert!(err.is_panic());
    }
}
