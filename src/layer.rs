//! Tower middleware that opens a request scope per call.
//!
//! Every request passed through [`RequestScopeService`] gets a freshly
//! minted [`ScopeToken`], bound for both the inner service's `call` and the
//! whole lifetime of the returned future.
//!
//! ```ignore
//! let service = ServiceBuilder::new()
//!     .layer(RequestScopeLayer::new())
//!     .service_fn(handle);
//! ```

use std::task::{Context, Poll};

use tokio::task::futures::TaskLocalFuture;
use tower::{Layer, Service};

use crate::scope::{RequestScopeProvider, ScopeToken};

/// Layer producing [`RequestScopeService`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestScopeLayer {
    provider: RequestScopeProvider,
}

impl RequestScopeLayer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> Layer<S> for RequestScopeLayer {
    type Service = RequestScopeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestScopeService {
            inner,
            provider: self.provider,
        }
    }
}

/// Runs each call of the inner service inside its own request scope.
#[derive(Debug, Clone)]
pub struct RequestScopeService<S> {
    inner: S,
    provider: RequestScopeProvider,
}

impl<S, R> Service<R> for RequestScopeService<S>
where
    S: Service<R>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = TaskLocalFuture<ScopeToken, S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: R) -> Self::Future {
        let token = self.provider.begin_request();
        let inner = &mut self.inner;
        // Services may resolve eagerly in `call`, before the future is polled
        let future = self
            .provider
            .sync_scope(token.clone(), move || inner.call(request));
        self.provider.scope(token, future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::time::Duration;
    use tower::{service_fn, ServiceExt};

    fn echo_scope() -> impl Service<(), Response = ScopeToken, Error = Infallible> + Clone {
        RequestScopeLayer::new().layer(service_fn(|_: ()| async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            let token = RequestScopeProvider.current_token().expect("inside request");
            Ok::<_, Infallible>(token)
        }))
    }

    #[tokio::test]
    async fn test_each_call_gets_a_scope() {
        let service = echo_scope();

        let a = service.clone().oneshot(()).await.unwrap();
        let b = service.oneshot(()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_scope_covers_eager_call_work() {
        let mut service = RequestScopeLayer::new().layer(service_fn(|_: ()| {
            // Runs inside `call`, before the future exists
            let eager = RequestScopeProvider.current_token();
            async move {
                let lazy = RequestScopeProvider.current_token();
                Ok::<_, Infallible>((eager, lazy))
            }
        }));

        let (eager, lazy) = service.ready().await.unwrap().call(()).await.unwrap();
        assert_eq!(eager.unwrap(), lazy.unwrap());
    }

    #[tokio::test]
    async fn test_scope_ends_with_request() {
        let service = echo_scope();
        service.oneshot(()).await.unwrap();

        assert!(RequestScopeProvider.current_token().is_err());
    }
}
