//! Demo command handler: concurrent requests against request-scoped controllers.

use std::sync::{Arc, Weak};
use std::time::Duration;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use futures::future::try_join_all;
use tower::{service_fn, Layer, ServiceExt};

use crate::config::DemoConfig;
use crate::context::Context;
use crate::inject::SelfInjecting;
use crate::layer::RequestScopeLayer;
use crate::proxy::ServiceProxy;
use crate::scope::{self, ScopeToken};

use super::app::{
    controller_catalog, extra_modules, HomeController, RequestLog, StatusController,
};
use super::App;

/// What one simulated request observed.
struct RequestReport {
    request_id: usize,
    scope: ScopeToken,
    controller: Arc<HomeController>,
    stable: bool,
    child_shared: bool,
}

impl App {
    /// Simulate concurrent requests and verify request scoping.
    pub async fn run_demo(
        &self,
        ctx: &Context,
        requests: Option<usize>,
        resolutions: Option<usize>,
    ) -> Result<()> {
        let mut demo = ctx.config.demo.clone();
        if let Some(requests) = requests {
            demo.requests = requests;
        }
        if let Some(resolutions) = resolutions {
            demo.resolutions = resolutions;
        }

        ctx.configure(&controller_catalog(), extra_modules(ctx))?;

        // Framework-constructed controller, populated after construction
        let status = SelfInjecting::activate::<StatusController>(&ctx.proxy)?;
        tracing::info!(
            greeting = status.greeting().unwrap_or("<none>"),
            settings = ?status.settings,
            "Self-injected status controller ready"
        );

        let proxy = ctx.proxy.clone();
        let per_request = demo.clone();
        let service = RequestScopeLayer::new().layer(service_fn(move |request_id: usize| {
            let proxy = proxy.clone();
            let demo = per_request.clone();
            async move { handle_request(proxy, request_id, demo).await }
        }));

        let reports = try_join_all(
            (0..demo.requests).map(|request_id| service.clone().oneshot(request_id)),
        )
        .await?;

        let stable = reports.iter().all(|r| r.stable && r.child_shared);
        let distinct = reports.iter().enumerate().all(|(i, a)| {
            reports[i + 1..]
                .iter()
                .all(|b| a.scope != b.scope && !Arc::ptr_eq(&a.controller, &b.controller))
        });

        for report in &reports {
            println!(
                "request {:>3}  scope {}  entries {}  stable {}",
                report.request_id,
                report.scope,
                report.controller.log().entries().len(),
                report.stable && report.child_shared
            );
        }
        println!("One controller per request:      {}", stable);
        println!("No controller shared by requests: {}", distinct);

        // Requests are over; their scoped instances go with the tokens
        let logs: Vec<Weak<RequestLog>> = reports
            .iter()
            .map(|r| Arc::downgrade(r.controller.log()))
            .collect();
        drop(reports);
        let live = logs.iter().filter(|log| log.strong_count() > 0).count();
        println!("Scoped instances still alive:     {}", live);

        observe_background_failure(demo_pause(ctx)).await;

        if !(stable && distinct) {
            return Err(eyre!("request scoping violated"));
        }
        if live > 0 {
            return Err(eyre!("{} scoped instances outlived their requests", live));
        }
        Ok(())
    }
}

fn demo_pause(ctx: &Context) -> Duration {
    Duration::from_millis(ctx.config.demo.pause_ms)
}

async fn handle_request(
    proxy: Arc<ServiceProxy>,
    request_id: usize,
    demo: DemoConfig,
) -> Result<RequestReport> {
    let token = proxy.scopes().current_token()?;
    let controller = proxy.get::<HomeController>()?;
    let mut stable = true;

    for step in 0..demo.resolutions {
        tokio::time::sleep(Duration::from_millis(demo.pause_ms)).await;
        let again = proxy.get::<HomeController>()?;
        stable &= Arc::ptr_eq(&controller, &again);
        again.handle(step);
    }

    // Child tasks stay in the request that spawned them
    let child_proxy = proxy.clone();
    let child = scope::spawn(async move { child_proxy.get::<HomeController>() }).await??;
    let child_shared = Arc::ptr_eq(&controller, &child);

    tracing::debug!(request_id, scope = %token, stable, child_shared, "Request handled");
    Ok(RequestReport {
        request_id,
        scope: token,
        controller,
        stable,
        child_shared,
    })
}

/// Fire off a task that fails after a delay and show the failure is observed.
async fn observe_background_failure(delay: Duration) {
    let handle = scope::spawn(async move {
        tokio::time::sleep(delay).await;
        Err::<(), _>("background task gave up".to_string())
    });

    match handle.await {
        Ok(Ok(())) => tracing::info!("Background task finished"),
        Ok(Err(err)) => println!("Background failure observed: {}", err),
        Err(err) => println!("Background task aborted: {}", err),
    }
}
