//! Check command handler.

use color_eyre::Result;
use serde::Serialize;

use crate::config::StrategyKind;
use crate::context::Context;
use crate::kernel::BindingInfo;

use super::app::{controller_catalog, extra_modules};
use super::App;

/// Summary of the published kernel.
#[derive(Debug, Serialize)]
struct CheckReport {
    strategy: StrategyKind,
    modules: Vec<String>,
    controllers: Vec<&'static str>,
    bindings: Vec<BindingInfo>,
}

impl CheckReport {
    /// Build and publish the application kernel and describe it.
    fn build(ctx: &Context) -> Result<Self> {
        let catalog = controller_catalog();
        let kernel = ctx.configure(&catalog, extra_modules(ctx))?;

        Ok(Self {
            strategy: ctx.config.strategy.kind,
            modules: kernel.module_names(),
            controllers: catalog.type_names(),
            bindings: kernel.bindings(),
        })
    }
}

impl App {
    /// Build and publish the application kernel, then print its bindings.
    pub fn run_check(&self, ctx: &Context, json: bool) -> Result<()> {
        let report = CheckReport::build(ctx)?;

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!("Strategy: {:?}", report.strategy);
        println!("Modules:  {}", report.modules.join(", "));
        println!("Bindings:");
        for binding in &report.bindings {
            println!(
                "  {:<10} {:<60} ({})",
                binding.scope.to_string(),
                binding.type_name,
                binding.module
            );
        }

        Ok(())
    }
}
