//! CLI module for kernel-scope.
//!
//! Subcommands:
//! - `check`: Build and publish the application kernel, then print its bindings
//! - `demo`: Simulate concurrent requests against request-scoped controllers

mod app;
mod check;
mod demo;

use clap::{Parser, Subcommand};
use color_eyre::Result;

use crate::config::Config;
use crate::context::Context;

pub use app::{
    app_modules, controller_catalog, AppModule, Greeting, HomeController, RequestLog,
    RequestModule, StatusController,
};

/// kernel-scope - request-scoped dependency injection
#[derive(Parser)]
#[command(name = "kernel-scope")]
#[command(about = "Kernel resolution strategies and request-scoped dependency injection")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the application kernel and list its bindings
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Simulate concurrent requests through the request-scope middleware
    Demo {
        /// Number of concurrent requests (overrides config)
        #[arg(long)]
        requests: Option<usize>,

        /// Controller resolutions per request (overrides config)
        #[arg(long)]
        resolutions: Option<usize>,
    },
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;

        // Initialize logging
        let filter = if self.verbose {
            "debug".to_string()
        } else {
            config.log.filter.clone()
        };
        tracing_subscriber::fmt().with_env_filter(filter).init();

        let ctx = Context::global(config);
        ctx.install_strategy(app_modules());

        match self.command {
            Command::Check { json } => self.run_check(&ctx, json),
            Command::Demo {
                requests,
                resolutions,
            } => self.run_demo(&ctx, requests, resolutions).await,
        }
    }
}
