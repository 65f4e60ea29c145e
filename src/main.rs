use clap::Parser;
use kernel_scope::cli::App;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    App::parse().run().await
}
