use anyhow::{Context, Result};
use lumi_core::config::LumiConfig;
use lumi_core::runtime::LumiRuntime;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Credentials usually live in .env next to the binary
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lumi=debug,lumi_core=debug")),
        )
        .init();

    let config = LumiConfig::load();

    // Handlers interleave at await points on one thread.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    rt.block_on(async move {
        let runtime = LumiRuntime::bootstrap(config)
            .await
            .context("failed to bootstrap Lumi")?;

        tokio::select! {
            _ = runtime.run() => {
                tracing::warn!("Inbound stream ended");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
            }
        }
        Ok(())
    })
}
