//! httpq service entry point.
//!
//! Loads configuration and serves the rendezvous API until Ctrl-C.
use anyhow::Result;
use httpq::config::HttpqConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let config = HttpqConfig::from_env_or_yaml()?;
    httpq::server::run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}
