use anyhow::Context;
use tenant_crm::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load().context("loading server configuration")?;
    tenant_crm::run(config).await.context("server stopped")?;
    Ok(())
}
