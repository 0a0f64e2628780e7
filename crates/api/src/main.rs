use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Config first: it loads `.env`, which may carry RUST_LOG.
    let config = pricebook_infra::Config::from_env()?;
    pricebook_observability::init();

    let store = pricebook_infra::store::connect(&config).await?;
    let app = pricebook_api::app::build_app(store);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
