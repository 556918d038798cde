mod query_payload;
mod rag_response;
mod routes;

use anyhow::{Context, Result};
use bedrock_rag::{RagAgent, Settings};
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let settings = Settings::from_env().context("invalid configuration")?;
    let agent = RagAgent::from_settings(&settings).context("failed to initialize RAG agent")?;
    log::info!("RAG agent initialized");

    let app = routes::router(Arc::new(agent));

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("cannot bind {}", bind_addr))?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
