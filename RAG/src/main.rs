use anyhow::{Context, Result};
use bedrock_rag::{chat, RagAgent, Settings};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let settings = Settings::from_env().context("invalid configuration")?;
    let agent = RagAgent::from_settings(&settings).context("failed to start RAG agent")?;

    chat::chat_loop(&agent, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
    Ok(())
}
