use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    sage_cli::main_entry().await
}
