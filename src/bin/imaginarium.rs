//! Imaginarium API server

use imaginarium::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}
