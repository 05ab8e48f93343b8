use std::path::Path;

use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use market_escrow::csv::{read_operations, write_balances};
use market_escrow::{EscrowConfig, EscrowEngine};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .expect("usage: market-escrow <operations.csv>");
    if !path.ends_with(".csv") {
        warn!("input file '{path}' does not have a .csv extension");
    }

    let mut engine = EscrowEngine::new(EscrowConfig::from_env());
    let (tx, rx) = tokio::sync::mpsc::channel(16);

    let reader = tokio::spawn(async move {
        for op in read_operations(Path::new(&path)) {
            match op {
                Ok(op) => {
                    if tx.send(op).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("{e}"),
            }
        }
    });

    engine.run(ReceiverStream::new(rx)).await;
    let _ = reader.await;

    write_balances(std::io::stdout(), engine.accounts());
}
