//! Line-delimited JSON-RPC over stdio exposing session reports as tools.

mod dto;
pub mod handlers;
mod router;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub use handlers::AppState;

/// Serve requests from stdin until it closes
pub async fn run_stdio(state: AppState) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(response) = router::handle_line(&state, line) {
            let mut out = serde_json::to_string(&response)?;
            out.push('\n');
            stdout.write_all(out.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
    tracing::debug!("stdin closed, server exiting");
    Ok(())
}
