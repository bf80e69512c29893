use anyhow::Result;

use crate::config::Config;
use crate::server::{self, AppState};
use crate::session::SessionContext;

/// Answer JSON-RPC tool calls on stdin/stdout until stdin closes
pub async fn run(config: Config) -> Result<()> {
    let state = AppState {
        context: SessionContext::new(config),
    };
    tracing::info!(
        "Serving sessions from {}",
        state.context.manager.sessions_dir().display()
    );
    server::run_stdio(state).await
}
