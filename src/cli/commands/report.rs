use anyhow::Result;

use crate::config::Config;
use crate::session::SessionContext;

/// Print the full report for a session, defaulting to the latest active one
pub async fn run(config: Config, session_id: Option<String>) -> Result<()> {
    let ctx = SessionContext::new(config);
    println!("{}", ctx.report_text(session_id.as_deref()));
    Ok(())
}

/// Print the short summary box for the latest active session
pub async fn run_inline(config: Config) -> Result<()> {
    let ctx = SessionContext::new(config);
    println!("{}", ctx.inline_text());
    Ok(())
}
