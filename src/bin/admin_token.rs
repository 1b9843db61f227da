//! Issue an operator token for the admin-only routes

use anyhow::Context;
use chrono::Utc;
use payment_reconciler::config::AppConfig;
use payment_reconciler::infrastructure::adapters::AccessTokenManager;

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    let tokens = AccessTokenManager::new(&config.tokens);
    let token = tokens
        .generate_admin_at(Utc::now())
        .context("failed to sign admin token")?;
    println!("{}", token);
    eprintln!(
        "valid for {} seconds as subject '{}'",
        config.tokens.admin_max_age_seconds, config.tokens.admin_subject
    );
    Ok(())
}
