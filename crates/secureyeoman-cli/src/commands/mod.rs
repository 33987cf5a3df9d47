//! CLI command implementations.

pub(crate) mod execute;
pub(crate) mod memory;
pub(crate) mod model;
pub(crate) mod role;
pub(crate) mod security;

use colored::Colorize;
use rand::RngCore;
use serde_json::Value;

use crate::client::ApiClient;

/// Print a value: raw JSON in `--json` mode, pretty otherwise.
pub(crate) fn emit(client: &ApiClient, value: &Value) {
    if client.json_output() {
        println!("{value}");
    } else {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}

/// `secureyeoman status` - gateway liveness and model summary.
pub(crate) async fn status(client: &ApiClient) -> anyhow::Result<()> {
    let info = client.get("/api/v1/model/info").await?;
    if client.json_output() {
        println!("{info}");
        return Ok(());
    }

    println!("{}", "SecureYeoman gateway".bold());
    println!(
        "  version:  {}",
        info["version"].as_str().unwrap_or("unknown")
    );
    if info["configured"].as_bool().unwrap_or(false) {
        println!(
            "  provider: {} ({})",
            info["provider"].as_str().unwrap_or("-"),
            info["model"].as_str().unwrap_or("default")
        );
        println!(
            "  today:    {} tokens, ${:.4}",
            info["usage"]["tokens_used_today"].as_u64().unwrap_or(0),
            info["usage"]["cost_usd_today"].as_f64().unwrap_or(0.0)
        );
    } else {
        println!("  provider: {}", "none configured".yellow());
    }
    Ok(())
}

/// `secureyeoman init` - write a starter configuration with fresh secrets.
pub(crate) fn init(
    out: &std::path::Path,
    password: &str,
    json_output: bool,
) -> anyhow::Result<()> {
    let mut key_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key_bytes);
    let signing_key = hex::encode(key_bytes);
    rand::thread_rng().fill_bytes(&mut key_bytes);
    let token_secret = hex::encode(key_bytes);

    let password_hash = secureyeoman_auth::AdminCredential::hash_password(password)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .phc_hash()
        .to_string();

    let config = format!(
        "bind_addr = \"127.0.0.1:3030\"\n\
         data_dir = \"./data\"\n\
         signing_key = \"{signing_key}\"\n\
         token_secret = \"{token_secret}\"\n\
         admin_password_hash = '{password_hash}'\n\
         consolidation_schedule = \"0 3 * * *\"\n\
         allow_webhooks = true\n",
    );
    std::fs::write(out, config)?;

    if json_output {
        println!("{}", serde_json::json!({"written": out}));
    } else {
        println!("{} {}", "wrote".green(), out.display());
        println!("Set provider keys via ANTHROPIC_API_KEY / OPENAI_API_KEY / … and run:");
        println!("  secureyeoman start --config {}", out.display());
    }
    Ok(())
}
