//! `secureyeoman security` subcommands.

use clap::Subcommand;
use colored::Colorize;
use serde_json::json;

use super::emit;
use crate::client::ApiClient;

#[derive(Subcommand)]
pub(crate) enum SecurityCommand {
    /// Verify the audit chain and show security posture.
    Status,
    /// Create an API key with a role.
    CreateKey {
        /// Key name.
        name: String,
        /// Role to assign.
        #[arg(long, default_value = "viewer")]
        role: String,
    },
    /// List API keys (hashes and prefixes only).
    Keys,
}

pub(crate) async fn run(client: &ApiClient, command: SecurityCommand) -> anyhow::Result<()> {
    match command {
        SecurityCommand::Status => {
            let report = client.post("/api/v1/audit/verify", &json!({})).await?;
            if client.json_output() {
                println!("{report}");
                return Ok(());
            }
            let valid = report["valid"].as_bool().unwrap_or(false);
            let checked = report["entriesChecked"].as_u64().unwrap_or(0);
            if valid {
                println!(
                    "{} audit chain intact ({checked} entries verified)",
                    "ok:".green().bold()
                );
            } else {
                println!(
                    "{} audit chain broken at sequence {}: {}",
                    "FAIL:".red().bold(),
                    report["firstBadSequence"],
                    report["error"].as_str().unwrap_or("unknown"),
                );
                anyhow::bail!("audit chain verification failed");
            }
            Ok(())
        },
        SecurityCommand::CreateKey { name, role } => {
            let created = client
                .post("/api/v1/auth/api-keys", &json!({"name": name, "role": role}))
                .await?;
            if !client.json_output() {
                println!("{}", "Store this key now; it is shown exactly once.".yellow());
            }
            emit(client, &created);
            Ok(())
        },
        SecurityCommand::Keys => {
            let keys = client.get("/api/v1/auth/api-keys").await?;
            emit(client, &keys);
            Ok(())
        },
    }
}
