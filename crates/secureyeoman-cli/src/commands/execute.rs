//! `secureyeoman execute` subcommands.

use clap::Subcommand;
use serde_json::json;

use super::emit;
use crate::client::ApiClient;

#[derive(Subcommand)]
pub(crate) enum ExecuteCommand {
    /// Submit a query task and wait for its result.
    Run {
        /// The prompt text.
        text: String,
        /// Submit without waiting for completion.
        #[arg(long)]
        no_wait: bool,
    },
    /// List submitted tasks.
    History,
    /// Show a single task.
    Show {
        /// Task id.
        id: String,
    },
    /// Cancel a queued task.
    Cancel {
        /// Task id.
        id: String,
    },
}

pub(crate) async fn run(client: &ApiClient, command: ExecuteCommand) -> anyhow::Result<()> {
    let value = match command {
        ExecuteCommand::Run { text, no_wait } => {
            client
                .post(
                    "/api/v1/tasks",
                    &json!({
                        "name": "cli query",
                        "input": {"text": text},
                        "wait": !no_wait,
                    }),
                )
                .await?
        },
        ExecuteCommand::History => client.get("/api/v1/tasks").await?,
        ExecuteCommand::Show { id } => client.get(&format!("/api/v1/tasks/{id}")).await?,
        ExecuteCommand::Cancel { id } => {
            client
                .post(&format!("/api/v1/tasks/{id}/cancel"), &json!({}))
                .await?
        },
    };
    emit(client, &value);
    Ok(())
}
