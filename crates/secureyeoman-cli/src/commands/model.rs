//! `secureyeoman model` subcommands.

use clap::Subcommand;
use serde_json::json;

use super::emit;
use crate::client::ApiClient;

#[derive(Subcommand)]
pub(crate) enum ModelCommand {
    /// Show the current provider, model, and usage.
    Info,
    /// List configured providers.
    List,
    /// Switch the default provider (and optionally pin a model).
    Switch {
        /// Provider name.
        provider: String,
        /// Model name to pin.
        #[arg(long)]
        model: Option<String>,
    },
    /// Default-model operations.
    #[command(subcommand)]
    Default(DefaultCommand),
    /// Show cost-optimization recommendations.
    CostRecommendations,
}

#[derive(Subcommand)]
pub(crate) enum DefaultCommand {
    /// Show the pinned default.
    Get,
    /// Pin a provider/model default.
    Set {
        /// Provider name.
        provider: String,
        /// Model name.
        #[arg(long)]
        model: Option<String>,
    },
    /// Clear the pinned model.
    Clear,
}

pub(crate) async fn run(client: &ApiClient, command: ModelCommand) -> anyhow::Result<()> {
    let value = match command {
        ModelCommand::Info => client.get("/api/v1/model/info").await?,
        ModelCommand::List => {
            let info = client.get("/api/v1/model/info").await?;
            json!({"providers": info["providers"]})
        },
        ModelCommand::Switch { provider, model } => {
            client
                .post("/api/v1/model/switch", &json!({"provider": provider, "model": model}))
                .await?
        },
        ModelCommand::Default(DefaultCommand::Get) => client.get("/api/v1/model/default").await?,
        ModelCommand::Default(DefaultCommand::Set { provider, model }) => {
            client
                .post("/api/v1/model/default", &json!({"provider": provider, "model": model}))
                .await?
        },
        ModelCommand::Default(DefaultCommand::Clear) => {
            client.delete("/api/v1/model/default").await?
        },
        ModelCommand::CostRecommendations => {
            client.get("/api/v1/model/cost-recommendations").await?
        },
    };
    emit(client, &value);
    Ok(())
}
