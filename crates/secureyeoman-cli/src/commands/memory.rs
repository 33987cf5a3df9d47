//! `secureyeoman memory` subcommands.

use clap::Subcommand;
use serde_json::json;

use super::emit;
use crate::client::ApiClient;

#[derive(Subcommand)]
pub(crate) enum MemoryCommand {
    /// Search memories by similarity.
    Search {
        /// Query text.
        query: String,
        /// Result count.
        #[arg(long, default_value_t = 10)]
        k: usize,
    },
    /// List all memories.
    Memories,
    /// Show memory statistics.
    Stats,
    /// Run deep consolidation now.
    Consolidate {
        /// Compute actions without applying them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Rebuild the vector index from stored memories.
    Reindex,
}

pub(crate) async fn run(client: &ApiClient, command: MemoryCommand) -> anyhow::Result<()> {
    let value = match command {
        MemoryCommand::Search { query, k } => {
            client
                .post("/api/v1/brain/search/similar", &json!({"query": query, "k": k}))
                .await?
        },
        MemoryCommand::Memories => client.get("/api/v1/brain/memories").await?,
        MemoryCommand::Stats => client.get("/api/v1/brain/stats").await?,
        MemoryCommand::Consolidate { dry_run } => {
            client
                .post("/api/v1/brain/consolidation/run", &json!({"dryRun": dry_run}))
                .await?
        },
        MemoryCommand::Reindex => client.post("/api/v1/brain/reindex", &json!({})).await?,
    };
    emit(client, &value);
    Ok(())
}
