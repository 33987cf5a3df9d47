//! `secureyeoman role` subcommands.

use clap::Subcommand;
use serde_json::json;

use super::emit;
use crate::client::ApiClient;

#[derive(Subcommand)]
pub(crate) enum RoleCommand {
    /// List roles.
    List,
    /// Create a role.
    Create {
        /// Role name.
        name: String,
        /// Permissions as `resource:action` pairs.
        #[arg(long = "permission")]
        permissions: Vec<String>,
        /// Parent role ids to inherit from.
        #[arg(long = "inherit")]
        inherit_from: Vec<String>,
    },
    /// Delete a role by id.
    Delete {
        /// Role id.
        id: String,
    },
}

pub(crate) async fn run(client: &ApiClient, command: RoleCommand) -> anyhow::Result<()> {
    let value = match command {
        RoleCommand::List => client.get("/api/v1/roles").await?,
        RoleCommand::Create {
            name,
            permissions,
            inherit_from,
        } => {
            let permissions: Vec<serde_json::Value> = permissions
                .iter()
                .map(|p| {
                    let (resource, action) = p.split_once(':').unwrap_or((p.as_str(), "read"));
                    json!({"resource": resource, "action": action})
                })
                .collect();
            client
                .post(
                    "/api/v1/roles",
                    &json!({
                        "name": name,
                        "permissions": permissions,
                        "inheritFrom": inherit_from,
                    }),
                )
                .await?
        },
        RoleCommand::Delete { id } => client.delete(&format!("/api/v1/roles/{id}")).await?,
    };
    emit(client, &value);
    Ok(())
}
