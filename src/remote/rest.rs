//! HTTP implementation of [`DataAccess`] against a PostgREST-style RPC API.
//!
//! Every operation is `POST {api}/rest/v1/rpc/{function}` with a JSON object
//! of `p_`-prefixed parameters. The public API key goes in both the `apikey`
//! header and as a bearer token. Edit rights are checked server-side from the
//! passphrase parameter.

use futures_util::future::BoxFuture;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{CreatedWorkspace, DataAccess, DataAccessError, DataResult, WorkspaceLookup};
use crate::local_db::state::parse_value;
use crate::shared::config::AppConfig;
use crate::shared::models::AppState;

const RESOLVE_TOKEN_FN: &str = "resolve_workspace_token";
const FETCH_STATE_FN: &str = "get_workspace_data";
const PUSH_STATE_FN: &str = "sync_workspace_data";
const ROTATE_TOKEN_FN: &str = "rotate_share_token";
const CREATE_WORKSPACE_FN: &str = "create_workspace";
const VERIFY_PASSPHRASE_FN: &str = "verify_workspace_passphrase";

#[derive(Debug, Deserialize)]
struct WorkspaceTokenRow {
    #[serde(alias = "id")]
    workspace_id: Uuid,
    #[serde(default)]
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedWorkspaceRow {
    id: Uuid,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    share_token: Option<String>,
}

/// Workspace service client over HTTP
#[derive(Debug, Clone)]
pub struct RestDataAccess {
    client: Client,
    base: String,
    api_key: String,
}

impl RestDataAccess {
    pub fn new(api_url: &Url, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base: api_url.as_str().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Client for the configured service, if one is configured
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let api_url = config.api_url.as_ref()?;
        let api_key = config.api_key.clone()?;
        Some(Self::new(api_url, api_key))
    }

    fn endpoint(&self, path: &str) -> DataResult<Url> {
        Url::parse(&format!("{}/rest/v1/{}", self.base, path))
            .map_err(|e| DataAccessError::protocol(format!("invalid endpoint {}: {}", path, e)))
    }

    /// Call an RPC function and return its JSON result (`Null` for an empty body)
    async fn rpc(&self, function: &str, params: Value) -> DataResult<Value> {
        let url = self.endpoint(&format!("rpc/{}", function))?;
        tracing::debug!("Calling RPC {}", function);

        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&params)
            .send()
            .await
            .map_err(|e| DataAccessError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(DataAccessError::from_status(status.as_u16(), error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DataAccessError::network(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| DataAccessError::protocol(format!("{} returned invalid JSON: {}", function, e)))
    }

    async fn rpc_as<T: DeserializeOwned>(&self, function: &str, params: Value) -> DataResult<Option<T>> {
        match single_row(self.rpc(function, params).await?) {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| DataAccessError::protocol(format!("{}: {}", function, e))),
            None => Ok(None),
        }
    }
}

/// Set-returning functions answer with an array; scalar ones with the value
fn single_row(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Array(rows) => rows.into_iter().next(),
        other => Some(other),
    }
}

impl DataAccess for RestDataAccess {
    fn resolve_token<'a>(&'a self, token: &'a str)
        -> BoxFuture<'a, DataResult<Option<WorkspaceLookup>>> {
        Box::pin(async move {
            let row: Option<WorkspaceTokenRow> = self
                .rpc_as(RESOLVE_TOKEN_FN, json!({ "p_token": token }))
                .await?;
            Ok(row.map(|row| WorkspaceLookup {
                id: row.workspace_id,
                short_name: row.short_name,
            }))
        })
    }

    fn fetch_state<'a>(&'a self, token: &'a str) -> BoxFuture<'a, DataResult<Option<AppState>>> {
        Box::pin(async move {
            let Some(document) = single_row(self.rpc(FETCH_STATE_FN, json!({ "p_token": token })).await?)
            else {
                return Ok(None);
            };

            parse_value(document).map(Some).map_err(|errors| {
                DataAccessError::protocol(format!(
                    "remote state failed validation: {}",
                    errors.messages().join("; ")
                ))
            })
        })
    }

    fn push_state<'a>(
        &'a self,
        workspace_id: Uuid,
        passphrase: Option<&'a str>,
        state: &'a AppState,
    ) -> BoxFuture<'a, DataResult<bool>> {
        Box::pin(async move {
            let params = json!({
                "p_workspace_id": workspace_id,
                "p_passphrase": passphrase,
                "p_state": state,
            });
            let accepted: Option<bool> = self.rpc_as(PUSH_STATE_FN, params).await?;
            Ok(accepted.unwrap_or(false))
        })
    }

    fn rotate_share_token<'a>(
        &'a self,
        workspace_id: Uuid,
        passphrase: Option<&'a str>,
    ) -> BoxFuture<'a, DataResult<Option<String>>> {
        Box::pin(async move {
            let params = json!({
                "p_workspace_id": workspace_id,
                "p_passphrase": passphrase,
            });
            self.rpc_as(ROTATE_TOKEN_FN, params).await
        })
    }

    fn create_workspace<'a>(&'a self, passphrase: &'a str)
        -> BoxFuture<'a, DataResult<CreatedWorkspace>> {
        Box::pin(async move {
            let row: CreatedWorkspaceRow = self
                .rpc_as(CREATE_WORKSPACE_FN, json!({ "p_passphrase": passphrase }))
                .await?
                .ok_or_else(|| DataAccessError::protocol("create_workspace returned no row"))?;
            Ok(CreatedWorkspace {
                id: row.id,
                short_name: row.short_name,
                share_token: row.share_token,
            })
        })
    }

    fn verify_passphrase<'a>(
        &'a self,
        workspace_id: Uuid,
        passphrase: &'a str,
    ) -> BoxFuture<'a, DataResult<bool>> {
        Box::pin(async move {
            let params = json!({
                "p_workspace_id": workspace_id,
                "p_passphrase": passphrase,
            });
            let valid: Option<bool> = self.rpc_as(VERIFY_PASSPHRASE_FN, params).await?;
            Ok(valid.unwrap_or(false))
        })
    }

    fn is_reachable(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let url = match self.endpoint("") {
                Ok(url) => url,
                Err(_) => return false,
            };
            match self
                .client
                .get(url)
                .header("apikey", &self.api_key)
                .bearer_auth(&self.api_key)
                .send()
                .await
            {
                Ok(response) => !response.status().is_server_error(),
                Err(e) => {
                    tracing::debug!("Health check failed: {}", e);
                    false
                }
            }
        })
    }
}
