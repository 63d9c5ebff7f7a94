//! Firebase Realtime Database REST backend.
//!
//! Every node is addressable as `{database_url}/{path}.json`; a read of a
//! node that does not exist returns the JSON literal `null`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::cache::credentials::TokenSource;
use crate::cache::{CacheEntry, ContentId, ResponseStore};
use crate::error::StoreError;

#[derive(Debug, Deserialize)]
struct FirebaseErrorBody {
    error: Option<String>,
}

/// How requests to the database are authorized.
#[derive(Clone)]
pub enum FirebaseAuth {
    /// Rely on the database rules alone.
    Anonymous,
    /// Legacy database secret or ID token, sent as `auth=`.
    DatabaseSecret(String),
    /// OAuth token minted from a service account, sent as `access_token=`.
    ServiceAccount(Arc<TokenSource>),
}

impl fmt::Debug for FirebaseAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirebaseAuth::Anonymous => f.write_str("Anonymous"),
            FirebaseAuth::DatabaseSecret(_) => f.write_str("DatabaseSecret(<redacted>)"),
            FirebaseAuth::ServiceAccount(source) => {
                f.debug_tuple("ServiceAccount").field(source).finish()
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct FirebaseStore {
    client: Client,
    database_url: Url,
    auth: FirebaseAuth,
}

impl FirebaseStore {
    pub fn new(client: Client, database_url: Url, auth: FirebaseAuth) -> Self {
        Self {
            client,
            database_url,
            auth,
        }
    }

    /// `{database_url}/responses/{id}.json`, keeping any query the database
    /// URL already carries (e.g. `ns=` for emulators).
    async fn node_url(&self, id: &ContentId) -> Result<Url, StoreError> {
        let mut url = self.database_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                StoreError::InvalidKey(format!("{} cannot be a base URL", self.database_url))
            })?
            .pop_if_empty()
            .push("responses")
            .push(&format!("{id}.json"));
        match &self.auth {
            FirebaseAuth::Anonymous => {}
            FirebaseAuth::DatabaseSecret(token) => {
                url.query_pairs_mut().append_pair("auth", token);
            }
            FirebaseAuth::ServiceAccount(source) => {
                let token = source.access_token().await?;
                url.query_pairs_mut().append_pair("access_token", &token);
            }
        }
        Ok(url)
    }
}

async fn assert_ok_response(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<FirebaseErrorBody>(&text)
        .ok()
        .and_then(|body| body.error)
        .unwrap_or(text);
    Err(StoreError::Api { status, message })
}

#[async_trait]
impl ResponseStore for FirebaseStore {
    async fn get(&self, id: &ContentId) -> Result<Option<CacheEntry>, StoreError> {
        let response = self.client.get(self.node_url(id).await?).send().await?;
        let response = assert_ok_response(response).await?;
        let value: serde_json::Value = response.json().await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    async fn put(&self, id: &ContentId, entry: &CacheEntry) -> Result<(), StoreError> {
        let response = self
            .client
            .put(self.node_url(id).await?)
            .json(entry)
            .send()
            .await?;
        assert_ok_response(response).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "firebase"
    }
}
