use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use crate::cache::{
    DEFAULT_TOKEN_URI, FirebaseAuth, FirebaseStore, LocalFileStore, ResponseStore, ServiceAccount,
    TokenSource,
};
use crate::error::ConfigError;
use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, GeminiClient, Generator};
use crate::insight::InsightService;

const DEFAULT_PORT: u16 = 3000;

/// Credentials for the Realtime Database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirebaseCredentials {
    None,
    /// `FIREBASE_AUTH_TOKEN`: a legacy database secret or ID token.
    DatabaseSecret(String),
    /// `FIREBASE_CLIENT_EMAIL` + `FIREBASE_PRIVATE_KEY`.
    ServiceAccount(ServiceAccount),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Firebase {
        database_url: Url,
        credentials: FirebaseCredentials,
    },
    Local {
        cache_dir: PathBuf,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub api_key: String,
    pub model: String,
    pub gemini_base_url: String,
    pub store: StoreConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads settings through `lookup`, treating blank values as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = match var("INSIGHT_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|err| ConfigError::Invalid {
                var: "INSIGHT_PORT",
                reason: err.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let api_key = var("GOOGLE_API_KEY").ok_or(ConfigError::Missing("GOOGLE_API_KEY"))?;
        let model = var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let gemini_base_url = match var("GEMINI_BASE_URL") {
            Some(raw) => validate_http_url("GEMINI_BASE_URL", &raw)?.to_string(),
            None => DEFAULT_BASE_URL.to_string(),
        };

        let store = match var("INSIGHT_STORE").as_deref().unwrap_or("firebase") {
            "firebase" => {
                let raw = var("FIREBASE_DATABASE_URL")
                    .ok_or(ConfigError::Missing("FIREBASE_DATABASE_URL"))?;
                StoreConfig::Firebase {
                    database_url: validate_http_url("FIREBASE_DATABASE_URL", &raw)?,
                    credentials: firebase_credentials(&var)?,
                }
            }
            "local" => StoreConfig::Local {
                cache_dir: var("CACHE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_cache_dir),
            },
            other => {
                return Err(ConfigError::Invalid {
                    var: "INSIGHT_STORE",
                    reason: format!("expected `firebase` or `local`, got `{other}`"),
                });
            }
        };

        Ok(Self {
            port,
            api_key,
            model,
            gemini_base_url,
            store,
        })
    }

    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// A service account wins over `FIREBASE_AUTH_TOKEN` when both are set.
fn firebase_credentials<V>(var: V) -> Result<FirebaseCredentials, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    match (var("FIREBASE_CLIENT_EMAIL"), var("FIREBASE_PRIVATE_KEY")) {
        (Some(client_email), Some(private_key)) => {
            let token_uri = match var("FIREBASE_TOKEN_URI") {
                Some(raw) => validate_http_url("FIREBASE_TOKEN_URI", &raw)?.to_string(),
                None => DEFAULT_TOKEN_URI.to_string(),
            };
            Ok(FirebaseCredentials::ServiceAccount(ServiceAccount {
                project_id: var("FIREBASE_PROJECT_ID"),
                private_key_id: var("FIREBASE_PRIVATE_KEY_ID"),
                // Keys pasted into .env files usually carry escaped newlines.
                private_key: private_key.replace("\\n", "\n"),
                client_email,
                token_uri,
            }))
        }
        (Some(_), None) => Err(ConfigError::Missing("FIREBASE_PRIVATE_KEY")),
        (None, Some(_)) => Err(ConfigError::Missing("FIREBASE_CLIENT_EMAIL")),
        (None, None) => Ok(match var("FIREBASE_AUTH_TOKEN") {
            Some(token) => FirebaseCredentials::DatabaseSecret(token),
            None => FirebaseCredentials::None,
        }),
    }
}

fn default_cache_dir() -> PathBuf {
    let mut base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push("chart-insight");
    base
}

fn validate_http_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let parsed = Url::parse(raw).map_err(|err| ConfigError::Invalid {
        var,
        reason: err.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(ConfigError::Invalid {
            var,
            reason: format!("only http or https is allowed, got {scheme}"),
        }),
    }
}

/// Client handles built once at startup and shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub insights: InsightService,
}

impl AppState {
    pub fn build(config: &Config) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("chart-insight/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ConfigError::Invalid {
                var: "HTTP client",
                reason: err.to_string(),
            })?;

        let store: Arc<dyn ResponseStore> = match &config.store {
            StoreConfig::Firebase {
                database_url,
                credentials,
            } => {
                let auth = match credentials {
                    FirebaseCredentials::None => FirebaseAuth::Anonymous,
                    FirebaseCredentials::DatabaseSecret(token) => {
                        FirebaseAuth::DatabaseSecret(token.clone())
                    }
                    FirebaseCredentials::ServiceAccount(account) => {
                        let source = TokenSource::new(http.clone(), account.clone()).map_err(
                            |err| ConfigError::Invalid {
                                var: "FIREBASE_PRIVATE_KEY",
                                reason: err.to_string(),
                            },
                        )?;
                        FirebaseAuth::ServiceAccount(Arc::new(source))
                    }
                };
                Arc::new(FirebaseStore::new(http.clone(), database_url.clone(), auth))
            }
            StoreConfig::Local { cache_dir } => Arc::new(LocalFileStore::new(cache_dir.clone())),
        };
        let generator: Arc<dyn Generator> = Arc::new(GeminiClient::with_base_url(
            http,
            config.api_key.clone(),
            config.gemini_base_url.clone(),
            config.model.clone(),
        ));

        Ok(Self {
            insights: InsightService::new(store, generator),
        })
    }
}
