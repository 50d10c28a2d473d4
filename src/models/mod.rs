//! Backend model catalog, fetched once and cached.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::backend::{shared_client, status_to_error};
use crate::config::Config;
use crate::error::Result;
use crate::util::timeout::with_timeout;

/// Models suggested when the backend's catalog cannot be consulted.
pub const RECOMMENDED_MODELS: &[&str] = &["o4-mini", "o3"];

/// How long a support check is willing to wait on the catalog fetch.
const LIST_TIMEOUT: Duration = Duration::from_millis(2_000);

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Read-through cache over the backend's `/models` listing. The fetch runs
/// at most once per catalog instance; failures fall back to
/// [`RECOMMENDED_MODELS`] rather than erroring.
pub struct ModelCatalog {
    models: OnceCell<Vec<String>>,
}

impl ModelCatalog {
    pub const fn new() -> Self {
        Self {
            models: OnceCell::const_new(),
        }
    }

    /// Sorted model identifiers advertised by the backend.
    pub async fn available(&self, config: &Config) -> &[String] {
        self.models
            .get_or_init(|| async {
                match fetch_models(config).await {
                    Ok(models) => models,
                    Err(err) => {
                        warn!(error = %err, "model list fetch failed, using recommended set");
                        RECOMMENDED_MODELS.iter().map(|m| m.to_string()).collect()
                    }
                }
            })
            .await
    }

    /// Whether `model` is usable against the configured backend. Biased
    /// toward `true`: an empty, recommended, or unverifiable name never
    /// blocks a session over a catalog hiccup.
    pub async fn is_supported(&self, config: &Config, model: &str) -> bool {
        let model = model.trim();
        if model.is_empty() || RECOMMENDED_MODELS.contains(&model) {
            return true;
        }
        let listed = with_timeout(LIST_TIMEOUT, async { Ok(self.available(config).await) }).await;
        match listed {
            Ok(models) if !models.is_empty() => models.iter().any(|m| m == model),
            _ => true,
        }
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED_CATALOG: ModelCatalog = ModelCatalog::new();

/// Process-wide catalog shared by callers that do not manage their own.
pub fn shared_catalog() -> &'static ModelCatalog {
    &SHARED_CATALOG
}

async fn fetch_models(config: &Config) -> Result<Vec<String>> {
    let url = format!("{}/models", config.api_base.trim_end_matches('/'));
    let mut request = shared_client().get(&url);
    if let Some(key) = config.api_key.as_deref() {
        request = request.bearer_auth(key);
    }
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_to_error(status.as_u16(), &body));
    }
    let list: ModelList = response.json().await?;
    let mut models: Vec<String> = list.data.into_iter().map(|entry| entry.id).collect();
    models.sort();
    Ok(models)
}
