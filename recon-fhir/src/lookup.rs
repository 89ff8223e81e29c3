//! HTTP adapter for the terminology lookup port.

use std::time::Duration;

use async_trait::async_trait;
use recon_core::CodeSystem;
use serde::Deserialize;

use crate::codes::{CodeInfo, CodeLookup, LookupError};

/// Calls `GET {base_url}/{system}/{code}` and expects `{name, category}`.
pub struct HttpCodeLookup {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct LookupResponse {
    name: Option<String>,
    #[serde(default)]
    display: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

impl HttpCodeLookup {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LookupError::Transport(err.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, system: CodeSystem, code: &str) -> String {
        format!("{}/{}/{}", self.base_url, system.slug(), code.trim())
    }
}

#[async_trait]
impl CodeLookup for HttpCodeLookup {
    async fn lookup(&self, system: CodeSystem, code: &str) -> Result<CodeInfo, LookupError> {
        let response = self
            .client
            .get(self.url(system, code))
            .send()
            .await
            .map_err(|err| LookupError::Transport(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(code.to_string()));
        }
        if !status.is_success() {
            return Err(LookupError::Transport(format!(
                "status {} for {}",
                status.as_u16(),
                code
            )));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|err| LookupError::Malformed(err.to_string()))?;

        let name = body
            .name
            .or(body.display)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| LookupError::Malformed(format!("no name for {code}")))?;

        Ok(CodeInfo {
            name,
            category: body.category,
        })
    }
}
