//! Upstream URL construction

use crate::state::EntityKind;
use crate::ConfigError;
use url::Url;

/// Builds catalog and detail URLs below the configured API base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    /// Validates `base_url` and strips any trailing slash
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::InvalidUrl(format!(
                    "{}: unsupported scheme '{}'",
                    base_url, other
                )))
            }
        }

        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `GET {base}/{endpoint}?page={page}`
    pub fn catalog(&self, kind: EntityKind, page: u32) -> String {
        format!("{}/{}?page={}", self.base, kind.endpoint(), page)
    }

    /// `GET {base}/{endpoint}/{id}/full`
    pub fn detail(&self, kind: EntityKind, mal_id: i64) -> String {
        format!("{}/{}/{}/full", self.base, kind.endpoint(), mal_id)
    }
}
