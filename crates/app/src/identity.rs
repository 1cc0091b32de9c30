use std::collections::HashMap;

use async_trait::async_trait;
use tracing::warn;
use url::Url;

use seminar_hub_core::store::{IdentityDirectory, IdentityError};
use seminar_hub_identity::DirectoryClient;
use seminar_hub_util::IdentityConfig;

/// Source of organizer display names.
#[derive(Clone)]
pub enum DirectoryBackend {
    Remote(DirectoryClient),
    /// No directory configured; every user is shown by id.
    Passthrough,
}

impl DirectoryBackend {
    pub fn from_config(
        config: Option<&IdentityConfig>,
        http: reqwest::Client,
    ) -> Result<Self, url::ParseError> {
        let Some(config) = config else {
            warn!(stage = "app", "APP_IDENTITY_URL not set; organizers are displayed by id");
            return Ok(Self::Passthrough);
        };
        let base_url = Url::parse(&with_trailing_slash(&config.base_url))?;
        Ok(Self::Remote(DirectoryClient::new(
            base_url,
            config.access_token.clone(),
            http,
        )))
    }
}

#[async_trait]
impl IdentityDirectory for DirectoryBackend {
    async fn display_names(&self, ids: &[String]) -> Result<HashMap<String, String>, IdentityError> {
        match self {
            Self::Remote(client) => {
                let users = client.lookup_users(ids).await.map_err(IdentityError::new)?;
                Ok(users
                    .into_iter()
                    .map(|user| (user.id, user.display_name))
                    .collect())
            }
            Self::Passthrough => Ok(HashMap::new()),
        }
    }
}

fn with_trailing_slash(value: &str) -> String {
    if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    }
}
