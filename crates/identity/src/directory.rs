use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use url::Url;

/// Client for the external user directory that owns identity records.
#[derive(Clone)]
pub struct DirectoryClient {
    http: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl DirectoryClient {
    /// Creates a new directory client with the provided configuration.
    pub fn new(base_url: Url, access_token: Option<String>, http: Client) -> Self {
        Self {
            http,
            base_url,
            access_token,
        }
    }

    /// Looks up the users with the given ids. Unknown ids are omitted from the result.
    pub async fn lookup_users(&self, ids: &[String]) -> Result<Vec<DirectoryUser>, DirectoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut url = self.base_url.join("users")?;
        {
            let mut query = url.query_pairs_mut();
            for id in ids {
                query.append_pair("id", id);
            }
        }

        let response = self.request(Method::GET, url).send().await?;
        parse_json::<UserListResponse>(response)
            .await
            .map(|body| body.data)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.access_token {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct UserListResponse {
    data: Vec<DirectoryUser>,
}

/// Identity record as returned by the directory.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DirectoryUser {
    pub id: String,
    pub display_name: String,
}

/// Errors produced by the directory client.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

async fn parse_json<T>(response: Response) -> Result<T, DirectoryError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(DirectoryError::Status { status, body });
    }

    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(base_url: &Url, token: Option<&str>) -> DirectoryClient {
        DirectoryClient::new(
            base_url.clone(),
            token.map(str::to_string),
            Client::builder().build().expect("client"),
        )
    }

    #[tokio::test]
    async fn lookup_users_sends_every_id_and_parses_response() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/directory/")).expect("url");
        let client = client(&base, Some("token"));

        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/directory/users")
                    .query_param("id", "user-a")
                    .query_param("id", "user-b")
                    .header("Authorization", "Bearer token");
                then.status(200).json_body(json!({
                    "data": [
                        { "id": "user-a", "display_name": "alice@example.com" }
                    ]
                }));
            })
            .await;

        let users = client
            .lookup_users(&["user-a".to_string(), "user-b".to_string()])
            .await
            .expect("lookup users");
        mock.assert_async().await;

        assert_eq!(
            users,
            vec![DirectoryUser {
                id: "user-a".to_string(),
                display_name: "alice@example.com".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn empty_id_list_skips_the_request() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/directory/")).expect("url");
        let client = client(&base, None);

        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/directory/users");
                then.status(200).json_body(json!({ "data": [] }));
            })
            .await;

        let users = client.lookup_users(&[]).await.expect("lookup");
        assert!(users.is_empty());
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn error_status_returns_message() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/directory/")).expect("url");
        let client = client(&base, None);

        server
            .mock_async(|when, then| {
                when.method(GET).path("/directory/users");
                then.status(503).body("maintenance");
            })
            .await;

        let err = client
            .lookup_users(&["user-a".to_string()])
            .await
            .expect_err("should error");
        match err {
            DirectoryError::Status { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
