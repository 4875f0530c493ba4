use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FetchError, Listing, ListingSource};

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Listing source backed by the file server's HTTP API
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    /// `timeout` applies to whole requests. Without one, requests wait as long as
    /// the connection stays open.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| FetchError::Transport(err.into()))?;

        Ok(HttpSource {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn listing_url(&self, path: &str) -> String {
        format!("{}/api/files{}", self.base_url, path)
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, username: &str, password: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .post(format!("{}/api/login", self.base_url))
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.into()))?;

        let body = read_success(response).await?;
        serde_json::from_slice::<LoginResponse>(&body)
            .map(|login| login.token)
            .map_err(FetchError::Malformed)
    }
}

#[async_trait]
impl ListingSource for HttpSource {
    async fn list(&self, path: &str, token: Option<&str>) -> Result<Listing, FetchError> {
        let url = self.listing_url(path);
        debug!(%url, authenticated = token.is_some(), "requesting listing");

        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.into()))?;

        let body = read_success(response).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        serde_json::from_slice(&body).map_err(FetchError::Malformed)
    }
}

/// Return the body of a 2xx response, or map the status to a `FetchError`
async fn read_success(response: Response) -> Result<Vec<u8>, FetchError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|err| FetchError::Transport(err.into()))?;

    if status.is_success() {
        return Ok(body.to_vec());
    }

    let message = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(|body| body.error);

    if status == StatusCode::UNAUTHORIZED {
        Err(FetchError::Unauthenticated { message })
    } else {
        Err(FetchError::Status {
            status: status.as_u16(),
            message,
        })
    }
}
