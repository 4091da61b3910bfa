//! Finds where a user can request a fresh API token once the current one got rejected.

use eyre::{
    Context as _,
    Result,
};
use serde::Deserialize;
use std::{
    future::Future,
    pin::Pin,
};
use url::Url;

const OAUTH_METADATA_PATH: &str = ".well-known/oauth-authorization-server";
const TOKEN_REQUEST_PATH: &str = "oauth/token/request";

pub trait TokenRequestLookup: Send + Sync {
    /// URL of the page that hands out new access tokens.
    fn token_request_url(&self) -> Pin<Box<dyn Future<Output = Result<Url>> + Send + '_>>;
}

/// Resolves the token request page through the OAuth metadata the cluster API server publishes.
#[derive(Debug, Clone)]
pub struct OAuthDiscovery {
    http_client: reqwest::Client,
    api_server_url: Url,
}

#[derive(Debug, Deserialize)]
struct OAuthMetadata {
    issuer: Url,
}

impl OAuthDiscovery {
    pub fn new(http_client: reqwest::Client, api_server_url: Url) -> Self {
        Self {
            http_client,
            api_server_url,
        }
    }

    async fn discover(&self) -> Result<Url> {
        let metadata_url = with_trailing_slash(self.api_server_url.clone()).join(OAUTH_METADATA_PATH)?;
        let metadata: OAuthMetadata = self
            .http_client
            .get(metadata_url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .wrap_err_with(|| format!("Failed to fetch OAuth metadata from {metadata_url}"))?
            .json()
            .await
            .wrap_err("Failed to decode OAuth metadata")?;

        let url = with_trailing_slash(metadata.issuer).join(TOKEN_REQUEST_PATH)?;
        debug!(%url, "resolved token request url");
        Ok(url)
    }
}

impl TokenRequestLookup for OAuthDiscovery {
    fn token_request_url(&self) -> Pin<Box<dyn Future<Output = Result<Url>> + Send + '_>> {
        Box::pin(self.discover())
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::{
        matchers::{
            method,
            path,
        },
        Mock,
        MockServer,
        ResponseTemplate,
    };

    #[tokio::test]
    async fn token_request_url_from_issuer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-authorization-server"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": "https://oauth-openshift.apps.example.com",
                "authorization_endpoint": "https://oauth-openshift.apps.example.com/oauth/authorize",
            })))
            .mount(&server)
            .await;

        let lookup = OAuthDiscovery::new(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());
        let url = lookup.token_request_url().await.unwrap();
        assert_eq!(
            url.as_str(),
            "https://oauth-openshift.apps.example.com/oauth/token/request"
        );
    }

    #[tokio::test]
    async fn missing_metadata_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let lookup = OAuthDiscovery::new(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());
        assert!(lookup.token_request_url().await.is_err());
    }
}
