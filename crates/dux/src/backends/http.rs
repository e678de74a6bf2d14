//! 📡 A generic JSON-over-HTTP tree provider.
//!
//! Two endpoints, no ceremony:
//!
//! ```text
//! GET {base_url}/nodes/{id}                          -> Entry JSON
//! GET {base_url}/nodes/{id}/children?page_token=...  -> {"children": [...], "next_page_token": ...}
//! ```
//!
//! 🔒 Auth is a static bearer token, if you have one. Getting that token is somebody
//! else's adventure.
//!
//! 🚦 Status codes decide the retry fate: 408, 429 and 5xx are transient; every other
//! non-2xx is terminal. Connect failures and timeouts are transient. A body we cannot
//! decode is terminal, because it will be just as undecodable next time.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::trace;

use crate::backends::{ProviderError, TreeProvider};
use crate::common::{ChildPage, Entry, NodeId};

/// 🔧 Where the API lives and how long we're willing to wait for it.
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// 📡 Include scheme + host + any path prefix. Yes, all of it.
    pub base_url: String,
    /// 🏠 Default root node id when the CLI isn't given one.
    #[serde(default)]
    pub root: Option<String>,
    /// 🔒 Sent as `Authorization: Bearer ...` when present.
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
struct ChildrenResponse {
    #[serde(default)]
    children: Vec<NodeId>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug)]
pub struct HttpTree {
    // 📡 one client, reused, because a new client per request is buying a new car per grocery run
    client: reqwest::Client,
    base_url: Url,
    config: HttpConfig,
}

impl HttpTree {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("💀 '{}' is not a URL we can talk to", config.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!(
                "💀 '{}' can't have paths appended to it. Try something with a scheme and a host.",
                config.base_url
            );
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. The TLS stack wept.")?;
        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn default_root(&self) -> Option<NodeId> {
        self.config.root.clone().map(NodeId::from)
    }

    fn node_url(&self, id: &NodeId, tail: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        // -- ✅ cannot_be_a_base was ruled out in new(), so the segments are always there
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("nodes").push(id.as_str());
            if let Some(tail) = tail {
                segments.push(tail);
            }
        }
        url
    }

    async fn fetch(&self, id: &NodeId, url: Url) -> Result<String, ProviderError> {
        trace!("📡 GET {}", url);
        let mut request = self.client.get(url);
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|err| classify_transport(id, &err))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(id, status, &body));
        }
        response
            .text()
            .await
            .map_err(|err| classify_transport(id, &err))
    }
}

fn classify_status(id: &NodeId, status: StatusCode, body: &str) -> ProviderError {
    let message = format!("'{id}': HTTP {status}: {body}");
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        ProviderError::transient(message)
    } else {
        ProviderError::terminal(message)
    }
}

fn classify_transport(id: &NodeId, err: &reqwest::Error) -> ProviderError {
    if err.is_decode() || err.is_builder() {
        ProviderError::terminal(format!("'{id}': {err}"))
    } else {
        ProviderError::transient(format!("'{id}': {err}"))
    }
}

fn decode<T: serde::de::DeserializeOwned>(id: &NodeId, body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body)
        .map_err(|err| ProviderError::terminal(format!("'{id}': undecodable response: {err}")))
}

#[async_trait]
impl TreeProvider for HttpTree {
    async fn get_node(&self, id: &NodeId) -> Result<Entry, ProviderError> {
        let body = self.fetch(id, self.node_url(id, None)).await?;
        decode(id, &body)
    }

    async fn list_children(
        &self,
        id: &NodeId,
        cursor: Option<&str>,
    ) -> Result<ChildPage, ProviderError> {
        let mut url = self.node_url(id, Some("children"));
        if let Some(cursor) = cursor {
            url.query_pairs_mut().append_pair("page_token", cursor);
        }
        let body = self.fetch(id, url).await?;
        let response: ChildrenResponse = decode(id, &body)?;
        Ok(ChildPage {
            children: response.children,
            // -- 🕳️ some APIs say "no more pages" with null, some with "". we accept both dialects.
            next_cursor: response.next_page_token.filter(|token| !token.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tree_for(server: &MockServer, token: Option<&str>) -> HttpTree {
        HttpTree::new(HttpConfig {
            base_url: format!("{}/api/", server.uri()),
            root: Some("root".to_string()),
            bearer_token: token.map(str::to_string),
            connect_timeout_secs: 2,
            request_timeout_secs: 2,
        })
        .expect("💀 client should build")
    }

    #[tokio::test]
    async fn the_one_where_a_node_arrives_as_json_with_a_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/nodes/f1"))
            .and(header("authorization", "Bearer sekrit"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"id":"f1","name":"cv.pdf","size":1024,"owners":["me@example.com"],"download_url":"https://dl/f1"}"#,
            ))
            .mount(&server)
            .await;

        let tree = tree_for(&server, Some("sekrit"));
        let entry = tree.get_node(&NodeId::from("f1")).await.expect("💀 node");
        assert_eq!(entry.name, "cv.pdf");
        assert_eq!(entry.size, 1024);
        assert_eq!(entry.owners, vec!["me@example.com".to_string()]);
        assert_eq!(tree.default_root(), Some(NodeId::from("root")));
    }

    #[tokio::test]
    async fn the_one_where_the_page_token_rides_along_in_the_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/nodes/root/children"))
            .and(query_param("page_token", "p2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"children":["c"],"next_page_token":""}"#),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/nodes/root/children"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"children":["a","b"],"next_page_token":"p2"}"#),
            )
            .mount(&server)
            .await;

        let tree = tree_for(&server, None);
        let root = NodeId::from("root");
        let first = tree.list_children(&root, None).await.expect("💀 page 1");
        assert_eq!(first.children, vec![NodeId::from("a"), NodeId::from("b")]);
        assert_eq!(first.next_cursor.as_deref(), Some("p2"));

        let second = tree.list_children(&root, Some("p2")).await.expect("💀 page 2");
        assert_eq!(second.children, vec![NodeId::from("c")]);
        assert_eq!(second.next_cursor, None);
    }

    #[tokio::test]
    async fn the_one_where_status_codes_pick_the_retry_fate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/nodes/busy"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/nodes/broken"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/nodes/secret"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/nodes/garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>lol</html>"))
            .mount(&server)
            .await;

        let tree = tree_for(&server, None);
        let busy = tree.get_node(&NodeId::from("busy")).await.expect_err("💀 429");
        assert!(busy.is_retryable());
        let broken = tree.get_node(&NodeId::from("broken")).await.expect_err("💀 503");
        assert!(broken.is_retryable());
        let secret = tree.get_node(&NodeId::from("secret")).await.expect_err("💀 403");
        assert!(!secret.is_retryable());
        let garbled = tree.get_node(&NodeId::from("garbled")).await.expect_err("💀 html");
        assert!(!garbled.is_retryable());
        // -- 🕳️ nothing mounted for this one, wiremock answers 404
        let ghost = tree.get_node(&NodeId::from("ghost")).await.expect_err("💀 404");
        assert!(!ghost.is_retryable());
    }
}
