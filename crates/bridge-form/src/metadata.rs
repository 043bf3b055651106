use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::error::{HttpError, MetadataError};
use crate::ipfs::{extract_ipfs_cid_from_url, gateway_url};
use crate::token::Token;

const ID_PLACEHOLDER: &str = "{id}";

/// NFT metadata document. Fields missing from the source are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftMetadata {
    pub description: String,
    pub external_url: String,
    pub image: String,
    pub name: String,
}

impl NftMetadata {
    /// Map a fetched document, tolerating missing, null or non-string fields.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            description: field("description"),
            external_url: field("external_url"),
            image: field("image"),
            name: field("name"),
        }
    }
}

/// Minimal HTTP client used for metadata requests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Body of a successful GET. Non-success statuses are errors.
    async fn get(&self, url: &str) -> Result<String, HttpError>;
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    async fn get(&self, url: &str) -> Result<String, HttpError> {
        (**self).get(url).await
    }
}

/// Detects whether a content blocker is intercepting requests to `url`.
#[async_trait]
pub trait AdblockProbe: Send + Sync {
    async fn is_blocked(&self, url: &str) -> bool;
}

/// Probe that never reports a blocker.
pub struct NoAdblock;

#[async_trait]
impl AdblockProbe for NoAdblock {
    async fn is_blocked(&self, _url: &str) -> bool {
        false
    }
}

/// Probe that re-requests the url and treats a request that never got a
/// response as blocked. An HTTP status, even an error one, means the request
/// went through.
pub struct HttpAdblockProbe<C> {
    client: C,
}

impl<C: HttpClient> HttpAdblockProbe<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: HttpClient> AdblockProbe for HttpAdblockProbe<C> {
    async fn is_blocked(&self, url: &str) -> bool {
        match self.client.get(url).await {
            Ok(_) => false,
            Err(e) => {
                debug!(url = %url, error = %e, "adblock probe failed");
                e.is_transport()
            }
        }
    }
}

/// Resolves NFT metadata from a token uri, with one retry through a public IPFS gateway.
pub struct MetadataFetcher<C, A> {
    client: C,
    adblock: A,
    timeout: Duration,
}

impl<C, A> MetadataFetcher<C, A>
where
    C: HttpClient,
    A: AdblockProbe,
{
    pub fn new(client: C, adblock: A) -> Self {
        Self::with_config(client, adblock, &Config::default())
    }

    pub fn with_config(client: C, adblock: A, config: &Config) -> Self {
        Self {
            client,
            adblock,
            timeout: config.http_timeout(),
        }
    }

    /// Fetch the metadata document of `token`.
    ///
    /// A literal `{id}` in the uri is replaced by the token id, and the
    /// resolved uri is written back to `token.uri`.
    pub async fn fetch_metadata(&self, token: &mut Token) -> Result<NftMetadata, MetadataError> {
        if !token.kind.is_nft() {
            warn!(token = %token.label(), kind = %token.kind, "not an NFT");
            return Err(MetadataError::NotNft {
                name: token.name.clone(),
            });
        }
        let Some(uri) = token.uri.clone() else {
            warn!(token = %token.label(), "no metadata uri");
            return Err(MetadataError::MissingUri {
                name: token.name.clone(),
            });
        };

        let url = if uri.contains(ID_PLACEHOLDER) {
            let Some(id) = &token.id else {
                warn!(token = %token.label(), uri = %uri, "uri has an id placeholder but token has no id");
                return Err(MetadataError::InvalidUri {
                    uri,
                    reason: "no token id to substitute".to_string(),
                });
            };
            let resolved = uri.replace(ID_PLACEHOLDER, &id.to_string());
            token.uri = Some(resolved.clone());
            resolved
        } else {
            uri
        };

        if let Err(e) = Url::parse(&url) {
            warn!(token = %token.label(), url = %url, error = %e, "invalid metadata uri");
            return Err(MetadataError::InvalidUri {
                uri: url,
                reason: e.to_string(),
            });
        }

        debug!(token = %token.label(), url = %url, "fetching metadata");
        match self.get(&url).await {
            Ok(body) if !body.trim().is_empty() => parse_metadata(token, &url, &body),
            Ok(_) => {
                if self.adblock.is_blocked(&url).await {
                    warn!(token = %token.label(), url = %url, "request blocked by a content blocker, retrying through gateway");
                    self.fetch_from_gateway(token, &url).await
                } else {
                    warn!(token = %token.label(), url = %url, "empty metadata response");
                    Err(MetadataError::NotFound { url })
                }
            }
            Err(e) => {
                warn!(token = %token.label(), url = %url, error = %e, "metadata request failed, retrying through gateway");
                self.fetch_from_gateway(token, &url).await
            }
        }
    }

    async fn fetch_from_gateway(&self, token: &Token, url: &str) -> Result<NftMetadata, MetadataError> {
        let Some(cid) = extract_ipfs_cid_from_url(url) else {
            warn!(token = %token.label(), url = %url, "no IPFS cid in metadata url");
            return Err(MetadataError::NotFound {
                url: url.to_string(),
            });
        };
        let Some(id) = &token.id else {
            warn!(token = %token.label(), url = %url, "no token id for gateway lookup");
            return Err(MetadataError::NotFound {
                url: url.to_string(),
            });
        };

        let gateway = gateway_url(&cid, id);
        debug!(token = %token.label(), url = %gateway, "fetching metadata from gateway");
        match self.get(&gateway).await {
            Ok(body) if !body.trim().is_empty() => parse_metadata(token, &gateway, &body),
            Ok(_) => {
                warn!(token = %token.label(), url = %gateway, "empty gateway response");
                Err(MetadataError::NotFound { url: gateway })
            }
            Err(e) => {
                warn!(token = %token.label(), url = %gateway, error = %e, "gateway request failed");
                Err(MetadataError::NotFound { url: gateway })
            }
        }
    }

    async fn get(&self, url: &str) -> Result<String, HttpError> {
        match tokio::time::timeout(self.timeout, self.client.get(url)).await {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout {
                url: url.to_string(),
            }),
        }
    }
}

fn parse_metadata(token: &Token, url: &str, body: &str) -> Result<NftMetadata, MetadataError> {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => Ok(NftMetadata::from_value(&value)),
        Err(e) => {
            warn!(token = %token.label(), url = %url, error = %e, "metadata is not valid JSON");
            Err(MetadataError::NotFound {
                url: url.to_string(),
            })
        }
    }
}
