//! Network implementation of [`Upstream`].
//!
//! Talks JSON to the media server (`/library/...`, `/activities`) and, when
//! configured, to the analytics companion (`/api/v2?cmd=...`). Every request
//! carries the configured timeout; responses are passed through
//! [`crate::normalize`] before they leave this module.
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | sections | `GET {server}/library/sections` |
//! | recently added | `GET {server}/library/sections/{id}/recentlyAdded` |
//! | metadata | `GET {server}/library/metadata/{ratingKey}` |
//! | poster | `GET {server}{thumb}` |
//! | activity | `GET {server}/activities` |
//! | library summary | `GET {analytics}/api/v2?cmd=get_libraries` (falls back to sections) |

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::models::{MediaItem, PosterImage, Section};
use crate::normalize;
use crate::upstream::Upstream;

pub struct HttpUpstream {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl HttpUpstream {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("mdsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    fn server_url(&self, path: &str) -> String {
        format!("{}{}", self.config.server_url.trim_end_matches('/'), path)
    }

    async fn server_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.server_url(path);
        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("X-Plex-Token", &self.config.token)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {} failed", path))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("GET {} returned {}", path, status);
        }
        resp.json::<Value>()
            .await
            .with_context(|| format!("GET {} returned invalid JSON", path))
    }

    async fn analytics_json(&self, cmd: &str) -> Result<Option<Value>> {
        let (Some(base), Some(key)) = (
            self.config.analytics_url.as_deref(),
            self.config.analytics_api_key.as_deref(),
        ) else {
            return Ok(None);
        };
        let url = format!("{}/api/v2", base.trim_end_matches('/'));
        let resp = self
            .client
            .get(&url)
            .query(&[("apikey", key), ("cmd", cmd)])
            .send()
            .await
            .with_context(|| format!("analytics {} failed", cmd))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("analytics {} returned {}", cmd, status);
        }
        let body: Value = resp.json().await?;
        match body.pointer("/response/result").and_then(Value::as_str) {
            Some("success") | None => Ok(Some(body)),
            Some(other) => bail!("analytics {} reported {}", cmd, other),
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn sections(&self) -> Result<Vec<Section>> {
        let payload = self.server_json("/library/sections", &[]).await?;
        Ok(normalize::sections(&payload))
    }

    async fn library_summary(&self) -> Result<Value> {
        if let Some(body) = self.analytics_json("get_libraries").await? {
            return Ok(body);
        }
        self.server_json("/library/sections", &[]).await
    }

    async fn activity(&self) -> Result<Value> {
        self.server_json("/activities", &[]).await
    }

    async fn recently_added(&self, section_id: &str, count: usize) -> Result<Vec<MediaItem>> {
        let path = format!("/library/sections/{}/recentlyAdded", section_id);
        let payload = self
            .server_json(
                &path,
                &[
                    ("X-Plex-Container-Start", "0".to_string()),
                    ("X-Plex-Container-Size", count.to_string()),
                ],
            )
            .await?;
        let mut items = normalize::stubs(&payload, section_id);
        items.truncate(count);
        Ok(items)
    }

    async fn metadata(&self, rating_key: &str) -> Result<MediaItem> {
        let path = format!("/library/metadata/{}", rating_key);
        let payload = self.server_json(&path, &[]).await?;
        let raw = normalize::records(&payload, &["Metadata", "data"])
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no metadata returned for {}", rating_key))?;
        normalize::media_item(raw, None, true)
    }

    async fn poster(&self, item: &MediaItem) -> Result<PosterImage> {
        let thumb = item
            .thumb
            .as_deref()
            .ok_or_else(|| anyhow!("item {} has no poster path", item.rating_key))?;
        let resp = self
            .client
            .get(self.server_url(thumb))
            .header("X-Plex-Token", &self.config.token)
            .send()
            .await
            .with_context(|| format!("poster download failed for {}", item.rating_key))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("poster for {} returned {}", item.rating_key, status);
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = resp.bytes().await?.to_vec();
        if bytes.is_empty() {
            bail!("empty poster body for {}", item.rating_key);
        }
        Ok(PosterImage {
            bytes,
            content_type,
        })
    }
}
