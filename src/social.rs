//! Publish adapter: a capability trait per platform and a name-keyed
//! router in front of them.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

use crate::config;
use crate::model::PublishConfirmation;

const LINKEDIN_API_BASE: &str = "https://api.linkedin.com/";

/// One posting capability. An implementation makes a single publish
/// attempt; on failure nothing must have been published.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn publish(&self, text: &str, media_url: Option<&str>) -> Result<PublishConfirmation>;
}

/// Dispatches publish requests to the platform named on the work item.
pub struct SocialRouter {
    platforms: HashMap<String, Box<dyn Platform>>,
}

impl SocialRouter {
    /// Router with every platform the configuration carries
    /// credentials for. An empty router is valid; every publish then
    /// fails as unsupported and gets recorded on the item.
    pub fn from_config(cfg: &config::Config) -> Self {
        let mut router = Self::empty();
        if let Some(linkedin) = &cfg.linkedin {
            router = router.with_platform("linkedin", Box::new(LinkedInClient::from_config(linkedin)));
        }
        router
    }

    pub fn empty() -> Self {
        Self {
            platforms: HashMap::new(),
        }
    }

    /// Register a platform under a name. Lookup is case-insensitive.
    pub fn with_platform(mut self, name: &str, platform: Box<dyn Platform>) -> Self {
        self.platforms.insert(name.to_ascii_lowercase(), platform);
        self
    }

    pub async fn publish(
        &self,
        platform_name: &str,
        text: &str,
        media_url: Option<&str>,
    ) -> Result<PublishConfirmation> {
        info!(platform = platform_name, "dispatching publish request");
        match self.platforms.get(&platform_name.to_ascii_lowercase()) {
            Some(platform) => platform.publish(text, media_url).await,
            None => Err(anyhow!("posting to '{}' is not supported", platform_name)),
        }
    }
}

impl fmt::Debug for SocialRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocialRouter")
            .field("platforms", &self.platforms.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Clone)]
pub struct LinkedInClient {
    http: Client,
    base_url: Url,
    access_token: String,
    author_urn: String,
}

impl fmt::Debug for LinkedInClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedInClient")
            .field("base_url", &self.base_url)
            .field("author_urn", &self.author_urn)
            .finish_non_exhaustive()
    }
}

impl LinkedInClient {
    pub fn from_config(cfg: &config::LinkedIn) -> Self {
        let base_url = Url::parse(LINKEDIN_API_BASE).expect("valid default LinkedIn URL");
        Self::with_base_url(cfg.access_token.clone(), cfg.author_urn.clone(), base_url)
    }

    pub fn with_base_url(access_token: String, author_urn: String, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("postbot/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            access_token,
            author_urn,
        }
    }
}

#[async_trait]
impl Platform for LinkedInClient {
    async fn publish(&self, text: &str, media_url: Option<&str>) -> Result<PublishConfirmation> {
        let body = build_share_request(&self.author_urn, text, media_url);
        let endpoint = self
            .base_url
            .join("v2/ugcPosts")
            .context("invalid LinkedIn base URL")?;

        debug!(payload = %body, "sending LinkedIn share");
        let res = self
            .http
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&body)
            .send()
            .await
            .context("failed to reach LinkedIn")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("linkedin error {}: {}", status, body));
        }

        // The share exists as soon as LinkedIn answers 201; an odd
        // response body must not turn that success into an error.
        let body = res.text().await.unwrap_or_default();
        let post_id = serde_json::from_str::<ShareResponse>(&body)
            .ok()
            .and_then(|r| r.id);
        info!(
            post_id = post_id.as_deref().unwrap_or("unknown"),
            "published to LinkedIn"
        );
        Ok(PublishConfirmation {
            platform: "linkedin".into(),
            post_id,
        })
    }
}

/// UGC share payload: a plain text share, or an article share carrying
/// the media reference when one is present.
pub fn build_share_request(author_urn: &str, text: &str, media_url: Option<&str>) -> Value {
    let media_url = media_url.filter(|url| !url.is_empty());

    let mut share_content = json!({
        "shareCommentary": { "text": text },
        "shareMediaCategory": if media_url.is_some() { "ARTICLE" } else { "NONE" },
    });
    if let Some(url) = media_url {
        share_content["media"] = json!([{ "status": "READY", "originalUrl": url }]);
    }

    json!({
        "author": author_urn,
        "lifecycleState": "PUBLISHED",
        "specificContent": { "com.linkedin.ugc.ShareContent": share_content },
        "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" },
    })
}

#[derive(Deserialize)]
struct ShareResponse {
    id: Option<String>,
}
