//! Asana adapter: candidate search and field-level task mutations.
//! Pure adapter; which items get touched and when is the workflow's
//! decision.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;
use tracing::{debug, info, warn};

use crate::config;
use crate::model::{ApprovalStatus, WorkItem};

const ASANA_API_BASE: &str = "https://app.asana.com/api/1.0/";

/// Field projection for the candidate search. Keeps responses small.
const OPT_FIELDS: [&str; 4] = ["name", "notes", "completed", "custom_fields"];

/// Tracker-side operations the workflow depends on.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Items in the project with status Granted, not completed, and a
    /// coarse due date no later than tomorrow. Failure here is fatal
    /// for the whole run.
    async fn fetch_approved_candidates(&self) -> Result<Vec<WorkItem>>;

    /// Idempotent patch of the approval-status custom field.
    async fn set_status(&self, item_gid: &str, status: ApprovalStatus) -> Result<()>;

    async fn mark_complete(&self, item_gid: &str) -> Result<()>;

    async fn add_error_comment(&self, item_gid: &str, message: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct AsanaClient {
    http: Client,
    base_url: Url,
    token: String,
    project_gid: String,
    status_field: String,
    status_options: config::StatusOptions,
}

impl fmt::Debug for AsanaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsanaClient")
            .field("base_url", &self.base_url)
            .field("project_gid", &self.project_gid)
            .finish_non_exhaustive()
    }
}

impl AsanaClient {
    pub fn from_config(cfg: &config::Asana) -> Self {
        let base_url = Url::parse(ASANA_API_BASE).expect("valid default Asana URL");
        Self::with_base_url(cfg, base_url)
    }

    pub fn with_base_url(cfg: &config::Asana, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("postbot/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            token: cfg.pat.clone(),
            project_gid: cfg.project_gid.clone(),
            status_field: cfg.fields.status.clone(),
            status_options: cfg.status_options.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let endpoint = self
            .base_url
            .join(path)
            .context("invalid Asana base URL")?;
        Ok(self
            .http
            .request(method, endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json"))
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        action: &'static str,
    ) -> Result<reqwest::Response> {
        let res = request
            .send()
            .await
            .with_context(|| format!("failed to reach Asana while {action}"))?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!("rate limited by Asana: {}", body);
            return Err(anyhow!("received 429 from Asana: {}", body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("asana error {} while {}: {}", status, action, body));
        }
        Ok(res)
    }
}

#[async_trait]
impl TaskSource for AsanaClient {
    async fn fetch_approved_candidates(&self) -> Result<Vec<WorkItem>> {
        // Coarse horizon: anything scheduled later than tomorrow can't
        // be due yet, so the server filters it out up front.
        let horizon = Utc::now().date_naive() + Duration::days(1);
        let body = build_search_request(
            &self.project_gid,
            &self.status_field,
            self.status_options.gid(ApprovalStatus::Granted),
            horizon,
        );

        info!("searching for approved tasks");
        let request = self.request(Method::POST, "tasks")?.json(&body);
        let res = self.send(request, "searching tasks").await?;
        let payload: SearchResponse = res
            .json()
            .await
            .context("invalid Asana search response")?;
        info!(count = payload.data.len(), "found candidate tasks");
        Ok(payload.data)
    }

    async fn set_status(&self, item_gid: &str, status: ApprovalStatus) -> Result<()> {
        debug!(item_gid, status = status.as_str(), "updating task status");
        let body = build_status_update(&self.status_field, self.status_options.gid(status));
        let request = self
            .request(Method::PUT, &format!("tasks/{item_gid}"))?
            .json(&body);
        self.send(request, "updating task status").await?;
        Ok(())
    }

    async fn mark_complete(&self, item_gid: &str) -> Result<()> {
        debug!(item_gid, "marking task complete");
        let request = self
            .request(Method::PUT, &format!("tasks/{item_gid}"))?
            .json(&build_complete_request());
        self.send(request, "completing task").await?;
        Ok(())
    }

    async fn add_error_comment(&self, item_gid: &str, message: &str) -> Result<()> {
        debug!(item_gid, "adding error comment to task");
        let request = self
            .request(Method::POST, &format!("tasks/{item_gid}/stories"))?
            .json(&build_comment_request(message));
        self.send(request, "adding error comment").await?;
        Ok(())
    }
}

/// Structured filter payload for the task search endpoint.
pub fn build_search_request(
    project_gid: &str,
    status_field_gid: &str,
    granted_option_gid: &str,
    due_before: NaiveDate,
) -> Value {
    let mut data = Map::new();
    data.insert("projects.any".into(), json!([project_gid]));
    data.insert(
        format!("custom_fields.{status_field_gid}.value"),
        json!(granted_option_gid),
    );
    data.insert("completed".into(), json!(false));
    data.insert(
        "due_on.before".into(),
        json!(due_before.format("%Y-%m-%d").to_string()),
    );
    data.insert("opt_fields".into(), json!(OPT_FIELDS.join(",")));

    json!({ "data": Value::Object(data) })
}

/// Partial update patching a single custom-field option.
pub fn build_status_update(status_field_gid: &str, option_gid: &str) -> Value {
    let mut custom_fields = Map::new();
    custom_fields.insert(status_field_gid.to_string(), json!(option_gid));
    json!({ "data": { "custom_fields": Value::Object(custom_fields) } })
}

pub fn build_complete_request() -> Value {
    json!({ "data": { "completed": true } })
}

/// Rich-text comment body; the error text is escaped so it can't break
/// out of the HTML wrapper.
pub fn build_comment_request(message: &str) -> Value {
    let html = format!(
        "<body><strong>🤖 Automation Bot Error:</strong><br>{}</body>",
        escape_html(message)
    );
    json!({ "data": { "html_text": html } })
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<WorkItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> config::Asana {
        config::Asana {
            pat: "pat-1".into(),
            project_gid: "proj-1".into(),
            fields: config::Fields {
                status: "f-status".into(),
                platform: "f-platform".into(),
                media: "f-media".into(),
                date: "f-date".into(),
                time: "f-time".into(),
            },
            status_options: config::StatusOptions {
                granted: "o-granted".into(),
                posting: "o-posting".into(),
                posted: "o-posted".into(),
                failed: "o-failed".into(),
            },
        }
    }

    #[test]
    fn build_search_request_shapes_filter() {
        let body = build_search_request(
            "proj-1",
            "f-status",
            "o-granted",
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        );
        let data = &body["data"];
        assert_eq!(data["projects.any"][0], "proj-1");
        assert_eq!(data["custom_fields.f-status.value"], "o-granted");
        assert_eq!(data["completed"], false);
        assert_eq!(data["due_on.before"], "2024-01-02");
        assert_eq!(data["opt_fields"], "name,notes,completed,custom_fields");
    }

    #[test]
    fn build_status_update_patches_single_field() {
        let body = build_status_update("f-status", "o-posting");
        assert_eq!(body["data"]["custom_fields"]["f-status"], "o-posting");
    }

    #[test]
    fn build_status_update_is_repeatable() {
        // Replaying the same transition must produce the same patch.
        assert_eq!(
            build_status_update("f-status", "o-posted"),
            build_status_update("f-status", "o-posted"),
        );
    }

    #[test]
    fn build_complete_request_sets_flag() {
        assert_eq!(build_complete_request()["data"]["completed"], true);
    }

    #[test]
    fn build_comment_request_wraps_and_escapes() {
        let body = build_comment_request("posting to '<TikTok>' failed & more");
        let html = body["data"]["html_text"].as_str().unwrap();
        assert!(html.starts_with("<body><strong>🤖 Automation Bot Error:</strong><br>"));
        assert!(html.contains("&lt;TikTok&gt;"));
        assert!(html.contains("&amp; more"));
        assert!(html.ends_with("</body>"));
    }

    #[test]
    fn request_sets_auth_and_path() {
        let client = AsanaClient::from_config(&sample_config());
        let request = client
            .request(Method::PUT, "tasks/1200")
            .unwrap()
            .json(&json!({}))
            .build()
            .unwrap();

        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.url().path(), "/api/1.0/tasks/1200");
        assert_eq!(
            request
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "Bearer pat-1"
        );
    }

    #[test]
    fn search_response_parses_items() {
        let payload: SearchResponse = serde_json::from_value(json!({
            "data": [
                { "gid": "1", "name": "a", "notes": "", "completed": false, "custom_fields": [] },
                { "gid": "2", "name": "b" }
            ]
        }))
        .unwrap();
        assert_eq!(payload.data.len(), 2);
        assert_eq!(payload.data[1].gid, "2");
    }
}
