//! Environment-sourced configuration for the relay.
use std::env;
use thiserror::Error;

use crate::model::ApprovalStatus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Immutable settings bundle, loaded once and passed into constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub asana: Asana,
    pub linkedin: Option<LinkedIn>,
}

/// Tracker credentials plus the board's field and option identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asana {
    pub pat: String,
    pub project_gid: String,
    pub fields: Fields,
    pub status_options: StatusOptions,
}

/// Custom-field gids on the content board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fields {
    pub status: String,
    pub platform: String,
    pub media: String,
    pub date: String,
    pub time: String,
}

/// Option gids for each choice of the approval-status drop-down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOptions {
    pub granted: String,
    pub posting: String,
    pub posted: String,
    pub failed: String,
}

impl StatusOptions {
    pub fn gid(&self, status: ApprovalStatus) -> &str {
        match status {
            ApprovalStatus::Granted => &self.granted,
            ApprovalStatus::Posting => &self.posting,
            ApprovalStatus::Posted => &self.posted,
            ApprovalStatus::PostingFailed => &self.failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedIn {
    pub access_token: String,
    pub author_urn: String,
}

/// Load configuration from process environment variables.
pub fn from_env() -> Result<Config, ConfigError> {
    load_with(|key| env::var(key).ok())
}

/// Load configuration through an arbitrary lookup function, so tests
/// can inject values without touching process-wide state.
pub fn load_with<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    let require = |key: &'static str| -> Result<String, ConfigError> {
        match lookup(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigError::Missing(key)),
        }
    };
    let optional = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

    let asana = Asana {
        pat: require("ASANA_PAT")?,
        project_gid: require("ASANA_PROJECT_GID")?,
        fields: Fields {
            status: require("ASANA_STATUS_FIELD_GID")?,
            platform: require("ASANA_PLATFORM_FIELD_GID")?,
            media: require("ASANA_IMAGE_URL_FIELD_GID")?,
            date: require("ASANA_DATE_FIELD_GID")?,
            time: require("ASANA_TIME_FIELD_GID")?,
        },
        status_options: StatusOptions {
            granted: require("ASANA_PERMISSION_GRANTED_GID")?,
            posting: require("ASANA_POSTING_GID")?,
            posted: require("ASANA_POSTED_GID")?,
            failed: require("ASANA_POSTING_FAILED_GID")?,
        },
    };

    // LinkedIn support is switched on by its credential pair. Half a
    // pair is a misconfiguration, not a disabled platform.
    let linkedin = match (
        optional("LINKEDIN_ACCESS_TOKEN"),
        optional("LINKEDIN_AUTHOR_URN"),
    ) {
        (Some(access_token), Some(author_urn)) => Some(LinkedIn {
            access_token,
            author_urn,
        }),
        (None, None) => None,
        _ => {
            return Err(ConfigError::Invalid(
                "LINKEDIN_ACCESS_TOKEN and LINKEDIN_AUTHOR_URN must be set together",
            ))
        }
    };

    Ok(Config { asana, linkedin })
}
