//! HTTP client for the remote grammar checker.
//!
//! Stateless: one form-encoded POST per check, answered by a JSON object
//! with a `matches` array.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::Settings;
use crate::error::CheckError;
use crate::problem::RawMatch;

#[derive(Debug, Deserialize)]
struct CheckResponse {
    matches: Option<Vec<RawMatch>>,
}

/// Client for a LanguageTool-compatible `/check` endpoint.
#[derive(Debug, Clone)]
pub struct CheckClient {
    http: Client,
    endpoint: String,
    user_agent: String,
}

impl CheckClient {
    pub fn new(endpoint: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            user_agent: user_agent.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.server.clone(), settings.user_agent.clone())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends `text` for checking. A failure is never reported as an empty
    /// match list.
    pub async fn check(
        &self,
        text: &str,
        language: &str,
        ignored_rule_ids: &[String],
    ) -> Result<Vec<RawMatch>, CheckError> {
        let form = request_form(text, language, &self.user_agent, ignored_rule_ids);

        debug!(endpoint = %self.endpoint, language, chars = text.chars().count(), "sending check request");
        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CheckError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_response(&body)
    }
}

/// Form fields of one check request. `disabledRules` is always present,
/// empty when no rule is ignored.
fn request_form(
    text: &str,
    language: &str,
    user_agent: &str,
    ignored_rule_ids: &[String],
) -> Vec<(&'static str, String)> {
    vec![
        ("language", language.to_string()),
        ("text", text.to_string()),
        ("User-Agent", user_agent.to_string()),
        ("disabledRules", ignored_rule_ids.join(",")),
    ]
}

/// Extracts the match records from a checker response body.
pub fn parse_response(body: &str) -> Result<Vec<RawMatch>, CheckError> {
    let response: CheckResponse =
        serde_json::from_str(body).map_err(|e| CheckError::Decode(e.to_string()))?;
    response
        .matches
        .ok_or_else(|| CheckError::Decode("response has no `matches` array".into()))
}
