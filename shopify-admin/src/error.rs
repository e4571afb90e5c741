use derive_more::{Display, Error};
use reqwest::StatusCode;
use serde_json::json;

const MAX_BODY_IN_MESSAGE: usize = 500;

#[derive(Debug, Display, Error)]
pub enum ApiError {
    #[display("Shopify API {status}: {}", truncate_body(body))]
    Status { status: StatusCode, body: String },
    #[display("Shopify API request failed: {source}")]
    Transport { source: reqwest::Error },
    #[display("Shopify API decode error: {source}")]
    Decode { source: serde_json::Error },
    #[display("Access token is not a valid header value")]
    InvalidToken {
        source: reqwest::header::InvalidHeaderValue,
    },
}

impl From<reqwest::Error> for ApiError {
    fn from(source: reqwest::Error) -> Self {
        Self::Transport { source }
    }
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { source } => source.status(),
            _ => None,
        }
    }

    /// Error payload as returned by the API, or `{"error": <message>}` when the
    /// response had no JSON body.
    pub fn detail(&self) -> serde_json::Value {
        if let Self::Status { body, .. } = self {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
                return value;
            }
        }
        json!({ "error": self.to_string() })
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_IN_MESSAGE {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_BODY_IN_MESSAGE).collect();
    format!("{cut}…")
}
