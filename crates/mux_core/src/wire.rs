use serde::{Deserialize, Serialize};

/// Request body: `{"urls": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UrlsRequest {
    pub urls: Vec<String>,
}

/// One successfully fetched URL. Serialized as `{"url": ..., "response": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchResult {
    pub url: String,
    #[serde(rename = "response")]
    pub body: String,
}

/// Error body returned to clients: `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
