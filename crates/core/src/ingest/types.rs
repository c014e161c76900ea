use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of the upstream ratings list. Items stay semi-structured until normalized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRatingsPage {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub next_page: Option<String>,
}

impl RawRatingsPage {
    /// The opaque continuation token, if there is another page.
    pub fn continuation(&self) -> Option<&str> {
        self.next_page.as_deref().filter(|t| !t.is_empty())
    }
}
