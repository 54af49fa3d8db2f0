use serde::{Deserialize, Serialize};

use super::id::SourceId;

/// Declared response dialect of an upstream (§3 Source).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Json,
    Xml,
    Auto,
}

impl ResponseFormat {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "xml" => Self::Xml,
            _ => Self::Auto,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Auto => "auto",
        }
    }
}

/// An upstream CMS-style provider (§3 Source). Immutable outside admin edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    pub base_url: String,
    pub weight: i32,
    pub active: bool,
    pub format: ResponseFormat,
    pub welfare: bool,
}

impl Source {
    /// Build the `ac=list` URL for a page, optionally scoped to a category id.
    #[must_use]
    pub fn list_url(&self, page: u32, category_id: Option<&str>) -> String {
        let mut url = format!("{}?ac=list&pg={page}", self.base_url);
        if let Some(t) = category_id {
            url.push_str("&t=");
            url.push_str(t);
        }
        url
    }

    /// Build the `ac=detail` URL for one or more upstream ids.
    #[must_use]
    pub fn detail_url(&self, ids: &str) -> String {
        format!("{}?ac=detail&ids={ids}", self.base_url)
    }
}
