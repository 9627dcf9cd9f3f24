//! Per-request retrieval values and citations

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Largest integer an `f64` holds exactly
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Page reference as stored in a payload: a number or a free label
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PageRef {
    Number(f64),
    Text(String),
}

impl PageRef {
    /// The page as an integer when it is a whole number
    fn whole(&self) -> Option<i64> {
        match self {
            PageRef::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_EXACT_INT => {
                Some(*n as i64)
            }
            _ => None,
        }
    }
}

// Whole pages go out as integers (`2`, not `2.0`)
impl Serialize for PageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match (self.whole(), self) {
            (Some(n), _) => serializer.serialize_i64(n),
            (None, PageRef::Number(n)) => serializer.serialize_f64(*n),
            (None, PageRef::Text(s)) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.whole() {
            return write!(f, "{}", n);
        }
        match self {
            PageRef::Number(n) => write!(f, "{}", n),
            PageRef::Text(s) => f.write_str(s),
        }
    }
}

/// A retrieved passage used to ground one answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub text: String,
    pub title: String,
    pub section: Option<String>,
    pub page: Option<PageRef>,
    pub url: Option<String>,
    pub ord: f64,
}

/// Source metadata returned next to an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<&ContextItem> for Citation {
    fn from(item: &ContextItem) -> Self {
        Self {
            title: item.title.clone(),
            section: item.section.clone(),
            page: item.page.clone(),
            url: item.url.clone(),
        }
    }
}
