use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static RE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:CATEGORIA\s*:\s*)?(IMPRODUTIVO|PRODUTIVO)").unwrap()
});

/// Classification of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Requires an action or a specific answer.
    #[serde(rename = "PRODUTIVO")]
    Produtivo,
    /// Needs no immediate action.
    #[serde(rename = "IMPRODUTIVO")]
    Improdutivo,
    /// The provider gave no usable label.
    #[serde(rename = "SEM_CLASSIFICACAO")]
    Unclassified,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown category label: '{0}'")]
pub struct ParseCategoryError(pub String);

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Produtivo => "PRODUTIVO",
            Category::Improdutivo => "IMPRODUTIVO",
            Category::Unclassified => "SEM_CLASSIFICACAO",
        }
    }

    /// Maps a free-form provider label onto a category.
    ///
    /// Accepts an optional `CATEGORIA:` prefix and any casing. Anything that
    /// does not name one of the two classes becomes `Unclassified`.
    pub fn normalize(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return Category::Unclassified;
        };
        if label.trim().eq_ignore_ascii_case(Category::Unclassified.as_str()) {
            return Category::Unclassified;
        }
        match RE_LABEL.captures(label).and_then(|c| c.get(1)) {
            Some(m) if m.as_str().eq_ignore_ascii_case("PRODUTIVO") => Category::Produtivo,
            Some(_) => Category::Improdutivo,
            None => Category::Unclassified,
        }
    }

    pub fn requires_action(&self) -> bool {
        matches!(self, Category::Produtivo)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse of a stored label.
impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Category::Produtivo,
            Category::Improdutivo,
            Category::Unclassified,
        ]
        .into_iter()
        .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}
