//! Document elements and the titled chunks built from them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Category of an extracted document element.
///
/// Names follow the element types emitted by common document partitioners.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ElementCategory {
    /// Section heading; starts a new chunk
    Title,
    /// Body paragraph
    #[default]
    NarrativeText,
    /// Bullet or numbered list entry
    ListItem,
    /// Tabular text
    Table,
    /// Anything else the partitioner produced
    Other(String),
}

impl ElementCategory {
    /// Whether this element starts a new section.
    pub fn is_heading(&self) -> bool {
        matches!(self, ElementCategory::Title)
    }
}

impl fmt::Display for ElementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementCategory::Title => write!(f, "Title"),
            ElementCategory::NarrativeText => write!(f, "NarrativeText"),
            ElementCategory::ListItem => write!(f, "ListItem"),
            ElementCategory::Table => write!(f, "Table"),
            ElementCategory::Other(s) => write!(f, "{}", s),
        }
    }
}

impl std::str::FromStr for ElementCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Title" => ElementCategory::Title,
            "NarrativeText" => ElementCategory::NarrativeText,
            "ListItem" => ElementCategory::ListItem,
            "Table" => ElementCategory::Table,
            other => ElementCategory::Other(other.to_string()),
        })
    }
}

impl Serialize for ElementCategory {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ElementCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let Ok(category) = s.parse::<ElementCategory>();
        Ok(category)
    }
}

/// One extracted span of document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub text: String,

    #[serde(rename = "type", default)]
    pub category: ElementCategory,
}

impl Element {
    pub fn new(text: impl Into<String>, category: ElementCategory) -> Self {
        Self {
            text: text.into(),
            category,
        }
    }

    pub fn title(text: impl Into<String>) -> Self {
        Self::new(text, ElementCategory::Title)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text, ElementCategory::NarrativeText)
    }
}

/// A titled section of document text, the unit of embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub section_title: String,
    pub content: String,
}

impl Chunk {
    pub fn new(section_title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            section_title: section_title.into(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!(
            "Title".parse::<ElementCategory>().unwrap(),
            ElementCategory::Title
        );
        assert_eq!(
            "ListItem".parse::<ElementCategory>().unwrap(),
            ElementCategory::ListItem
        );
        assert_eq!(
            "Footer".parse::<ElementCategory>().unwrap(),
            ElementCategory::Other("Footer".to_string())
        );
    }

    #[test]
    fn test_only_title_is_heading() {
        assert!(ElementCategory::Title.is_heading());
        assert!(!ElementCategory::NarrativeText.is_heading());
        assert!(!ElementCategory::Other("Header".to_string()).is_heading());
    }

    #[test]
    fn test_element_deserializes_partitioner_shape() {
        let element: Element =
            serde_json::from_str(r#"{"type": "Title", "text": "Virtualization"}"#).unwrap();
        assert_eq!(element, Element::title("Virtualization"));
    }
}
