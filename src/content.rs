//! Tutorial and challenge catalog.
//!
//! Lessons are addressed by their position in the catalog, which is also the
//! id stored in a learner's completed sets.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;

const EMBEDDED_CATALOG: &str = include_str!("../content/catalog.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tutorial {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub example_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub starter_code: String,
    pub expected_output: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub tutorials: Vec<Tutorial>,
    pub challenges: Vec<Challenge>,
}

/// Previous/next ids around a position, for ordered navigation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Navigation {
    pub previous: Option<usize>,
    pub next: Option<usize>,
    pub position: usize,
    pub total: usize,
}

impl Navigation {
    pub fn around(position: usize, total: usize) -> Self {
        Self {
            previous: position.checked_sub(1),
            next: (position + 1 < total).then_some(position + 1),
            position,
            total,
        }
    }
}

impl Catalog {
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let catalog: Catalog = serde_json::from_str(raw)
            .map_err(|e| AppError::Internal(format!("Invalid catalog: {}", e)))?;
        if catalog.tutorials.is_empty() || catalog.challenges.is_empty() {
            return Err(AppError::Internal(
                "Catalog needs at least one tutorial and one challenge".to_string(),
            ));
        }
        Ok(catalog)
    }

    pub fn embedded() -> Result<Self, AppError> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    /// Reads the catalog file when one is configured and present, otherwise
    /// uses the catalog compiled into the binary.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                let catalog = Self::from_json(&raw)?;
                info!(
                    path = %path.display(),
                    tutorials = catalog.tutorials.len(),
                    challenges = catalog.challenges.len(),
                    "Loaded lesson catalog"
                );
                Ok(catalog)
            }
            Some(path) => {
                warn!(path = %path.display(), "Catalog file not found, using embedded catalog");
                Self::embedded()
            }
            None => Self::embedded(),
        }
    }

    pub fn tutorial(&self, id: usize) -> Result<&Tutorial, AppError> {
        self.tutorials
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Tutorial {} does not exist", id)))
    }

    pub fn challenge(&self, id: usize) -> Result<&Challenge, AppError> {
        self.challenges
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Challenge {} does not exist", id)))
    }
}

fn normalize_output(text: &str) -> String {
    let unified = text.replace("\r\n", "\n");
    let lines: Vec<&str> = unified.lines().map(str::trim_end).collect();
    let last_content = lines
        .iter()
        .rposition(|line| !line.is_empty())
        .map_or(0, |i| i + 1);
    lines[..last_content].join("\n")
}

/// Compares program output with the expected output, ignoring line-ending
/// style, trailing spaces and trailing blank lines.
pub fn check_output(expected: &str, actual: &str) -> bool {
    normalize_output(expected) == normalize_output(actual)
}

#[cfg(test)]
mod tests {
    use super::{Catalog, Navigation, check_output};

    #[test]
    fn test_embedded_catalog_parses() {
        let catalog = Catalog::embedded().expect("embedded catalog");
        assert!(!catalog.tutorials.is_empty());
        assert!(!catalog.challenges.is_empty());
        for challenge in &catalog.challenges {
            assert!(!challenge.expected_output.trim().is_empty());
        }
    }

    #[test]
    fn test_navigation_edges() {
        assert_eq!(
            Navigation::around(0, 3),
            Navigation {
                previous: None,
                next: Some(1),
                position: 0,
                total: 3
            }
        );
        assert_eq!(Navigation::around(2, 3).next, None);
        assert_eq!(Navigation::around(2, 3).previous, Some(1));
        assert_eq!(Navigation::around(0, 1).next, None);
    }

    #[test]
    fn test_check_output_ignores_trailing_whitespace() {
        assert!(check_output("Hello\nWorld", "Hello  \r\nWorld\n\n"));
        assert!(!check_output("Hello\nWorld", "Hello\n\nWorld"));
        assert!(!check_output("5", "6\n"));
        assert!(check_output("", "\n"));
    }

    #[test]
    fn test_missing_lessons_are_not_found() {
        let catalog = Catalog::embedded().expect("embedded catalog");
        assert!(catalog.tutorial(catalog.tutorials.len()).is_err());
        assert!(catalog.challenge(999).is_err());
    }

    #[test]
    fn test_empty_catalog_is_rejected() {
        let raw = r#"{"tutorials": [], "challenges": []}"#;
        assert!(Catalog::from_json(raw).is_err());
    }
}
