use std::fmt;
use std::str::FromStr;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::content::Catalog;
use crate::models::Progress;

pub const TUTORIAL_POINTS: i64 = 5;
pub const CHALLENGE_POINTS: i64 = 10;

pub const BADGES: [&str; 15] = [
    "🐢", "🦊", "🐱", "🐶", "🦁", "🐯", "🦄", "🦋", "🐬", "🐙", "🦖", "🦕", "🐘", "🦒", "🐼",
];

/// Draws a badge at random. Duplicates are possible; the progress store
/// ignores badges that are already collected.
pub fn draw_badge() -> &'static str {
    BADGES.choose(&mut rand::rng()).copied().unwrap_or(BADGES[0])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateKind {
    PythonExplorer,
    CodingChampion,
    PythonMaster,
}

impl CertificateKind {
    pub const ALL: [CertificateKind; 3] = [
        CertificateKind::PythonExplorer,
        CertificateKind::CodingChampion,
        CertificateKind::PythonMaster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateKind::PythonExplorer => "python_explorer",
            CertificateKind::CodingChampion => "coding_champion",
            CertificateKind::PythonMaster => "python_master",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            CertificateKind::PythonExplorer => "Python Explorer",
            CertificateKind::CodingChampion => "Coding Champion",
            CertificateKind::PythonMaster => "Python Master",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CertificateKind::PythonExplorer => "Completed every Python tutorial",
            CertificateKind::CodingChampion => "Solved every coding challenge",
            CertificateKind::PythonMaster => "Completed every tutorial and every challenge",
        }
    }

    fn needs_tutorials(&self) -> bool {
        matches!(
            self,
            CertificateKind::PythonExplorer | CertificateKind::PythonMaster
        )
    }

    fn needs_challenges(&self) -> bool {
        matches!(
            self,
            CertificateKind::CodingChampion | CertificateKind::PythonMaster
        )
    }

    /// Human-readable list of what is still missing; empty when earned.
    pub fn missing_requirements(&self, progress: &Progress, catalog: &Catalog) -> Vec<String> {
        let mut missing = Vec::new();

        if self.needs_tutorials() {
            missing.extend(
                (0..catalog.tutorials.len())
                    .filter(|id| !progress.completed_tutorials.contains(id))
                    .map(|id| format!("Tutorial: {}", catalog.tutorials[id].title)),
            );
        }

        if self.needs_challenges() {
            missing.extend(
                (0..catalog.challenges.len())
                    .filter(|id| !progress.completed_challenges.contains(id))
                    .map(|id| format!("Challenge: {}", catalog.challenges[id].title)),
            );
        }

        missing
    }
}

impl fmt::Display for CertificateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CertificateKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown certificate type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::{BADGES, CertificateKind, draw_badge};
    use crate::content::Catalog;
    use crate::models::Progress;

    fn progress(tutorials: Vec<usize>, challenges: Vec<usize>) -> Progress {
        Progress {
            user_id: 1,
            points: 0,
            completed_tutorials: tutorials,
            completed_challenges: challenges,
            emoji_collection: Vec::new(),
        }
    }

    #[test]
    fn test_draw_badge_comes_from_the_list() {
        for _ in 0..50 {
            assert!(BADGES.contains(&draw_badge()));
        }
    }

    #[test]
    fn test_requirements_track_catalog() {
        let catalog = Catalog::embedded().unwrap();
        let all_tutorials: Vec<usize> = (0..catalog.tutorials.len()).collect();
        let all_challenges: Vec<usize> = (0..catalog.challenges.len()).collect();

        let fresh = progress(vec![], vec![]);
        assert_eq!(
            CertificateKind::PythonExplorer
                .missing_requirements(&fresh, &catalog)
                .len(),
            catalog.tutorials.len()
        );

        let tutorials_done = progress(all_tutorials.clone(), vec![0]);
        assert!(CertificateKind::PythonExplorer
            .missing_requirements(&tutorials_done, &catalog)
            .is_empty());
        assert_eq!(
            CertificateKind::CodingChampion
                .missing_requirements(&tutorials_done, &catalog)
                .len(),
            catalog.challenges.len() - 1
        );
        assert!(!CertificateKind::PythonMaster
            .missing_requirements(&tutorials_done, &catalog)
            .is_empty());

        let everything = progress(all_tutorials, all_challenges);
        for kind in CertificateKind::ALL {
            assert!(kind.missing_requirements(&everything, &catalog).is_empty());
        }
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in CertificateKind::ALL {
            assert_eq!(kind.as_str().parse::<CertificateKind>(), Ok(kind));
        }
        assert!("gold_star".parse::<CertificateKind>().is_err());
    }
}
