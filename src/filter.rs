//! Filter predicates over applications.
//!
//! `matches` is the AND of four independent checks (role, status, experience bucket and
//! free-text search). Unset criteria never exclude anything.

use std::fmt;
use std::str::FromStr;

use crate::error::AtsError;
use crate::models::{Application, Stage};

/// Named experience range. Bounds are inclusive on both ends, so neighbouring buckets
/// share their boundary year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExperienceBucket {
    UpToOne,
    OneToThree,
    ThreeToFive,
    FiveToTen,
    TenPlus,
}

impl ExperienceBucket {
    pub const ALL: [ExperienceBucket; 5] = [
        ExperienceBucket::UpToOne,
        ExperienceBucket::OneToThree,
        ExperienceBucket::ThreeToFive,
        ExperienceBucket::FiveToTen,
        ExperienceBucket::TenPlus,
    ];

    /// `(min, max)` in years; `None` max means unbounded.
    pub fn bounds(self) -> (u32, Option<u32>) {
        match self {
            ExperienceBucket::UpToOne => (0, Some(1)),
            ExperienceBucket::OneToThree => (1, Some(3)),
            ExperienceBucket::ThreeToFive => (3, Some(5)),
            ExperienceBucket::FiveToTen => (5, Some(10)),
            ExperienceBucket::TenPlus => (10, None),
        }
    }

    pub fn contains(self, years: u32) -> bool {
        let (min, max) = self.bounds();
        years >= min && max.is_none_or(|max| years <= max)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExperienceBucket::UpToOne => "0-1",
            ExperienceBucket::OneToThree => "1-3",
            ExperienceBucket::ThreeToFive => "3-5",
            ExperienceBucket::FiveToTen => "5-10",
            ExperienceBucket::TenPlus => "10+",
        }
    }
}

impl fmt::Display for ExperienceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperienceBucket {
    type Err = AtsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|bucket| bucket.as_str() == s)
            .ok_or_else(|| {
                AtsError::Validation(format!(
                    "unknown experience range '{}' (expected 0-1, 1-3, 3-5, 5-10 or 10+)",
                    s
                ))
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub search: String,
    pub role: Option<String>,
    pub status: Option<Stage>,
    pub experience: Option<ExperienceBucket>,
}

impl FilterCriteria {
    pub fn is_active(&self) -> bool {
        !self.search.is_empty()
            || self.role.as_deref().is_some_and(|r| !r.is_empty())
            || self.status.is_some()
            || self.experience.is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

pub fn matches(app: &Application, criteria: &FilterCriteria) -> bool {
    matches_role(app, criteria)
        && matches_status(app, criteria)
        && matches_experience(app, criteria)
        && matches_search(app, criteria)
}

fn matches_role(app: &Application, criteria: &FilterCriteria) -> bool {
    match criteria.role.as_deref() {
        None | Some("") => true,
        Some(role) => app.role == role,
    }
}

fn matches_status(app: &Application, criteria: &FilterCriteria) -> bool {
    criteria.status.is_none_or(|status| app.status == status)
}

fn matches_experience(app: &Application, criteria: &FilterCriteria) -> bool {
    criteria
        .experience
        .is_none_or(|bucket| bucket.contains(app.experience_years))
}

fn matches_search(app: &Application, criteria: &FilterCriteria) -> bool {
    if criteria.search.is_empty() {
        return true;
    }
    let needle = criteria.search.to_lowercase();
    app.candidate_name.to_lowercase().contains(&needle) || app.role.to_lowercase().contains(&needle)
}

/// Matching applications, in input order.
pub fn apply<'a>(apps: &'a [Application], criteria: &FilterCriteria) -> Vec<&'a Application> {
    apps.iter().filter(|app| matches(app, criteria)).collect()
}

/// Sorted distinct roles, for the role facet.
pub fn unique_roles(apps: &[Application]) -> Vec<String> {
    let mut roles: Vec<String> = apps.iter().map(|app| app.role.clone()).collect();
    roles.sort();
    roles.dedup();
    roles
}
