use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AtsError;

pub const MAX_EXPERIENCE_YEARS: u32 = 50;

/// Hiring pipeline stage. Declaration order is display order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Applied,
    Interview,
    Offer,
    Rejected,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Applied, Stage::Interview, Stage::Offer, Stage::Rejected];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Applied => "applied",
            Stage::Interview => "interview",
            Stage::Offer => "offer",
            Stage::Rejected => "rejected",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Stage::Applied => "Applied",
            Stage::Interview => "Interview",
            Stage::Offer => "Offer",
            Stage::Rejected => "Rejected",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = AtsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "applied" => Ok(Stage::Applied),
            "interview" => Ok(Stage::Interview),
            "offer" => Ok(Stage::Offer),
            "rejected" => Ok(Stage::Rejected),
            other => Err(AtsError::Validation(format!(
                "unknown stage '{}' (expected applied, interview, offer or rejected)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Where a candidate's resume lives. Uploaded files also carry their storage path and size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeRef {
    pub url: String,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub owner_id: i64,
    pub candidate_name: String,
    pub role: String,
    pub experience_years: u32,
    pub status: Stage,
    pub resume: Option<ResumeRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw resume file as picked by the user. Never persisted as a record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeSource {
    Link { url: String, file_name: Option<String> },
    Upload(ResumeUpload),
}

/// Candidate data as entered in the add form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewApplication {
    pub candidate_name: String,
    pub role: String,
    pub experience_years: u32,
    pub status: Stage,
    pub resume: Option<ResumeSource>,
}

impl NewApplication {
    pub fn new(candidate_name: impl Into<String>, role: impl Into<String>, experience_years: u32) -> Self {
        Self {
            candidate_name: candidate_name.into(),
            role: role.into(),
            experience_years,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), AtsError> {
        require_text("candidate name", &self.candidate_name)?;
        require_text("role", &self.role)?;
        check_experience(self.experience_years)
    }
}

/// Fully resolved row handed to the record store: resume uploads are already replaced by
/// their stored reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDraft {
    pub owner_id: i64,
    pub candidate_name: String,
    pub role: String,
    pub experience_years: u32,
    pub status: Stage,
    pub resume: Option<ResumeRef>,
}

/// Partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationPatch {
    pub candidate_name: Option<String>,
    pub role: Option<String>,
    pub experience_years: Option<u32>,
    pub status: Option<Stage>,
    pub resume: Option<ResumeRef>,
}

impl ApplicationPatch {
    pub fn status(stage: Stage) -> Self {
        Self {
            status: Some(stage),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidate_name.is_none()
            && self.role.is_none()
            && self.experience_years.is_none()
            && self.status.is_none()
            && self.resume.is_none()
    }

    pub fn validate(&self) -> Result<(), AtsError> {
        if self.is_empty() {
            return Err(AtsError::Validation("nothing to update".to_string()));
        }
        if let Some(name) = &self.candidate_name {
            require_text("candidate name", name)?;
        }
        if let Some(role) = &self.role {
            require_text("role", role)?;
        }
        if let Some(years) = self.experience_years {
            check_experience(years)?;
        }
        Ok(())
    }
}

fn require_text(field: &str, value: &str) -> Result<(), AtsError> {
    if value.trim().is_empty() {
        return Err(AtsError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn check_experience(years: u32) -> Result<(), AtsError> {
    if years > MAX_EXPERIENCE_YEARS {
        return Err(AtsError::Validation(format!(
            "experience must be between 0 and {} years",
            MAX_EXPERIENCE_YEARS
        )));
    }
    Ok(())
}
