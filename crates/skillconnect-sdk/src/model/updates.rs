use super::UpdateId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Status of a learning update; each maps to a default completion percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LearningStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Ongoing")]
    Ongoing,
    #[serde(rename = "Almost Complete")]
    AlmostComplete,
    #[serde(rename = "Completed")]
    Completed,
}

impl LearningStatus {
    pub const ALL: [LearningStatus; 5] = [
        LearningStatus::NotStarted,
        LearningStatus::InProgress,
        LearningStatus::Ongoing,
        LearningStatus::AlmostComplete,
        LearningStatus::Completed,
    ];

    pub fn completion_percentage(self) -> u8 {
        match self {
            LearningStatus::NotStarted => 0,
            LearningStatus::InProgress => 25,
            LearningStatus::Ongoing => 50,
            LearningStatus::AlmostComplete => 75,
            LearningStatus::Completed => 100,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LearningStatus::NotStarted => "Not Started",
            LearningStatus::InProgress => "In Progress",
            LearningStatus::Ongoing => "Ongoing",
            LearningStatus::AlmostComplete => "Almost Complete",
            LearningStatus::Completed => "Completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

/// A tracked learning activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningUpdate {
    pub update_id: UpdateId,
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub learning_method: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub status: LearningStatus,
    #[serde(default)]
    pub completion_percentage: Option<u8>,
    #[serde(default)]
    pub target_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

/// Body for creating a learning update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLearningUpdate {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub description: String,
    pub learning_method: String,
    pub level: String,
    pub status: LearningStatus,
    pub completion_percentage: u8,
    pub user: super::UserRef,
}

/// Server-side filter for listing learning updates; the service applies
/// at most one, checked in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateFilter {
    pub status: Option<LearningStatus>,
    pub category: Option<String>,
    pub kind: Option<String>,
    pub level: Option<String>,
}
