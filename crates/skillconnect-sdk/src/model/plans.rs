use super::{ItemId, PlanId, UserRef};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Learning plan with its checklist
///
/// Progress is never stored here; it is computed from `items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPlan {
    pub plan_id: PlanId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub items: Vec<PlanItem>,
}

impl LearningPlan {
    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|i| i.complete).count()
    }

    /// Exact completion percentage; 0 for an empty checklist
    pub fn progress_exact(&self) -> f64 {
        if self.items.is_empty() {
            return 0.0;
        }
        self.completed_count() as f64 / self.items.len() as f64 * 100.0
    }

    /// Completion percentage rounded to a whole number
    pub fn progress(&self) -> u8 {
        self.progress_exact().round() as u8
    }

    pub fn item(&self, item_id: ItemId) -> Option<&PlanItem> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    pub fn item_mut(&mut self, item_id: ItemId) -> Option<&mut PlanItem> {
        self.items.iter_mut().find(|i| i.item_id == item_id)
    }
}

/// Checklist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanItem {
    pub item_id: ItemId,
    pub title: String,
    #[serde(default)]
    pub complete: bool,
}

/// Reference to a plan by id only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRef {
    pub plan_id: PlanId,
}

/// Body for creating a plan item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlanItem {
    pub title: String,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_plan: Option<PlanRef>,
}

/// Body for creating a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlan {
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub user: UserRef,
    pub items: Vec<NewPlanItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(flags: &[bool]) -> LearningPlan {
        LearningPlan {
            plan_id: 1,
            title: "Rust".into(),
            description: None,
            start_date: None,
            end_date: None,
            user: None,
            items: flags
                .iter()
                .enumerate()
                .map(|(i, c)| PlanItem {
                    item_id: i as i64 + 1,
                    title: format!("step {}", i + 1),
                    complete: *c,
                })
                .collect(),
        }
    }

    #[test]
    fn test_progress_empty_is_zero() {
        assert_eq!(plan(&[]).progress(), 0);
    }

    #[test]
    fn test_progress_rounds() {
        assert_eq!(plan(&[true, false, false]).progress(), 33);
        assert_eq!(plan(&[true, true, false]).progress(), 67);
        assert_eq!(plan(&[true, true]).progress(), 100);
    }

    #[test]
    fn test_plan_from_service_json() {
        let json = r#"{
            "planId": 5,
            "title": "Learn Rust",
            "description": "ownership first",
            "startDate": "2024-01-01",
            "endDate": null,
            "status": 50.0,
            "items": [
                {"itemId": 1, "title": "Book", "complete": true},
                {"itemId": 2, "title": "Exercises", "complete": false}
            ]
        }"#;
        let plan: LearningPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.items.len(), 2);
        assert_eq!(plan.progress(), 50);
    }
}
