use std::collections::BTreeMap;

use crate::models::{Application, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCount {
    pub role: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total: usize,
    pub by_stage: BTreeMap<Stage, usize>,
    pub avg_experience: f64,
    /// Share of applications that reached an offer, in percent.
    pub conversion_rate: f64,
    /// Roles in order of first appearance.
    pub roles: Vec<RoleCount>,
}

impl Summary {
    pub fn offers(&self) -> usize {
        self.by_stage.get(&Stage::Offer).copied().unwrap_or(0)
    }

    pub fn stage_share(&self, stage: Stage) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.by_stage.get(&stage).copied().unwrap_or(0) as f64 * 100.0 / self.total as f64
    }

    /// Upper bound for the role chart, leaving headroom above the tallest bar.
    pub fn role_axis_max(&self) -> u64 {
        let tallest = self.roles.iter().map(|r| r.count).max().unwrap_or(1) as u64;
        (tallest + 2).max(5)
    }
}

pub fn summarize(apps: &[Application]) -> Summary {
    let mut by_stage: BTreeMap<Stage, usize> = Stage::ALL.iter().map(|s| (*s, 0)).collect();
    let mut roles: Vec<RoleCount> = Vec::new();
    let mut years: u64 = 0;

    for app in apps {
        *by_stage.entry(app.status).or_default() += 1;
        years += u64::from(app.experience_years);
        match roles.iter_mut().find(|r| r.role == app.role) {
            Some(existing) => existing.count += 1,
            None => roles.push(RoleCount {
                role: app.role.clone(),
                count: 1,
            }),
        }
    }

    let total = apps.len();
    let offers = by_stage[&Stage::Offer];
    let (avg_experience, conversion_rate) = if total == 0 {
        (0.0, 0.0)
    } else {
        (years as f64 / total as f64, offers as f64 * 100.0 / total as f64)
    };

    Summary {
        total,
        by_stage,
        avg_experience,
        conversion_rate,
        roles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn app(id: i64, role: &str, years: u32, status: Stage) -> Application {
        let now = Utc::now();
        Application {
            id,
            owner_id: 1,
            candidate_name: format!("C{}", id),
            role: role.to_string(),
            experience_years: years,
            status,
            resume: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.by_stage.len(), 4);
        assert_eq!(summary.avg_experience, 0.0);
        assert_eq!(summary.conversion_rate, 0.0);
        assert_eq!(summary.role_axis_max(), 5);
        assert_eq!(summary.stage_share(Stage::Offer), 0.0);
    }

    #[test]
    fn counts_rates_and_roles() {
        let apps = vec![
            app(1, "Eng", 2, Stage::Offer),
            app(2, "PM", 6, Stage::Interview),
            app(3, "Eng", 4, Stage::Applied),
            app(4, "Eng", 0, Stage::Rejected),
        ];
        let summary = summarize(&apps);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.offers(), 1);
        assert_eq!(summary.avg_experience, 3.0);
        assert_eq!(summary.conversion_rate, 25.0);
        assert_eq!(summary.stage_share(Stage::Interview), 25.0);
        assert_eq!(
            summary.roles,
            vec![
                RoleCount { role: "Eng".to_string(), count: 3 },
                RoleCount { role: "PM".to_string(), count: 1 },
            ]
        );
        assert_eq!(summary.role_axis_max(), 5);
    }

    #[test]
    fn axis_leaves_headroom_for_tall_bars() {
        let apps: Vec<Application> = (0..7).map(|i| app(i, "Eng", 1, Stage::Applied)).collect();
        assert_eq!(summarize(&apps).role_axis_max(), 9);
    }
}
