use std::collections::BTreeMap;

use crate::models::{Application, Stage};

/// Applications per stage. Always holds all four stages, in pipeline order.
pub type StageGroups<'a> = BTreeMap<Stage, Vec<&'a Application>>;

/// Partition `apps` by status, keeping input order inside each stage.
pub fn group_by_stage<'a, I>(apps: I) -> StageGroups<'a>
where
    I: IntoIterator<Item = &'a Application>,
{
    let mut groups: StageGroups<'a> = Stage::ALL.iter().map(|stage| (*stage, Vec::new())).collect();
    for app in apps {
        groups.entry(app.status).or_default().push(app);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{self, ExperienceBucket, FilterCriteria};
    use chrono::Utc;

    fn app(id: i64, status: Stage, role: &str, years: u32) -> Application {
        let now = Utc::now();
        Application {
            id,
            owner_id: 1,
            candidate_name: format!("Candidate {}", id),
            role: role.to_string(),
            experience_years: years,
            status,
            resume: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn ids(list: &[&Application]) -> Vec<i64> {
        list.iter().map(|a| a.id).collect()
    }

    #[test]
    fn empty_input_still_has_every_stage() {
        let groups = group_by_stage(std::iter::empty());
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), Stage::ALL.to_vec());
        assert!(groups.values().all(|list| list.is_empty()));
    }

    #[test]
    fn preserves_order_and_total() {
        let apps = vec![
            app(5, Stage::Offer, "Eng", 1),
            app(4, Stage::Applied, "Eng", 1),
            app(3, Stage::Offer, "Eng", 1),
            app(2, Stage::Rejected, "Eng", 1),
            app(1, Stage::Applied, "Eng", 1),
        ];
        let groups = group_by_stage(&apps);
        assert_eq!(groups.len(), 4);
        assert_eq!(groups.values().map(Vec::len).sum::<usize>(), apps.len());
        assert_eq!(ids(&groups[&Stage::Applied]), vec![4, 1]);
        assert_eq!(ids(&groups[&Stage::Offer]), vec![5, 3]);
        assert_eq!(ids(&groups[&Stage::Interview]), Vec::<i64>::new());
        assert_eq!(ids(&groups[&Stage::Rejected]), vec![2]);
    }

    #[test]
    fn filtered_scenario() {
        let apps = vec![app(1, Stage::Applied, "Eng", 2), app(2, Stage::Interview, "PM", 6)];
        let criteria = FilterCriteria {
            experience: Some(ExperienceBucket::OneToThree),
            ..Default::default()
        };
        let filtered = filter::apply(&apps, &criteria);
        let groups = group_by_stage(filtered);

        assert_eq!(ids(&groups[&Stage::Applied]), vec![1]);
        assert!(groups[&Stage::Interview].is_empty());
        assert!(groups[&Stage::Offer].is_empty());
        assert!(groups[&Stage::Rejected].is_empty());
    }
}
