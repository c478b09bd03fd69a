use chrono::Utc;
use tracing::info;

use crate::eligibility;
use crate::error::PortalResult;
use crate::models::{LifecycleState, NewOpportunity, Opportunity, OpportunityId};
use crate::portal::{require_account, Caller, Portal};

impl Portal {
    /// Newest postings first, optionally restricted to one lifecycle state.
    pub async fn placements(&self, state: Option<LifecycleState>) -> PortalResult<Vec<Opportunity>> {
        self.store.opportunities(state).await
    }

    /// Upcoming postings the caller qualifies for, re-evaluated on every call.
    pub async fn eligible_placements(&self, caller: Caller) -> PortalResult<Vec<Opportunity>> {
        let Some(student) = self.student_for(caller).await? else {
            return Ok(Vec::new());
        };

        let upcoming = self.store.opportunities(Some(LifecycleState::Upcoming)).await?;
        Ok(eligibility::eligible_opportunities(
            &student.branch,
            student.cumulative_average,
            &upcoming,
        ))
    }

    pub async fn add_placement(
        &self,
        caller: Caller,
        input: NewOpportunity,
    ) -> PortalResult<OpportunityId> {
        require_account(caller)?;
        input.validate()?;

        let opportunity = input.into_opportunity(Utc::now());
        self.store.insert_opportunity(&opportunity).await?;
        info!(
            opportunity_id = %opportunity.id,
            organization = %opportunity.organization,
            state = %opportunity.lifecycle_state,
            "placement posted"
        );
        Ok(opportunity.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortalError;
    use crate::grades::GradePointAverage;
    use crate::models::{ExamCategory, NewResult};
    use crate::portal::testing::{harness, profile, ScriptedCompletions};
    use chrono::Duration;
    use uuid::Uuid;

    fn posting(
        organization: &str,
        groups: &[&str],
        minimum_average: Option<f64>,
        state: LifecycleState,
    ) -> NewOpportunity {
        NewOpportunity {
            organization: organization.to_string(),
            role: "Associate Engineer".to_string(),
            compensation: None,
            eligible_groups: groups.iter().map(|g| g.to_string()).collect(),
            minimum_average,
            narrative: "On-campus drive".to_string(),
            apply_by: Some(Utc::now() - Duration::days(30)),
            event_date: None,
            lifecycle_state: state,
            requirements: Some(vec!["No active backlogs".to_string()]),
            contact: None,
        }
    }

    #[tokio::test]
    async fn posting_requires_an_account() {
        let h = harness(ScriptedCompletions::default());
        let input = posting("TCS", &["All"], None, LifecycleState::Upcoming);
        assert!(matches!(
            h.portal.add_placement(None, input).await,
            Err(PortalError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_filters_state() {
        let h = harness(ScriptedCompletions::default());
        let caller = Some(Uuid::new_v4());
        let first = h
            .portal
            .add_placement(caller, posting("Wipro", &["All"], None, LifecycleState::Upcoming))
            .await
            .unwrap();
        let second = h
            .portal
            .add_placement(caller, posting("Accenture", &["All"], None, LifecycleState::Completed))
            .await
            .unwrap();

        let all: Vec<_> = h.portal.placements(None).await.unwrap().iter().map(|o| o.id).collect();
        assert_eq!(all, vec![second, first]);

        let completed = h.portal.placements(Some(LifecycleState::Completed)).await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, second);
    }

    #[tokio::test]
    async fn eligible_listing_only_considers_upcoming_postings() {
        let h = harness(ScriptedCompletions::default());
        let caller = Some(Uuid::new_v4());
        h.portal.upsert_profile(caller, profile("Civil", 7)).await.unwrap();

        // Past deadline but still manually marked upcoming: stays listed.
        h.portal
            .add_placement(caller, posting("L&T", &["All"], Some(7.5), LifecycleState::Upcoming))
            .await
            .unwrap();
        h.portal
            .add_placement(caller, posting("Cisco", &["CSE"], None, LifecycleState::Upcoming))
            .await
            .unwrap();
        h.portal
            .add_placement(caller, posting("Shapoorji", &["Civil"], None, LifecycleState::Ongoing))
            .await
            .unwrap();

        let eligible = h.portal.eligible_placements(caller).await.unwrap();
        let names: Vec<_> = eligible.iter().map(|o| o.organization.as_str()).collect();
        assert_eq!(names, vec!["L&T"]);
    }

    #[tokio::test]
    async fn computed_average_below_threshold_excludes() {
        let h = harness(ScriptedCompletions::default());
        let caller = Some(Uuid::new_v4());
        h.portal.upsert_profile(caller, profile("CSE", 5)).await.unwrap();
        h.portal
            .add_result(
                caller,
                NewResult {
                    term: 4,
                    subject_name: "Microcontrollers".to_string(),
                    subject_code: "21CS43".to_string(),
                    internal_score: None,
                    external_score: None,
                    total_score: None,
                    letter_grade: Some("B+".to_string()),
                    credit_weight: 4,
                    exam_category: ExamCategory::Regular,
                    academic_year: "2022-23".to_string(),
                },
            )
            .await
            .unwrap();
        let average = h.portal.refresh_cumulative_average(caller).await.unwrap();
        assert_eq!(average.map(GradePointAverage::hundredths), Some(700));

        h.portal
            .add_placement(caller, posting("Google", &["CSE"], Some(8.0), LifecycleState::Upcoming))
            .await
            .unwrap();
        h.portal
            .add_placement(caller, posting("Mindtree", &["CSE"], Some(6.5), LifecycleState::Upcoming))
            .await
            .unwrap();

        let eligible = h.portal.eligible_placements(caller).await.unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].organization, "Mindtree");
    }

    #[tokio::test]
    async fn anonymous_caller_sees_nothing_eligible() {
        let h = harness(ScriptedCompletions::default());
        assert!(h.portal.eligible_placements(None).await.unwrap().is_empty());
    }
}
