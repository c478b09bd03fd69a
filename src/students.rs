use tracing::info;
use uuid::Uuid;

use crate::error::PortalResult;
use crate::models::{MaterialIndex, ProfileInput, StudentId, StudentProfile, StudentStats};
use crate::portal::{require_account, Caller, Portal};

impl Portal {
    pub async fn current_student(&self, caller: Caller) -> PortalResult<Option<StudentProfile>> {
        self.student_for(caller).await
    }

    /// Updates the caller's profile in place, or creates it on first use.
    pub async fn upsert_profile(&self, caller: Caller, input: ProfileInput) -> PortalResult<StudentId> {
        let account = require_account(caller)?;
        input.validate()?;

        if let Some(existing) = self.store.student_by_account(account).await? {
            self.store.patch_student(existing.id, &input).await?;
            info!(student_id = %existing.id, "profile updated");
            return Ok(existing.id);
        }

        let student = StudentProfile {
            id: Uuid::new_v4(),
            account,
            registration_id: input.registration_id,
            display_name: input.display_name,
            branch: input.branch,
            current_term: input.current_term,
            cohort_label: input.cohort_label,
            cumulative_average: None,
        };
        self.store.insert_student(&student).await?;
        info!(student_id = %student.id, "profile created");
        Ok(student.id)
    }

    pub async fn student_stats(&self, caller: Caller) -> PortalResult<Option<StudentStats>> {
        let Some(student) = self.student_for(caller).await? else {
            return Ok(None);
        };

        let results_count = self.store.results_for_student(student.id, None).await?.len();
        let materials_count = self
            .store
            .materials(&MaterialIndex::BranchTerm(
                student.branch.clone(),
                student.current_term,
            ))
            .await?
            .len();

        Ok(Some(StudentStats {
            student,
            results_count,
            materials_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::PortalError;
    use crate::portal::testing::{harness, profile, ScriptedCompletions};
    use uuid::Uuid;

    #[tokio::test]
    async fn profile_requires_an_account() {
        let h = harness(ScriptedCompletions::default());
        assert!(matches!(
            h.portal.upsert_profile(None, profile("CSE", 3)).await,
            Err(PortalError::NotAuthenticated)
        ));
        assert_eq!(h.portal.current_student(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn second_upsert_patches_the_same_profile() {
        let h = harness(ScriptedCompletions::default());
        let account = Some(Uuid::new_v4());

        let first = h.portal.upsert_profile(account, profile("CSE", 3)).await.unwrap();
        let second = h.portal.upsert_profile(account, profile("ISE", 4)).await.unwrap();
        assert_eq!(first, second);

        let student = h.portal.current_student(account).await.unwrap().unwrap();
        assert_eq!(student.branch, "ISE");
        assert_eq!(student.current_term, 4);
        assert_eq!(student.cumulative_average, None);
    }

    #[tokio::test]
    async fn invalid_profile_is_rejected() {
        let h = harness(ScriptedCompletions::default());
        let mut input = profile("CSE", 3);
        input.current_term = 0;
        assert!(matches!(
            h.portal.upsert_profile(Some(Uuid::new_v4()), input).await,
            Err(PortalError::Invalid { field: "current_term", .. })
        ));
    }

    #[tokio::test]
    async fn stats_without_profile_are_none() {
        let h = harness(ScriptedCompletions::default());
        assert_eq!(h.portal.student_stats(Some(Uuid::new_v4())).await.unwrap(), None);
    }
}
