use chrono::Utc;
use uuid::Uuid;

use crate::error::{PortalError, PortalResult};
use crate::models::{Announcement, AnnouncementId, NewAnnouncement, StudentProfile};
use crate::portal::{require_account, Caller, Portal};

fn targets(announcement: &Announcement, student: Option<&StudentProfile>) -> bool {
    let branch_ok = match (&announcement.target_branches, student) {
        (None, _) => true,
        (Some(branches), Some(student)) => branches.iter().any(|b| b == &student.branch),
        (Some(_), None) => false,
    };
    let term_ok = match (&announcement.target_terms, student) {
        (None, _) => true,
        (Some(terms), Some(student)) => terms.contains(&student.current_term),
        (Some(_), None) => false,
    };
    branch_ok && term_ok
}

impl Portal {
    pub async fn post_announcement(
        &self,
        caller: Caller,
        input: NewAnnouncement,
    ) -> PortalResult<AnnouncementId> {
        let account = require_account(caller)?;
        input.validate()?;

        let announcement = Announcement {
            id: Uuid::new_v4(),
            title: input.title,
            content: input.content,
            kind: input.kind,
            target_branches: input.target_branches,
            target_terms: input.target_terms,
            created_by: account,
            is_active: true,
            created_at: Utc::now(),
        };
        self.store.insert_announcement(&announcement).await?;
        Ok(announcement.id)
    }

    /// Active announcements addressed to the caller, newest first. Callers
    /// without a profile only see announcements with no targeting.
    pub async fn announcements_for(&self, caller: Caller) -> PortalResult<Vec<Announcement>> {
        let student = self.student_for(caller).await?;
        let active = self.store.active_announcements().await?;
        Ok(active
            .into_iter()
            .filter(|announcement| targets(announcement, student.as_ref()))
            .collect())
    }

    pub async fn deactivate_announcement(&self, caller: Caller, id: AnnouncementId) -> PortalResult<()> {
        require_account(caller)?;
        if !self.store.set_announcement_active(id, false).await? {
            return Err(PortalError::NotFound("announcement"));
        }
        Ok(())
    }
}
