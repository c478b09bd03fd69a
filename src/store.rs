use async_trait::async_trait;

use crate::error::PortalResult;
use crate::models::{
    AccountId, Announcement, AnnouncementId, ChatMessage, ChatSession, LifecycleState,
    MaterialId, MaterialIndex, Opportunity, ProfileInput, ResultRecord, SessionId, StudentId,
    StudentProfile, StudyMaterial,
};

#[cfg(test)]
mod memory;

#[cfg(test)]
pub use memory::MemoryStore;

/// Persistence capability the portal operations run against.
///
/// Listing order is part of the contract: opportunities and chat sessions
/// come back newest first, chat messages oldest first.
#[async_trait]
pub trait PortalStore: Send + Sync {
    async fn student_by_account(&self, account: AccountId) -> PortalResult<Option<StudentProfile>>;
    async fn insert_student(&self, student: &StudentProfile) -> PortalResult<()>;
    async fn patch_student(&self, id: StudentId, profile: &ProfileInput) -> PortalResult<()>;
    async fn set_cumulative_average(&self, id: StudentId, average: Option<f64>) -> PortalResult<()>;

    async fn insert_result(&self, result: &ResultRecord) -> PortalResult<()>;
    async fn results_for_student(
        &self,
        student: StudentId,
        term: Option<i32>,
    ) -> PortalResult<Vec<ResultRecord>>;

    async fn insert_opportunity(&self, opportunity: &Opportunity) -> PortalResult<()>;
    async fn opportunities(&self, state: Option<LifecycleState>) -> PortalResult<Vec<Opportunity>>;

    async fn insert_material(&self, material: &StudyMaterial) -> PortalResult<()>;
    async fn materials(&self, index: &MaterialIndex) -> PortalResult<Vec<StudyMaterial>>;
    /// Returns the new count, or `None` when the material does not exist.
    async fn increment_download_count(&self, id: MaterialId) -> PortalResult<Option<i32>>;

    async fn insert_session(&self, session: &ChatSession) -> PortalResult<()>;
    async fn session(&self, id: SessionId) -> PortalResult<Option<ChatSession>>;
    async fn sessions_for_account(&self, account: AccountId) -> PortalResult<Vec<ChatSession>>;
    async fn set_last_message(&self, id: SessionId, content: &str) -> PortalResult<()>;
    async fn insert_message(&self, message: &ChatMessage) -> PortalResult<()>;
    async fn messages(&self, session: SessionId) -> PortalResult<Vec<ChatMessage>>;
    /// The newest `limit` messages, returned oldest first.
    async fn recent_messages(&self, session: SessionId, limit: usize)
        -> PortalResult<Vec<ChatMessage>>;

    async fn insert_announcement(&self, announcement: &Announcement) -> PortalResult<()>;
    async fn active_announcements(&self) -> PortalResult<Vec<Announcement>>;
    /// Returns `false` when the announcement does not exist.
    async fn set_announcement_active(&self, id: AnnouncementId, active: bool) -> PortalResult<bool>;
}
