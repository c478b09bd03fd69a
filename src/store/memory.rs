use async_trait::async_trait;
use tokio::sync::Mutex;

use super::PortalStore;
use crate::error::{PortalError, PortalResult};
use crate::models::{
    AccountId, Announcement, AnnouncementId, ChatMessage, ChatSession, LifecycleState,
    MaterialId, MaterialIndex, Opportunity, ProfileInput, ResultRecord, SessionId, StudentId,
    StudentProfile, StudyMaterial,
};

#[derive(Default)]
struct Tables {
    students: Vec<StudentProfile>,
    results: Vec<ResultRecord>,
    opportunities: Vec<Opportunity>,
    materials: Vec<StudyMaterial>,
    sessions: Vec<ChatSession>,
    messages: Vec<ChatMessage>,
    announcements: Vec<Announcement>,
}

/// Process-local store. Rows are kept in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PortalStore for MemoryStore {
    async fn student_by_account(&self, account: AccountId) -> PortalResult<Option<StudentProfile>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .students
            .iter()
            .find(|student| student.account == account)
            .cloned())
    }

    async fn insert_student(&self, student: &StudentProfile) -> PortalResult<()> {
        self.tables.lock().await.students.push(student.clone());
        Ok(())
    }

    async fn patch_student(&self, id: StudentId, profile: &ProfileInput) -> PortalResult<()> {
        let mut tables = self.tables.lock().await;
        let student = tables
            .students
            .iter_mut()
            .find(|student| student.id == id)
            .ok_or(PortalError::NotFound("student profile"))?;
        student.registration_id = profile.registration_id.clone();
        student.display_name = profile.display_name.clone();
        student.branch = profile.branch.clone();
        student.current_term = profile.current_term;
        student.cohort_label = profile.cohort_label.clone();
        Ok(())
    }

    async fn set_cumulative_average(&self, id: StudentId, average: Option<f64>) -> PortalResult<()> {
        let mut tables = self.tables.lock().await;
        let student = tables
            .students
            .iter_mut()
            .find(|student| student.id == id)
            .ok_or(PortalError::NotFound("student profile"))?;
        student.cumulative_average = average;
        Ok(())
    }

    async fn insert_result(&self, result: &ResultRecord) -> PortalResult<()> {
        self.tables.lock().await.results.push(result.clone());
        Ok(())
    }

    async fn results_for_student(
        &self,
        student: StudentId,
        term: Option<i32>,
    ) -> PortalResult<Vec<ResultRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .results
            .iter()
            .filter(|result| result.student_id == student)
            .filter(|result| term.map_or(true, |term| result.term == term))
            .cloned()
            .collect())
    }

    async fn insert_opportunity(&self, opportunity: &Opportunity) -> PortalResult<()> {
        self.tables.lock().await.opportunities.push(opportunity.clone());
        Ok(())
    }

    async fn opportunities(&self, state: Option<LifecycleState>) -> PortalResult<Vec<Opportunity>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .opportunities
            .iter()
            .rev()
            .filter(|opportunity| state.map_or(true, |state| opportunity.lifecycle_state == state))
            .cloned()
            .collect())
    }

    async fn insert_material(&self, material: &StudyMaterial) -> PortalResult<()> {
        self.tables.lock().await.materials.push(material.clone());
        Ok(())
    }

    async fn materials(&self, index: &MaterialIndex) -> PortalResult<Vec<StudyMaterial>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .materials
            .iter()
            .filter(|material| index.matches(material))
            .cloned()
            .collect())
    }

    async fn increment_download_count(&self, id: MaterialId) -> PortalResult<Option<i32>> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .materials
            .iter_mut()
            .find(|material| material.id == id)
            .map(|material| {
                material.download_count += 1;
                material.download_count
            }))
    }

    async fn insert_session(&self, session: &ChatSession) -> PortalResult<()> {
        self.tables.lock().await.sessions.push(session.clone());
        Ok(())
    }

    async fn session(&self, id: SessionId) -> PortalResult<Option<ChatSession>> {
        let tables = self.tables.lock().await;
        Ok(tables.sessions.iter().find(|session| session.id == id).cloned())
    }

    async fn sessions_for_account(&self, account: AccountId) -> PortalResult<Vec<ChatSession>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .rev()
            .filter(|session| session.account == account)
            .cloned()
            .collect())
    }

    async fn set_last_message(&self, id: SessionId, content: &str) -> PortalResult<()> {
        let mut tables = self.tables.lock().await;
        let session = tables
            .sessions
            .iter_mut()
            .find(|session| session.id == id)
            .ok_or(PortalError::NotFound("chat session"))?;
        session.last_message = Some(content.to_string());
        Ok(())
    }

    async fn insert_message(&self, message: &ChatMessage) -> PortalResult<()> {
        self.tables.lock().await.messages.push(message.clone());
        Ok(())
    }

    async fn messages(&self, session: SessionId) -> PortalResult<Vec<ChatMessage>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .messages
            .iter()
            .filter(|message| message.session_id == session)
            .cloned()
            .collect())
    }

    async fn recent_messages(
        &self,
        session: SessionId,
        limit: usize,
    ) -> PortalResult<Vec<ChatMessage>> {
        let mut messages = self.messages(session).await?;
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.split_off(skip))
    }

    async fn insert_announcement(&self, announcement: &Announcement) -> PortalResult<()> {
        self.tables.lock().await.announcements.push(announcement.clone());
        Ok(())
    }

    async fn active_announcements(&self) -> PortalResult<Vec<Announcement>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .announcements
            .iter()
            .rev()
            .filter(|announcement| announcement.is_active)
            .cloned()
            .collect())
    }

    async fn set_announcement_active(&self, id: AnnouncementId, active: bool) -> PortalResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables
            .announcements
            .iter_mut()
            .find(|announcement| announcement.id == id)
        {
            Some(announcement) => {
                announcement.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatRole;
    use chrono::Utc;
    use uuid::Uuid;

    fn message(session_id: SessionId, content: &str) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            account: Uuid::nil(),
            content: content.to_string(),
            role: ChatRole::User,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn recent_messages_keep_the_newest_oldest_first() {
        let store = MemoryStore::new();
        let session = Uuid::new_v4();
        for n in 0..12 {
            store
                .insert_message(&message(session, &format!("m{n}")))
                .await
                .unwrap();
        }
        store
            .insert_message(&message(Uuid::new_v4(), "elsewhere"))
            .await
            .unwrap();

        let recent = store.recent_messages(session, 10).await.unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents.len(), 10);
        assert_eq!(contents.first(), Some(&"m2"));
        assert_eq!(contents.last(), Some(&"m11"));
    }

    #[tokio::test]
    async fn download_count_of_missing_material_is_none() {
        let store = MemoryStore::new();
        assert_eq!(
            store.increment_download_count(Uuid::new_v4()).await.unwrap(),
            None
        );
    }
}
