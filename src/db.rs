use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::info;

use crate::error::{PortalError, PortalResult};
use crate::models::{
    AccountId, Announcement, AnnouncementId, ChatMessage, ChatSession, LifecycleState,
    MaterialId, MaterialIndex, Opportunity, ProfileInput, ResultRecord, SessionId, StudentId,
    StudentProfile, StudyMaterial,
};
use crate::store::PortalStore;

pub async fn connect(database_url: &str, max_connections: u32) -> PortalResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &PgPool) -> PortalResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("student_portal schema migrated");
    Ok(())
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn student_from_row(row: &PgRow) -> PortalResult<StudentProfile> {
    Ok(StudentProfile {
        id: row.try_get("id")?,
        account: row.try_get("account_id")?,
        registration_id: row.try_get("registration_id")?,
        display_name: row.try_get("display_name")?,
        branch: row.try_get("branch")?,
        current_term: row.try_get("current_term")?,
        cohort_label: row.try_get("cohort_label")?,
        cumulative_average: row.try_get("cumulative_average")?,
    })
}

/// Decodes a stored enum label. Unknown labels mean the row is corrupt.
fn decode_label<T: FromStr<Err = PortalError>>(raw: &str) -> PortalResult<T> {
    raw.parse()
        .map_err(|_| PortalError::Corrupt(format!("unknown label {raw:?}")))
}

fn result_from_row(row: &PgRow) -> PortalResult<ResultRecord> {
    let exam_category: String = row.try_get("exam_category")?;
    Ok(ResultRecord {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        term: row.try_get("term")?,
        subject_name: row.try_get("subject_name")?,
        subject_code: row.try_get("subject_code")?,
        internal_score: row.try_get("internal_score")?,
        external_score: row.try_get("external_score")?,
        total_score: row.try_get("total_score")?,
        letter_grade: row.try_get("letter_grade")?,
        credit_weight: row.try_get("credit_weight")?,
        exam_category: decode_label(&exam_category)?,
        academic_year: row.try_get("academic_year")?,
    })
}

fn opportunity_from_row(row: &PgRow) -> PortalResult<Opportunity> {
    let lifecycle_state: String = row.try_get("lifecycle_state")?;
    Ok(Opportunity {
        id: row.try_get("id")?,
        organization: row.try_get("organization")?,
        role: row.try_get("role")?,
        compensation: row.try_get("compensation")?,
        eligible_groups: row.try_get("eligible_groups")?,
        minimum_average: row.try_get("minimum_average")?,
        narrative: row.try_get("narrative")?,
        apply_by: row.try_get("apply_by")?,
        event_date: row.try_get("event_date")?,
        lifecycle_state: decode_label(&lifecycle_state)?,
        requirements: row.try_get("requirements")?,
        contact: row.try_get("contact")?,
        created_at: row.try_get("created_at")?,
    })
}

fn material_from_row(row: &PgRow) -> PortalResult<StudyMaterial> {
    let kind: String = row.try_get("kind")?;
    Ok(StudyMaterial {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        subject: row.try_get("subject")?,
        branch: row.try_get("branch")?,
        term: row.try_get("term")?,
        kind: decode_label(&kind)?,
        storage_id: row.try_get("storage_id")?,
        description: row.try_get("description")?,
        uploaded_by: row.try_get("uploaded_by")?,
        tags: row.try_get("tags")?,
        download_count: row.try_get("download_count")?,
        created_at: row.try_get("created_at")?,
    })
}

fn session_from_row(row: &PgRow) -> PortalResult<ChatSession> {
    Ok(ChatSession {
        id: row.try_get("id")?,
        account: row.try_get("account_id")?,
        title: row.try_get("title")?,
        last_message: row.try_get("last_message")?,
        created_at: row.try_get("created_at")?,
    })
}

fn message_from_row(row: &PgRow) -> PortalResult<ChatMessage> {
    let role: String = row.try_get("role")?;
    Ok(ChatMessage {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        account: row.try_get("account_id")?,
        content: row.try_get("content")?,
        role: decode_label(&role)?,
        timestamp: row.try_get("created_at")?,
    })
}

fn announcement_from_row(row: &PgRow) -> PortalResult<Announcement> {
    let kind: String = row.try_get("kind")?;
    Ok(Announcement {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        kind: decode_label(&kind)?,
        target_branches: row.try_get("target_branches")?,
        target_terms: row.try_get("target_terms")?,
        created_by: row.try_get("created_by")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

const MESSAGE_COLUMNS: &str =
    "id, session_id, account_id, content, role, created_at FROM student_portal.chat_messages";

#[async_trait]
impl PortalStore for PgStore {
    async fn student_by_account(&self, account: AccountId) -> PortalResult<Option<StudentProfile>> {
        let row = sqlx::query("SELECT * FROM student_portal.students WHERE account_id = $1")
            .bind(account)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(student_from_row).transpose()
    }

    async fn insert_student(&self, student: &StudentProfile) -> PortalResult<()> {
        sqlx::query(
            r#"
            INSERT INTO student_portal.students
            (id, account_id, registration_id, display_name, branch, current_term, cohort_label, cumulative_average)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(student.id)
        .bind(student.account)
        .bind(&student.registration_id)
        .bind(&student.display_name)
        .bind(&student.branch)
        .bind(student.current_term)
        .bind(&student.cohort_label)
        .bind(student.cumulative_average)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn patch_student(&self, id: StudentId, profile: &ProfileInput) -> PortalResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE student_portal.students
            SET registration_id = $2, display_name = $3, branch = $4, current_term = $5, cohort_label = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&profile.registration_id)
        .bind(&profile.display_name)
        .bind(&profile.branch)
        .bind(profile.current_term)
        .bind(&profile.cohort_label)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PortalError::NotFound("student profile"));
        }
        Ok(())
    }

    async fn set_cumulative_average(&self, id: StudentId, average: Option<f64>) -> PortalResult<()> {
        let result = sqlx::query(
            "UPDATE student_portal.students SET cumulative_average = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(average)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PortalError::NotFound("student profile"));
        }
        Ok(())
    }

    async fn insert_result(&self, result: &ResultRecord) -> PortalResult<()> {
        sqlx::query(
            r#"
            INSERT INTO student_portal.results
            (id, student_id, term, subject_name, subject_code, internal_score, external_score,
             total_score, letter_grade, credit_weight, exam_category, academic_year)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(result.id)
        .bind(result.student_id)
        .bind(result.term)
        .bind(&result.subject_name)
        .bind(&result.subject_code)
        .bind(result.internal_score)
        .bind(result.external_score)
        .bind(result.total_score)
        .bind(&result.letter_grade)
        .bind(result.credit_weight)
        .bind(result.exam_category.as_str())
        .bind(&result.academic_year)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn results_for_student(
        &self,
        student: StudentId,
        term: Option<i32>,
    ) -> PortalResult<Vec<ResultRecord>> {
        let mut query = String::from("SELECT * FROM student_portal.results WHERE student_id = $1");
        if term.is_some() {
            query.push_str(" AND term = $2");
        }
        query.push_str(" ORDER BY seq");

        let mut rows = sqlx::query(&query).bind(student);
        if let Some(term) = term {
            rows = rows.bind(term);
        }

        rows.fetch_all(&self.pool)
            .await?
            .iter()
            .map(result_from_row)
            .collect()
    }

    async fn insert_opportunity(&self, opportunity: &Opportunity) -> PortalResult<()> {
        sqlx::query(
            r#"
            INSERT INTO student_portal.opportunities
            (id, organization, role, compensation, eligible_groups, minimum_average, narrative,
             apply_by, event_date, lifecycle_state, requirements, contact, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(opportunity.id)
        .bind(&opportunity.organization)
        .bind(&opportunity.role)
        .bind(&opportunity.compensation)
        .bind(&opportunity.eligible_groups)
        .bind(opportunity.minimum_average)
        .bind(&opportunity.narrative)
        .bind(opportunity.apply_by)
        .bind(opportunity.event_date)
        .bind(opportunity.lifecycle_state.as_str())
        .bind(&opportunity.requirements)
        .bind(&opportunity.contact)
        .bind(opportunity.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn opportunities(&self, state: Option<LifecycleState>) -> PortalResult<Vec<Opportunity>> {
        let rows = match state {
            Some(state) => {
                sqlx::query(
                    "SELECT * FROM student_portal.opportunities WHERE lifecycle_state = $1 \
                     ORDER BY created_at DESC",
                )
                .bind(state.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM student_portal.opportunities ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(opportunity_from_row).collect()
    }

    async fn insert_material(&self, material: &StudyMaterial) -> PortalResult<()> {
        sqlx::query(
            r#"
            INSERT INTO student_portal.materials
            (id, title, subject, branch, term, kind, storage_id, description, uploaded_by, tags,
             download_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(material.id)
        .bind(&material.title)
        .bind(&material.subject)
        .bind(&material.branch)
        .bind(material.term)
        .bind(material.kind.as_str())
        .bind(material.storage_id)
        .bind(&material.description)
        .bind(material.uploaded_by)
        .bind(&material.tags)
        .bind(material.download_count)
        .bind(material.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn materials(&self, index: &MaterialIndex) -> PortalResult<Vec<StudyMaterial>> {
        let base = "SELECT * FROM student_portal.materials";
        let rows = match index {
            MaterialIndex::BranchTerm(branch, term) => {
                sqlx::query(&format!("{base} WHERE branch = $1 AND term = $2 ORDER BY created_at"))
                    .bind(branch)
                    .bind(*term)
                    .fetch_all(&self.pool)
                    .await?
            }
            MaterialIndex::Subject(subject) => {
                sqlx::query(&format!("{base} WHERE subject = $1 ORDER BY created_at"))
                    .bind(subject)
                    .fetch_all(&self.pool)
                    .await?
            }
            MaterialIndex::Kind(kind) => {
                sqlx::query(&format!("{base} WHERE kind = $1 ORDER BY created_at"))
                    .bind(kind.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            MaterialIndex::All => {
                sqlx::query(&format!("{base} ORDER BY created_at"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(material_from_row).collect()
    }

    async fn increment_download_count(&self, id: MaterialId) -> PortalResult<Option<i32>> {
        let row = sqlx::query(
            r#"
            UPDATE student_portal.materials
            SET download_count = download_count + 1
            WHERE id = $1
            RETURNING download_count
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.try_get("download_count")).transpose()?)
    }

    async fn insert_session(&self, session: &ChatSession) -> PortalResult<()> {
        sqlx::query(
            r#"
            INSERT INTO student_portal.chat_sessions (id, account_id, title, last_message, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session.id)
        .bind(session.account)
        .bind(&session.title)
        .bind(&session.last_message)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn session(&self, id: SessionId) -> PortalResult<Option<ChatSession>> {
        let row = sqlx::query("SELECT * FROM student_portal.chat_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn sessions_for_account(&self, account: AccountId) -> PortalResult<Vec<ChatSession>> {
        sqlx::query(
            "SELECT * FROM student_portal.chat_sessions WHERE account_id = $1 \
             ORDER BY created_at DESC",
        )
        .bind(account)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(session_from_row)
        .collect()
    }

    async fn set_last_message(&self, id: SessionId, content: &str) -> PortalResult<()> {
        let result =
            sqlx::query("UPDATE student_portal.chat_sessions SET last_message = $2 WHERE id = $1")
                .bind(id)
                .bind(content)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(PortalError::NotFound("chat session"));
        }
        Ok(())
    }

    async fn insert_message(&self, message: &ChatMessage) -> PortalResult<()> {
        sqlx::query(
            r#"
            INSERT INTO student_portal.chat_messages (id, session_id, account_id, content, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id)
        .bind(message.session_id)
        .bind(message.account)
        .bind(&message.content)
        .bind(message.role.as_str())
        .bind(message.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn messages(&self, session: SessionId) -> PortalResult<Vec<ChatMessage>> {
        sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} WHERE session_id = $1 ORDER BY seq"
        ))
        .bind(session)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(message_from_row)
        .collect()
    }

    async fn recent_messages(
        &self,
        session: SessionId,
        limit: usize,
    ) -> PortalResult<Vec<ChatMessage>> {
        let limit = i64::try_from(limit).map_err(|_| PortalError::invalid("limit", "too large"))?;
        let rows = sqlx::query(&format!(
            "SELECT * FROM (SELECT seq, {MESSAGE_COLUMNS} WHERE session_id = $1 \
             ORDER BY seq DESC LIMIT $2) recent ORDER BY seq"
        ))
        .bind(session)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    async fn insert_announcement(&self, announcement: &Announcement) -> PortalResult<()> {
        sqlx::query(
            r#"
            INSERT INTO student_portal.announcements
            (id, title, content, kind, target_branches, target_terms, created_by, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(announcement.id)
        .bind(&announcement.title)
        .bind(&announcement.content)
        .bind(announcement.kind.as_str())
        .bind(&announcement.target_branches)
        .bind(&announcement.target_terms)
        .bind(announcement.created_by)
        .bind(announcement.is_active)
        .bind(announcement.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn active_announcements(&self) -> PortalResult<Vec<Announcement>> {
        sqlx::query(
            "SELECT * FROM student_portal.announcements WHERE is_active ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(announcement_from_row)
        .collect()
    }

    async fn set_announcement_active(&self, id: AnnouncementId, active: bool) -> PortalResult<bool> {
        let result =
            sqlx::query("UPDATE student_portal.announcements SET is_active = $2 WHERE id = $1")
                .bind(id)
                .bind(active)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
