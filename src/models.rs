use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PortalError, PortalResult};

/// Identity issued by the authentication layer.
pub type AccountId = Uuid;
/// Internal identity of a student profile. Results reference this, not the account.
pub type StudentId = Uuid;
pub type ResultId = Uuid;
pub type OpportunityId = Uuid;
pub type MaterialId = Uuid;
pub type StorageId = Uuid;
pub type SessionId = Uuid;
pub type MessageId = Uuid;
pub type AnnouncementId = Uuid;

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = PortalError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(PortalError::invalid(
                        stringify!($name),
                        format!("unknown value {other:?}, expected one of: {}", [$($text),+].join(", ")),
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamCategory {
    Regular,
    Revaluation,
    Supplementary,
}

text_enum!(ExamCategory {
    Regular => "regular",
    Revaluation => "revaluation",
    Supplementary => "supplementary",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Upcoming,
    Ongoing,
    Completed,
}

text_enum!(LifecycleState {
    Upcoming => "upcoming",
    Ongoing => "ongoing",
    Completed => "completed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Notes,
    QuestionPaper,
    Syllabus,
    LabManual,
}

text_enum!(MaterialKind {
    Notes => "notes",
    QuestionPaper => "question_paper",
    Syllabus => "syllabus",
    LabManual => "lab_manual",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

text_enum!(ChatRole {
    User => "user",
    Assistant => "assistant",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementKind {
    General,
    Academic,
    Placement,
    Urgent,
}

text_enum!(AnnouncementKind {
    General => "general",
    Academic => "academic",
    Placement => "placement",
    Urgent => "urgent",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: StudentId,
    pub account: AccountId,
    pub registration_id: String,
    pub display_name: String,
    pub branch: String,
    pub current_term: i32,
    pub cohort_label: String,
    pub cumulative_average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileInput {
    pub registration_id: String,
    pub display_name: String,
    pub branch: String,
    pub current_term: i32,
    pub cohort_label: String,
}

impl ProfileInput {
    pub fn validate(&self) -> PortalResult<()> {
        require_text("registration_id", &self.registration_id)?;
        require_text("display_name", &self.display_name)?;
        require_text("branch", &self.branch)?;
        require_text("cohort_label", &self.cohort_label)?;
        require_positive("current_term", self.current_term)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: ResultId,
    pub student_id: StudentId,
    pub term: i32,
    pub subject_name: String,
    pub subject_code: String,
    pub internal_score: Option<f64>,
    pub external_score: Option<f64>,
    pub total_score: Option<f64>,
    /// Raw grade as entered. Unrecognized symbols are kept but never averaged.
    pub letter_grade: Option<String>,
    pub credit_weight: i32,
    pub exam_category: ExamCategory,
    pub academic_year: String,
}

/// One result row as submitted by a student or read from an import file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewResult {
    pub term: i32,
    pub subject_name: String,
    pub subject_code: String,
    pub internal_score: Option<f64>,
    pub external_score: Option<f64>,
    pub total_score: Option<f64>,
    pub letter_grade: Option<String>,
    pub credit_weight: i32,
    pub exam_category: ExamCategory,
    pub academic_year: String,
}

impl NewResult {
    pub fn validate(&self) -> PortalResult<()> {
        require_positive("term", self.term)?;
        require_positive("credit_weight", self.credit_weight)?;
        require_text("subject_name", &self.subject_name)?;
        require_text("subject_code", &self.subject_code)?;
        require_text("academic_year", &self.academic_year)?;
        for (field, score) in [
            ("internal_score", self.internal_score),
            ("external_score", self.external_score),
            ("total_score", self.total_score),
        ] {
            if let Some(value) = score {
                if !value.is_finite() || value < 0.0 {
                    return Err(PortalError::invalid(field, "must be a non-negative number"));
                }
            }
        }
        Ok(())
    }

    pub fn into_record(self, student_id: StudentId) -> ResultRecord {
        ResultRecord {
            id: Uuid::new_v4(),
            student_id,
            term: self.term,
            subject_name: self.subject_name.trim().to_string(),
            subject_code: self.subject_code.trim().to_string(),
            internal_score: self.internal_score,
            external_score: self.external_score,
            total_score: self.total_score,
            letter_grade: self
                .letter_grade
                .map(|grade| grade.trim().to_string())
                .filter(|grade| !grade.is_empty()),
            credit_weight: self.credit_weight,
            exam_category: self.exam_category,
            academic_year: self.academic_year.trim().to_string(),
        }
    }
}

/// A placement posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: OpportunityId,
    pub organization: String,
    pub role: String,
    pub compensation: Option<String>,
    /// Branch labels; "All" matches any branch.
    pub eligible_groups: Vec<String>,
    pub minimum_average: Option<f64>,
    pub narrative: String,
    pub apply_by: Option<DateTime<Utc>>,
    pub event_date: Option<DateTime<Utc>>,
    /// Set by whoever posts the opportunity. Never derived from the dates.
    pub lifecycle_state: LifecycleState,
    pub requirements: Option<Vec<String>>,
    pub contact: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOpportunity {
    pub organization: String,
    pub role: String,
    pub compensation: Option<String>,
    pub eligible_groups: Vec<String>,
    pub minimum_average: Option<f64>,
    pub narrative: String,
    pub apply_by: Option<DateTime<Utc>>,
    pub event_date: Option<DateTime<Utc>>,
    pub lifecycle_state: LifecycleState,
    pub requirements: Option<Vec<String>>,
    pub contact: Option<String>,
}

impl NewOpportunity {
    pub fn validate(&self) -> PortalResult<()> {
        require_text("organization", &self.organization)?;
        require_text("role", &self.role)?;
        if self.eligible_groups.iter().all(|group| group.trim().is_empty()) {
            return Err(PortalError::invalid(
                "eligible_groups",
                "at least one branch label is required",
            ));
        }
        if let Some(minimum) = self.minimum_average {
            if !(0.0..=10.0).contains(&minimum) {
                return Err(PortalError::invalid(
                    "minimum_average",
                    "must be between 0 and 10",
                ));
            }
        }
        Ok(())
    }

    pub fn into_opportunity(self, created_at: DateTime<Utc>) -> Opportunity {
        Opportunity {
            id: Uuid::new_v4(),
            organization: self.organization,
            role: self.role,
            compensation: self.compensation,
            eligible_groups: self
                .eligible_groups
                .into_iter()
                .map(|group| group.trim().to_string())
                .filter(|group| !group.is_empty())
                .collect(),
            minimum_average: self.minimum_average,
            narrative: self.narrative,
            apply_by: self.apply_by,
            event_date: self.event_date,
            lifecycle_state: self.lifecycle_state,
            requirements: self.requirements,
            contact: self.contact,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyMaterial {
    pub id: MaterialId,
    pub title: String,
    pub subject: String,
    pub branch: String,
    pub term: i32,
    pub kind: MaterialKind,
    pub storage_id: Option<StorageId>,
    pub description: Option<String>,
    pub uploaded_by: AccountId,
    pub tags: Vec<String>,
    pub download_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMaterial {
    pub title: String,
    pub subject: String,
    pub branch: String,
    pub term: i32,
    pub kind: MaterialKind,
    pub storage_id: Option<StorageId>,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl NewMaterial {
    pub fn validate(&self) -> PortalResult<()> {
        require_text("title", &self.title)?;
        require_text("subject", &self.subject)?;
        require_text("branch", &self.branch)?;
        require_positive("term", self.term)
    }
}

/// Lookup used when listing materials. Branch and term only narrow the
/// listing when both are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialFilter {
    pub branch: Option<String>,
    pub term: Option<i32>,
    pub subject: Option<String>,
    pub kind: Option<MaterialKind>,
}

impl MaterialFilter {
    /// Picks the single lookup to run: branch and term together, then
    /// subject, then kind, otherwise everything.
    pub fn index(&self) -> MaterialIndex {
        match (&self.branch, self.term, &self.subject, self.kind) {
            (Some(branch), Some(term), _, _) => MaterialIndex::BranchTerm(branch.clone(), term),
            (_, _, Some(subject), _) => MaterialIndex::Subject(subject.clone()),
            (_, _, _, Some(kind)) => MaterialIndex::Kind(kind),
            _ => MaterialIndex::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MaterialIndex {
    BranchTerm(String, i32),
    Subject(String),
    Kind(MaterialKind),
    All,
}

impl MaterialIndex {
    #[cfg(test)]
    pub fn matches(&self, material: &StudyMaterial) -> bool {
        match self {
            MaterialIndex::BranchTerm(branch, term) => {
                &material.branch == branch && material.term == *term
            }
            MaterialIndex::Subject(subject) => &material.subject == subject,
            MaterialIndex::Kind(kind) => material.kind == *kind,
            MaterialIndex::All => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialView {
    #[serde(flatten)]
    pub material: StudyMaterial,
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: SessionId,
    pub account: AccountId,
    pub title: String,
    pub last_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub session_id: SessionId,
    pub account: AccountId,
    pub content: String,
    pub role: ChatRole,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: AnnouncementId,
    pub title: String,
    pub content: String,
    pub kind: AnnouncementKind,
    pub target_branches: Option<Vec<String>>,
    pub target_terms: Option<Vec<i32>>,
    pub created_by: AccountId,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnnouncement {
    pub title: String,
    pub content: String,
    pub kind: AnnouncementKind,
    pub target_branches: Option<Vec<String>>,
    pub target_terms: Option<Vec<i32>>,
}

impl NewAnnouncement {
    pub fn validate(&self) -> PortalResult<()> {
        require_text("title", &self.title)?;
        require_text("content", &self.content)?;
        if let Some(terms) = &self.target_terms {
            for term in terms {
                require_positive("target_terms", *term)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentStats {
    pub student: StudentProfile,
    pub results_count: usize,
    pub materials_count: usize,
}

fn require_text(field: &'static str, value: &str) -> PortalResult<()> {
    if value.trim().is_empty() {
        return Err(PortalError::invalid(field, "must not be empty"));
    }
    Ok(())
}

fn require_positive(field: &'static str, value: i32) -> PortalResult<()> {
    if value < 1 {
        return Err(PortalError::invalid(field, "must be a positive integer"));
    }
    Ok(())
}
