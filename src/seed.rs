use anyhow::Context;
use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::models::{
    AnnouncementKind, LifecycleState, MaterialKind, NewAnnouncement, NewMaterial, NewOpportunity,
};
use crate::portal::Portal;

/// Account that owns seeded rows.
pub const SEED_ACCOUNT: &str = "8f1d0c52-6a3e-4c1b-9a57-2f4b1e7d9c30";

fn at(year: i32, month: u32, day: u32) -> anyhow::Result<chrono::DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(9, 0, 0))
        .context("invalid date")?;
    Ok(Utc.from_utc_datetime(&date))
}

/// Inserts sample placements, materials and a notice. Does nothing when
/// placements already exist.
pub async fn seed(portal: &Portal) -> anyhow::Result<bool> {
    if !portal.placements(None).await?.is_empty() {
        return Ok(false);
    }
    let account = Some(Uuid::parse_str(SEED_ACCOUNT)?);

    let placements = vec![
        NewOpportunity {
            organization: "Infosys".to_string(),
            role: "Systems Engineer".to_string(),
            compensation: Some("3.6 LPA".to_string()),
            eligible_groups: vec!["All".to_string()],
            minimum_average: Some(6.0),
            narrative: "Mass recruitment drive for all branches.".to_string(),
            apply_by: Some(at(2026, 11, 20)?),
            event_date: Some(at(2026, 12, 2)?),
            lifecycle_state: LifecycleState::Upcoming,
            requirements: Some(vec!["No active backlogs".to_string()]),
            contact: Some("placements@college.edu".to_string()),
        },
        NewOpportunity {
            organization: "Cisco".to_string(),
            role: "Software Engineer".to_string(),
            compensation: Some("18 LPA".to_string()),
            eligible_groups: vec!["CSE".to_string(), "ISE".to_string(), "ECE".to_string()],
            minimum_average: Some(8.0),
            narrative: "Online assessment followed by two technical rounds.".to_string(),
            apply_by: Some(at(2026, 11, 5)?),
            event_date: None,
            lifecycle_state: LifecycleState::Upcoming,
            requirements: None,
            contact: None,
        },
        NewOpportunity {
            organization: "Larsen & Toubro".to_string(),
            role: "Graduate Engineer Trainee".to_string(),
            compensation: None,
            eligible_groups: vec!["Civil".to_string(), "ME".to_string()],
            minimum_average: None,
            narrative: "Site engineering roles across project locations.".to_string(),
            apply_by: None,
            event_date: Some(at(2026, 9, 14)?),
            lifecycle_state: LifecycleState::Completed,
            requirements: None,
            contact: None,
        },
    ];
    for placement in placements {
        portal.add_placement(account, placement).await?;
    }

    let materials = vec![
        NewMaterial {
            title: "DBMS Module 3 Notes".to_string(),
            subject: "Database Management Systems".to_string(),
            branch: "CSE".to_string(),
            term: 5,
            kind: MaterialKind::Notes,
            storage_id: None,
            description: Some("Normalization and transaction processing".to_string()),
            tags: vec!["dbms".to_string(), "module-3".to_string()],
        },
        NewMaterial {
            title: "Analog Circuits 2024 Paper".to_string(),
            subject: "Analog Electronic Circuits".to_string(),
            branch: "ECE".to_string(),
            term: 3,
            kind: MaterialKind::QuestionPaper,
            storage_id: None,
            description: None,
            tags: Vec::new(),
        },
    ];
    for material in materials {
        portal.upload_material(account, material).await?;
    }

    portal
        .post_announcement(
            account,
            NewAnnouncement {
                title: "Semester end examinations".to_string(),
                content: "Timetable is published on the examination portal.".to_string(),
                kind: AnnouncementKind::Academic,
                target_branches: None,
                target_terms: None,
            },
        )
        .await?;

    Ok(true)
}
