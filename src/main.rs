use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

mod announcements;
mod chat;
mod completions;
mod config;
mod db;
mod eligibility;
mod error;
mod files;
mod grades;
mod materials;
mod models;
mod placements;
mod portal;
mod report;
mod results;
mod seed;
mod store;
mod students;
mod tasks;

use completions::HttpCompletionClient;
use config::Config;
use db::PgStore;
use files::LocalFileStorage;
use models::{
    AnnouncementKind, ChatRole, ExamCategory, LifecycleState, MaterialFilter, MaterialKind,
    NewAnnouncement, NewMaterial, NewOpportunity, NewResult, ProfileInput,
};
use portal::{Caller, Portal};
use tasks::TokioTaskQueue;

#[derive(Parser)]
#[command(name = "student-portal")]
#[command(about = "University student portal: results, placements, materials and an AI assistant", long_about = None)]
struct Cli {
    /// Account the command runs as
    #[arg(long, global = true, env = "PORTAL_ACCOUNT")]
    account: Option<Uuid>,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample placements, materials and announcements
    Seed,
    /// Student profile
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Exam results and grade-point averages
    #[command(subcommand)]
    Results(ResultsCommand),
    /// Placement opportunities
    #[command(subcommand)]
    Placements(PlacementsCommand),
    /// Study materials
    #[command(subcommand)]
    Materials(MaterialsCommand),
    /// AI assistant conversations
    #[command(subcommand)]
    Chat(ChatCommand),
    /// Notices for students
    #[command(subcommand)]
    Announcements(AnnouncementsCommand),
    /// Write a markdown transcript for the current student
    Report {
        #[arg(long, default_value = "transcript.md")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    Show,
    Set {
        #[arg(long)]
        usn: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        branch: String,
        #[arg(long)]
        term: i32,
        #[arg(long)]
        batch: String,
    },
    Stats,
}

#[derive(Subcommand)]
enum ResultsCommand {
    List {
        #[arg(long)]
        term: Option<i32>,
    },
    Add {
        #[arg(long)]
        term: i32,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        internal: Option<f64>,
        #[arg(long)]
        external: Option<f64>,
        #[arg(long)]
        total: Option<f64>,
        #[arg(long)]
        grade: Option<String>,
        #[arg(long)]
        credits: i32,
        #[arg(long, default_value = "regular")]
        exam_type: ExamCategory,
        #[arg(long)]
        academic_year: String,
    },
    /// Import results from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Grade-point average for one term
    Sgpa {
        #[arg(long)]
        term: i32,
    },
    /// Recompute and store the cumulative average
    Cgpa,
}

#[derive(Subcommand)]
enum PlacementsCommand {
    List {
        #[arg(long)]
        status: Option<LifecycleState>,
    },
    Eligible,
    Add {
        #[arg(long)]
        company: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        package: Option<String>,
        #[arg(long = "branch", value_delimiter = ',', required = true)]
        branches: Vec<String>,
        #[arg(long)]
        min_cgpa: Option<f64>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        apply_by: Option<NaiveDate>,
        #[arg(long)]
        drive_date: Option<NaiveDate>,
        #[arg(long, default_value = "upcoming")]
        status: LifecycleState,
        #[arg(long = "requirement")]
        requirements: Vec<String>,
        #[arg(long)]
        contact: Option<String>,
    },
}

#[derive(Subcommand)]
enum MaterialsCommand {
    List {
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        term: Option<i32>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        kind: Option<MaterialKind>,
    },
    Upload {
        #[arg(long)]
        title: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        branch: String,
        #[arg(long)]
        term: i32,
        #[arg(long)]
        kind: MaterialKind,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Count a download of one material
    Download {
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum ChatCommand {
    Sessions,
    New {
        #[arg(long)]
        title: String,
    },
    /// Send a message and wait for the assistant reply
    Send {
        #[arg(long)]
        session: Uuid,
        #[arg(long)]
        message: String,
    },
    History {
        #[arg(long)]
        session: Uuid,
    },
}

#[derive(Subcommand)]
enum AnnouncementsCommand {
    List,
    Post {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long, default_value = "general")]
        kind: AnnouncementKind,
        #[arg(long = "branch", value_delimiter = ',')]
        branches: Vec<String>,
        #[arg(long = "term", value_delimiter = ',')]
        terms: Vec<i32>,
    },
    Deactivate {
        #[arg(long)]
        id: Uuid,
    },
}

fn day_start(date: Option<NaiveDate>) -> Option<chrono::DateTime<Utc>> {
    date.and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|moment| Utc.from_utc_datetime(&moment))
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    let pool = db::connect(&config.database_url, config.max_connections)
        .await
        .context("failed to connect to Postgres")?;

    if let Commands::InitDb = cli.command {
        db::init_db(&pool).await?;
        println!("Schema ready.");
        return Ok(());
    }

    let tasks = Arc::new(TokioTaskQueue::new());
    let portal = Portal::new(
        Arc::new(PgStore::new(pool)),
        Arc::new(LocalFileStorage::new(config.storage_dir.clone())),
        tasks.clone(),
        Arc::new(HttpCompletionClient::new(
            &config.completions_base_url,
            config.completions_api_key.clone(),
            &config.completions_model,
        )),
    );

    let outcome = run(&portal, &tasks, cli.account, cli.json, cli.command).await;
    tasks.drain().await;
    outcome
}

async fn run(
    portal: &Portal,
    tasks: &TokioTaskQueue,
    caller: Caller,
    json: bool,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::InitDb => {}
        Commands::Seed => {
            if seed::seed(portal).await? {
                println!("Seed data inserted.");
            } else {
                println!("Placements already present; seed skipped.");
            }
        }
        Commands::Profile(command) => profile(portal, caller, json, command).await?,
        Commands::Results(command) => results(portal, caller, json, command).await?,
        Commands::Placements(command) => placements(portal, caller, json, command).await?,
        Commands::Materials(command) => materials(portal, caller, json, command).await?,
        Commands::Chat(command) => chat(portal, tasks, caller, json, command).await?,
        Commands::Announcements(command) => announcements(portal, caller, json, command).await?,
        Commands::Report { out } => {
            let student = portal
                .current_student(caller)
                .await?
                .context("no student profile for this account")?;
            let results = portal.student_results(caller, None).await?;
            let eligible = portal.eligible_placements(caller).await?;
            let report =
                report::build_transcript(&student, Utc::now().date_naive(), &results, &eligible);
            std::fs::write(&out, report)?;
            println!("Transcript written to {}.", out.display());
        }
    }
    Ok(())
}

async fn profile(
    portal: &Portal,
    caller: Caller,
    json: bool,
    command: ProfileCommand,
) -> anyhow::Result<()> {
    match command {
        ProfileCommand::Show => {
            let student = portal.current_student(caller).await?;
            if json {
                return print_json(&student);
            }
            match student {
                Some(s) => {
                    println!("{} ({})", s.display_name, s.registration_id);
                    println!("Branch {} term {}, batch {}", s.branch, s.current_term, s.cohort_label);
                    match s.cumulative_average {
                        Some(average) => println!("CGPA {average:.2}"),
                        None => println!("CGPA not computed"),
                    }
                }
                None => println!("No profile yet."),
            }
        }
        ProfileCommand::Set {
            usn,
            name,
            branch,
            term,
            batch,
        } => {
            let id = portal
                .upsert_profile(
                    caller,
                    ProfileInput {
                        registration_id: usn,
                        display_name: name,
                        branch,
                        current_term: term,
                        cohort_label: batch,
                    },
                )
                .await?;
            println!("Profile saved ({id}).");
        }
        ProfileCommand::Stats => {
            let stats = portal.student_stats(caller).await?;
            if json {
                return print_json(&stats);
            }
            match stats {
                Some(stats) => println!(
                    "{}: {} results recorded, {} materials for {} term {}",
                    stats.student.display_name,
                    stats.results_count,
                    stats.materials_count,
                    stats.student.branch,
                    stats.student.current_term
                ),
                None => println!("No profile yet."),
            }
        }
    }
    Ok(())
}

async fn results(
    portal: &Portal,
    caller: Caller,
    json: bool,
    command: ResultsCommand,
) -> anyhow::Result<()> {
    match command {
        ResultsCommand::List { term } => {
            let results = portal.student_results(caller, term).await?;
            if json {
                return print_json(&results);
            }
            if results.is_empty() {
                println!("No results found.");
            }
            for result in &results {
                println!(
                    "- term {} {} {}: grade {} ({} credits, {})",
                    result.term,
                    result.subject_code,
                    result.subject_name,
                    result.letter_grade.as_deref().unwrap_or("-"),
                    result.credit_weight,
                    result.exam_category
                );
            }
        }
        ResultsCommand::Add {
            term,
            subject,
            code,
            internal,
            external,
            total,
            grade,
            credits,
            exam_type,
            academic_year,
        } => {
            let id = portal
                .add_result(
                    caller,
                    NewResult {
                        term,
                        subject_name: subject,
                        subject_code: code,
                        internal_score: internal,
                        external_score: external,
                        total_score: total,
                        letter_grade: grade,
                        credit_weight: credits,
                        exam_category: exam_type,
                        academic_year,
                    },
                )
                .await?;
            println!("Result added ({id}).");
        }
        ResultsCommand::Import { csv } => {
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;
            let inserted = portal.import_results_csv(caller, file).await?;
            println!("Inserted {inserted} results from {}.", csv.display());
        }
        ResultsCommand::Sgpa { term } => {
            let average = portal.term_average_for(caller, term).await?;
            if json {
                return print_json(&average);
            }
            match average {
                Some(average) => println!("SGPA for term {term}: {average}"),
                None => println!("SGPA for term {term}: not available"),
            }
        }
        ResultsCommand::Cgpa => {
            let average = portal.refresh_cumulative_average(caller).await?;
            if json {
                return print_json(&average);
            }
            match average {
                Some(average) => println!("CGPA: {average}"),
                None => println!("CGPA: not available"),
            }
        }
    }
    Ok(())
}

async fn placements(
    portal: &Portal,
    caller: Caller,
    json: bool,
    command: PlacementsCommand,
) -> anyhow::Result<()> {
    match command {
        PlacementsCommand::List { status } => {
            let listed = portal.placements(status).await?;
            if json {
                return print_json(&listed);
            }
            for opportunity in &listed {
                println!(
                    "- [{}] {}: {} ({})",
                    opportunity.lifecycle_state,
                    opportunity.organization,
                    opportunity.role,
                    opportunity.eligible_groups.join(", ")
                );
            }
        }
        PlacementsCommand::Eligible => {
            let eligible = portal.eligible_placements(caller).await?;
            if json {
                return print_json(&eligible);
            }
            if eligible.is_empty() {
                println!("No upcoming placements match this profile.");
            }
            for opportunity in &eligible {
                println!(
                    "- {}: {}{}",
                    opportunity.organization,
                    opportunity.role,
                    opportunity
                        .compensation
                        .as_deref()
                        .map(|package| format!(" ({package})"))
                        .unwrap_or_default()
                );
            }
        }
        PlacementsCommand::Add {
            company,
            role,
            package,
            branches,
            min_cgpa,
            description,
            apply_by,
            drive_date,
            status,
            requirements,
            contact,
        } => {
            let id = portal
                .add_placement(
                    caller,
                    NewOpportunity {
                        organization: company,
                        role,
                        compensation: package,
                        eligible_groups: branches,
                        minimum_average: min_cgpa,
                        narrative: description,
                        apply_by: day_start(apply_by),
                        event_date: day_start(drive_date),
                        lifecycle_state: status,
                        requirements: non_empty(requirements),
                        contact,
                    },
                )
                .await?;
            println!("Placement added ({id}).");
        }
    }
    Ok(())
}

async fn materials(
    portal: &Portal,
    caller: Caller,
    json: bool,
    command: MaterialsCommand,
) -> anyhow::Result<()> {
    match command {
        MaterialsCommand::List {
            branch,
            term,
            subject,
            kind,
        } => {
            let filter = MaterialFilter {
                branch,
                term,
                subject,
                kind,
            };
            let listed = portal.materials(&filter).await?;
            if json {
                return print_json(&listed);
            }
            for view in &listed {
                let material = &view.material;
                println!(
                    "- {} [{}] {} / {} term {} ({} downloads){}",
                    material.id,
                    material.kind,
                    material.title,
                    material.branch,
                    material.term,
                    material.download_count,
                    view.file_url
                        .as_deref()
                        .map(|url| format!(" {url}"))
                        .unwrap_or_default()
                );
            }
        }
        MaterialsCommand::Upload {
            title,
            subject,
            branch,
            term,
            kind,
            file,
            description,
            tags,
        } => {
            let storage_id = match file {
                Some(path) => {
                    let bytes = tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    let target = portal.generate_upload_target(caller).await?;
                    Some(portal.files.upload(target, &bytes).await?)
                }
                None => None,
            };
            let id = portal
                .upload_material(
                    caller,
                    NewMaterial {
                        title,
                        subject,
                        branch,
                        term,
                        kind,
                        storage_id,
                        description,
                        tags,
                    },
                )
                .await?;
            println!("Material uploaded ({id}).");
        }
        MaterialsCommand::Download { id } => {
            let count = portal.record_download(id).await?;
            println!("Download recorded; {count} total.");
        }
    }
    Ok(())
}

async fn chat(
    portal: &Portal,
    tasks: &TokioTaskQueue,
    caller: Caller,
    json: bool,
    command: ChatCommand,
) -> anyhow::Result<()> {
    match command {
        ChatCommand::Sessions => {
            let sessions = portal.chat_sessions(caller).await?;
            if json {
                return print_json(&sessions);
            }
            for session in &sessions {
                println!(
                    "- {} {}: {}",
                    session.id,
                    session.title,
                    session.last_message.as_deref().unwrap_or("")
                );
            }
        }
        ChatCommand::New { title } => {
            let id = portal.create_chat_session(caller, &title).await?;
            println!("Session created ({id}).");
        }
        ChatCommand::Send { session, message } => {
            portal.send_message(caller, session, &message).await?;
            tasks.drain().await;
            let history = portal.chat_messages(session).await?;
            if let Some(reply) = history.iter().rev().find(|m| m.role == ChatRole::Assistant) {
                println!("{}", reply.content);
            }
        }
        ChatCommand::History { session } => {
            let history = portal.chat_messages(session).await?;
            if json {
                return print_json(&history);
            }
            for message in &history {
                println!(
                    "[{}] {}: {}",
                    message.timestamp.format("%Y-%m-%d %H:%M"),
                    message.role,
                    message.content
                );
            }
        }
    }
    Ok(())
}

async fn announcements(
    portal: &Portal,
    caller: Caller,
    json: bool,
    command: AnnouncementsCommand,
) -> anyhow::Result<()> {
    match command {
        AnnouncementsCommand::List => {
            let listed = portal.announcements_for(caller).await?;
            if json {
                return print_json(&listed);
            }
            for announcement in &listed {
                println!(
                    "- [{}] {}: {}",
                    announcement.kind, announcement.title, announcement.content
                );
            }
        }
        AnnouncementsCommand::Post {
            title,
            content,
            kind,
            branches,
            terms,
        } => {
            let id = portal
                .post_announcement(
                    caller,
                    NewAnnouncement {
                        title,
                        content,
                        kind,
                        target_branches: non_empty(branches),
                        target_terms: non_empty(terms),
                    },
                )
                .await?;
            println!("Announcement posted ({id}).");
        }
        AnnouncementsCommand::Deactivate { id } => {
            portal.deactivate_announcement(caller, id).await?;
            println!("Announcement deactivated.");
        }
    }
    Ok(())
}
