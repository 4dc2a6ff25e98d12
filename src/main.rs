use anyhow::{Context, anyhow, bail};
use chrono::{Local, NaiveTime};
use clap::Parser;
use std::fs;
use tracing_subscriber::EnvFilter;

use rollcall::cli::{Cli, Command, SessionArgs};
use rollcall::descriptor::Descriptor;
use rollcall::manager::BulkRecord;
use rollcall::models::{ClassSession, Confidence, NewStudent, Status};
use rollcall::notify::Notification;
use rollcall::sync::SyncRequest;
use rollcall::{Settings, display, export, notify, sync};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = rollcall::load_settings()?;
    let mut manager = rollcall::create_default_manager()?;

    match cli.command {
        Command::RegisterStudent {
            roll_no,
            full_name,
            class_name,
            section,
            parent_name,
            parent_phone,
            parent_email,
        } => {
            let student = manager.register_student(NewStudent {
                roll_no,
                full_name,
                class_name,
                section,
                parent_name,
                parent_phone,
                parent_email,
            })?;
            println!("Registered {} ({})", student.full_name, student.roll_no);
        }

        Command::Enroll {
            roll_no,
            descriptor_file,
        } => {
            let raw = fs::read_to_string(&descriptor_file)
                .with_context(|| format!("reading {}", descriptor_file.display()))?;
            let vectors: Vec<Vec<f32>> = serde_json::from_str(&raw)
                .or_else(|_| serde_json::from_str::<Vec<f32>>(&raw).map(|v| vec![v]))
                .context("descriptor file must hold a vector or an array of vectors")?;

            let count = vectors.len();
            for values in vectors {
                manager.add_descriptor(&roll_no, values, settings.matcher.dimension)?;
            }
            println!("Enrolled {count} descriptor(s) for {roll_no}");
        }

        Command::RemoveStudent { roll_no } => {
            let removed = manager.remove_student(&roll_no)?;
            println!("Removed {} ({})", removed.full_name, removed.roll_no);
        }

        Command::Roster => display::show_roster(&manager.roster()?),

        Command::Recognize {
            probe_file,
            session,
        } => {
            let session = resolve_session(&session, &settings)?;
            let raw = fs::read_to_string(&probe_file)
                .with_context(|| format!("reading {}", probe_file.display()))?;
            let values: Vec<f32> = serde_json::from_str(&raw)?;
            let probe = Descriptor::new(values, settings.matcher.dimension)?;

            match manager.recognize(&probe, settings.matcher.threshold)? {
                Some(m) => {
                    let outcome = manager.mark_present(
                        &m.roll_no,
                        &session,
                        Local::now().naive_local(),
                        Confidence::Score(m.confidence),
                    )?;
                    println!(
                        "Matched {} ({}) with confidence {:.2}: {outcome:?}",
                        m.full_name, m.roll_no, m.confidence
                    );
                }
                None => println!("No match within threshold {}", settings.matcher.threshold),
            }
        }

        Command::Mark { roll_no, session } => {
            let session = resolve_session(&session, &settings)?;
            let outcome = manager.mark_present(
                &roll_no,
                &session,
                Local::now().naive_local(),
                Confidence::Manual,
            )?;
            println!("{roll_no}: {outcome:?}");
        }

        Command::OverridePresent { roll_no, session } => {
            let session = resolve_session(&session, &settings)?;
            manager.override_present(&roll_no, &session)?;
            println!("{roll_no}: overridden to Present");
        }

        Command::ClearMark { roll_no, date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let cleared = manager.clear_mark(&roll_no, date)?;
            println!("Cleared {cleared} entry(ies) for {roll_no} on {date}");
        }

        Command::BulkMark { file, session } => {
            let session = resolve_session(&session, &settings)?;
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let records: Vec<BulkRecord> = serde_json::from_str(&raw)?;

            let outcome = manager.bulk_mark(&records, &session)?;
            println!("Attendance saved: {}", outcome.saved);
            for skipped in &outcome.skipped {
                println!("  skipped {}: {}", skipped.roll_no, skipped.reason);
            }
        }

        Command::Summary { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            display::show_summary(&manager.generate_summary(date)?);
        }

        Command::Attendance { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            display::show_attendance(&manager.attendance_on(date)?);
        }

        Command::Stats => display::show_stats(&manager.compute_stats()?),

        Command::ExportCsv { output } => {
            let rows = manager.export_rows()?;
            let file = fs::File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            export::write_csv(&rows, file)?;
            println!("Exported {} row(s) to {}", rows.len(), output.display());
        }

        Command::Notify { status, date } => {
            let status: Status = status
                .parse()
                .map_err(|reason: String| anyhow!(reason))?;
            if status == Status::Present {
                bail!("notifications are for Absent or Late students");
            }

            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let summary = manager.generate_summary(date)?;
            let list = match status {
                Status::Late => &summary.late,
                _ => &summary.absent,
            };

            let mut batch = Vec::new();
            for student in list {
                match &student.parent_email {
                    Some(contact) => batch.push(Notification {
                        student_name: student.full_name.clone(),
                        roll_no: student.roll_no.clone(),
                        contact: contact.clone(),
                        status,
                        class_name: student.class_name.clone(),
                        date,
                    }),
                    None => println!("  no parent email on file for {}", student.roll_no),
                }
            }

            if batch.is_empty() {
                println!("Nobody to notify for {date}");
                return Ok(());
            }

            dotenvy::dotenv().ok();
            let password =
                std::env::var("SMTP_PASSWORD").context("SMTP_PASSWORD must be set")?;
            let outcomes = notify::send_notifications(&settings.smtp, &password, &batch);
            let sent = outcomes.iter().filter(|o| o.succeeded()).count();
            println!("Notifications sent: {sent}/{}", outcomes.len());
            for outcome in outcomes.iter().filter(|o| !o.succeeded()) {
                println!(
                    "  failed {}: {}",
                    outcome.roll_no,
                    outcome.error.as_deref().unwrap_or("unknown")
                );
            }
        }

        Command::Sync { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let request: SyncRequest = serde_json::from_str(&raw)?;
            let report = sync::sync(&mut manager, request)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Builds the session for a marking command, falling back to the
/// configured defaults.
fn resolve_session(args: &SessionArgs, settings: &Settings) -> anyhow::Result<ClassSession> {
    let start = args
        .start_time
        .as_deref()
        .unwrap_or(&settings.session.default_start_time);

    Ok(ClassSession {
        class_name: args
            .class_name
            .clone()
            .unwrap_or_else(|| settings.session.default_class.clone()),
        date: args.date.unwrap_or_else(|| Local::now().date_naive()),
        starts_at: parse_start_time(start)?,
        grace_minutes: args
            .grace_minutes
            .unwrap_or(settings.session.default_grace_minutes),
    })
}

fn parse_start_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| anyhow!("invalid start time {s:?}, expected HH:MM or HH:MM:SS"))
}
