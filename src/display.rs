use crate::manager::{DailySummary, Stats};
use crate::models::{AttendanceRecord, Student};
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
struct RosterRow {
    roll_no: String,
    full_name: String,
    class_name: String,
    section: String,
}

/// Pretty prints the roster.
pub fn show_roster(roster: &[Student]) {
    let rows: Vec<RosterRow> = roster
        .iter()
        .map(|student| RosterRow {
            roll_no: student.roll_no.clone(),
            full_name: student.full_name.clone(),
            class_name: student.class_name.clone(),
            section: student.section.clone().unwrap_or_default(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("Roster:\n{table}");
}

#[derive(Tabled)]
struct SummaryRow {
    roll_no: String,
    full_name: String,
    status: &'static str,
}

/// Pretty prints the present/late/absent partition for one date.
pub fn show_summary(summary: &DailySummary) {
    let mut rows = Vec::new();
    for (list, label) in [
        (&summary.present, "Present"),
        (&summary.late, "Late"),
        (&summary.absent, "Absent"),
    ] {
        rows.extend(list.iter().map(|student| SummaryRow {
            roll_no: student.roll_no.clone(),
            full_name: student.full_name.clone(),
            status: label,
        }));
    }

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!(
        "Summary for {} (present {}, late {}, absent {}):\n{table}",
        summary.date,
        summary.present.len(),
        summary.late.len(),
        summary.absent.len()
    );
}

#[derive(Tabled)]
struct AttendanceRow {
    roll_no: String,
    status: String,
    captured_at: String,
    confidence: String,
}

/// Pretty prints the raw ledger entries for one date.
pub fn show_attendance(entries: &[AttendanceRecord]) {
    let rows: Vec<AttendanceRow> = entries
        .iter()
        .map(|entry| AttendanceRow {
            roll_no: entry.roll_no.clone(),
            status: entry.status.to_string(),
            captured_at: entry.captured_at.to_string(),
            confidence: entry.confidence.to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("Attendance:\n{table}");
}

/// Prints the aggregate counters.
pub fn show_stats(stats: &Stats) {
    #[derive(Tabled)]
    struct StatsRow {
        total_students: i64,
        total_records: i64,
        total_present: i64,
        total_absent: i64,
        attendance_rate: String,
    }

    let mut table = Table::new([StatsRow {
        total_students: stats.total_students,
        total_records: stats.total_records,
        total_present: stats.total_present,
        total_absent: stats.total_absent,
        attendance_rate: format!("{:.2}%", stats.attendance_rate),
    }]);
    table.with(Style::modern());
    println!("Stats:\n{table}");
}
