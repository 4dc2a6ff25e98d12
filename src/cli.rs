//! Command-line interface for the attendance tracker.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rollcall", about = "Face-recognition attendance tracker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Session parameters shared by the marking commands. Anything omitted
/// falls back to the defaults in `config.toml`.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Class the session belongs to.
    #[arg(long)]
    pub class_name: Option<String>,

    /// Scheduled start time, HH:MM or HH:MM:SS.
    #[arg(long)]
    pub start_time: Option<String>,

    /// Minutes after the start during which a mark still counts as on time.
    #[arg(long)]
    pub grace_minutes: Option<u32>,

    /// Session date (defaults to today).
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register a new student on the roster.
    RegisterStudent {
        roll_no: String,
        full_name: String,
        class_name: String,
        #[arg(long)]
        section: Option<String>,
        #[arg(long)]
        parent_name: Option<String>,
        #[arg(long)]
        parent_phone: Option<String>,
        #[arg(long)]
        parent_email: Option<String>,
    },

    /// Append reference descriptors for a student from a JSON file
    /// (one vector or an array of vectors).
    Enroll {
        roll_no: String,
        descriptor_file: PathBuf,
    },

    /// Remove a student; descriptors and attendance history go with them.
    RemoveStudent { roll_no: String },

    /// Display the roster.
    Roster,

    /// Match a probe descriptor from a JSON file against the enrolled
    /// gallery and mark the recognized student.
    Recognize {
        probe_file: PathBuf,
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Mark a single student present (or late, per the grace window).
    Mark {
        roll_no: String,
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Teacher override: force a Present entry with the Manual marker.
    OverridePresent {
        roll_no: String,
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Teacher override: delete a student's entry for a date.
    ClearMark {
        roll_no: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Mark multiple students from a JSON file of records.
    BulkMark {
        file: PathBuf,
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Show the present/late/absent partition for a date.
    Summary {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show the raw ledger entries for a date.
    Attendance {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show aggregate attendance statistics.
    Stats,

    /// Export the full ledger as CSV.
    ExportCsv { output: PathBuf },

    /// Email parents of absent (or late) students for a date.
    Notify {
        /// Which list of the summary to notify: Absent or Late.
        #[arg(long, default_value = "Absent")]
        status: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Merge an offline client's queued changes from a JSON request file
    /// and print the sync report.
    Sync { file: PathBuf },
}
