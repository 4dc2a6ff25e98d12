//! Reconciliation of offline-queued mutations with the server-side store.
//!
//! The merge is last-writer-wins keyed by natural identifiers: roll number
//! for students, (roll number, date) for attendance. There is no conflict
//! detection; the last batch to arrive overwrites. Each change is applied
//! independently and failures are reported per item, never as an
//! all-or-nothing transaction.

use crate::error::Result;
use crate::manager::AttendanceManager;
use crate::models::{AttendanceRecord, Student};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One queued mutation, tagged with its target collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "collection", content = "record", rename_all = "snake_case")]
pub enum Change {
    Students(Student),
    Attendance(AttendanceRecord),
}

impl Change {
    /// The natural key the upsert merges on.
    pub fn key(&self) -> String {
        match self {
            Change::Students(student) => student.roll_no.clone(),
            Change::Attendance(record) => format!("{}/{}", record.roll_no, record.date),
        }
    }
}

/// A client's sync call: its queued changes plus the marker returned by the
/// previous call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub last_sync: NaiveDateTime,
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedChange {
    pub key: String,
    pub reason: String,
}

/// Outcome of one sync call: per-item results, the remote changes the
/// client has not seen, and the new marker to hand back next time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub applied: usize,
    pub skipped: Vec<SkippedChange>,
    pub remote_changes: Vec<Change>,
    pub marker: NaiveDateTime,
}

/// Applies a batch of local changes and collects everything that changed
/// server-side since the client's last marker.
///
/// Student changes always upsert. An attendance change referencing a roll
/// number unknown server-side is skipped and logged, not fatal to the batch.
pub fn sync(manager: &mut AttendanceManager, request: SyncRequest) -> Result<SyncReport> {
    let marker = Utc::now().naive_utc();
    let mut applied = 0;
    let mut skipped = Vec::new();

    for change in request.changes {
        let key = change.key();
        let result = match change {
            Change::Students(student) => manager.upsert_student(student),
            Change::Attendance(record) => manager.upsert_attendance(record),
        };
        match result {
            Ok(()) => applied += 1,
            Err(err) => {
                tracing::warn!(%key, error = %err, "skipping sync change");
                skipped.push(SkippedChange {
                    key,
                    reason: err.to_string(),
                });
            }
        }
    }

    let mut remote_changes: Vec<Change> = manager
        .students_updated_since(request.last_sync)?
        .into_iter()
        .map(Change::Students)
        .collect();
    remote_changes.extend(
        manager
            .attendance_updated_since(request.last_sync)?
            .into_iter()
            .map(Change::Attendance),
    );

    tracing::info!(applied, skipped = skipped.len(), pushed = remote_changes.len(), "sync batch merged");

    Ok(SyncReport {
        applied,
        skipped,
        remote_changes,
        marker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{sample_student, test_manager};
    use crate::models::{Confidence, Status};
    use chrono::{Duration, NaiveDate};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn long_ago() -> NaiveDateTime {
        date().and_hms_opt(0, 0, 0).unwrap()
    }

    fn student_change(roll: &str, name: &str) -> Change {
        let new = sample_student(roll);
        Change::Students(Student {
            roll_no: new.roll_no,
            full_name: name.to_string(),
            class_name: new.class_name,
            section: new.section,
            parent_name: new.parent_name,
            parent_phone: new.parent_phone,
            parent_email: new.parent_email,
            updated_at: long_ago(),
        })
    }

    fn attendance_change(roll: &str) -> Change {
        Change::Attendance(AttendanceRecord {
            roll_no: roll.to_string(),
            date: date(),
            status: Status::Present,
            captured_at: date().and_hms_opt(9, 1, 0).unwrap(),
            confidence: Confidence::Score(0.9),
            class_name: "CS-A".to_string(),
            updated_at: long_ago(),
        })
    }

    #[test]
    fn upsert_inserts_then_overwrites_by_natural_key() {
        let mut manager = test_manager();

        let report = sync(
            &mut manager,
            SyncRequest {
                last_sync: long_ago(),
                changes: vec![student_change("CS101", "First Name")],
            },
        )
        .unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(manager.get_student("CS101").unwrap().full_name, "First Name");

        // Same natural key again: last writer wins, no second row.
        let report = sync(
            &mut manager,
            SyncRequest {
                last_sync: long_ago(),
                changes: vec![student_change("CS101", "Second Name")],
            },
        )
        .unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(manager.num_students().unwrap(), 1);
        assert_eq!(manager.get_student("CS101").unwrap().full_name, "Second Name");
    }

    #[test]
    fn unknown_student_skips_one_item_not_the_batch() {
        let mut manager = test_manager();
        manager.register_student(sample_student("CS101")).unwrap();

        let report = sync(
            &mut manager,
            SyncRequest {
                last_sync: long_ago(),
                changes: vec![attendance_change("NOPE"), attendance_change("CS101")],
            },
        )
        .unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].key, format!("NOPE/{}", date()));
        assert_eq!(manager.attendance_on(date()).unwrap().len(), 1);
    }

    #[test]
    fn remote_changes_are_those_after_the_marker() {
        let mut manager = test_manager();
        manager.register_student(sample_student("CS101")).unwrap();

        // A marker taken before the registration sees it; one taken after
        // does not.
        let report = sync(
            &mut manager,
            SyncRequest {
                last_sync: long_ago(),
                changes: vec![],
            },
        )
        .unwrap();
        assert_eq!(report.remote_changes.len(), 1);

        let report = sync(
            &mut manager,
            SyncRequest {
                last_sync: Utc::now().naive_utc() + Duration::hours(1),
                changes: vec![],
            },
        )
        .unwrap();
        assert!(report.remote_changes.is_empty());
    }

    #[test]
    fn marker_is_the_calls_own_timestamp() {
        let mut manager = test_manager();
        let before = Utc::now().naive_utc();

        let report = sync(
            &mut manager,
            SyncRequest {
                last_sync: long_ago(),
                changes: vec![],
            },
        )
        .unwrap();

        assert!(report.marker >= before);
        assert!(report.marker <= Utc::now().naive_utc());
    }

    #[test]
    fn change_round_trips_through_tagged_json() {
        let change = attendance_change("CS101");
        let json = serde_json::to_string(&change).unwrap();
        assert!(json.contains("\"collection\":\"attendance\""));
        let back: Change = serde_json::from_str(&json).unwrap();
        assert_eq!(back, change);
    }
}
