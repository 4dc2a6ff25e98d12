use crate::descriptor::Descriptor;
use crate::error::{Result, RollcallError};
use crate::matcher::{self, GalleryEntry, Match};
use crate::models::{
    AttendanceRecord, ClassSession, Confidence, DescriptorRow, NewDescriptor, NewStudent, Status,
    Student,
};
use crate::schema;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Schema applied by `bin/setup` and the test fixtures. The composite
/// primary key on `attendance` is what makes per-(student, date) marking
/// atomic: a second insert for the same key is ignored, never duplicated.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS students (
    roll_no TEXT NOT NULL PRIMARY KEY,
    full_name TEXT NOT NULL,
    class_name TEXT NOT NULL,
    section TEXT,
    parent_name TEXT,
    parent_phone TEXT,
    parent_email TEXT,
    updated_at TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS descriptors (
    id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    roll_no TEXT NOT NULL REFERENCES students (roll_no),
    vector TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS attendance (
    roll_no TEXT NOT NULL REFERENCES students (roll_no),
    date DATE NOT NULL,
    status TEXT NOT NULL,
    captured_at TIMESTAMP NOT NULL,
    confidence TEXT NOT NULL,
    class_name TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL,
    PRIMARY KEY (roll_no, date)
);
";

/// Result of a single mark attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// A new entry was written with the given classification.
    Recorded(Status),
    /// An entry for this (student, date) already existed; nothing changed.
    AlreadyMarked,
}

/// One row of a bulk-mark request. The status arrives as text so that a
/// single malformed row is skipped rather than failing the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkRecord {
    pub roll_no: String,
    pub status: String,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub roll_no: String,
    pub reason: String,
}

/// Per-batch result: how many rows were written, and why the rest were not.
#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub saved: usize,
    pub skipped: Vec<SkippedRecord>,
}

/// The three disjoint lists covering the full roster for one date.
#[derive(Debug, Clone)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub present: Vec<Student>,
    pub late: Vec<Student>,
    pub absent: Vec<Student>,
}

/// Aggregate counters over the whole ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total_students: i64,
    pub total_records: i64,
    pub total_present: i64,
    pub total_absent: i64,
    /// `total_present / total_records * 100`, two decimals; 0.0 when the
    /// ledger is empty.
    pub attendance_rate: f64,
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// The manager for the enrollment store and the attendance ledger.
pub struct AttendanceManager {
    db: SqliteConnection,
}

impl AttendanceManager {
    /// Connects to the sqlite database at the given URL.
    pub fn connect(database_url: &str) -> Result<Self> {
        let db = SqliteConnection::establish(database_url)?;
        Ok(Self { db })
    }

    /// Connects using the `DATABASE_URL` environment variable, loading
    /// `.env` first.
    pub fn connect_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| RollcallError::Validation("DATABASE_URL must be set".to_string()))?;
        Self::connect(&database_url)
    }

    /// Creates the tables if they do not exist yet.
    pub fn initialize_schema(&mut self) -> Result<()> {
        self.db.batch_execute(SCHEMA_SQL)?;
        Ok(())
    }

    // --- Enrollment store ---

    /// Registers a new student. Roll number, full name, and class name are
    /// required; a roll number that is already taken is a conflict.
    pub fn register_student(&mut self, new: NewStudent) -> Result<Student> {
        for (field, value) in [
            ("roll_no", &new.roll_no),
            ("full_name", &new.full_name),
            ("class_name", &new.class_name),
        ] {
            if value.trim().is_empty() {
                return Err(RollcallError::Validation(format!("{field} is required")));
            }
        }

        use schema::students::dsl::*;

        let existing: i64 = students
            .filter(roll_no.eq(&new.roll_no))
            .count()
            .get_result(&mut self.db)?;
        if existing > 0 {
            return Err(RollcallError::Conflict(format!(
                "roll number {} exists",
                new.roll_no
            )));
        }

        let student = Student {
            roll_no: new.roll_no,
            full_name: new.full_name,
            class_name: new.class_name,
            section: new.section,
            parent_name: new.parent_name,
            parent_phone: new.parent_phone,
            parent_email: new.parent_email,
            updated_at: now(),
        };

        diesel::insert_into(students)
            .values(&student)
            .execute(&mut self.db)?;

        Ok(student)
    }

    /// Retrieves a student by roll number.
    pub fn get_student(&mut self, student_roll: &str) -> Result<Student> {
        use schema::students::dsl::*;

        students
            .filter(roll_no.eq(student_roll))
            .select(Student::as_select())
            .first(&mut self.db)
            .optional()?
            .ok_or_else(|| RollcallError::NotFound {
                entity: "student",
                key: student_roll.to_string(),
            })
    }

    /// Retrieves the full roster, ordered by roll number.
    pub fn roster(&mut self) -> Result<Vec<Student>> {
        use schema::students::dsl::*;

        Ok(students
            .select(Student::as_select())
            .order(roll_no.asc())
            .load(&mut self.db)?)
    }

    /// Returns the total number of students on the roster.
    pub fn num_students(&mut self) -> Result<i64> {
        use schema::students::dsl::*;

        Ok(students.count().get_result(&mut self.db)?)
    }

    /// Removes a student and returns the deleted record.
    ///
    /// Removal cascades: the student's descriptors and attendance history
    /// are deleted in the same call, so no dangling roll numbers remain.
    pub fn remove_student(&mut self, student_roll: &str) -> Result<Student> {
        diesel::delete(
            schema::attendance::table.filter(schema::attendance::roll_no.eq(student_roll)),
        )
        .execute(&mut self.db)?;
        diesel::delete(
            schema::descriptors::table.filter(schema::descriptors::roll_no.eq(student_roll)),
        )
        .execute(&mut self.db)?;

        let mut deleted =
            diesel::delete(schema::students::table.filter(schema::students::roll_no.eq(student_roll)))
                .returning(Student::as_returning())
                .get_results(&mut self.db)?;

        deleted.pop().ok_or_else(|| RollcallError::NotFound {
            entity: "student",
            key: student_roll.to_string(),
        })
    }

    /// Appends a reference descriptor to a student's enrollment set. The
    /// vector must match the configured embedding dimensionality.
    pub fn add_descriptor(
        &mut self,
        student_roll: &str,
        values: Vec<f32>,
        expected_dim: usize,
    ) -> Result<()> {
        self.get_student(student_roll)?;
        let descriptor = Descriptor::new(values, expected_dim)?;

        let row = NewDescriptor {
            roll_no: student_roll,
            vector: serde_json::to_string(&descriptor)?,
        };
        diesel::insert_into(schema::descriptors::table)
            .values(&row)
            .execute(&mut self.db)?;

        Ok(())
    }

    /// Loads every student that has at least one descriptor, with all of
    /// their descriptors, ordered by roll number.
    pub fn enrolled_gallery(&mut self) -> Result<Vec<GalleryEntry>> {
        let rows: Vec<(DescriptorRow, Student)> = schema::descriptors::table
            .inner_join(schema::students::table)
            .select((DescriptorRow::as_select(), Student::as_select()))
            .order(schema::descriptors::roll_no.asc())
            .load(&mut self.db)?;

        let mut gallery: Vec<GalleryEntry> = Vec::new();
        for (row, student) in rows {
            let descriptor: Descriptor = serde_json::from_str(&row.vector)?;
            match gallery.last_mut() {
                Some(entry) if entry.roll_no == row.roll_no => {
                    entry.descriptors.push(descriptor)
                }
                _ => gallery.push(GalleryEntry {
                    roll_no: row.roll_no,
                    full_name: student.full_name,
                    descriptors: vec![descriptor],
                }),
            }
        }

        Ok(gallery)
    }

    /// Matches a probe descriptor against the enrolled gallery.
    pub fn recognize(&mut self, probe: &Descriptor, threshold: f32) -> Result<Option<Match>> {
        let gallery = self.enrolled_gallery()?;
        Ok(matcher::find_best_match(probe, &gallery, threshold))
    }

    // --- Attendance ledger ---

    /// Marks a student for the session's date, classifying Present or Late
    /// against the grace window. Re-marking an already-marked (student,
    /// date) is a silent no-op so the recognition loop can fire repeatedly.
    pub fn mark_present(
        &mut self,
        student_roll: &str,
        session: &ClassSession,
        captured_at: NaiveDateTime,
        confidence: Confidence,
    ) -> Result<MarkOutcome> {
        self.get_student(student_roll)?;

        let status = session.classify(captured_at);
        let record = AttendanceRecord {
            roll_no: student_roll.to_string(),
            date: session.date,
            status,
            captured_at,
            confidence,
            class_name: session.class_name.clone(),
            updated_at: now(),
        };

        let inserted = diesel::insert_or_ignore_into(schema::attendance::table)
            .values(&record)
            .execute(&mut self.db)?;

        Ok(if inserted == 0 {
            MarkOutcome::AlreadyMarked
        } else {
            MarkOutcome::Recorded(status)
        })
    }

    /// Applies a batch of teacher-supplied records independently. Unknown
    /// roll numbers, malformed statuses, and already-marked days are
    /// skipped; one bad row never aborts its siblings.
    pub fn bulk_mark(&mut self, records: &[BulkRecord], session: &ClassSession) -> Result<BulkOutcome> {
        let mut outcome = BulkOutcome {
            saved: 0,
            skipped: Vec::new(),
        };

        for record in records {
            let status = match record.status.parse::<Status>() {
                Ok(status) => status,
                Err(reason) => {
                    tracing::warn!(roll_no = %record.roll_no, %reason, "skipping bulk record");
                    outcome.skipped.push(SkippedRecord {
                        roll_no: record.roll_no.clone(),
                        reason,
                    });
                    continue;
                }
            };

            if self.get_student(&record.roll_no).is_err() {
                tracing::warn!(roll_no = %record.roll_no, "skipping bulk record for unknown student");
                outcome.skipped.push(SkippedRecord {
                    roll_no: record.roll_no.clone(),
                    reason: "student not found".to_string(),
                });
                continue;
            }

            let stamp = now();
            let entry = AttendanceRecord {
                roll_no: record.roll_no.clone(),
                date: record.date.unwrap_or(session.date),
                status,
                captured_at: stamp,
                confidence: Confidence::Manual,
                class_name: session.class_name.clone(),
                updated_at: stamp,
            };

            let inserted = diesel::insert_or_ignore_into(schema::attendance::table)
                .values(&entry)
                .execute(&mut self.db)?;
            if inserted == 0 {
                outcome.skipped.push(SkippedRecord {
                    roll_no: record.roll_no.clone(),
                    reason: format!("already marked for {}", entry.date),
                });
            } else {
                outcome.saved += 1;
            }
        }

        Ok(outcome)
    }

    /// Teacher override: force a Present entry with the `Manual` confidence
    /// marker, replacing whatever the recognition flow recorded.
    pub fn override_present(&mut self, student_roll: &str, session: &ClassSession) -> Result<()> {
        self.get_student(student_roll)?;

        let stamp = now();
        let record = AttendanceRecord {
            roll_no: student_roll.to_string(),
            date: session.date,
            status: Status::Present,
            captured_at: stamp,
            confidence: Confidence::Manual,
            class_name: session.class_name.clone(),
            updated_at: stamp,
        };

        diesel::replace_into(schema::attendance::table)
            .values(&record)
            .execute(&mut self.db)?;

        Ok(())
    }

    /// Teacher override in the other direction: deletes the entry for the
    /// given (student, date), reverting the student to derived-Absent.
    /// Returns the number of entries removed (0 or 1).
    pub fn clear_mark(&mut self, student_roll: &str, on: NaiveDate) -> Result<usize> {
        use schema::attendance::dsl::*;

        Ok(diesel::delete(attendance.filter(roll_no.eq(student_roll).and(date.eq(on))))
            .execute(&mut self.db)?)
    }

    /// Retrieves all attendance entries for a date, ordered by roll number.
    pub fn attendance_on(&mut self, on: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        use schema::attendance::dsl::*;

        Ok(attendance
            .select(AttendanceRecord::as_select())
            .filter(date.eq(on))
            .order(roll_no.asc())
            .load(&mut self.db)?)
    }

    /// Partitions the full roster for one date into present, late, and
    /// absent. Every student appears in exactly one list; Absent is derived
    /// for students with no stored entry.
    pub fn generate_summary(&mut self, on: NaiveDate) -> Result<DailySummary> {
        let roster = self.roster()?;
        let statuses: HashMap<String, Status> = self
            .attendance_on(on)?
            .into_iter()
            .map(|record| (record.roll_no, record.status))
            .collect();

        let mut summary = DailySummary {
            date: on,
            present: Vec::new(),
            late: Vec::new(),
            absent: Vec::new(),
        };

        for student in roster {
            match statuses.get(&student.roll_no) {
                Some(Status::Present) => summary.present.push(student),
                Some(Status::Late) => summary.late.push(student),
                Some(Status::Absent) | None => summary.absent.push(student),
            }
        }

        Ok(summary)
    }

    /// Aggregate counters over the whole ledger. Present and Late entries
    /// both count as attendance for the rate.
    pub fn compute_stats(&mut self) -> Result<Stats> {
        use schema::attendance::dsl::*;

        let total_students = self.num_students()?;
        let total_records: i64 = attendance.count().get_result(&mut self.db)?;
        let total_present: i64 = attendance
            .filter(status.eq(Status::Present).or(status.eq(Status::Late)))
            .count()
            .get_result(&mut self.db)?;
        let total_absent: i64 = attendance
            .filter(status.eq(Status::Absent))
            .count()
            .get_result(&mut self.db)?;

        let attendance_rate = if total_records == 0 {
            0.0
        } else {
            (total_present as f64 / total_records as f64 * 10_000.0).round() / 100.0
        };

        Ok(Stats {
            total_students,
            total_records,
            total_present,
            total_absent,
            attendance_rate,
        })
    }

    /// Flattens the whole ledger into export rows, newest date first, for
    /// the CSV collaborator.
    pub fn export_rows(&mut self) -> Result<Vec<crate::export::ExportRow>> {
        let rows: Vec<(NaiveDate, String, String, String, Status)> = schema::attendance::table
            .inner_join(schema::students::table)
            .select((
                schema::attendance::date,
                schema::students::full_name,
                schema::attendance::roll_no,
                schema::attendance::class_name,
                schema::attendance::status,
            ))
            .order((schema::attendance::date.desc(), schema::attendance::roll_no.asc()))
            .load(&mut self.db)?;

        Ok(rows
            .into_iter()
            .map(|(date, student_name, roll_no, class_name, status)| crate::export::ExportRow {
                date,
                student_name,
                roll_no,
                class_name,
                status,
            })
            .collect())
    }

    // --- Sync support (last-writer-wins upserts by natural key) ---

    /// Upserts a student row, stamping the server-side `updated_at`.
    pub fn upsert_student(&mut self, mut student: Student) -> Result<()> {
        student.updated_at = now();
        diesel::replace_into(schema::students::table)
            .values(&student)
            .execute(&mut self.db)?;
        Ok(())
    }

    /// Upserts an attendance row, stamping the server-side `updated_at`.
    /// The referenced student must already exist.
    pub fn upsert_attendance(&mut self, mut record: AttendanceRecord) -> Result<()> {
        self.get_student(&record.roll_no)?;
        record.updated_at = now();
        diesel::replace_into(schema::attendance::table)
            .values(&record)
            .execute(&mut self.db)?;
        Ok(())
    }

    /// Students whose server-side timestamp is strictly after the marker.
    pub fn students_updated_since(&mut self, marker: NaiveDateTime) -> Result<Vec<Student>> {
        use schema::students::dsl::*;

        Ok(students
            .select(Student::as_select())
            .filter(updated_at.gt(marker))
            .order(roll_no.asc())
            .load(&mut self.db)?)
    }

    /// Attendance entries whose server-side timestamp is strictly after the
    /// marker.
    pub fn attendance_updated_since(
        &mut self,
        marker: NaiveDateTime,
    ) -> Result<Vec<AttendanceRecord>> {
        use schema::attendance::dsl::*;

        Ok(attendance
            .select(AttendanceRecord::as_select())
            .filter(updated_at.gt(marker))
            .order((roll_no.asc(), date.asc()))
            .load(&mut self.db)?)
    }
}

#[cfg(test)]
pub(crate) fn test_manager() -> AttendanceManager {
    let mut manager = AttendanceManager::connect(":memory:").unwrap();
    manager.initialize_schema().unwrap();
    manager
}

#[cfg(test)]
pub(crate) fn sample_student(roll: &str) -> NewStudent {
    NewStudent {
        roll_no: roll.to_string(),
        full_name: format!("Student {roll}"),
        class_name: "CS-A".to_string(),
        section: Some("A".to_string()),
        parent_name: Some("Parent".to_string()),
        parent_phone: Some("+919876543210".to_string()),
        parent_email: None,
    }
}
