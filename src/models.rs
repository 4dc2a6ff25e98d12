use crate::schema::{attendance, descriptors, students};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Attendance classification for one (student, date) entry.
///
/// Only `Present` and `Late` are written by the recognition flow; `Absent`
/// is derived at report time for students with no stored entry, but may be
/// stored when it arrives through a sync batch or bulk mark.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow, Serialize, Deserialize,
)]
#[diesel(sql_type = Text)]
pub enum Status {
    Present,
    Late,
    Absent,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Present => "Present",
            Status::Late => "Late",
            Status::Absent => "Absent",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Present" => Ok(Status::Present),
            "Late" => Ok(Status::Late),
            "Absent" => Ok(Status::Absent),
            other => Err(format!("unknown attendance status {other:?}")),
        }
    }
}

impl ToSql<Text, Sqlite> for Status {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str().to_string());
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for Status {
    fn from_sql(bytes: <Sqlite as diesel::backend::Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        s.parse::<Status>().map_err(Into::into)
    }
}

/// How an attendance entry was produced: a recognition similarity score
/// (`1 - distance`, stored with two decimals), or the literal marker
/// `Manual` for teacher-entered entries.
#[derive(Debug, Clone, PartialEq, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = Text)]
#[serde(into = "String", try_from = "String")]
pub enum Confidence {
    Score(f32),
    Manual,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Score(score) => write!(f, "{score:.2}"),
            Confidence::Manual => f.write_str("Manual"),
        }
    }
}

impl From<Confidence> for String {
    fn from(value: Confidence) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Confidence {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "Manual" {
            return Ok(Confidence::Manual);
        }
        value
            .parse::<f32>()
            .map(Confidence::Score)
            .map_err(|_| format!("unknown confidence marker {value:?}"))
    }
}

impl ToSql<Text, Sqlite> for Confidence {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.to_string());
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for Confidence {
    fn from_sql(bytes: <Sqlite as diesel::backend::Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Confidence::try_from(s).map_err(Into::into)
    }
}

/// A student on the roster. The roll number is the natural key and is
/// immutable once registered.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(Sqlite))]
pub struct Student {
    pub roll_no: String,
    pub full_name: String,
    pub class_name: String,
    pub section: Option<String>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub parent_email: Option<String>,
    pub updated_at: NaiveDateTime,
}

/// Registration payload for a new student; `updated_at` is stamped by the
/// manager on insert.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub roll_no: String,
    pub full_name: String,
    pub class_name: String,
    pub section: Option<String>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub parent_email: Option<String>,
}

/// A stored reference face descriptor, JSON-encoded in the `vector` column.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = descriptors)]
#[diesel(check_for_backend(Sqlite))]
pub struct DescriptorRow {
    pub id: i32,
    pub roll_no: String,
    pub vector: String,
}

#[derive(Insertable)]
#[diesel(table_name = descriptors)]
pub struct NewDescriptor<'a> {
    pub roll_no: &'a str,
    pub vector: String,
}

/// One attendance entry per (student, calendar date); the composite primary
/// key enforces the per-day uniqueness invariant.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[diesel(table_name = attendance)]
#[diesel(check_for_backend(Sqlite))]
pub struct AttendanceRecord {
    pub roll_no: String,
    pub date: NaiveDate,
    pub status: Status,
    pub captured_at: NaiveDateTime,
    pub confidence: Confidence,
    pub class_name: String,
    pub updated_at: NaiveDateTime,
}

/// The session a teacher starts before a recognition run. Not persisted;
/// passed explicitly to every classification call so late/absent decisions
/// never depend on ambient state.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSession {
    pub class_name: String,
    pub date: NaiveDate,
    pub starts_at: NaiveTime,
    pub grace_minutes: u32,
}

impl ClassSession {
    /// Classifies a capture timestamp against the grace window. At or before
    /// `starts_at + grace_minutes` counts as on time; strictly after is late.
    pub fn classify(&self, captured_at: NaiveDateTime) -> Status {
        let deadline =
            self.date.and_time(self.starts_at) + Duration::minutes(i64::from(self.grace_minutes));
        if captured_at <= deadline {
            Status::Present
        } else {
            Status::Late
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ClassSession {
        ClassSession {
            class_name: "CS-A".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            starts_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            grace_minutes: 15,
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn mark_at_grace_boundary_is_present() {
        assert_eq!(session().classify(at(9, 15, 0)), Status::Present);
    }

    #[test]
    fn mark_one_second_past_grace_is_late() {
        assert_eq!(session().classify(at(9, 15, 1)), Status::Late);
    }

    #[test]
    fn mark_before_class_start_is_present() {
        assert_eq!(session().classify(at(8, 45, 0)), Status::Present);
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [Status::Present, Status::Late, Status::Absent] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("Unknown".parse::<Status>().is_err());
    }

    #[test]
    fn confidence_round_trips_through_text() {
        assert_eq!(
            Confidence::try_from("Manual".to_string()).unwrap(),
            Confidence::Manual
        );
        assert_eq!(
            Confidence::try_from("0.87".to_string()).unwrap(),
            Confidence::Score(0.87)
        );
        assert_eq!(Confidence::Score(0.876).to_string(), "0.88");
        assert!(Confidence::try_from("bogus".to_string()).is_err());
    }
}
