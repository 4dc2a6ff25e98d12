//! CSV export of flattened attendance rows.

use crate::error::Result;
use crate::models::Status;
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;

/// One flattened attendance row, the shape the export collaborators
/// consume. Column order is the serialized field order.
#[derive(Debug, Clone, Serialize)]
pub struct ExportRow {
    pub date: NaiveDate,
    pub student_name: String,
    pub roll_no: String,
    pub class_name: String,
    pub status: Status,
}

/// Writes a header line plus one line per row.
pub fn write_csv<W: Write>(rows: &[ExportRow], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_has_header_and_one_line_per_row() {
        let rows = vec![
            ExportRow {
                date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                student_name: "Asha Rao".to_string(),
                roll_no: "CS101".to_string(),
                class_name: "CS-A".to_string(),
                status: Status::Present,
            },
            ExportRow {
                date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                student_name: "Vikram Iyer".to_string(),
                roll_no: "CS102".to_string(),
                class_name: "CS-A".to_string(),
                status: Status::Late,
            },
        ];

        let mut buffer = Vec::new();
        write_csv(&rows, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let lines: Vec<&str> = text.trim_end().lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "date,student_name,roll_no,class_name,status");
        assert_eq!(lines[1], "2026-03-02,Asha Rao,CS101,CS-A,Present");
        assert!(lines[2].ends_with("Late"));
    }

    #[test]
    fn empty_export_is_just_flushed() {
        let mut buffer = Vec::new();
        write_csv(&[], &mut buffer).unwrap();
        assert!(buffer.is_empty());
    }
}
