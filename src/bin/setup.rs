//! Creates the sqlite schema and optionally imports a roster CSV.
//!
//! The CSV columns match [`NewStudent`]: roll_no, full_name, class_name,
//! section, parent_name, parent_phone, parent_email. Rows whose roll
//! number is already registered are skipped.

use rollcall::error::RollcallError;
use rollcall::models::NewStudent;

pub fn main() -> anyhow::Result<()> {
    let mut manager = rollcall::create_default_manager()?;
    manager.initialize_schema()?;
    println!("Schema ready");

    let Some(roster_path) = std::env::args().nth(1) else {
        return Ok(());
    };

    let mut reader = csv::Reader::from_path(&roster_path)?;
    let mut imported = 0;
    for row in reader.deserialize() {
        let new: NewStudent = row?;
        let roll_no = new.roll_no.clone();
        match manager.register_student(new) {
            Ok(_) => imported += 1,
            Err(RollcallError::Conflict(_)) => {
                println!("Skipping {roll_no}: already registered");
            }
            Err(err) => return Err(err.into()),
        }
    }
    println!("Imported {imported} student(s) from {roster_path}");

    Ok(())
}
