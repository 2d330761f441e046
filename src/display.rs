use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::schedule::{format_clock, DaySlots};

/// One line per slot: `HH:MM-HH:MM` plus the discount when there is one
pub fn format_slot_line(day: &DaySlots, index: usize) -> Option<String> {
    let slot = day.slots.get(index)?;
    let mut line = format!("{}-{}", format_clock(slot.start), format_clock(slot.end));
    if slot.discount_pct > 0 {
        line.push_str(&format!(" (-{}%)", slot.discount_pct));
    }
    Some(line)
}

fn day_header(day: &DaySlots) -> String {
    format!("** {} **", day.date.format("%A %d/%m/%Y"))
}

/// Writes the availability of every day to a file, closed days marked as such
pub fn write_availability_to_file<P: AsRef<Path>>(days: &[DaySlots], filename: P) -> std::io::Result<()> {
    let mut file = File::create(filename)?;

    for day in days {
        writeln!(file, "{}", day_header(day))?;
        if day.slots.is_empty() {
            writeln!(file, "[CLOSED]")?;
        }
        for index in 0..day.slots.len() {
            if let Some(line) = format_slot_line(day, index) {
                writeln!(file, "{}", line)?;
            }
        }
        writeln!(file)?;
    }

    Ok(())
}

/// Prints availability in a readable format
pub fn print_availability(duration_min: i64, days: &[DaySlots]) {
    let total: usize = days.iter().map(|d| d.slots.len()).sum();
    println!("\n=== Availability for a {} min repair ===", duration_min);
    println!("Total open slots: {}", total);

    for day in days {
        println!("\n{}", day_header(day));
        if day.slots.is_empty() {
            println!("  [CLOSED]");
            continue;
        }
        for index in 0..day.slots.len() {
            if let Some(line) = format_slot_line(day, index) {
                println!("  {}", line);
            }
        }
    }
}
