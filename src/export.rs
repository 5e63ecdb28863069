//! Flattening of the entry collection into CSV, either as a human-readable
//! export or as rows ready to paste into the remote spreadsheet.

use time::{Date, OffsetDateTime};

use crate::codec::{self, HEADERS, NO, YES};
use crate::entry::FoodEntry;
use crate::reference::{complaint_name, meal_label, severity_level};

pub const EXPORT_HEADERS: [&str; 10] = [
    "Dátum",
    "Időpont",
    "Étkezés Típusa",
    "Ételek",
    "Étkezési Megjegyzések",
    "Van Panasz",
    "Panasz Típusok",
    "Panasz Súlyosság",
    "Panasz Megjegyzések",
    "Idő az Étkezés Után",
];

const UNKNOWN_SEVERITY: &str = "Ismeretlen";

/// Renders the entries as a CSV document, one line per entry below a header line.
pub fn to_csv(entries: &[FoodEntry]) -> String {
    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(EXPORT_HEADERS.join(","));

    for entry in entries {
        lines.push(export_line(entry));
    }

    lines.join("\n")
}

/// e.g. `etkezesi-naplo-2024-01-15.csv`
pub fn export_filename(date: Date) -> String {
    format!("etkezesi-naplo-{}.csv", date)
}

fn export_line(entry: &FoodEntry) -> String {
    let names = entry
        .complaint_types
        .iter()
        .map(|id| complaint_name(id))
        .collect::<Vec<_>>()
        .join("; ");

    let severities = entry
        .complaint_types
        .iter()
        .map(|id| format!("{}: {}", complaint_name(id), severity_text(entry.severity_of(id))))
        .collect::<Vec<_>>()
        .join("; ");

    let fields = [
        entry.date.clone(),
        entry.time.clone(),
        meal_label(entry.meal_type).to_owned(),
        quote(&entry.foods),
        quote(&entry.meal_notes),
        if entry.has_complaints { YES } else { NO }.to_owned(),
        quote(&names),
        quote(&severities),
        quote(&entry.complaint_notes),
        quote(&entry.time_after_meal),
    ];

    fields.join(",")
}

fn severity_text(severity: Option<u8>) -> String {
    match severity {
        Some(value) => severity_level(value)
            .map(|level| level.label.to_owned())
            .unwrap_or_else(|| value.to_string()),
        None => UNKNOWN_SEVERITY.to_owned(),
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// The header row plus one remote-store row per entry.
pub fn sheet_rows(entries: &[FoodEntry], now: OffsetDateTime) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(entries.len() + 1);
    rows.push(HEADERS.iter().map(|h| (*h).to_owned()).collect());

    for entry in entries {
        rows.push(codec::encode(entry, now));
    }

    rows
}

/// Renders rows as CSV, quoting only the cells that need it.
pub fn rows_to_csv(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|cell| {
                    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
                        quote(cell)
                    } else {
                        cell.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
