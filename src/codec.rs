//! Maps entries to and from the flat twelve-column rows of the remote store.
//!
//! The mapping is lossy: complaint IDs travel as display names and are
//! resolved back through the reference table, and unknown names survive only
//! as pseudo-IDs. Complaint names (column 9) and severity pairs (column 10)
//! are produced from one pass over `complaint_types` so that they always line
//! up on the way back.

use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::entry::{generate_id, FoodEntry, MealType};
use crate::reference::{complaint_by_name, complaint_name, meal_by_label, meal_label};

pub const COLUMN_COUNT: usize = 12;

pub const HEADERS: [&str; COLUMN_COUNT] = [
    "ID",
    "Dátum",
    "Időpont",
    "Étkezés Típusa",
    "Elfogyasztott Ételek",
    "Étkezési Megjegyzések",
    "Van Panasz",
    "Panasz Időpontja",
    "Panasz Típusok",
    "Panasz Súlyosságok",
    "Panasz Megjegyzések",
    "Létrehozva",
];

pub const YES: &str = "Igen";
pub const NO: &str = "Nem";

const LIST_SEPARATOR: &str = ", ";
const PAIR_SEPARATOR: &str = ": ";

/// Converts an entry into a row. `written_at` fills the last column.
pub fn encode(entry: &FoodEntry, written_at: OffsetDateTime) -> Vec<String> {
    let (names, severities) = complaint_columns(entry);

    vec![
        entry.id.clone(),
        entry.date.clone(),
        entry.time.clone(),
        meal_label(entry.meal_type).to_owned(),
        entry.foods.clone(),
        entry.meal_notes.clone(),
        if entry.has_complaints { YES } else { NO }.to_owned(),
        entry.time_after_meal.clone(),
        names,
        severities,
        entry.complaint_notes.clone(),
        format_timestamp(written_at),
    ]
}

/// Converts a row back into an entry. Missing cells read as empty strings
/// and a missing ID is replaced with a fresh one; nothing here fails.
pub fn decode(row: &[String]) -> FoodEntry {
    let cell = |index: usize| row.get(index).map(String::as_str).unwrap_or("");

    let id = match cell(0) {
        "" => generate_id(),
        id => id.to_owned(),
    };

    FoodEntry {
        id,
        date: cell(1).to_owned(),
        time: cell(2).to_owned(),
        meal_type: meal_by_label(cell(3)).unwrap_or(MealType::Other),
        foods: cell(4).to_owned(),
        meal_notes: cell(5).to_owned(),
        has_complaints: cell(6) == YES,
        time_after_meal: cell(7).to_owned(),
        complaint_types: parse_complaint_names(cell(8)),
        complaint_severities: parse_severities(cell(9)),
        complaint_notes: cell(10).to_owned(),
    }
}

/// Whether every cell of a row is blank, i.e. the row holds no entry.
pub fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

fn complaint_columns(entry: &FoodEntry) -> (String, String) {
    let mut names = Vec::with_capacity(entry.complaint_types.len());
    let mut pairs = Vec::with_capacity(entry.complaint_types.len());

    for id in &entry.complaint_types {
        let name = complaint_name(id);

        // a complaint without a severity has nothing to pair with
        if let Some(severity) = entry.severity_of(id) {
            pairs.push(format!("{}{}{}", name, PAIR_SEPARATOR, severity));
        }

        names.push(name);
    }

    (names.join(LIST_SEPARATOR), pairs.join(LIST_SEPARATOR))
}

fn resolve_complaint(name: &str) -> String {
    let name = name.trim();

    complaint_by_name(name)
        .map(|c| c.id.to_owned())
        .unwrap_or_else(|| name.to_owned())
}

fn parse_complaint_names(text: &str) -> Vec<String> {
    text.split(LIST_SEPARATOR)
        .filter(|name| !name.trim().is_empty())
        .map(resolve_complaint)
        .collect()
}

fn parse_severities(text: &str) -> BTreeMap<String, u8> {
    let mut severities = BTreeMap::new();

    for pair in text.split(LIST_SEPARATOR) {
        let mut parts = pair.split(PAIR_SEPARATOR);

        let (name, severity) = match (parts.next(), parts.next()) {
            (Some(name), Some(severity)) if !name.trim().is_empty() => (name, severity),
            _ => continue,
        };

        if let Ok(severity) = severity.trim().parse::<u8>() {
            severities.insert(resolve_complaint(name), severity);
        }
    }

    severities
}

/// Formats a timestamp the way browsers print `Date.toISOString()`,
/// e.g. `2024-01-15T08:30:00.000Z`.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    let at = at.to_offset(time::UtcOffset::UTC);

    format!(
        "{}T{:02}:{:02}:{:02}.{:03}Z",
        at.date(),
        at.hour(),
        at.minute(),
        at.second(),
        at.millisecond()
    )
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use time::macros::datetime;

    use super::*;
    use crate::reference::COMPLAINT_TYPES;

    fn example_entry() -> FoodEntry {
        let mut complaint_severities = BTreeMap::new();
        complaint_severities.insert("nausea".to_owned(), 2);
        complaint_severities.insert("bloating".to_owned(), 1);

        FoodEntry {
            id: "1705307400000".to_owned(),
            date: "2024-01-15".to_owned(),
            time: "08:30".to_owned(),
            meal_type: MealType::Breakfast,
            foods: "oatmeal".to_owned(),
            has_complaints: true,
            complaint_types: vec!["nausea".to_owned(), "bloating".to_owned()],
            complaint_severities,
            ..Default::default()
        }
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn encodes_the_reference_example() {
        let encoded = encode(&example_entry(), datetime!(2024-01-15 09:00:00.5 UTC));

        assert_eq!(encoded.len(), COLUMN_COUNT);
        assert_eq!(encoded[3], "Reggeli");
        assert_eq!(encoded[6], "Igen");
        assert_eq!(encoded[8], "Hányinger, Puffadás");
        // the severity map iterates alphabetically; the pairs must not
        assert_eq!(encoded[9], "Hányinger: 2, Puffadás: 1");
        assert_eq!(encoded[11], "2024-01-15T09:00:00.500Z");
    }

    #[test]
    fn decodes_what_it_encodes() {
        let entry = example_entry();
        let decoded = decode(&encode(&entry, OffsetDateTime::now_utc()));

        assert_eq!(decoded, entry);
    }

    #[test]
    fn unknown_complaints_pass_through() {
        let mut entry = example_entry();
        entry.complaint_types = vec!["hiccups".to_owned(), "nausea".to_owned()];
        entry.complaint_severities.insert("hiccups".to_owned(), 3);

        let encoded = encode(&entry, OffsetDateTime::now_utc());
        assert_eq!(encoded[8], "hiccups, Hányinger");
        assert_eq!(encoded[9], "hiccups: 3, Hányinger: 2");

        let decoded = decode(&encoded);
        assert_eq!(decoded.complaint_types, vec!["hiccups", "nausea"]);
        assert_eq!(decoded.severity_of("hiccups"), Some(3));
    }

    #[test]
    fn complaints_without_severity_are_left_out_of_the_pairs() {
        let mut entry = example_entry();
        entry.complaint_severities.remove("nausea");

        let encoded = encode(&entry, OffsetDateTime::now_utc());

        assert_eq!(encoded[8], "Hányinger, Puffadás");
        assert_eq!(encoded[9], "Puffadás: 1");
    }

    #[test]
    fn unknown_meal_labels_read_as_other() {
        let decoded = decode(&row(&["7", "2024-01-15", "08:30", "Brunch", "eggs"]));

        assert_eq!(decoded.meal_type, MealType::Other);
        assert_eq!(decoded.foods, "eggs");
    }

    #[test]
    fn short_rows_fill_in_defaults() {
        let decoded = decode(&row(&["7", "2024-01-15"]));

        assert_eq!(decoded.id, "7");
        assert_eq!(decoded.time, "");
        assert!(!decoded.has_complaints);
        assert!(decoded.complaint_types.is_empty());
        assert!(decoded.complaint_severities.is_empty());
    }

    #[test]
    fn missing_ids_are_generated() {
        let decoded = decode(&row(&["", "2024-01-15", "08:30", "Ebéd", "soup"]));

        assert!(!decoded.id.is_empty());
        assert_eq!(decoded.meal_type, MealType::Lunch);
    }

    #[test]
    fn garbage_complaint_columns_do_not_block_decoding() {
        let decoded = decode(&row(&[
            "7",
            "2024-01-15",
            "08:30",
            "Vacsora",
            "pasta",
            "",
            "Nem",
            "???",
            ", , ",
            "Hányinger: sok, : 2, Puffadás, Fejfájás: 3",
            "",
        ]));

        assert!(!decoded.has_complaints);
        assert!(decoded.complaint_types.is_empty());
        assert_eq!(decoded.complaint_severities.len(), 1);
        assert_eq!(decoded.severity_of("headache"), Some(3));
    }

    #[test]
    fn has_complaints_requires_the_exact_literal() {
        let decoded = decode(&row(&["7", "", "", "", "", "", "igen"]));

        assert!(!decoded.has_complaints);
    }

    #[test]
    fn blank_rows_are_recognised() {
        assert!(is_blank(&[]));
        assert!(is_blank(&row(&["", " "])));
        assert!(!is_blank(&row(&["", "x"])));
    }

    fn meal_types() -> impl Strategy<Value = MealType> {
        prop::sample::select(MealType::ALL.to_vec())
    }

    fn complaint_ids() -> impl Strategy<Value = Vec<String>> {
        let ids = COMPLAINT_TYPES.iter().map(|c| c.id.to_owned()).collect::<Vec<_>>();

        prop::sample::subsequence(ids, 0..=COMPLAINT_TYPES.len())
    }

    proptest! {
        #[test]
        fn known_complaints_survive_a_round_trip(
            date in "20[0-9]{2}-[01][0-9]-[0-3][0-9]",
            time in "[0-2][0-9]:[0-5][0-9]",
            meal_type in meal_types(),
            foods in "[^\\x00]{1,40}",
            has_complaints in any::<bool>(),
            complaint_types in complaint_ids(),
            severities in prop::collection::vec(1u8..=4, COMPLAINT_TYPES.len()),
        ) {
            let complaint_severities = complaint_types
                .iter()
                .cloned()
                .zip(severities.into_iter())
                .collect::<BTreeMap<_, _>>();

            let entry = FoodEntry {
                id: "1".to_owned(),
                date,
                time,
                meal_type,
                foods,
                has_complaints,
                complaint_types,
                complaint_severities,
                ..Default::default()
            };

            let decoded = decode(&encode(&entry, OffsetDateTime::now_utc()));

            prop_assert_eq!(&decoded.date, &entry.date);
            prop_assert_eq!(&decoded.time, &entry.time);
            prop_assert_eq!(decoded.meal_type, entry.meal_type);
            prop_assert_eq!(&decoded.foods, &entry.foods);
            prop_assert_eq!(decoded.has_complaints, entry.has_complaints);
            prop_assert_eq!(&decoded.complaint_types, &entry.complaint_types);
            prop_assert_eq!(&decoded.complaint_severities, &entry.complaint_severities);
        }
    }
}
