use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::errors::DiaryError;

/// The kind of meal an entry records.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    #[default]
    Other,
}

impl MealType {
    pub const ALL: [MealType; 5] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
        MealType::Other,
    ];

    pub fn id(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
            MealType::Other => "other",
        }
    }

    pub fn from_id(id: &str) -> Option<MealType> {
        MealType::ALL.iter().copied().find(|m| m.id() == id)
    }
}

// unknown meal types from older clients fall back to `other` instead of
// rejecting the whole entry
impl<'de> Deserialize<'de> for MealType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: Deserializer<'de> {
        let id = String::deserialize(deserializer)?;
        Ok(MealType::from_id(&id).unwrap_or_default())
    }
}

/// A single logged meal, with the reactions that followed it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodEntry {
    /// Assigned at creation and never changed afterwards.
    pub id: String,

    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,

    /// Local time of day, `HH:MM`.
    pub time: String,

    pub meal_type: MealType,

    /// What was eaten.
    pub foods: String,

    #[serde(default)]
    pub meal_notes: String,

    /// Gates every complaint field below.
    #[serde(default)]
    pub has_complaints: bool,

    /// Complaint identifiers in the order they were chosen. Identifiers
    /// missing from the reference table are kept as they are.
    #[serde(default)]
    pub complaint_types: Vec<String>,

    /// Severity (1–4) per complaint identifier.
    #[serde(default)]
    pub complaint_severities: BTreeMap<String, u8>,

    #[serde(default)]
    pub complaint_notes: String,

    /// Free-text onset latency, e.g. "30 perc".
    #[serde(default)]
    pub time_after_meal: String,
}

/// An entry as submitted for creation; the ID is optional.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub date: String,
    pub time: String,
    pub meal_type: MealType,
    pub foods: String,
    #[serde(default)]
    pub meal_notes: String,
    #[serde(default)]
    pub has_complaints: bool,
    #[serde(default)]
    pub complaint_types: Vec<String>,
    #[serde(default)]
    pub complaint_severities: BTreeMap<String, u8>,
    #[serde(default)]
    pub complaint_notes: String,
    #[serde(default)]
    pub time_after_meal: String,
}

impl NewEntry {
    /// Checks the fields a meal cannot be recorded without.
    pub fn validate(&self) -> Result<(), DiaryError> {
        validate_required(&self.date, &self.time, &self.foods)
    }

    /// Turns this into a full entry, generating an ID if none was given.
    pub fn into_entry(self) -> FoodEntry {
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => generate_id(),
        };

        FoodEntry {
            id,
            date: self.date,
            time: self.time,
            meal_type: self.meal_type,
            foods: self.foods,
            meal_notes: self.meal_notes,
            has_complaints: self.has_complaints,
            complaint_types: self.complaint_types,
            complaint_severities: self.complaint_severities,
            complaint_notes: self.complaint_notes,
            time_after_meal: self.time_after_meal,
        }
    }
}

impl FoodEntry {
    pub fn validate(&self) -> Result<(), DiaryError> {
        validate_required(&self.date, &self.time, &self.foods)
    }

    /// Severity recorded for the given complaint, if any.
    pub fn severity_of(&self, complaint_id: &str) -> Option<u8> {
        self.complaint_severities.get(complaint_id).copied()
    }
}

fn validate_required(date: &str, time: &str, foods: &str) -> Result<(), DiaryError> {
    let required = [("date", date), ("time", time), ("foods", foods)];

    match required.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((field, _)) => Err(DiaryError::MissingField { field: *field }),
        None => Ok(()),
    }
}

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Generates an entry ID from the current time in milliseconds. IDs are
/// strictly increasing within the process even when two entries are created
/// in the same millisecond.
pub fn generate_id() -> String {
    let now = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;

    let previous = LAST_ID
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);

    now.max(previous + 1).to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn new_entry() -> NewEntry {
        NewEntry {
            date: "2024-01-15".to_owned(),
            time: "08:30".to_owned(),
            meal_type: MealType::Breakfast,
            foods: "oatmeal".to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn generated_ids_are_unique() {
        let ids = (0..1000).map(|_| generate_id()).collect::<HashSet<_>>();

        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn generated_ids_are_millisecond_timestamps() {
        let id: i64 = generate_id().parse().expect("parse generated ID");
        let now = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;

        assert!((now - id).abs() < 60_000, "{} is close to {}", id, now);
    }

    #[test]
    fn into_entry_keeps_a_supplied_id() {
        let entry = NewEntry {
            id: Some("42".to_owned()),
            ..new_entry()
        }
        .into_entry();

        assert_eq!(entry.id, "42");
    }

    #[test]
    fn into_entry_replaces_a_blank_id() {
        let entry = NewEntry {
            id: Some("  ".to_owned()),
            ..new_entry()
        }
        .into_entry();

        assert!(!entry.id.trim().is_empty());
    }

    #[test]
    fn validation_names_the_first_missing_field() {
        let entry = NewEntry {
            foods: " ".to_owned(),
            ..new_entry()
        };

        match entry.validate() {
            Err(DiaryError::MissingField { field }) => assert_eq!(field, "foods"),
            other => panic!("expected missing field, got {:?}", other),
        }

        assert!(new_entry().validate().is_ok());
    }

    #[test]
    fn unknown_meal_types_deserialize_as_other() {
        let meal: MealType = serde_json::from_str("\"brunch\"").expect("parse meal type");

        assert_eq!(meal, MealType::Other);
    }

    #[test]
    fn entries_use_camel_case_on_the_wire() {
        let json = r#"{
            "date": "2024-01-15",
            "time": "08:30",
            "mealType": "breakfast",
            "foods": "oatmeal",
            "hasComplaints": true,
            "complaintTypes": ["nausea"],
            "complaintSeverities": { "nausea": 2 }
        }"#;

        let entry: NewEntry = serde_json::from_str(json).expect("parse new entry");

        assert_eq!(entry.id, None);
        assert_eq!(entry.meal_type, MealType::Breakfast);
        assert!(entry.has_complaints);
        assert_eq!(entry.complaint_severities.get("nausea"), Some(&2));
        assert_eq!(entry.meal_notes, "");
    }
}
