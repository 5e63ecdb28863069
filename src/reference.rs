//! Static reference tables for complaint types, severity levels and meal
//! labels. Display names double as lookup keys when reading rows back from
//! the remote store, so they must stay unique.

use serde::Serialize;

use crate::entry::MealType;

/// A kind of adverse reaction that can follow a meal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ComplaintType {
    pub id: &'static str,
    pub name: &'static str,
    pub color: &'static str,
}

/// One step on the 1–4 severity scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SeverityLevel {
    pub value: u8,
    pub label: &'static str,
    pub color: &'static str,
}

/// The display label for a meal type.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MealLabel {
    pub id: MealType,
    pub label: &'static str,
}

pub const COMPLAINT_TYPES: [ComplaintType; 10] = [
    complaint("nausea", "Hányinger", "bg-yellow-100 text-yellow-800"),
    complaint("bloating", "Puffadás", "bg-blue-100 text-blue-800"),
    complaint("stomach-pain", "Gyomorfájás", "bg-red-100 text-red-800"),
    complaint("heartburn", "Gyomorégés", "bg-orange-100 text-orange-800"),
    complaint("diarrhea", "Hasmenés", "bg-brown-100 text-brown-800"),
    complaint("constipation", "Székrekedés", "bg-gray-100 text-gray-800"),
    complaint("gas", "Gázosság", "bg-green-100 text-green-800"),
    complaint("fatigue", "Fáradtság", "bg-purple-100 text-purple-800"),
    complaint("headache", "Fejfájás", "bg-pink-100 text-pink-800"),
    complaint("other", "Egyéb", "bg-indigo-100 text-indigo-800"),
];

pub const SEVERITY_LEVELS: [SeverityLevel; 4] = [
    SeverityLevel { value: 1, label: "Enyhe", color: "text-green-600" },
    SeverityLevel { value: 2, label: "Közepes", color: "text-yellow-600" },
    SeverityLevel { value: 3, label: "Súlyos", color: "text-orange-600" },
    SeverityLevel { value: 4, label: "Extrém", color: "text-red-600" },
];

pub const MEAL_LABELS: [MealLabel; 5] = [
    MealLabel { id: MealType::Breakfast, label: "Reggeli" },
    MealLabel { id: MealType::Lunch, label: "Ebéd" },
    MealLabel { id: MealType::Dinner, label: "Vacsora" },
    MealLabel { id: MealType::Snack, label: "Snack" },
    MealLabel { id: MealType::Other, label: "Egyéb" },
];

const fn complaint(id: &'static str, name: &'static str, color: &'static str) -> ComplaintType {
    ComplaintType { id, name, color }
}

pub fn complaint_by_id(id: &str) -> Option<&'static ComplaintType> {
    COMPLAINT_TYPES.iter().find(|c| c.id == id)
}

pub fn complaint_by_name(name: &str) -> Option<&'static ComplaintType> {
    COMPLAINT_TYPES.iter().find(|c| c.name == name)
}

/// Display name for a complaint ID, or the ID itself when it is not in the table.
pub fn complaint_name(id: &str) -> &str {
    complaint_by_id(id).map(|c| c.name).unwrap_or(id)
}

pub fn severity_level(value: u8) -> Option<&'static SeverityLevel> {
    SEVERITY_LEVELS.iter().find(|s| s.value == value)
}

pub fn meal_label(meal: MealType) -> &'static str {
    MEAL_LABELS
        .iter()
        .find(|m| m.id == meal)
        .map(|m| m.label)
        .unwrap_or_else(|| meal.id())
}

pub fn meal_by_label(label: &str) -> Option<MealType> {
    MEAL_LABELS.iter().find(|m| m.label == label).map(|m| m.id)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn complaint_names_are_unique() {
        let names = COMPLAINT_TYPES.iter().map(|c| c.name).collect::<HashSet<_>>();
        let ids = COMPLAINT_TYPES.iter().map(|c| c.id).collect::<HashSet<_>>();

        assert_eq!(names.len(), COMPLAINT_TYPES.len());
        assert_eq!(ids.len(), COMPLAINT_TYPES.len());
    }

    #[test]
    fn lookups_miss_for_unknown_keys() {
        assert_eq!(complaint_by_id("hiccups"), None);
        assert_eq!(complaint_by_name("Csuklás"), None);
        assert_eq!(severity_level(0), None);
        assert_eq!(severity_level(5), None);
        assert_eq!(meal_by_label("Brunch"), None);
    }

    #[test]
    fn complaint_name_falls_back_to_the_id() {
        assert_eq!(complaint_name("nausea"), "Hányinger");
        assert_eq!(complaint_name("hiccups"), "hiccups");
    }

    #[test]
    fn severity_levels_are_ordered_by_value() {
        let values = SEVERITY_LEVELS.iter().map(|s| s.value).collect::<Vec<_>>();

        assert_eq!(values, vec![1, 2, 3, 4]);
    }

    #[test]
    fn every_meal_type_has_a_reversible_label() {
        for meal in MealType::ALL.iter().copied() {
            assert_eq!(meal_by_label(meal_label(meal)), Some(meal));
        }
    }
}
