use serde::Deserialize;
use time::macros::format_description;
use time::{Date, Duration};

use crate::entry::{FoodEntry, MealType};

/// Which entries to keep with respect to complaints.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ComplaintsFilter {
    #[default]
    All,
    With,
    Without,
}

/// A filter over the entry collection, as used by the history view.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Case-insensitive text looked for in the foods and both note fields.
    pub search: Option<String>,
    pub meal_type: Option<MealType>,
    pub complaints: ComplaintsFilter,
    /// Only entries from the last `days` days, today included.
    pub days: Option<u32>,
}

impl HistoryQuery {
    /// Filters `entries` and sorts what is left newest first.
    pub fn apply(&self, entries: &[FoodEntry], today: Date) -> Vec<FoodEntry> {
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        // a range reaching past the earliest representable date covers everything
        let cutoff = self
            .days
            .and_then(|days| today.checked_sub(Duration::days(i64::from(days))));

        let mut matching = entries
            .iter()
            .filter(|entry| needle.as_deref().map_or(true, |needle| mentions(entry, needle)))
            .filter(|entry| self.meal_type.map_or(true, |meal| entry.meal_type == meal))
            .filter(|entry| match self.complaints {
                ComplaintsFilter::All => true,
                ComplaintsFilter::With => entry.has_complaints,
                ComplaintsFilter::Without => !entry.has_complaints,
            })
            .filter(|entry| match cutoff {
                // entries with dates that cannot be read never fall inside a range
                Some(cutoff) => parse_date(&entry.date).map_or(false, |date| date > cutoff),
                None => true,
            })
            .cloned()
            .collect::<Vec<_>>();

        sort_newest_first(&mut matching);

        matching
    }
}

fn mentions(entry: &FoodEntry, needle: &str) -> bool {
    [&entry.foods, &entry.meal_notes, &entry.complaint_notes]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Sorts by date and time, newest first. Ties keep their order.
pub fn sort_newest_first(entries: &mut [FoodEntry]) {
    entries.sort_by(|a, b| (&b.date, &b.time).cmp(&(&a.date, &a.time)));
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(text: &str) -> Option<Date> {
    Date::parse(text.trim(), format_description!("[year]-[month]-[day]")).ok()
}
