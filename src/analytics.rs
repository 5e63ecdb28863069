use std::collections::BTreeMap;

use serde::Serialize;
use time::Date;

use crate::entry::{FoodEntry, MealType};
use crate::history::parse_date;
use crate::reference::{complaint_by_id, complaint_name};

const WINDOW_DAYS: i64 = 7;

/// How often one complaint type was reported.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintCount {
    pub id: String,
    pub name: String,
    pub color: String,
    pub count: usize,
    /// Share of the entries with complaints that mention this one.
    pub percentage: f64,
}

/// Summary statistics over the whole entry collection.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_entries: usize,
    pub complaints_count: usize,
    pub complaints_percentage: f64,
    pub meal_types: BTreeMap<MealType, usize>,
    /// Most frequent first.
    pub sorted_complaints: Vec<ComplaintCount>,
    /// Percentage of entries with complaints over the last 7 days.
    pub recent_complaints_rate: f64,
    /// The same percentage for the 7 days before that.
    pub previous_complaints_rate: f64,
    /// Recent rate minus previous rate; positive means things got worse.
    pub trend: f64,
}

impl Analytics {
    /// Returns `None` when there is nothing to analyse.
    pub fn compute(entries: &[FoodEntry], today: Date) -> Option<Analytics> {
        if entries.is_empty() {
            return None;
        }

        let total_entries = entries.len();
        let with_complaints = entries.iter().filter(|e| e.has_complaints).collect::<Vec<_>>();
        let complaints_count = with_complaints.len();

        let mut meal_types = BTreeMap::new();
        for entry in entries {
            *meal_types.entry(entry.meal_type).or_insert(0) += 1;
        }

        let mut recent = vec![];
        let mut previous = vec![];

        for entry in entries {
            match days_before(entry, today) {
                Some(days) if days < WINDOW_DAYS => recent.push(entry),
                Some(days) if days < 2 * WINDOW_DAYS => previous.push(entry),
                _ => {}
            }
        }

        let recent_complaints_rate = complaint_rate(&recent);
        let previous_complaints_rate = complaint_rate(&previous);

        Some(Analytics {
            total_entries,
            complaints_count,
            complaints_percentage: percentage(complaints_count, total_entries),
            meal_types,
            sorted_complaints: rank_complaints(&with_complaints),
            recent_complaints_rate,
            previous_complaints_rate,
            trend: recent_complaints_rate - previous_complaints_rate,
        })
    }
}

/// Whole days from the entry's date to `today`; future dates count as today.
fn days_before(entry: &FoodEntry, today: Date) -> Option<i64> {
    let date = parse_date(&entry.date)?;

    Some((today - date).whole_days().max(0))
}

fn rank_complaints(with_complaints: &[&FoodEntry]) -> Vec<ComplaintCount> {
    // counts in order of first appearance, so the stable sort below breaks ties that way
    let mut counts: Vec<(&str, usize)> = vec![];

    for entry in with_complaints {
        for id in &entry.complaint_types {
            match counts.iter_mut().find(|(seen, _)| *seen == id.as_str()) {
                Some((_, count)) => *count += 1,
                None => counts.push((id.as_str(), 1)),
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));

    counts
        .into_iter()
        .map(|(id, count)| ComplaintCount {
            id: id.to_owned(),
            name: complaint_name(id).to_owned(),
            color: complaint_by_id(id).map(|c| c.color).unwrap_or("").to_owned(),
            count,
            percentage: percentage(count, with_complaints.len()),
        })
        .collect()
}

fn complaint_rate(entries: &[&FoodEntry]) -> f64 {
    percentage(entries.iter().filter(|e| e.has_complaints).count(), entries.len())
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
