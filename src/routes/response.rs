use serde::Serialize;

use crate::entry::FoodEntry;
use crate::sync::RemoteOutcome;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Entry {
        entry: FoodEntry,
        remote: RemoteOutcome,
    },
    Deleted {
        id: String,
        remote: RemoteOutcome,
    },
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
    },
}
