//! Load-time reconciliation between the local cache and the remote store.
//!
//! Whichever side wins replaces the other wholesale: a non-empty remote
//! store always wins, even over newer local entries, and an empty one is
//! seeded from the local entries.

use log::{debug, info, warn, Logger};
use serde::Serialize;

use crate::entry::FoodEntry;
use crate::errors::StoreError;
use crate::store::EntryStore;

/// Where the active entry set came from.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Source {
    /// Remote sync is off; the local cache is used as is.
    Local,
    /// The remote store had entries and they replaced the local ones.
    Remote { count: usize },
    /// The remote store was empty and was seeded with the local entries.
    Seeded { appended: usize },
    /// Both sides were empty.
    Empty,
    /// The remote store could not be read, or seeding it failed part-way.
    LocalFallback { message: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reconciliation {
    pub entries: Vec<FoodEntry>,
    pub source: Source,
}

/// Decides which of `local` and the remote entries becomes the active set.
/// Never fails: when the remote store misbehaves the local entries win.
pub async fn reconcile(logger: &Logger, store: &EntryStore, local: Vec<FoodEntry>) -> Reconciliation {
    let remote = match store.list().await {
        Ok(remote) => remote,
        Err(e) => {
            warn!(logger, "Could not fetch remote entries; using local cache"; "error" => %e);
            return fallback(local, e);
        }
    };

    if !remote.is_empty() {
        info!(logger, "Remote entries replace local cache"; "remote" => remote.len(), "local" => local.len());
        let count = remote.len();

        return Reconciliation {
            entries: remote,
            source: Source::Remote { count },
        };
    }

    if local.is_empty() {
        debug!(logger, "Nothing to reconcile");

        return Reconciliation {
            entries: local,
            source: Source::Empty,
        };
    }

    info!(logger, "Seeding empty remote store"; "entries" => local.len());

    // one at a time, in local order
    for (index, entry) in local.iter().enumerate() {
        if let Err(e) = store.append(entry).await {
            warn!(logger, "Seeding remote store failed"; "id" => &entry.id, "appended" => index, "error" => %e);
            return fallback(local, e);
        }
    }

    let appended = local.len();

    Reconciliation {
        entries: local,
        source: Source::Seeded { appended },
    }
}

fn fallback(local: Vec<FoodEntry>, error: StoreError) -> Reconciliation {
    Reconciliation {
        entries: local,
        source: Source::LocalFallback {
            message: error.to_string(),
        },
    }
}

/// What happened when a local mutation was mirrored to the remote store.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RemoteOutcome {
    Disabled,
    Mirrored,
    Failed { message: String },
}

impl RemoteOutcome {
    /// Downgrades a mirroring failure to a warning.
    pub fn settle(logger: &Logger, operation: &'static str, result: Result<(), StoreError>) -> Self {
        match result {
            Ok(()) => RemoteOutcome::Mirrored,
            Err(e) => {
                warn!(logger, "Could not mirror change to remote store"; "operation" => operation, "error" => %e);

                RemoteOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::OffsetDateTime;

    use super::*;
    use crate::codec;
    use crate::entry::MealType;
    use crate::store::mock::MemoryGrid;

    fn entry(id: &str, foods: &str) -> FoodEntry {
        FoodEntry {
            id: id.to_owned(),
            date: "2024-01-15".to_owned(),
            time: "08:30".to_owned(),
            meal_type: MealType::Breakfast,
            foods: foods.to_owned(),
            ..Default::default()
        }
    }

    fn setup(remote: &[FoodEntry]) -> (Arc<MemoryGrid>, EntryStore, Logger) {
        let logger = log::discard_logger();
        let grid = Arc::new(MemoryGrid::new());

        if !remote.is_empty() {
            grid.push_raw_row(codec::HEADERS.iter().map(|h| h.to_string()).collect());
        }
        for entry in remote {
            grid.push_raw_row(codec::encode(entry, OffsetDateTime::now_utc()));
        }

        let store = EntryStore::new(grid.clone(), Arc::new(logger.clone()));

        (grid, store, logger)
    }

    #[tokio::test]
    async fn remote_wins_when_it_has_entries() {
        let remote = vec![entry("1", "remote soup")];
        let (grid, store, logger) = setup(&remote);
        let local = vec![entry("2", "newer local"), entry("1", "older local")];

        let result = reconcile(&logger, &store, local).await;

        assert_eq!(result.entries, remote);
        assert_eq!(result.source, Source::Remote { count: 1 });
        assert!(grid.appends().is_empty());
    }

    #[tokio::test]
    async fn an_empty_remote_is_seeded_once_per_entry() {
        let (grid, store, logger) = setup(&[]);
        let local = vec![entry("3", "c"), entry("2", "b"), entry("1", "a")];

        let result = reconcile(&logger, &store, local.clone()).await;

        assert_eq!(result.entries, local);
        assert_eq!(result.source, Source::Seeded { appended: 3 });

        let appended_ids = grid.appends().into_iter().map(|row| row[0].clone()).collect::<Vec<_>>();
        assert_eq!(appended_ids, vec!["3", "2", "1"]);
    }

    #[tokio::test]
    async fn seeding_that_stops_partway_falls_back_to_local() {
        let (grid, store, logger) = setup(&[]);
        let local = vec![entry("3", "c"), entry("2", "b"), entry("1", "a")];

        // the listing, four calls for the first append with its header row,
        // then two for the second
        grid.fail_after(7);

        let result = reconcile(&logger, &store, local.clone()).await;

        assert_eq!(result.entries, local);
        assert!(matches!(result.source, Source::LocalFallback { .. }));

        let appended_ids = grid.appends().into_iter().map(|row| row[0].clone()).collect::<Vec<_>>();
        assert_eq!(appended_ids, vec!["3", "2"]);
        assert_eq!(grid.data_rows().len(), 2);
    }

    #[tokio::test]
    async fn nothing_happens_when_both_sides_are_empty() {
        let (grid, store, logger) = setup(&[]);

        let result = reconcile(&logger, &store, vec![]).await;

        assert!(result.entries.is_empty());
        assert_eq!(result.source, Source::Empty);
        assert!(grid.appends().is_empty());
    }

    #[tokio::test]
    async fn fetch_failures_fall_back_to_local() {
        let (grid, store, logger) = setup(&[entry("1", "remote")]);
        grid.fail_all();
        let local = vec![entry("2", "local")];

        let result = reconcile(&logger, &store, local.clone()).await;

        assert_eq!(result.entries, local);
        assert!(matches!(result.source, Source::LocalFallback { .. }));
    }

    #[test]
    fn mirroring_failures_become_outcomes() {
        let logger = log::discard_logger();

        assert_eq!(RemoteOutcome::settle(&logger, "add", Ok(())), RemoteOutcome::Mirrored);

        let failed = RemoteOutcome::settle(
            &logger,
            "delete",
            Err(StoreError::NotFound { id: "1".to_owned() }),
        );
        assert_eq!(
            failed,
            RemoteOutcome::Failed {
                message: "entry 1 not found in remote store".to_owned()
            }
        );
    }

    #[test]
    fn outcomes_are_tagged_on_the_wire() {
        let json = serde_json::to_value(&RemoteOutcome::Disabled).expect("serialize outcome");

        assert_eq!(json, serde_json::json!({ "status": "disabled" }));
    }
}
