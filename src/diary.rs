use std::sync::Arc;

use log::{debug, error, info, o, warn, Logger};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::cache::{LocalCache, SyncSettings};
use crate::config::{extract_spreadsheet_id, is_valid_spreadsheet_id};
use crate::entry::{FoodEntry, NewEntry};
use crate::errors::{DiaryError, StoreError};
use crate::store::{Connector, EntryStore};
use crate::sync::{self, Reconciliation, RemoteOutcome, Source};

/// How the diary reaches the remote store, if it can at all.
pub struct Remote {
    connector: Arc<Connector>,
    service_account: Option<String>,
}

impl Remote {
    pub fn new(connector: Arc<Connector>, service_account: Option<String>) -> Self {
        Self {
            connector,
            service_account,
        }
    }
}

/// A settings change as submitted; the spreadsheet may be given as a URL.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub enabled: bool,
    #[serde(default)]
    pub spreadsheet_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    pub success: bool,
    pub message: String,
    pub sheet_title: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub troubleshooting: Option<String>,
    pub service_account: Option<String>,
}

/// The diary session: the canonical entry collection, its local cache and
/// the optional remote mirror. Every operation holds the same lock, so no
/// two of them ever interleave.
pub struct Diary {
    logger: Arc<Logger>,
    cache: LocalCache,
    remote: Option<Remote>,
    default_spreadsheet_id: Option<String>,
    entries: Mutex<Vec<FoodEntry>>,
}

impl Diary {
    pub fn new(logger: Arc<Logger>, cache: LocalCache) -> Self {
        Self {
            logger,
            cache,
            remote: None,
            default_spreadsheet_id: None,
            entries: Mutex::new(vec![]),
        }
    }

    pub fn with_remote(mut self, remote: Remote) -> Self {
        self.remote = Some(remote);
        self
    }

    /// The spreadsheet to use when none has been saved in the settings.
    pub fn with_default_spreadsheet_id(mut self, id: Option<String>) -> Self {
        self.default_spreadsheet_id = id.map(|id| extract_spreadsheet_id(&id));
        self
    }

    /// Reads the local cache and, if sync is on, reconciles it with the
    /// remote store. Always produces an entry set.
    pub async fn load(&self) -> Reconciliation {
        let mut entries = self.entries.lock().await;
        let local = self.cache.entries();

        let result = match self.store_for(&self.settings()) {
            Ok(None) => Reconciliation {
                entries: local,
                source: Source::Local,
            },
            Ok(Some(store)) => self.reconcile(&store, local).await,
            Err(e) => {
                warn!(self.logger, "Remote sync is enabled but unavailable"; "error" => %e);

                Reconciliation {
                    entries: local,
                    source: Source::LocalFallback {
                        message: e.to_string(),
                    },
                }
            }
        };

        info!(self.logger, "Loaded diary"; "entries" => result.entries.len(), "source" => ?result.source);
        *entries = result.entries.clone();

        result
    }

    /// Re-runs reconciliation against the entries currently held.
    pub async fn sync(&self) -> Result<Reconciliation, DiaryError> {
        let mut entries = self.entries.lock().await;

        let store = self.store_for(&self.settings())?.ok_or(DiaryError::SyncDisabled)?;
        let result = self.reconcile(&store, entries.clone()).await;
        *entries = result.entries.clone();

        Ok(result)
    }

    pub async fn entries(&self) -> Vec<FoodEntry> {
        self.entries.lock().await.clone()
    }

    /// Records a new entry at the front of the collection.
    pub async fn add(&self, new_entry: NewEntry) -> Result<(FoodEntry, RemoteOutcome), DiaryError> {
        new_entry.validate()?;
        let entry = new_entry.into_entry();
        let logger = self.logger.new(o!("operation" => "add", "id" => entry.id.clone()));

        let mut entries = self.entries.lock().await;

        if entries.iter().any(|e| e.id == entry.id) {
            return Err(DiaryError::DuplicateEntry { id: entry.id });
        }

        entries.insert(0, entry.clone());
        self.persist(&logger, &entries);

        let outcome = match self.mirror() {
            Some(Ok(store)) => RemoteOutcome::settle(&logger, "add", store.append(&entry).await),
            Some(Err(e)) => RemoteOutcome::settle(&logger, "add", Err(e)),
            None => RemoteOutcome::Disabled,
        };

        debug!(logger, "Added entry"; "remote" => ?outcome);

        Ok((entry, outcome))
    }

    /// Replaces the entry with the same ID.
    pub async fn edit(&self, entry: FoodEntry) -> Result<(FoodEntry, RemoteOutcome), DiaryError> {
        entry.validate()?;
        let logger = self.logger.new(o!("operation" => "edit", "id" => entry.id.clone()));

        let mut entries = self.entries.lock().await;

        let slot = entries
            .iter_mut()
            .find(|e| e.id == entry.id)
            .ok_or_else(|| DiaryError::UnknownEntry { id: entry.id.clone() })?;
        *slot = entry.clone();
        self.persist(&logger, &entries);

        let outcome = match self.mirror() {
            Some(Ok(store)) => RemoteOutcome::settle(&logger, "edit", store.update(&entry).await),
            Some(Err(e)) => RemoteOutcome::settle(&logger, "edit", Err(e)),
            None => RemoteOutcome::Disabled,
        };

        debug!(logger, "Edited entry"; "remote" => ?outcome);

        Ok((entry, outcome))
    }

    /// Removes an entry. A remote store that no longer has it counts as mirrored.
    pub async fn delete(&self, id: &str) -> Result<RemoteOutcome, DiaryError> {
        let logger = self.logger.new(o!("operation" => "delete", "id" => id.to_owned()));

        let mut entries = self.entries.lock().await;

        let index = entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| DiaryError::UnknownEntry { id: id.to_owned() })?;
        entries.remove(index);
        self.persist(&logger, &entries);

        let outcome = match self.mirror() {
            Some(Ok(store)) => {
                let result = match store.delete(id).await {
                    Err(e) if e.is_not_found() => {
                        debug!(logger, "Entry was already gone from remote store");
                        Ok(())
                    }
                    other => other,
                };

                RemoteOutcome::settle(&logger, "delete", result)
            }
            Some(Err(e)) => RemoteOutcome::settle(&logger, "delete", Err(e)),
            None => RemoteOutcome::Disabled,
        };

        debug!(logger, "Deleted entry"; "remote" => ?outcome);

        Ok(outcome)
    }

    /// The saved sync settings, with the default spreadsheet filled in.
    pub fn settings(&self) -> SyncSettings {
        let mut settings = self.cache.settings();

        if settings.spreadsheet_id.trim().is_empty() {
            if let Some(id) = &self.default_spreadsheet_id {
                settings.spreadsheet_id = id.clone();
            }
        }

        settings
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<SyncSettings, DiaryError> {
        let spreadsheet_id = extract_spreadsheet_id(&update.spreadsheet_id);

        // blank means "use the default"
        if !spreadsheet_id.is_empty() && !is_valid_spreadsheet_id(&spreadsheet_id) {
            return Err(DiaryError::BadRequest(format!(
                "{:?} is neither a spreadsheet ID nor a spreadsheet URL",
                spreadsheet_id
            )));
        }

        let _entries = self.entries.lock().await;

        let settings = SyncSettings {
            enabled: update.enabled,
            spreadsheet_id,
        };

        self.cache.save_settings(&settings)?;
        info!(self.logger, "Updated sync settings"; "enabled" => settings.enabled, "spreadsheet_id" => &settings.spreadsheet_id);

        Ok(self.settings())
    }

    /// Checks that the configured spreadsheet can be reached, whether or not
    /// sync is switched on.
    pub async fn test_connection(&self) -> ConnectionReport {
        let _entries = self.entries.lock().await;

        let settings = self.settings();
        let spreadsheet_id = Some(settings.spreadsheet_id.clone()).filter(|id| !id.trim().is_empty());
        let service_account = self.remote.as_ref().and_then(|r| r.service_account.clone());

        let result = match (&self.remote, &spreadsheet_id) {
            (None, _) => Err(StoreError::MissingConfiguration {
                name: "GOOGLE_CLIENT_EMAIL",
            }),
            (_, None) => Err(StoreError::MissingConfiguration {
                name: "GOOGLE_SPREADSHEET_ID",
            }),
            (Some(remote), Some(id)) => self.entry_store(remote, id).test_connection().await,
        };

        match result {
            Ok(info) => ConnectionReport {
                success: true,
                message: "Connection successful".to_owned(),
                sheet_title: info.title,
                spreadsheet_id: Some(info.id),
                troubleshooting: None,
                service_account,
            },
            Err(e) => {
                warn!(self.logger, "Connection test failed"; "error" => %e);

                let troubleshooting = match (&service_account, e.is_permission_denied()) {
                    (Some(email), true) => Some(format!("Share your spreadsheet with this email: {}", email)),
                    _ => None,
                };

                ConnectionReport {
                    success: false,
                    message: e.to_string(),
                    sheet_title: None,
                    spreadsheet_id,
                    troubleshooting,
                    service_account,
                }
            }
        }
    }

    async fn reconcile(&self, store: &EntryStore, local: Vec<FoodEntry>) -> Reconciliation {
        let result = sync::reconcile(&self.logger, store, local).await;

        if let Source::Remote { .. } = result.source {
            self.persist(&self.logger, &result.entries);
        }

        result
    }

    fn mirror(&self) -> Option<Result<EntryStore, StoreError>> {
        self.store_for(&self.settings()).transpose()
    }

    fn store_for(&self, settings: &SyncSettings) -> Result<Option<EntryStore>, StoreError> {
        if !settings.is_active() {
            return Ok(None);
        }

        match &self.remote {
            Some(remote) => Ok(Some(self.entry_store(remote, &settings.spreadsheet_id))),
            None => Err(StoreError::MissingConfiguration {
                name: "GOOGLE_CLIENT_EMAIL",
            }),
        }
    }

    fn entry_store(&self, remote: &Remote, spreadsheet_id: &str) -> EntryStore {
        let logger = self.logger.new(o!("spreadsheet_id" => spreadsheet_id.to_owned()));

        EntryStore::new((remote.connector)(spreadsheet_id), Arc::new(logger))
    }

    // the in-memory collection stays authoritative even when this fails
    fn persist(&self, logger: &Logger, entries: &[FoodEntry]) {
        if let Err(e) = self.cache.save_entries(entries) {
            error!(logger, "Could not save entries to local cache"; "error" => %e, "entries" => entries.len());
        }
    }
}
