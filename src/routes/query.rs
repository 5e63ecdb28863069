use serde::Deserialize;

pub use crate::history::HistoryQuery as ListQuery;

/// Which flavour of CSV the export route produces.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// The human-readable diary export.
    #[default]
    Diary,
    /// Rows in the remote store's own layout, for manual import.
    Sheet,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExportQuery {
    pub format: ExportFormat,
}
