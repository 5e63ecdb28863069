use std::sync::Arc;

use futures::future::BoxFuture;
use log::{debug, trace, warn, Logger};
use serde::Serialize;
use time::OffsetDateTime;

use crate::codec::{self, COLUMN_COUNT, HEADERS};
use crate::entry::FoodEntry;
use crate::errors::StoreError;

pub mod mock;
pub mod sheets;

/// The first data row; row 1 holds the headers.
pub const FIRST_DATA_ROW: usize = 2;

/// A row-major grid of text cells addressed by 1-based row numbers.
pub trait Grid: Send + Sync {
    /// Reads rows `first..=last`, or through the end of the grid when `last` is `None`.
    fn read_rows(
        &self,
        first: usize,
        last: Option<usize>,
    ) -> BoxFuture<'_, Result<Vec<Vec<String>>, StoreError>>;

    /// Reads the first column of every row, starting at row 1.
    fn read_ids(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>>;

    fn write_row(&self, row: usize, values: Vec<String>) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Adds a row after the last non-empty one.
    fn append_row(&self, values: Vec<String>) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Removes a row, shifting the ones below it up.
    fn delete_row(&self, row: usize) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Makes the first `width` cells of row 1 look like headers.
    fn style_header(&self, width: usize) -> BoxFuture<'_, Result<(), StoreError>>;

    fn describe(&self) -> BoxFuture<'_, Result<GridInfo, StoreError>>;
}

/// Builds a grid for the given spreadsheet ID.
pub type Connector = dyn Fn(&str) -> Arc<dyn Grid> + Send + Sync;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GridInfo {
    pub id: String,
    pub title: Option<String>,
}

/// Stores entries as rows of a [`Grid`], one entry per row below a header row.
#[derive(Clone)]
pub struct EntryStore {
    grid: Arc<dyn Grid>,
    logger: Arc<Logger>,
}

impl EntryStore {
    pub fn new(grid: Arc<dyn Grid>, logger: Arc<Logger>) -> Self {
        Self { grid, logger }
    }

    /// Writes the header row if row 1 is empty.
    pub async fn ensure_headers(&self) -> Result<(), StoreError> {
        let first = self.grid.read_rows(1, Some(1)).await?;

        let present = first.first().map(|row| !codec::is_blank(row)).unwrap_or(false);

        if present {
            return Ok(());
        }

        debug!(self.logger, "Writing header row...");
        let headers = HEADERS.iter().map(|h| (*h).to_owned()).collect();
        self.grid.write_row(1, headers).await?;

        // cosmetic only
        if let Err(e) = self.grid.style_header(COLUMN_COUNT).await {
            warn!(self.logger, "Could not style header row"; "error" => %e);
        }

        Ok(())
    }

    /// Adds an entry as a new row. IDs are not checked for duplicates.
    pub async fn append(&self, entry: &FoodEntry) -> Result<(), StoreError> {
        self.ensure_headers().await?;

        trace!(self.logger, "Appending row..."; "id" => &entry.id);
        self.grid
            .append_row(codec::encode(entry, OffsetDateTime::now_utc()))
            .await
    }

    /// Overwrites the row holding the entry with the same ID.
    pub async fn update(&self, entry: &FoodEntry) -> Result<(), StoreError> {
        let row = self.find_row(&entry.id).await?;

        trace!(self.logger, "Overwriting row..."; "id" => &entry.id, "row" => row);
        self.grid
            .write_row(row, codec::encode(entry, OffsetDateTime::now_utc()))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let row = self.find_row(id).await?;

        trace!(self.logger, "Deleting row..."; "id" => id, "row" => row);
        self.grid.delete_row(row).await
    }

    /// Reads every data row in stored order. Blank rows are skipped.
    pub async fn list(&self) -> Result<Vec<FoodEntry>, StoreError> {
        let rows = self.grid.read_rows(FIRST_DATA_ROW, None).await?;

        let entries = rows
            .iter()
            .filter(|row| !codec::is_blank(row))
            .map(|row| codec::decode(row))
            .collect::<Vec<_>>();

        debug!(self.logger, "Listed remote entries"; "rows" => rows.len(), "entries" => entries.len());

        Ok(entries)
    }

    pub async fn test_connection(&self) -> Result<GridInfo, StoreError> {
        self.grid.describe().await
    }

    async fn find_row(&self, id: &str) -> Result<usize, StoreError> {
        let ids = self.grid.read_ids().await?;

        ids.iter()
            .enumerate()
            .skip(FIRST_DATA_ROW - 1)
            .find(|(_, cell)| cell.as_str() == id)
            .map(|(index, _)| index + 1)
            .ok_or_else(|| StoreError::NotFound { id: id.to_owned() })
    }
}
