use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures::future::{self, BoxFuture, FutureExt};

use super::{Connector, Grid, GridInfo};
use crate::errors::StoreError;

/// A call made against a [`MemoryGrid`].
#[derive(Clone, Debug, PartialEq)]
pub enum GridCall {
    ReadRows { first: usize, last: Option<usize> },
    ReadIds,
    WriteRow { row: usize, values: Vec<String> },
    AppendRow { values: Vec<String> },
    DeleteRow { row: usize },
    StyleHeader { width: usize },
    Describe,
}

/// A grid held in memory that records every call made against it.
#[derive(Default)]
pub struct MemoryGrid {
    id: String,
    rows: RwLock<Vec<Vec<String>>>,
    calls: RwLock<Vec<GridCall>>,
    failure: RwLock<Option<(u16, String)>>,
    remaining_calls: RwLock<Option<usize>>,
    failing_styling: AtomicBool,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::with_id("memory")
    }

    pub fn with_id(id: impl AsRef<str>) -> Self {
        MemoryGrid {
            id: id.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Makes every subsequent call fail as if the remote store were down.
    pub fn fail_all(&self) {
        self.fail_with(503, "memory grid is unavailable");
    }

    /// Makes every subsequent call fail with the given status and message.
    pub fn fail_with(&self, status: u16, message: impl Into<String>) {
        *write(&self.failure) = Some((status, message.into()));
    }

    /// Lets the next `calls` calls through, then fails every call after them.
    pub fn fail_after(&self, calls: usize) {
        *write(&self.remaining_calls) = Some(calls);
    }

    pub fn recover(&self) {
        *write(&self.failure) = None;
        *write(&self.remaining_calls) = None;
    }

    pub fn fail_styling(&self) {
        self.failing_styling.store(true, Ordering::SeqCst);
    }

    /// Adds a row directly, bypassing the call log.
    pub fn push_raw_row(&self, values: Vec<String>) {
        write(&self.rows).push(values);
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        read(&self.rows).clone()
    }

    /// Every row below the header row.
    pub fn data_rows(&self) -> Vec<Vec<String>> {
        read(&self.rows).iter().skip(1).cloned().collect()
    }

    pub fn calls(&self) -> Vec<GridCall> {
        read(&self.calls).clone()
    }

    /// The values of every append, in call order.
    pub fn appends(&self) -> Vec<Vec<String>> {
        read(&self.calls)
            .iter()
            .filter_map(|call| match call {
                GridCall::AppendRow { values } => Some(values.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: GridCall) -> Result<(), StoreError> {
        write(&self.calls).push(call);

        {
            let mut remaining = write(&self.remaining_calls);
            match *remaining {
                Some(0) => {
                    *remaining = None;
                    self.fail_all();
                }
                Some(n) => *remaining = Some(n - 1),
                None => {}
            }
        }

        match &*read(&self.failure) {
            Some((status, message)) => Err(StoreError::Rejected {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn do_read_rows(&self, first: usize, last: Option<usize>) -> Result<Vec<Vec<String>>, StoreError> {
        self.record(GridCall::ReadRows { first, last })?;

        let rows = read(&self.rows);
        let end = last.unwrap_or(rows.len()).min(rows.len());
        let start = first.saturating_sub(1).min(end);

        Ok(rows[start..end].to_vec())
    }

    fn do_read_ids(&self) -> Result<Vec<String>, StoreError> {
        self.record(GridCall::ReadIds)?;

        Ok(read(&self.rows)
            .iter()
            .map(|row| row.first().cloned().unwrap_or_default())
            .collect())
    }

    fn do_write_row(&self, row: usize, values: Vec<String>) -> Result<(), StoreError> {
        self.record(GridCall::WriteRow { row, values: values.clone() })?;

        let mut rows = write(&self.rows);
        if rows.len() < row {
            rows.resize(row, Vec::new());
        }
        rows[row - 1] = values;

        Ok(())
    }

    fn do_append_row(&self, values: Vec<String>) -> Result<(), StoreError> {
        self.record(GridCall::AppendRow { values: values.clone() })?;

        write(&self.rows).push(values);

        Ok(())
    }

    fn do_delete_row(&self, row: usize) -> Result<(), StoreError> {
        self.record(GridCall::DeleteRow { row })?;

        let mut rows = write(&self.rows);
        if row == 0 || row > rows.len() {
            return Err(StoreError::Rejected {
                status: 400,
                message: format!("row {} is out of range", row),
            });
        }
        rows.remove(row - 1);

        Ok(())
    }

    fn do_style_header(&self, width: usize) -> Result<(), StoreError> {
        self.record(GridCall::StyleHeader { width })?;

        if self.failing_styling.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected {
                status: 400,
                message: "styling is not supported".to_owned(),
            });
        }

        Ok(())
    }

    fn do_describe(&self) -> Result<GridInfo, StoreError> {
        self.record(GridCall::Describe)?;

        Ok(GridInfo {
            id: self.id.clone(),
            title: Some(format!("In-memory grid {}", self.id)),
        })
    }
}

impl Grid for MemoryGrid {
    fn read_rows(
        &self,
        first: usize,
        last: Option<usize>,
    ) -> BoxFuture<'_, Result<Vec<Vec<String>>, StoreError>> {
        future::ready(self.do_read_rows(first, last)).boxed()
    }

    fn read_ids(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        future::ready(self.do_read_ids()).boxed()
    }

    fn write_row(&self, row: usize, values: Vec<String>) -> BoxFuture<'_, Result<(), StoreError>> {
        future::ready(self.do_write_row(row, values)).boxed()
    }

    fn append_row(&self, values: Vec<String>) -> BoxFuture<'_, Result<(), StoreError>> {
        future::ready(self.do_append_row(values)).boxed()
    }

    fn delete_row(&self, row: usize) -> BoxFuture<'_, Result<(), StoreError>> {
        future::ready(self.do_delete_row(row)).boxed()
    }

    fn style_header(&self, width: usize) -> BoxFuture<'_, Result<(), StoreError>> {
        future::ready(self.do_style_header(width)).boxed()
    }

    fn describe(&self) -> BoxFuture<'_, Result<GridInfo, StoreError>> {
        future::ready(self.do_describe()).boxed()
    }
}

/// A connector that hands out the same grid whatever the spreadsheet ID.
pub fn memory_connector(grid: Arc<MemoryGrid>) -> Arc<Connector> {
    Arc::new(move |_: &str| grid.clone() as Arc<dyn Grid>)
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
