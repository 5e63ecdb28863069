use std::time::{Duration, Instant};

use log::debug;
use time::OffsetDateTime;
use warp::{
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::analytics::Analytics;
use crate::diary::SettingsUpdate;
use crate::entry::{FoodEntry, NewEntry};
use crate::environment::Environment;
use crate::errors::DiaryError;
use crate::export::{export_filename, rows_to_csv, sheet_rows, to_csv};
use crate::reference::{COMPLAINT_TYPES, MEAL_LABELS, SEVERITY_LEVELS};
use crate::routes::{
    query::{ExportFormat, ExportQuery, ListQuery},
    rejection::{Context, Rejection},
    response::SuccessResponse,
};

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($expression:stmt);+) => {
        let start = Instant::now();

        let result = { $($expression)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    };
}

pub async fn list(environment: Environment, query: ListQuery) -> RouteResult {
    timed! {
        let entries = environment.diary.entries().await;
        debug!(environment.logger, "Listing entries..."; "total" => entries.len(), "query" => ?query);

        json(&query.apply(&entries, today()))
    }
}

pub async fn create(environment: Environment, new_entry: NewEntry) -> RouteResult {
    timed! {
        let (entry, remote) = environment
            .diary
            .add(new_entry)
            .await
            .map_err(|e: DiaryError| Rejection::new(Context::create(), e))?;

        with_status(json(&SuccessResponse::Entry { entry, remote }), StatusCode::CREATED)
    }
}

pub async fn edit(environment: Environment, id: String, entry: FoodEntry) -> RouteResult {
    timed! {
        let error_handler = |e: DiaryError| Rejection::new(Context::edit(id.clone()), e);

        if entry.id != id {
            return Err(error_handler(DiaryError::BadRequest(format!(
                "entry ID {} does not match path ID {}",
                entry.id, id
            )))
            .into());
        };

        let (entry, remote) = environment.diary.edit(entry).await.map_err(error_handler)?;

        json(&SuccessResponse::Entry { entry, remote })
    }
}

pub async fn delete_entry(environment: Environment, id: String) -> RouteResult {
    timed! {
        let remote = environment
            .diary
            .delete(&id)
            .await
            .map_err(|e| Rejection::new(Context::delete(id.clone()), e))?;

        json(&SuccessResponse::Deleted { id, remote })
    }
}

pub async fn sync(environment: Environment) -> RouteResult {
    timed! {
        let reconciliation = environment
            .diary
            .sync()
            .await
            .map_err(|e| Rejection::new(Context::sync(), e))?;

        json(&reconciliation)
    }
}

pub async fn analytics(environment: Environment) -> RouteResult {
    timed! {
        let entries = environment.diary.entries().await;

        json(&Analytics::compute(&entries, today()))
    }
}

pub async fn export(environment: Environment, query: ExportQuery) -> RouteResult {
    timed! {
        let entries = environment.diary.entries().await;

        let csv = match query.format {
            ExportFormat::Diary => to_csv(&entries),
            ExportFormat::Sheet => rows_to_csv(&sheet_rows(&entries, OffsetDateTime::now_utc())),
        };

        let disposition = format!("attachment; filename=\"{}\"", export_filename(today()));

        with_header(
            with_header(csv, "content-type", mime::TEXT_CSV_UTF_8.as_ref()),
            "content-disposition",
            disposition,
        )
    }
}

pub async fn settings(environment: Environment) -> RouteResult {
    timed! {
        json(&environment.diary.settings())
    }
}

pub async fn update_settings(environment: Environment, update: SettingsUpdate) -> RouteResult {
    timed! {
        let settings = environment
            .diary
            .update_settings(update)
            .await
            .map_err(|e| Rejection::new(Context::update_settings(), e))?;

        json(&settings)
    }
}

pub async fn connection(environment: Environment) -> RouteResult {
    timed! {
        json(&environment.diary.test_connection().await)
    }
}

pub async fn complaint_types(_environment: Environment) -> RouteResult {
    timed! {
        json(&COMPLAINT_TYPES)
    }
}

pub async fn severity_levels(_environment: Environment) -> RouteResult {
    timed! {
        json(&SEVERITY_LEVELS)
    }
}

pub async fn meal_types(_environment: Environment) -> RouteResult {
    timed! {
        json(&MEAL_LABELS)
    }
}

fn today() -> time::Date {
    OffsetDateTime::now_utc().date()
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}
