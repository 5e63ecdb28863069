use std::sync::Arc;

use log::{error, Logger};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, WithStatus};

use crate::errors::{DiaryError, StoreError};

pub mod admin;
mod handlers;
mod query;
mod rejection;
mod response;

pub use internal::*;

/// Entries are small; anything larger than this is not a diary entry.
const MAX_CONTENT_LENGTH: u64 = 64 * 1024;

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        error!(logger, "Diary error"; "context" => ?r.context, "error" => ?r.error, "status" => %status_code_for(e), "message" => %r.error);
        let flattened = r.flatten();

        return Ok(with_status(json(&flattened), status_code_for(e)));
    }

    Err(rej)
}

fn status_code_for(e: &DiaryError) -> StatusCode {
    use DiaryError::*;

    match e {
        MissingField { .. } | BadRequest(..) | SyncDisabled => StatusCode::BAD_REQUEST,
        DuplicateEntry { .. } => StatusCode::CONFLICT,
        UnknownEntry { .. } => StatusCode::NOT_FOUND,
        Store(StoreError::MissingConfiguration { .. }) | Store(StoreError::InvalidConfiguration { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        Store(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

mod internal {
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{body, delete, get as g, path as p, path::param as par, post, put, query};

    use super::{handlers, query as q, MAX_CONTENT_LENGTH};
    use crate::environment::Environment;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
    ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
    ($route_variable:ident; $first:expr, $($rest:expr),+) => (
        let $route_variable = $route_variable.and($first);
        route_filter!($route_variable; $($rest),+);
    )
}

    macro_rules! route {
    ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
        pub fn $name(environment: Environment) -> Route {
            let $route_variable = warp::any()
                .map(move || environment.clone());

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    route!(make_list_route => list, rt; p("entries"), end(), g(), query::<q::ListQuery>());
    route!(make_create_route => create, rt; p("entries"), end(), post(), body::content_length_limit(MAX_CONTENT_LENGTH), body::json());
    route!(make_edit_route => edit, rt; p("entries"), par::<String>(), end(), put(), body::content_length_limit(MAX_CONTENT_LENGTH), body::json());
    route!(make_delete_route => delete_entry, rt; p("entries"), par::<String>(), end(), delete());
    route!(make_sync_route => sync, rt; p("sync"), end(), post());
    route!(make_analytics_route => analytics, rt; p("analytics"), end(), g());
    route!(make_export_route => export, rt; p("export"), end(), g(), query::<q::ExportQuery>());
    route!(make_settings_route => settings, rt; p("settings"), end(), g());
    route!(make_update_settings_route => update_settings, rt; p("settings"), end(), put(), body::content_length_limit(MAX_CONTENT_LENGTH), body::json());
    route!(make_connection_route => connection, rt; p("connection"), end(), g());
    route!(make_complaint_types_route => complaint_types, rt; p("complaint-types"), end(), g());
    route!(make_severity_levels_route => severity_levels, rt; p("severity-levels"), end(), g());
    route!(make_meal_types_route => meal_types, rt; p("meal-types"), end(), g());

    /// Every main-server route, with errors rendered as JSON.
    pub fn make_api(environment: Environment) -> BoxedFilter<(Box<dyn Reply>,)> {
        let logger = environment.logger.clone();

        make_list_route(environment.clone())
            .or(make_create_route(environment.clone()))
            .unify()
            .or(make_edit_route(environment.clone()))
            .unify()
            .or(make_delete_route(environment.clone()))
            .unify()
            .or(make_sync_route(environment.clone()))
            .unify()
            .or(make_analytics_route(environment.clone()))
            .unify()
            .or(make_export_route(environment.clone()))
            .unify()
            .or(make_settings_route(environment.clone()))
            .unify()
            .or(make_update_settings_route(environment.clone()))
            .unify()
            .or(make_connection_route(environment.clone()))
            .unify()
            .or(make_complaint_types_route(environment.clone()))
            .unify()
            .or(make_severity_levels_route(environment.clone()))
            .unify()
            .or(make_meal_types_route(environment))
            .unify()
            .recover(move |r| super::format_rejection(logger.clone(), r))
            .map(|reply| Box::new(reply) as Box<dyn Reply>)
            .boxed()
    }
}
