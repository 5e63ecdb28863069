use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::info;
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, Reply};
use warp::Filter;

use super::response::SuccessResponse;
use crate::environment::Environment;

pub fn make_healthz_route(
    _environment: Environment,
) -> impl warp::Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    warp::path("healthz").and(warp::get()).map(move || {
        json(&SuccessResponse::Healthz {
            revision: info::REVISION,
            timestamp: info::BUILD_TIMESTAMP,
            version: info::VERSION,
        })
    })
}

type TerminationFuture<'a> = BoxFuture<'a, ()>;

pub type TerminationFunctionWrapper<'a> = Arc<dyn Fn() -> TerminationFuture<'a> + Send + Sync + 'a>;

pub fn make_termination_route<'a>(
    environment: Environment,
    terminate: TerminationFunctionWrapper<'a>,
) -> impl warp::Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone + 'a {
    let logger = environment.logger;

    let handler = move || -> BoxFuture<'a, Result<StatusCode, std::convert::Infallible>> {
        let terminate = terminate.clone();
        let logger = logger.clone();

        async move {
            info!(logger, "Termination requested");
            terminate().await;
            Ok(StatusCode::NO_CONTENT)
        }
        .boxed()
    };

    warp::path("terminate").and(warp::post()).and_then(handler)
}
