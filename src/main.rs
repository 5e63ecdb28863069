use std::error::Error;
use std::sync::Arc;

use futures::future::FutureExt;
use tokio::sync::mpsc;
use warp::Filter;

use food_diary::cache::{FileStore, LocalCache};
use food_diary::config::{get_optional_variable, get_variable};
use food_diary::diary::{Diary, Remote};
use food_diary::environment::Environment;
use food_diary::errors::StoreError;
use food_diary::routes;
use food_diary::store::sheets::{make_connector, Endpoints, ServiceAccount, SheetsClient};
use log::{info, initialize_logger, warn, Logger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let main_port: u16 = get_variable("FOOD_DIARY_PORT")
        .parse()
        .expect("parse FOOD_DIARY_PORT as u16");
    let admin_port: u16 = get_variable("FOOD_DIARY_ADMIN_PORT")
        .parse()
        .expect("parse FOOD_DIARY_ADMIN_PORT as u16");
    let cache_path = get_variable("FOOD_DIARY_CACHE_PATH");

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port, "cache_path" => &cache_path);
    let logger = Arc::new(logger);

    let store = FileStore::open(&cache_path).expect("open local cache at FOOD_DIARY_CACHE_PATH");
    let cache = LocalCache::new(Arc::new(store), logger.clone());

    let spreadsheet_id = get_optional_variable("GOOGLE_SPREADSHEET_ID");
    let mut diary = Diary::new(logger.clone(), cache).with_default_spreadsheet_id(spreadsheet_id);

    match make_remote(logger.clone()) {
        Ok(remote) => diary = diary.with_remote(remote),
        Err(e) => warn!(logger, "Remote sync is unavailable"; "error" => %e),
    }

    let diary = Arc::new(diary);
    diary.load().await;

    let environment = Environment::new(logger.clone(), diary);

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate = Arc::new(move || {
        let termination_sender = termination_sender.clone();

        async move {
            // the receiver only goes away once shutdown is under way
            termination_sender.send(()).await.ok();
        }
        .boxed()
    });

    let should_terminate = async move {
        termination_receiver.recv().await;
    }
    .shared();

    let ctrlc = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let signal = tokio::signal::ctrl_c();

        async move {
            tokio::select! {
                _ = should_terminate => {},
                _ = signal => {
                    terminate().await;
                }
            }
        }
    };

    let main_server = {
        let should_terminate = should_terminate.clone();

        let routes = routes::make_api(environment.clone());

        let (_, main_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let routes = routes::admin::make_healthz_route(environment.clone()).or(
            routes::admin::make_termination_route(environment.clone(), terminate),
        );

        let (_, admin_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), async {
                should_terminate.await;
            });

        admin_server
    };

    tokio::join!(ctrlc, main_server, admin_server);

    info!(logger, "Exiting gracefully...");

    Ok(())
}

fn make_remote(logger: Arc<Logger>) -> Result<Remote, StoreError> {
    let account = ServiceAccount::from_env()?;
    let service_account = account.client_email().to_owned();
    let client = SheetsClient::new(logger, account, Endpoints::from_env()?)?;

    Ok(Remote::new(make_connector(Arc::new(client)), Some(service_account)))
}
