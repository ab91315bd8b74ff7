use std::env;
use std::error::Error;
use std::fs;
use std::sync::Arc;

use futures::future::FutureExt;
use log::{error, info, initialize_logger};
use tokio::sync::mpsc;
use warp::Filter;

use petransport::config::{get_variable, parse_variable, Config};
use petransport::db::PgDb;
use petransport::environment::Environment;
use petransport::routes;
use petransport::store::S3Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let store = Arc::new(S3Store::from_env()?);

    fs::create_dir_all(env::temp_dir())?;

    let main_port: u16 = parse_variable("PETRANSPORT_PORT");
    let admin_port: u16 = parse_variable("PETRANSPORT_ADMIN_PORT");

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port);
    let logger = Arc::new(logger);

    info!(logger, "Creating database pool...");
    let connection_string = get_variable("PETRANSPORT_DB_CONNECTION_STRING");
    let pool = sqlx::Pool::connect(&connection_string).await?;
    let db = Arc::new(PgDb::new(pool));

    let config = Config::from_env();
    info!(logger, "Loaded configuration"; "upload_timeout" => ?config.upload_timeout, "max_upload_bytes" => config.max_upload_bytes);

    let environment = Environment::new(logger.clone(), db, store, config);

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate = {
        let logger = logger.clone();

        Arc::new(move || {
            let termination_sender = termination_sender.clone();
            let logger = logger.clone();

            async move {
                if termination_sender.send(()).await.is_err() {
                    error!(logger, "Termination already in progress");
                }
            }
            .boxed()
        })
    };

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

        let logger2 = logger.clone();

        let progress_route = routes::make_progress_route(environment.clone());
        let dashboard_route = routes::make_dashboard_route(environment.clone());
        let upload_route = routes::make_upload_route(environment.clone());
        let cancel_route = routes::make_cancel_route(environment.clone());
        let complete_route = routes::make_complete_route(environment.clone());

        let routes = progress_route
            .or(dashboard_route)
            .or(upload_route)
            .or(cancel_route)
            .or(complete_route)
            .recover(move |r| routes::format_rejection(logger2.clone(), r));

        let (_, main_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let logger2 = logger.clone();

        let routes = routes::admin::make_healthz_route()
            .or(routes::admin::make_termination_route(terminate))
            .or(routes::admin::make_required_documents_route(environment.clone()))
            .or(routes::admin::make_admin_progress_route(environment.clone()))
            .recover(move |r| routes::format_rejection(logger2.clone(), r));

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
