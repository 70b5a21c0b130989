use std::{process, sync::Arc};

use scatto::{
    application::{error::AppError, photos::PhotoService, repos::UserStore},
    cache::ResponseCache,
    config,
    infra::{
        db::PostgresStore,
        error::InfraError,
        http::{self, AppState},
        media::{CleanupQueue, MediaStorage},
        telemetry,
    },
    notify::Notifier,
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(%error, "scatto exited with an error");
    } else {
        // Startup can fail before the subscriber is installed; log
        // through a throwaway one so the cause still reaches stderr.
        let fallback = Dispatch::new(tracing_fmt().with_max_level(Level::ERROR).finish());
        dispatcher::with_default(&fallback, || error!(%error, "scatto exited with an error"));
    }
}

async fn run() -> Result<(), AppError> {
    let (_cli, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresStore::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    PostgresStore::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    let store = Arc::new(PostgresStore::new(pool));

    let media = Arc::new(
        MediaStorage::new(settings.media.directory.clone()).map_err(InfraError::Io)?,
    );
    let (cleanup, cleanup_worker) = CleanupQueue::start(
        media.clone(),
        settings.media.cleanup_queue_depth.get() as usize,
    );

    let cache = Arc::new(ResponseCache::new());
    let notifier = Arc::new(Notifier::new(
        settings.stream.subscriber_buffer.get() as usize,
    ));

    let photos = Arc::new(PhotoService::new(
        store.clone(),
        cache,
        notifier.clone(),
        cleanup.clone(),
    ));

    let state = AppState {
        photos,
        users: store.clone() as Arc<dyn UserStore>,
        notifier: notifier.clone(),
        media,
        cleanup: cleanup.clone(),
        upload_limit_bytes: settings.media.max_request_bytes.get() as usize,
    };

    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "scatto listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    // Stop the live feed, then let the cleanup worker drain its queue.
    // The server (and with it the state's queue handles) is gone by now,
    // so dropping ours closes the channel.
    notifier.shutdown();
    drop(cleanup);
    if tokio::time::timeout(settings.server.graceful_shutdown, cleanup_worker)
        .await
        .is_err()
    {
        error!("cleanup worker did not drain before shutdown deadline");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
}
