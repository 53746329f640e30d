use std::sync::Arc;

use meter_tracker::{
    config::AppConfig,
    routes::build_router,
    services::{
        auth::AuthService, gis::GisService, meter_service::MeterService,
        meter_store::SeaOrmMeterStore, pdf::PdfService, photo_storage::ImageKitPhotoStorage,
        user_service::{UserService, UserServiceError},
        user_store::SeaOrmUserStore,
    },
    AppState,
};
use mockable::{Clock, DefaultClock};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,meter_tracker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(DefaultClock);

    let users = UserService::new(
        Arc::new(SeaOrmUserStore::new(db.clone())),
        clock.clone(),
        config.local_offset,
        config.default_password.clone(),
    )
    .with_admin_password(config.default_admin_password.clone());
    match users.ensure_admin().await {
        Ok(_) => {}
        // retried on every login until DEFAULT_ADMIN_PASSWORD is set
        Err(UserServiceError::BootstrapUnavailable) => {
            tracing::warn!("No users exist and DEFAULT_ADMIN_PASSWORD is not set, logins will be refused")
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to bootstrap admin account");
            std::process::exit(1);
        }
    }

    let photos = ImageKitPhotoStorage::new(
        config.imagekit_token.clone(),
        config.imagekit_upload_url.clone(),
        config.imagekit_api_url.clone(),
    );
    let meters = MeterService::new(
        Arc::new(SeaOrmMeterStore::new(db.clone())),
        Arc::new(photos),
        clock.clone(),
        config.local_offset,
    );

    let state = AppState {
        meters,
        auth: AuthService::new(users.clone()),
        users,
        gis: GisService::new(config.gis_query_url.clone(), config.gis_root_url.clone()),
        pdf: PdfService::new(config.pdf_service_url.clone()),
        clock,
        local_offset: config.local_offset,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind address");

    tracing::info!(
        "Server listening on {}",
        listener.local_addr().map(|a| a.to_string()).unwrap_or_default()
    );

    axum::serve(listener, app).await.expect("Server error");
}
