//! Lutrin Server - Library Lending System
//!
//! REST API server for catalog, lending and reservation management.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lutrin_server::{
    api,
    config::AppConfig,
    models::User,
    policy::SubscriptionTier,
    services::{users::hash_password, Services},
    storage::Storage,
    store::{NewExemplar, State, Store},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("lutrin_server={},tower_http=debug", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "compact" {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Lutrin Server v{}", env!("CARGO_PKG_VERSION"));

    // Load snapshots, or start from a seeded catalog on first run
    let storage = Arc::new(Storage::new(&config.storage));
    let state = match storage.load()? {
        Some(mut state) => {
            let users: Vec<_> = state.users.values().cloned().collect();
            state.library.reconcile(users.iter());
            tracing::info!(
                titles = state.library.titles.len(),
                users = state.users.len(),
                "Snapshots loaded"
            );
            state
        }
        None => {
            tracing::info!("No snapshots found, seeding demo library");
            seed_state(&config)?
        }
    };

    // Save server address before moving config
    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    // Create store and services
    let store = Arc::new(Store::new(state));
    let services = Services::new(store, Arc::clone(&storage), config.auth.clone());

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    // Build router
    let app = create_router(state.clone());

    // Start server
    let addr = SocketAddr::new(
        server_host.parse().expect("Invalid host address"),
        server_port,
    );

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Persist on clean shutdown
    if let Err(e) = state.services.snapshots.save_all().await {
        tracing::error!(error = %e, "Failed to save snapshots on shutdown");
    } else {
        tracing::info!("Snapshots saved, bye");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

/// Build the first-run state: a small demo catalog plus the bootstrap
/// administrator account when one is configured.
fn seed_state(config: &AppConfig) -> anyhow::Result<State> {
    let mut state = State::new("Lutrin");
    let today = Utc::now().date_naive();

    let seeds = [
        ("978-0452284234", "1984", "George Orwell", Some("dystopia"), None, 2),
        ("978-0140444308", "Les Miserables", "Victor Hugo", Some("classic"), None, 1),
        ("978-0156012195", "The Little Prince", "Antoine de Saint-Exupery", Some("classic"), None, 3),
        ("978-0312944926", "Digital Fortress", "Dan Brown", Some("thriller"), Some("2MB"), 1),
    ];
    for (isbn, title, author, genre, digital_size, copies) in seeds {
        for _ in 0..copies {
            state.library.add_exemplar(NewExemplar {
                title: title.to_string(),
                author: author.to_string(),
                isbn: isbn.to_string(),
                exemplar_id: None,
                genre: genre.map(str::to_string),
                digital_size: digital_size.map(str::to_string),
            })?;
        }
    }

    if let Some(password) = &config.auth.bootstrap_admin_password {
        let hash = hash_password(password)?;
        let admin = User::new("admin", hash, SubscriptionTier::Vip, true, today);
        state.users.insert(admin.username.clone(), admin);
        tracing::info!("Bootstrap admin account created");
    }

    Ok(state)
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Authentication
        .route("/auth/login", post(api::auth::login))
        .route("/auth/me", get(api::auth::me))
        // Titles (catalog)
        .route("/titles", get(api::titles::list_titles))
        .route("/titles", post(api::titles::create_title))
        .route("/titles/:isbn", get(api::titles::get_title))
        .route("/titles/:isbn", delete(api::titles::delete_title))
        .route("/titles/:isbn/exemplars", post(api::titles::create_exemplar))
        .route("/titles/:isbn/status", get(api::titles::status_counts))
        .route("/titles/:isbn/reviews", post(api::titles::create_review))
        // Exemplars
        .route("/exemplars/:id/state", put(api::titles::set_exemplar_state))
        // Users
        .route("/users", get(api::users::list_users))
        .route("/users", post(api::users::create_user))
        .route("/users/:username", get(api::users::get_user))
        .route("/users/:username", delete(api::users::delete_user))
        .route("/users/:username/loans", get(api::users::get_user_loans))
        .route(
            "/users/:username/subscription/renew",
            post(api::users::renew_subscription),
        )
        .route(
            "/users/:username/penalties/pay",
            post(api::users::pay_penalties),
        )
        // Loans
        .route("/loans", post(api::loans::create_loan))
        .route("/loans/return", post(api::loans::return_loan))
        // Reservations
        .route("/reservations", post(api::loans::create_reservation))
        .route("/reservations", delete(api::loans::cancel_reservation))
        // Statistics
        .route("/stats", get(api::stats::get_stats))
        .route("/recommendations", get(api::stats::get_recommendations))
        // Admin
        .route("/admin/save", post(api::admin::save_snapshots))
        .route("/admin/export-csv", post(api::admin::export_csv))
        .with_state(state);

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
