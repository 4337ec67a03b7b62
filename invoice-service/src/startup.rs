use crate::config::InvoiceConfig;
use crate::handlers;
use crate::services::Database;
use axum::{
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use std::future::IntoFuture;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: InvoiceConfig,
    pub db: Database,
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: InvoiceConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to PostgreSQL: {}", e);
            e
        })?;
        db.run_migrations().await.map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;

        let state = AppState {
            config: config.clone(),
            db: db.clone(),
        };

        let app = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics_endpoint))
            .route("/invoices", post(handlers::ingest_invoice))
            .route("/invoices/:invoice_id", get(handlers::get_invoice))
            .route(
                "/invoices/:invoice_id/allocations",
                put(handlers::replace_allocations),
            )
            .route(
                "/invoices/:invoice_id/reconcile",
                post(handlers::reconcile_invoice),
            )
            .route("/suppliers/resolve", post(handlers::resolve_supplier))
            .route("/suppliers/:supplier_id", get(handlers::get_supplier))
            .layer(TraceLayer::new_for_http())
            .with_state(state.clone());

        let addr = config.common.bind_address();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
