//! API server implementation.

use axum::{middleware, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::dto::{
    DeletedResponse, PaginationInfo, RequestDetailResponse, RequestResponse, SampleResponse,
};
use crate::error::ErrorResponse;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::routes::{
    self,
    capabilities::{CapabilityResponse, CreateCapabilityRequest, UpdateCapabilityRequest},
    equipment::{CreateEquipmentRequest, EquipmentResponse, UpdateEquipmentRequest},
    health::{DatabaseHealth, HealthResponse},
    ios::{CreateIoRequest, IoResponse, UpdateIoRequest},
    locations::{CreateLocationRequest, LocationResponse, UpdateLocationRequest},
    requests::{
        SampleInput, SubmitAsrRequest, SubmitErRequest, SubmitNtrRequest, TestMethodSelection,
        UpdateRequestStatusRequest,
    },
    samples::UpdateSampleStatusRequest,
    test_methods::{CreateTestMethodRequest, TestMethodResponse, UpdateTestMethodRequest},
    users::{CreateUserRequest, UpdateUserRequest, UserResponse},
};
use crate::state::AppState;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: SocketAddr,
    /// Requests running longer than this are answered with 408.
    pub request_timeout: Duration,
    /// Serve Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,
    /// Allowed CORS origins; empty allows any.
    pub cors_origins: Vec<String>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            request_timeout: Duration::from_secs(30),
            enable_swagger: true,
            cors_origins: Vec::new(),
        }
    }
}

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health_check,
        routes::health::readiness_check,
        routes::health::liveness_check,
        routes::capabilities::list_capabilities,
        routes::capabilities::get_capability,
        routes::capabilities::create_capability,
        routes::capabilities::update_capability,
        routes::capabilities::delete_capability,
        routes::locations::list_locations,
        routes::locations::get_location,
        routes::locations::create_location,
        routes::locations::update_location,
        routes::locations::delete_location,
        routes::equipment::list_equipment,
        routes::equipment::get_equipment,
        routes::equipment::create_equipment,
        routes::equipment::update_equipment,
        routes::equipment::delete_equipment,
        routes::test_methods::list_test_methods,
        routes::test_methods::get_test_method,
        routes::test_methods::create_test_method,
        routes::test_methods::update_test_method,
        routes::test_methods::delete_test_method,
        routes::users::list_users,
        routes::users::get_user,
        routes::users::create_user,
        routes::users::update_user,
        routes::users::delete_user,
        routes::ios::list_ios,
        routes::ios::get_io,
        routes::ios::create_io,
        routes::ios::update_io,
        routes::ios::delete_io,
        routes::requests::list_requests,
        routes::requests::get_request,
        routes::requests::get_request_by_number,
        routes::requests::submit_ntr,
        routes::requests::submit_asr,
        routes::requests::submit_er,
        routes::requests::update_request_status,
        routes::requests::delete_request,
        routes::samples::list_samples,
        routes::samples::get_sample,
        routes::samples::update_sample_status,
        routes::backup::export_backup,
        routes::backup::restore_backup,
    ),
    components(
        schemas(
            HealthResponse,
            DatabaseHealth,
            ErrorResponse,
            PaginationInfo,
            DeletedResponse,
            CapabilityResponse,
            CreateCapabilityRequest,
            UpdateCapabilityRequest,
            LocationResponse,
            CreateLocationRequest,
            UpdateLocationRequest,
            EquipmentResponse,
            CreateEquipmentRequest,
            UpdateEquipmentRequest,
            TestMethodResponse,
            CreateTestMethodRequest,
            UpdateTestMethodRequest,
            UserResponse,
            CreateUserRequest,
            UpdateUserRequest,
            IoResponse,
            CreateIoRequest,
            UpdateIoRequest,
            RequestResponse,
            RequestDetailResponse,
            SampleResponse,
            SampleInput,
            TestMethodSelection,
            SubmitNtrRequest,
            SubmitAsrRequest,
            SubmitErRequest,
            UpdateRequestStatusRequest,
            UpdateSampleStatusRequest,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Capabilities", description = "Lab capabilities and their run counters"),
        (name = "Locations", description = "Lab locations"),
        (name = "Equipment", description = "Lab equipment"),
        (name = "Test Methods", description = "Test method catalog"),
        (name = "Users", description = "Portal users"),
        (name = "IOs", description = "Internal orders"),
        (name = "Requests", description = "NTR, ASR and ER submission and workflow"),
        (name = "Samples", description = "Testing sample workflow"),
        (name = "Backup", description = "Whole-database export and restore"),
    ),
    info(
        title = "Lab Portal API",
        version = "0.1.0",
        description = "Lab request portal: test requests, analysis requests and equipment reservations",
        license(name = "MIT"),
    )
)]
pub struct ApiDoc;

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(state: AppState, config: ApiServerConfig) -> Self {
        Self { config, state }
    }

    /// Creates a server with the default configuration.
    pub fn with_state(state: AppState) -> Self {
        Self::new(state, ApiServerConfig::default())
    }

    /// Builds the router with all middleware applied.
    pub fn router(&self) -> Router {
        routes::health::init_start_time();

        let mut app = routes::create_router(self.state.clone());

        if self.config.enable_swagger {
            app = app.merge(
                SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
            );
        }

        // Outermost layer last.
        app.layer(middleware::from_fn(security_headers))
            .layer(middleware::from_fn(request_logging))
            .layer(middleware::from_fn(request_id))
            .layer(TimeoutLayer::new(self.config.request_timeout))
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&self.config.cors_origins))
            .layer(CatchPanicLayer::new())
    }

    /// Serves until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<(), std::io::Error> {
        self.run_until(shutdown_signal()).await
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let addr = self.config.bind_address;

        let listener = TcpListener::bind(addr).await?;
        info!(address = %addr, "Lab portal API listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API server shut down gracefully");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
