use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

mod constants;
mod erp;
mod handlers;
mod models;
mod services;
mod utils;

#[cfg(test)]
mod test_support;

use handlers::transfer;
use services::{monitor_sessions, FormSettings, TransferService};

#[derive(Clone)]
pub struct AppState {
    pub transfer_service: TransferService,
    pub static_assets_path: String,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("static_assets_path", &self.static_assets_path)
            .finish()
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub message: String,
    pub timestamp: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ErpStatusResponse {
    pub success: bool,
    pub base_url: String,
    pub open_sessions: usize,
    pub timestamp: String,
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "healthy".to_string(),
        message: "Bin transfer backend is running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: VERSION.to_string(),
    })
}

/// ERP status endpoint - shows which ERP the forms talk to
async fn erp_status(State(state): State<AppState>) -> Json<ErpStatusResponse> {
    Json(ErpStatusResponse {
        success: true,
        base_url: state.transfer_service.erp_base_url().to_string(),
        open_sessions: state.transfer_service.sessions().len().await,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Serve the browser form, falling back to index.html for client-side routes
async fn handle_spa_or_static(State(state): State<AppState>, uri: axum::http::Uri) -> impl IntoResponse {
    let path = uri.path().trim_start_matches('/');

    // Unknown API routes are a plain 404, never the SPA shell
    if path.starts_with("api/") {
        return StatusCode::NOT_FOUND.into_response();
    }

    if path.ends_with(".js")
        || path.ends_with(".css")
        || path.ends_with(".ico")
        || path.ends_with(".png")
        || path.ends_with(".svg")
        || path.ends_with(".json")
    {
        let file_path = format!("{}/{}", state.static_assets_path, path);

        if let Ok(content) = tokio::fs::read(&file_path).await {
            let content_type = match path.split('.').next_back().unwrap_or("") {
                "js" => "application/javascript",
                "css" => "text/css",
                "json" => "application/json",
                "png" => "image/png",
                "svg" => "image/svg+xml",
                "ico" => "image/x-icon",
                _ => "text/plain",
            };

            return ([(header::CONTENT_TYPE, content_type)], content).into_response();
        }
    }

    serve_index_html(&state.static_assets_path).await.into_response()
}

async fn serve_index_html(static_assets_path: &str) -> impl IntoResponse {
    let index_path = format!("{static_assets_path}/index.html");

    match tokio::fs::read_to_string(&index_path).await {
        Ok(content) => Html(content).into_response(),
        Err(e) => {
            warn!("🚨 Failed to read index.html from {}: {}", index_path, e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

fn build_cors(cors_origins: &str) -> anyhow::Result<CorsLayer> {
    let methods = [Method::GET, Method::POST, Method::PATCH, Method::DELETE];

    if cors_origins == "*" {
        if std::env::var("RUST_ENV").unwrap_or_default() == "production" {
            anyhow::bail!("CORS wildcard (*) is not allowed in production. Set CORS_ORIGINS to specific origins.");
        }
        warn!("⚠️ CORS is configured with wildcard (*) - this is only acceptable for development!");
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE]));
    }

    let origins: Vec<axum::http::HeaderValue> = cors_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        anyhow::bail!("No valid CORS origins found in CORS_ORIGINS: {cors_origins}");
    }

    info!("🔒 CORS configured for specific origins: {}", cors_origins);
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE]))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing with environment-based filtering
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "bin_transfer_backend=info,tower_http=warn".to_string()
        } else {
            "bin_transfer_backend=warn,tower_http=error".to_string()
        }
    });

    let subscriber =
        tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::new(log_level));
    if std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("🚀 Starting Bin Transfer Backend v{}", VERSION);

    // Server configuration
    let host = std::env::var("SERVER_HOST")
        .unwrap_or_else(|_| constants::DEFAULT_SERVER_HOST.to_string());
    let port = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(constants::DEFAULT_SERVER_PORT);

    let cors_origins = std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    info!("Server configured to run on {}:{}", host, port);

    let erp_config = erp::ErpConfig::from_env()?;
    let erp_client = erp::ErpClient::new(erp_config)?;

    let settings = FormSettings::from_env()?;
    info!(
        timezone = %settings.timezone,
        require_remark = settings.rules.require_remark,
        session_idle_timeout_secs = settings.session_idle_timeout.as_secs(),
        "Transfer form settings loaded"
    );

    let transfer_service = TransferService::new(erp_client, settings);

    let static_assets_path = match std::env::var("STATIC_ASSETS_PATH") {
        Ok(path) => path,
        Err(_) => {
            let possible_paths = [
                "/app/frontend/dist",
                "../frontend/dist",
                "frontend/dist",
            ];

            let mut selected_path = possible_paths[0].to_string();
            for path in possible_paths {
                if tokio::fs::metadata(path).await.is_ok() {
                    selected_path = path.to_string();
                    break;
                }
            }
            selected_path
        }
    };
    info!("📁 Static assets will be served from: {}", static_assets_path);

    let state = AppState {
        transfer_service: transfer_service.clone(),
        static_assets_path,
    };

    let cors = build_cors(&cors_origins)?;

    let x_content_type_options = tower_http::set_header::SetResponseHeaderLayer::overriding(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    let x_frame_options = tower_http::set_header::SetResponseHeaderLayer::overriding(
        header::X_FRAME_OPTIONS,
        header::HeaderValue::from_static("DENY"),
    );

    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/erp/status", get(erp_status))
        .nest(
            "/api/transfer",
            transfer::create_transfer_routes().with_state(transfer_service.clone()),
        )
        .nest_service(
            "/assets",
            ServeDir::new(format!("{}/assets", state.static_assets_path)),
        )
        .fallback(handle_spa_or_static)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(x_content_type_options)
        .layer(x_frame_options)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&format!("{host}:{port}")).await?;

    info!("🎯 Bin Transfer Server started successfully on http://{}:{}", host, port);
    info!("🔧 API endpoints available at http://{}:{}/api/", host, port);

    // Spawn idle session eviction task
    let sessions = transfer_service.sessions().clone();
    let idle_timeout = transfer_service.settings().session_idle_timeout;
    tokio::spawn(async move {
        monitor_sessions(sessions, idle_timeout).await;
    });

    axum::serve(listener, app).await?;
    Ok(())
}
