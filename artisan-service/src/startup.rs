use crate::config::{ArtisanConfig, CatalogBackend, CatalogConfig, GenaiConfig};
use crate::handlers;
use crate::services::providers::{GeminiConfig, GeminiTextProvider, TextProvider};
use crate::services::{
    CatalogStore, ImageEnhancer, InMemoryCatalog, LocalStorage, MongoCatalog, PhotoEnhancer,
    Storage, Storyteller,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware::from_fn,
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, services::ServeDir,
    set_header::SetResponseHeader, trace::TraceLayer,
};

/// Room for the non-file multipart fields on top of the upload ceiling.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Media responses never run scripts or load subresources.
const STATIC_CSP: &str = "default-src 'none'; sandbox";

#[derive(Clone)]
pub struct AppState {
    pub config: ArtisanConfig,
    pub catalog: Arc<dyn CatalogStore>,
    /// Enhanced images, served under `/static`.
    pub storage: Arc<dyn Storage>,
    /// Raw uploads, never served.
    pub originals: Arc<dyn Storage>,
    pub enhancer: Arc<dyn ImageEnhancer>,
    pub storyteller: Storyteller,
}

impl AppState {
    pub fn backend_origin(&self) -> Option<&str> {
        self.config.public.backend_origin.as_deref()
    }
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    pub async fn build(config: ArtisanConfig) -> Result<Self, AppError> {
        let provider = text_provider(&config.genai);
        Self::build_with_provider(config, provider).await
    }

    /// Build with an explicit GenAI provider; `None` runs on fallbacks only.
    pub async fn build_with_provider(
        config: ArtisanConfig,
        provider: Option<Arc<dyn TextProvider>>,
    ) -> Result<Self, AppError> {
        let catalog = catalog_store(&config.catalog).await?;

        if config.media.originals_dir.starts_with(&config.media.dir) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ORIGINALS_DIR {} must not be inside the served MEDIA_DIR {}",
                config.media.originals_dir.display(),
                config.media.dir.display()
            )));
        }
        let storage = media_storage(&config.media.dir).await?;
        let originals = media_storage(&config.media.originals_dir).await?;

        let state = AppState {
            storyteller: Storyteller::new(provider, config.genai.strict),
            config: config.clone(),
            catalog,
            storage,
            originals,
            enhancer: Arc::new(PhotoEnhancer::new()),
        };

        let router = router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            router,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.media.max_upload_bytes + FORM_OVERHEAD_BYTES;
    let static_files = SetResponseHeader::overriding(
        ServeDir::new(&state.config.media.dir),
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(STATIC_CSP),
    );

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/check-gemini", get(handlers::check_gemini))
        .route("/register_artisan", post(handlers::register_artisan))
        .route(
            "/artisan/:id",
            get(handlers::get_artisan).put(handlers::update_artisan),
        )
        .route("/find_artisan", get(handlers::find_artisan))
        .route("/upload_product", post(handlers::upload_product))
        .route(
            "/product/:id",
            put(handlers::update_product).delete(handlers::delete_product),
        )
        .route("/search", get(handlers::search))
        .route("/image/:product_id", get(handlers::get_image))
        .route("/story/questions", get(handlers::story_questions))
        .route("/story/generate", post(handlers::generate_story))
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CorsLayer::permissive())
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Gemini provider when a key is configured.
pub fn text_provider(config: &GenaiConfig) -> Option<Arc<dyn TextProvider>> {
    let Some(api_key) = config.api_key.clone().filter(|_| config.key_present()) else {
        tracing::warn!("GenAI API key not configured; artisan bios will use the raw text");
        return None;
    };

    match GeminiTextProvider::new(GeminiConfig {
        api_key,
        model: config.text_model.clone(),
        base_url: config.base_url.clone(),
        timeout: Duration::from_secs(config.timeout_secs),
    }) {
        Ok(provider) => {
            tracing::info!(model = %config.text_model, "Gemini provider initialized");
            Some(Arc::new(provider))
        }
        Err(e) => {
            tracing::error!("Failed to initialize Gemini provider: {}", e);
            None
        }
    }
}

async fn media_storage(dir: &std::path::Path) -> Result<Arc<dyn Storage>, AppError> {
    let storage = LocalStorage::new(dir).await.map_err(|e| {
        tracing::error!("Failed to initialize media directory {}: {}", dir.display(), e);
        e
    })?;
    Ok(Arc::new(storage))
}

async fn catalog_store(config: &CatalogConfig) -> Result<Arc<dyn CatalogStore>, AppError> {
    match config.backend {
        CatalogBackend::Mongo => {
            let mongo = config.mongodb.as_ref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("MongoDB settings missing for mongodb backend"))
            })?;
            let catalog = MongoCatalog::connect(&mongo.uri, &mongo.database).await?;
            catalog.initialize_indexes().await.map_err(|e| {
                tracing::error!("Failed to initialize database indexes: {}", e);
                e
            })?;
            Ok(Arc::new(catalog))
        }
        CatalogBackend::Memory => {
            tracing::warn!("Using in-memory catalog; data is lost on restart");
            Ok(Arc::new(InMemoryCatalog::new()))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
