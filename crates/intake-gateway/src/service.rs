//! Intake service: wiring and HTTP server lifecycle.

use crate::adapters::HttpDeliveryClient;
use crate::domain::config::{GatewayConfig, StoreBackend};
use crate::domain::error::GatewayError;
use crate::middleware::{IntakeMetrics, RateLimitLayer, TracingLayer};
use crate::routes::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use intake_core::adapters::{
    ConfirmationRenderer, InMemoryStore, LoggingBillingHandler, UnconfiguredDeliveryClient,
};
use intake_core::domain::{
    EnrollmentSequencer, EnrollmentService, EventDispatcher, NotificationTrigger, RateLimiter,
    Scope, SignatureVerifier,
};
use intake_core::ports::{
    BillingHandler, DeliveryClient, MessageRenderer, SharedStore, SystemTimeSource, TimeSource,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

/// Collaborators injected into the pipeline.
pub struct Collaborators {
    pub clock: Arc<dyn TimeSource>,
    pub billing: Arc<dyn BillingHandler>,
    pub renderer: Arc<dyn MessageRenderer>,
    pub delivery: Arc<dyn DeliveryClient>,
}

impl Collaborators {
    /// Production collaborators for `config`.
    ///
    /// Without a mail API key the delivery client fails every send, so
    /// confirmations are counted as failed but enrollment still succeeds.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let notification = &config.notification;
        let delivery: Arc<dyn DeliveryClient> = match &notification.api_key {
            Some(key) if !key.is_empty() => Arc::new(
                HttpDeliveryClient::new(
                    notification.api_url.clone(),
                    key.clone(),
                    notification.from.clone(),
                    notification.timeout,
                )
                .map_err(|e| GatewayError::Config(e.to_string()))?,
            ),
            _ => {
                if notification.enabled {
                    warn!("MAIL_API_KEY not set, confirmation emails will fail");
                }
                Arc::new(UnconfiguredDeliveryClient)
            }
        };

        Ok(Self {
            clock: Arc::new(SystemTimeSource),
            billing: Arc::new(LoggingBillingHandler),
            renderer: Arc::new(ConfirmationRenderer::new(notification.project_name.clone())),
            delivery,
        })
    }
}

/// Intake service state
pub struct IntakeService {
    config: GatewayConfig,
    state: AppState,
    limiter: Arc<RateLimiter>,
}

impl IntakeService {
    /// Create the service with the store and collaborators named by `config`.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;
        let collaborators = Collaborators::from_config(&config)?;

        match config.store.backend {
            StoreBackend::Memory => {
                warn!("Using in-memory store; state is lost on restart and not shared between processes");
                Self::with_store(config, Arc::new(InMemoryStore::new()), collaborators)
            }
            StoreBackend::RocksDb => Self::open_rocksdb(config, collaborators),
        }
    }

    #[cfg(feature = "rocksdb")]
    fn open_rocksdb(config: GatewayConfig, collaborators: Collaborators) -> Result<Self, GatewayError> {
        use intake_core::adapters::{RocksDbConfig, RocksDbStore};

        let store = RocksDbStore::open(RocksDbConfig {
            path: config.store.path.clone(),
            ..RocksDbConfig::default()
        })
        .map_err(|e| GatewayError::Store(e.to_string()))?;
        Self::with_store(config, Arc::new(store), collaborators)
    }

    #[cfg(not(feature = "rocksdb"))]
    fn open_rocksdb(_config: GatewayConfig, _collaborators: Collaborators) -> Result<Self, GatewayError> {
        Err(GatewayError::Config(
            "rocksdb backend requires the `rocksdb` feature".into(),
        ))
    }

    /// Create the service over an explicit store.
    pub fn with_store<S>(
        config: GatewayConfig,
        store: Arc<S>,
        collaborators: Collaborators,
    ) -> Result<Self, GatewayError>
    where
        S: SharedStore + 'static,
    {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let Collaborators {
            clock,
            billing,
            renderer,
            delivery,
        } = collaborators;
        let timeout = config.store.timeout;

        let limiter = Arc::new(
            RateLimiter::new(store.clone(), Arc::clone(&clock), config.policies(), timeout)
                .with_enabled(config.rate_limit.enabled),
        );
        if !config.rate_limit.enabled {
            warn!("Rate limiting is disabled");
        }

        let verifier = SignatureVerifier::new(
            config.webhook.secret.clone(),
            config.webhook.tolerance,
            Arc::clone(&clock),
        );
        if !verifier.is_configured() {
            warn!("PAYMENT_WEBHOOK_SECRET not set, every webhook will be rejected");
        }

        let enrollment = EnrollmentService::new(
            EnrollmentSequencer::new(store.clone(), Arc::clone(&clock), timeout),
            NotificationTrigger::new(
                renderer,
                delivery,
                config.notification.enabled,
                config.notification.timeout,
            ),
        );

        let dispatcher = EventDispatcher::new(store, billing, clock, timeout);

        let state = AppState {
            enrollment: Arc::new(enrollment),
            verifier: Arc::new(verifier),
            dispatcher: Arc::new(dispatcher),
            metrics: Arc::new(IntakeMetrics::new()),
        };

        Ok(Self {
            config,
            state,
            limiter,
        })
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        let metrics = Arc::clone(&self.state.metrics);
        let limited = |scope: Scope| {
            RateLimitLayer::new(Arc::clone(&self.limiter), scope, Arc::clone(&metrics))
        };

        Router::new()
            .route(
                routes::ENROLL_PATH,
                post(routes::enroll::enroll).route_layer(limited(Scope::Notification)),
            )
            .route(
                routes::WEBHOOK_PATH,
                post(routes::webhooks::payment_events).route_layer(limited(Scope::General)),
            )
            .route(routes::HEALTH_PATH, get(routes::health::health_check))
            .route(routes::METRICS_PATH, get(routes::health::metrics))
            .layer(RequestBodyLimitLayer::new(self.config.http.max_body_bytes))
            .layer(TracingLayer::new(Arc::clone(&metrics)))
            .with_state(self.state.clone())
    }

    /// Serve on the configured address until ctrl-c.
    pub async fn start(&self) -> Result<(), GatewayError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Serve on the configured address until `shutdown` resolves, then drain
    /// in-flight requests.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.http.addr;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    pub async fn serve<F>(
        &self,
        listener: tokio::net::TcpListener,
        shutdown: F,
    ) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;
        info!(addr = %local_addr, "Starting HTTP server");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server error");
                GatewayError::Internal(e.to_string())
            })?;

        info!("Intake service stopped");
        Ok(())
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<IntakeMetrics> {
        Arc::clone(&self.state.metrics)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
