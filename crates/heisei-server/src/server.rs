//! Process bootstrap: logging, wiring, serving, and graceful shutdown.

use crate::api::{self, AppState};
use crate::config::ServerConfig;
use crate::lifecycle::ShutdownSignal;
use crate::limiter::{ReclaimerHandle, VisitorLimiter};
use crate::seed::seed_default_categories;
use crate::services::ForumServices;
use anyhow::Result;
use heisei_core::{Clock, ForumStorage, SystemClock};
use heisei_store::MemoryStorage;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber; `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// A wired application: router state, the drain signal, and the reclaimer
pub struct Application {
    state: AppState,
    shutdown: ShutdownSignal,
    reclaimer: ReclaimerHandle,
}

impl Application {
    /// Wire services, limiter, and the idle-visitor reclaimer over `storage`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build(
        config: &ServerConfig,
        storage: Arc<dyn ForumStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let shutdown = ShutdownSignal::new();
        let limiter = Arc::new(VisitorLimiter::new(config.limiter.clone(), clock.clone()));
        let reclaimer = limiter.spawn_reclaimer(&shutdown);

        let state = AppState {
            services: Arc::new(ForumServices::new(storage, clock)),
            limiter,
            shutdown: shutdown.token(),
            request_timeout: config.request_timeout(),
        };
        Self {
            state,
            shutdown,
            reclaimer,
        }
    }

    /// Router state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Drain signal handed to requests and the reclaimer
    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Serve on `listener` until `signal` resolves, then drain.
    ///
    /// The drain signal fires as soon as `signal` resolves, before the listener
    /// waits for open connections, so writes still in flight roll back and
    /// answer `503 cancelled` instead of committing during shutdown.
    pub async fn serve<S>(self, listener: TcpListener, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let router = api::router(self.state.clone());
        let draining = self.shutdown.clone();
        let served = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            signal.await;
            draining.trigger();
        })
        .await;

        self.shutdown.trigger();
        self.reclaimer.stop().await;
        if let Err(err) = &served {
            error!(error = %err, "Server stopped with error");
        }
        served?;
        info!("Server exited properly");
        Ok(())
    }
}

/// Run the server until SIGINT or SIGTERM.
pub async fn run(config: ServerConfig, seed: bool) -> Result<()> {
    let storage: Arc<dyn ForumStorage> = Arc::new(MemoryStorage::new());
    let app = Application::build(&config, storage, Arc::new(SystemClock));

    if seed {
        seed_default_categories(&app.state.services.categories).await?;
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Server starting");

    app.serve(listener, termination_signal()).await
}

async fn termination_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(err) => error!(error = %err, "Failed to listen for Ctrl+C"),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
