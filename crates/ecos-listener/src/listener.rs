// ── Listener ──
//
// Owns the session providers and wires connectors, sessions and the
// router together. The general session tracks the station, locomotives
// and accessories; the feedback session tracks S88 buses on its own
// connection.

use std::sync::Arc;

use ecos_core::{DataProvider, DataProviderMode};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ListenerConfig;
use crate::connector::{ConnectorHandle, ConnectorOptions, spawn_connector};
use crate::error::ListenerError;
use crate::router::{Router, RouterSources};
use crate::session::run_session;

pub struct Listener {
    config: ListenerConfig,
    general: Arc<DataProvider>,
    feedback: Option<Arc<DataProvider>>,
    cancel: CancellationToken,
}

impl Listener {
    pub fn new(config: ListenerConfig) -> Self {
        let (general, feedback) = if config.feedback_session {
            (
                DataProvider::new(DataProviderMode::General),
                Some(Arc::new(DataProvider::new(DataProviderMode::Feedback))),
            )
        } else {
            (DataProvider::new(DataProviderMode::Any), None)
        };

        Self {
            config,
            general: Arc::new(general),
            feedback,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Model of the general session.
    pub fn general(&self) -> &Arc<DataProvider> {
        &self.general
    }

    /// Model of the S88 session, when one runs.
    pub fn feedback(&self) -> Option<&Arc<DataProvider>> {
        self.feedback.as_ref()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop every session and the router.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Bind the router when it is enabled.
    pub async fn bind_router(&self) -> Result<Option<Router>, ListenerError> {
        if !self.config.router.enabled {
            return Ok(None);
        }
        Router::bind(&self.config.router).await.map(Some)
    }

    /// Bind the router, then run until [`shutdown`](Self::shutdown).
    pub async fn run(&self) -> Result<(), ListenerError> {
        let router = self.bind_router().await?;
        self.serve(router).await;
        Ok(())
    }

    /// Run the sessions and, if given, the router until cancelled.
    pub async fn serve(&self, router: Option<Router>) {
        tracing::info!(
            station = %self.config.station_addr(),
            feedback_session = self.feedback.is_some(),
            router = router.is_some(),
            "Listener started"
        );

        let mut tasks = Vec::new();
        let general = self.spawn_session("general", &self.general, &mut tasks);
        if let Some(feedback) = &self.feedback {
            self.spawn_session("feedback", feedback, &mut tasks);
        }

        if let Some(router) = router {
            let sources = RouterSources {
                general: Arc::clone(&self.general),
                feedback: self.feedback.clone(),
                relay: general,
            };
            tasks.push(tokio::spawn(router.serve(sources, self.cancel.child_token())));
        }

        self.cancel.cancelled().await;
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Listener task ended abnormally");
            }
        }
        tracing::info!("Listener stopped");
    }

    fn spawn_session(
        &self,
        name: &str,
        provider: &Arc<DataProvider>,
        tasks: &mut Vec<JoinHandle<()>>,
    ) -> ConnectorHandle {
        let cancel = self.cancel.child_token();
        let (connector, events) =
            spawn_connector(name, ConnectorOptions::from(&self.config), cancel.clone());
        tasks.push(tokio::spawn(run_session(
            Arc::clone(provider),
            connector.clone(),
            events,
            cancel,
        )));
        connector
    }
}
