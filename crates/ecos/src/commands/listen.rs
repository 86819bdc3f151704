//! `ecos listen`: mirror the station and serve the model.

use std::sync::Arc;

use ecos_listener::Listener;

use crate::cli::{GlobalOpts, ListenArgs};
use crate::config;
use crate::error::CliError;

pub async fn handle(args: &ListenArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::resolve(global)?;
    let mut listener_cfg = cfg.to_listener_config()?;

    if args.no_router {
        listener_cfg.router.enabled = false;
    }
    if let Some(port) = args.router_port {
        listener_cfg.router.port = port;
    }
    if args.single_session {
        listener_cfg.feedback_session = false;
    }

    let listener = Arc::new(Listener::new(listener_cfg));
    let router = listener.bind_router().await?;
    if let Some(router) = &router {
        if let Ok(addr) = router.local_addr() {
            if !global.quiet {
                eprintln!("Router listening on ws://{addr}");
            }
        }
    }

    let serving = {
        let listener = Arc::clone(&listener);
        tokio::spawn(async move { listener.serve(router).await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, shutting down");
    listener.shutdown();

    if let Err(e) = serving.await {
        tracing::warn!(error = %e, "Listener task ended abnormally");
    }
    Ok(())
}
