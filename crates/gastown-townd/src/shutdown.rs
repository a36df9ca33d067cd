//! Shutdown signal handling, ported from the coordination layer's own
//! graceful-shutdown wait.

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).ok();
    let mut sigint = signal(SignalKind::interrupt()).ok();

    tokio::select! {
        () = async {
            if let Some(ref mut sig) = sigterm {
                sig.recv().await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            tracing::info!("received SIGTERM, initiating graceful shutdown");
        }
        () = async {
            if let Some(ref mut sig) = sigint {
                sig.recv().await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            tracing::info!("received SIGINT, initiating graceful shutdown");
        }
    }
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("received ctrl-c, initiating graceful shutdown");
}
