use console::Term;

/// Resolve once the user asks the process to stop (Ctrl+C).
///
/// If the signal handler cannot be installed the future never resolves, so
/// the server keeps running rather than exiting immediately.
pub(crate) async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }

    if Term::stdout().is_term() {
        eprintln!("\n\nShutdown requested, finishing in-flight requests...");
    } else {
        tracing::warn!("Shutdown requested, finishing in-flight requests");
    }
}
