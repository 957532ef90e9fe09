use console::Term;
use tokio_util::sync::CancellationToken;

/// Exit code used when the user force-quits with a second Ctrl+C.
pub(crate) const FORCE_QUIT_EXIT_CODE: i32 = 130;

/// Set up the Ctrl+C handler for graceful shutdown.
///
/// The first Ctrl+C cancels `token`; the running category stops and nothing further starts.
/// A second Ctrl+C exits the process immediately.
pub(crate) fn setup_shutdown_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing current category...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, cancelling sync");
        }

        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            if is_tty {
                eprintln!("Force quit!");
            }
            std::process::exit(FORCE_QUIT_EXIT_CODE);
        }
    });
}
