//! Ctrl-C handling.
//!
//! The first Ctrl-C cancels the process-wide token so bounded waits return
//! `Cancelled`. A second one exits immediately, which also covers the
//! blocking console read of the manual sign-in flow.

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

pub fn install(rt: &Runtime) -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();

    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("could not listen for Ctrl-C");
            return;
        }
        tracing::debug!("interrupt received");
        on_interrupt.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    cancel
}
