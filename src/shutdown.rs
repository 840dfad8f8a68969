//! Graceful shutdown on SIGTERM/SIGINT via a shared cancellation token.

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn try_new() -> Result<Self, std::io::Error> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let token = CancellationToken::new();
        let inner = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
            inner.cancel();
        });
        Ok(Shutdown { token })
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}
