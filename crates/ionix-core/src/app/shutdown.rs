//! Shutdown - 消費ループの停止要求
//!
//! A `tokio::sync::watch` flag. Loops check it before pulling the next element
//! (stream mode) or starting the next `poll` (poll-loop mode). A dispatch in
//! progress always runs to completion.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Ask every loop watching this signal to stop. Stays set until `reset`.
    pub fn request(&self) {
        // send_replace works even when no receiver is alive
        self.tx.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Clear a request. Called when a consume run ends, so the next run starts fresh.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // sender gone: nobody can request shutdown any more
                std::future::pending::<()>().await;
            }
        }
    }
}
