//! Ingest Supervisor (component D).
//!
//! Owns the order-book stream, up to two derivatives venues, and the
//! whale-intent intake, and reports an aggregate health generalized from the
//! teacher's `OrderBookManager::get_health` (ONLINE when everything is up,
//! LIMITED when something is down or stale, OFFLINE when nothing is up).

pub mod derivatives;
pub mod orderbook;
pub mod types;
pub mod whale;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

pub use derivatives::DerivativesVenue;
pub use orderbook::OrderBookIngest;
pub use types::{DerivativesAlert, IngestHealth, OrderBookSnapshot, WhaleIntent};
pub use whale::WhaleIntake;

pub struct IngestSupervisor {
    pub order_book: Arc<OrderBookIngest>,
    pub derivatives: Vec<Arc<DerivativesVenue>>,
    pub whale_intake: WhaleIntake,
    shutdown_tx: watch::Sender<bool>,
}

impl IngestSupervisor {
    pub fn new(
        symbol: &str,
        ws_base_url: &str,
        rest_base_url: &str,
        derivatives_venues: &[(String, String)],
        book_updates_tx: mpsc::Sender<OrderBookSnapshot>,
        derivatives_alerts_tx: mpsc::Sender<DerivativesAlert>,
    ) -> (Self, mpsc::Receiver<WhaleIntent>) {
        let symbol_lower = symbol.to_lowercase();
        let order_book = Arc::new(OrderBookIngest::new(
            symbol.to_string(),
            format!("{ws_base_url}/ws/{symbol_lower}@depth"),
            format!("{rest_base_url}/api/v3/depth?symbol={symbol}&limit=50"),
            book_updates_tx,
        ));

        let derivatives = derivatives_venues
            .iter()
            .take(2)
            .map(|(name, url)| Arc::new(DerivativesVenue::new(name.clone(), url.clone(), derivatives_alerts_tx.clone())))
            .collect();

        let (whale_intake, whale_rx) = WhaleIntake::channel();
        let (shutdown_tx, _) = watch::channel(false);

        (
            Self {
                order_book,
                derivatives,
                whale_intake,
                shutdown_tx,
            },
            whale_rx,
        )
    }

    /// Spawns the supervised tasks for every stream. Each is independent:
    /// one venue's failure never stops another.
    pub fn start(&self) {
        let book = Arc::clone(&self.order_book);
        let rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move { book.run(rx).await });

        for venue in &self.derivatives {
            let venue = Arc::clone(venue);
            let rx = self.shutdown_tx.subscribe();
            tokio::spawn(async move { venue.run(rx).await });
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Aggregate health across every ingest stream.
    pub async fn health(&self) -> IngestHealth {
        let book_health = self.order_book.health().await;
        let mut derivative_healths = Vec::with_capacity(self.derivatives.len());
        for venue in &self.derivatives {
            derivative_healths.push(venue.health().await);
        }

        let all = std::iter::once(book_health).chain(derivative_healths);
        let mut any_online = false;
        let mut any_down = false;
        for h in all {
            match h {
                IngestHealth::Online => any_online = true,
                _ => any_down = true,
            }
        }

        match (any_online, any_down) {
            (true, false) => IngestHealth::Online,
            (true, true) => IngestHealth::Limited,
            (false, _) => IngestHealth::Offline,
        }
    }

    pub async fn per_stream_health(&self) -> Vec<(String, IngestHealth)> {
        let mut out = vec![("order_book".to_string(), self.order_book.health().await)];
        for venue in &self.derivatives {
            out.push((venue.name.clone(), venue.health().await));
        }
        out
    }
}
