//! Shared handler state, cloned per request.

use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    CheckInCoordinator, IssuanceService, OrderService, ScannerAuth, TokenCodec,
};
use crate::services::token::TokenError;
use crate::store::{OrderStore, ScanLog, TicketStore};

#[derive(Clone)]
pub struct AppState {
    pub checkin: Arc<CheckInCoordinator>,
    pub orders: Arc<OrderService>,
    pub issuance: Arc<IssuanceService>,
    pub scan_log: Arc<dyn ScanLog>,
    pub scanner_auth: Arc<ScannerAuth>,
    pub payment_confirmation_secret: Option<Arc<str>>,
}

impl AppState {
    /// Wires every service over a single backing store.
    pub fn new<S>(config: &Config, store: S) -> Result<Self, TokenError>
    where
        S: TicketStore + ScanLog + OrderStore + 'static,
    {
        let store = Arc::new(store);
        let tickets: Arc<dyn TicketStore> = store.clone();
        let scan_log: Arc<dyn ScanLog> = store.clone();
        let orders: Arc<dyn OrderStore> = store;

        let qr_codec = TokenCodec::new(config.qr_signing_secret.as_bytes())?;
        let scanner_codec = TokenCodec::new(config.scanner_auth_secret.as_bytes())?;

        Ok(Self {
            checkin: Arc::new(CheckInCoordinator::new(
                qr_codec.clone(),
                tickets.clone(),
                scan_log.clone(),
                config.checkin_max_retries,
            )),
            orders: Arc::new(OrderService::new(orders.clone())),
            issuance: Arc::new(IssuanceService::new(orders, tickets, qr_codec)),
            scan_log,
            scanner_auth: Arc::new(ScannerAuth::new(scanner_codec)),
            payment_confirmation_secret: config
                .payment_confirmation_secret
                .as_deref()
                .map(Arc::from),
        })
    }
}

