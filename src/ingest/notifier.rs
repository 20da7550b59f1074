use anyhow::Result;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::aggregators::signal::Signal;

/// Payload handed to the downstream notification step
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SignalNotification {
    pub asset_id: String,
    pub signal: Signal,
    pub pct_change: Option<BigDecimal>,
    pub price: BigDecimal,
    pub avg: Option<BigDecimal>,
}

/// Outbound notification collaborator, invoked for bullish and bearish results only
pub trait SignalNotifier: Send + Sync {
    fn notify(&self, notification: &SignalNotification) -> Result<()>;
}

/// Emits the notification as a structured log line
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl SignalNotifier for LogNotifier {
    fn notify(&self, n: &SignalNotification) -> Result<()> {
        tracing::info!(
            asset_id = %n.asset_id,
            signal = %n.signal,
            pct_change = ?n.pct_change.as_ref().map(|p| p.to_string()),
            price = %n.price,
            avg = ?n.avg.as_ref().map(|a| a.to_string()),
            "signal raised"
        );
        Ok(())
    }
}
