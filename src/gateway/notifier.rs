//! Notification dispatch (e-mail / WhatsApp) for settled orders.

use crate::entities::order;
use async_trait::async_trait;
use tracing::info;

/// Error type returned by notification providers.
pub type NotifyError = Box<dyn std::error::Error + Send + Sync>;

/// Fire-and-forget notifications about engine events.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tells the customer their order was confirmed.
    async fn order_confirmed(
        &self,
        order: &order::Model,
        recipient: Option<&str>,
    ) -> Result<(), NotifyError>;
}

/// Notifier that only writes a log line; used until a messaging provider is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn order_confirmed(
        &self,
        order: &order::Model,
        recipient: Option<&str>,
    ) -> Result<(), NotifyError> {
        info!(
            order_id = order.id,
            order_number = %order.order_number,
            recipient = recipient.unwrap_or("-"),
            "Order confirmation dispatched"
        );
        Ok(())
    }
}
