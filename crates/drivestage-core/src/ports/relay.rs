//! Notification relay port
//!
//! Carries a [`FileNotice`] from the watcher to the mover. Delivery is
//! attempted once; the caller logs failures and moves on.

use crate::domain::FileNotice;

/// Port trait for relaying file notices to the processing endpoint
#[async_trait::async_trait]
pub trait INotificationRelay: Send + Sync {
    /// Sends one notice
    async fn relay(&self, notice: &FileNotice) -> anyhow::Result<()>;

    /// Short name of the transport, used in logs
    fn transport(&self) -> &'static str;
}
