pub mod service_account;
pub mod sheets;

use crate::domain::subscriber::{dedup_recipients, Subscriber};
use anyhow::Context;

/// The external append-only subscriber log.
///
/// Row 1 is a header. Column 1 holds the email, column 2 the signup timestamp.
#[async_trait::async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Column 1 of every row, header included.
    async fn email_column(&self) -> anyhow::Result<Vec<String>>;

    /// Appends one row. No uniqueness check.
    async fn append(&self, subscriber: &Subscriber) -> anyhow::Result<()>;
}

/// Reads the whole store, skips the header row, and deduplicates deliverable addresses.
pub async fn load_recipients(store: &dyn SubscriberStore) -> anyhow::Result<Vec<String>> {
    let column = store
        .email_column()
        .await
        .context("failed to read subscriber store")?;
    Ok(dedup_recipients(column.iter().skip(1)))
}
