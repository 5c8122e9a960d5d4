//! Falls back from a primary executor to a secondary one on failure, per
//! spec §4.9. The combined error's cause chain preserves the secondary
//! failure via [`DnsError::fallback_combine`].

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::DnsError;
use crate::executor::{check_cancelled, BoxExecutor, Executor};
use crate::message::{Message, Query};

pub struct FallbackExecutor {
    primary: BoxExecutor,
    secondary: BoxExecutor,
}

impl FallbackExecutor {
    pub fn new(primary: BoxExecutor, secondary: BoxExecutor) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl Executor for FallbackExecutor {
    async fn execute(&self, query: Query, cancel: CancellationToken) -> Result<Message, DnsError> {
        check_cancelled(&cancel)?;

        match self.primary.execute(query.clone(), cancel.clone()).await {
            Ok(message) => Ok(message),
            Err(DnsError::Cancelled) => Err(DnsError::Cancelled),
            Err(primary_err) => {
                debug!(name = %query.name, error = %primary_err, "primary executor failed, falling back");
                match self.secondary.execute(query, cancel).await {
                    Ok(message) => Ok(message),
                    Err(secondary_err) => Err(DnsError::fallback_combine(primary_err, secondary_err)),
                }
            }
        }
    }
}
