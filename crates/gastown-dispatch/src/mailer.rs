//! Step 8's crew work mail and the forced-re-sling shutdown mail. Mail
//! storage formats are out of scope; this is the narrow seam the pipeline
//! hands a constructed `Envelope` through, mirroring the `Signaler` and
//! `FormulaEngine` capability traits.

use async_trait::async_trait;

use gastown_core::mailbox::Envelope;

use crate::error::Result;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, envelope: &Envelope) -> Result<()>;
}

/// A `Mailer` that only logs; used when no mail backend is wired in.
pub struct LoggingMailer;

#[async_trait]
impl Mailer for LoggingMailer {
    async fn deliver(&self, envelope: &Envelope) -> Result<()> {
        tracing::info!(to = %envelope.to, subject = %envelope.subject, "mail");
        Ok(())
    }
}
