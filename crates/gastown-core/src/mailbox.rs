//! Mailbox envelopes and the delivery-label acknowledgment state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority of a mailbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MailPriority {
    Low,
    Normal,
    High,
}

/// The mailbox envelope. Delivery state itself is *not* a
/// field on the envelope — it is derived from the bead's label set by
/// [`DeliveryState::from_labels`], since the store records it as an
/// append-only label sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub thread_id: String,
    pub reply_to: Option<String>,
    pub priority: MailPriority,
    pub message_type: String,
    pub timestamp: DateTime<Utc>,
    pub body: String,
    /// Mailbox delivery of this message should not trigger a second nudge
    /// for crew targets.
    pub skip_notify: bool,
}

impl Envelope {
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            thread_id: String::new(),
            reply_to: None,
            priority: MailPriority::Normal,
            message_type: "mail".to_string(),
            timestamp: Utc::now(),
            body: body.into(),
            skip_notify: false,
        }
    }

    /// A lifecycle-shutdown mail sent to a worker's witness after a forced
    /// re-sling unhooks it.
    #[must_use]
    pub fn lifecycle_shutdown(from: impl Into<String>, to_witness: impl Into<String>, worker: &str) -> Self {
        Self::new(
            from,
            to_witness,
            format!("LIFECYCLE:Shutdown {worker}"),
            format!("Worker {worker} was unhooked by a forced re-sling."),
        )
    }
}

/// Derived acknowledgment state of a mail delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    Acked { by: String, at: DateTime<Utc> },
    Pending,
    Empty,
}

const LABEL_PENDING: &str = "delivery:pending";
const LABEL_ACKED: &str = "delivery:acked";
const PREFIX_ACKED_BY: &str = "delivery-acked-by:";
const PREFIX_ACKED_AT: &str = "delivery-acked-at:";

impl DeliveryState {
    /// Parse delivery state from a label set. Order-independent by
    /// construction (it scans the whole set before deciding), and
    /// `delivery:pending` without `delivery:acked` always reads as
    /// `Pending`, even if partial ack labels are present — this is the
    /// crash-between-labels safety property.
    #[must_use]
    pub fn from_labels(labels: &[String]) -> Self {
        let has_pending = labels.iter().any(|l| l == LABEL_PENDING);
        let has_acked = labels.iter().any(|l| l == LABEL_ACKED);

        if has_acked {
            let by = labels
                .iter()
                .find_map(|l| l.strip_prefix(PREFIX_ACKED_BY))
                .unwrap_or_default()
                .to_string();
            let at = labels
                .iter()
                .find_map(|l| l.strip_prefix(PREFIX_ACKED_AT))
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            return Self::Acked { by, at };
        }

        if has_pending {
            return Self::Pending;
        }

        Self::Empty
    }

    /// The label set that should be written to record this ack, following
    /// the mandated write order: `delivery-acked-by`, `delivery-acked-at`,
    /// `delivery:acked`. If `existing_labels` already carries an ack
    /// written by the same `acked_by` identity, its timestamp is reused
    /// rather than stamping a fresh one; a different identity always gets
    /// `now`.
    #[must_use]
    pub fn ack_labels(existing_labels: &[String], acked_by: &str, now: DateTime<Utc>) -> Vec<String> {
        let at = match Self::from_labels(existing_labels) {
            Self::Acked { by, at } if by == acked_by => at,
            _ => now,
        };
        vec![
            format!("{PREFIX_ACKED_BY}{acked_by}"),
            format!("{PREFIX_ACKED_AT}{}", at.to_rfc3339()),
            LABEL_ACKED.to_string(),
        ]
    }
}
