//! The `sling` dispatch pipeline: pins a bead to a worker, spawning one
//! if the target names a rig rather than an existing agent.

pub mod convoy;
pub mod error;
pub mod formula;
pub mod mailer;
pub mod pipeline;
pub mod target;

pub use error::{DispatchError, Result};
pub use formula::{FormulaEngine, IdentityFormulaEngine};
pub use mailer::{LoggingMailer, Mailer};
pub use pipeline::{sling, sling_batch, DispatchOutcome, DispatchRequest};
pub use target::Target;
