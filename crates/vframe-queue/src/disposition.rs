//! Failure classification and the ack/nack policy shared by every worker.

use std::fmt;

/// Classifies a handler error as permanent or transient.
///
/// Permanent errors cannot be resolved by redelivery (malformed payloads,
/// entities missing upstream). Everything else is assumed transient.
pub trait FailureClass {
    fn is_permanent(&self) -> bool;
}

/// How a delivery is settled once its handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Handled successfully
    Ack,
    /// Permanent failure; acknowledged so it is not redelivered
    Drop,
    /// Transient failure; negatively acknowledged with requeue
    Requeue,
}

impl Disposition {
    pub fn for_result<E: FailureClass>(result: &Result<(), E>) -> Self {
        match result {
            Ok(()) => Disposition::Ack,
            Err(e) if e.is_permanent() => Disposition::Drop,
            Err(_) => Disposition::Requeue,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Ack => "ack",
            Disposition::Drop => "drop",
            Disposition::Requeue => "requeue",
        }
    }

    /// Whether the broker should redeliver the message.
    pub fn requeues(&self) -> bool {
        matches!(self, Disposition::Requeue)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
