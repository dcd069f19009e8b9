use crate::error::ControlError;
use std::fmt;
use tokio::sync::mpsc;

/// Operator-visible failure raised outside a direct call, e.g. by a periodic
/// motion command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub context: &'static str,
    pub error: ControlError,
}

impl Alert {
    pub fn new(context: &'static str, error: impl Into<ControlError>) -> Self {
        Self {
            context,
            error: error.into(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.error)
    }
}

pub type AlertSender = mpsc::UnboundedSender<Alert>;
pub type AlertReceiver = mpsc::UnboundedReceiver<Alert>;
