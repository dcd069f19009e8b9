pub mod alert;
pub mod command_stream;
pub mod control_service;
pub mod credentials;
pub mod error;
pub mod operator;
pub mod options;
pub mod ptz;
pub mod ptz_dispatcher;
pub mod reconciliation;
pub mod session_controller;
pub mod session_state;
mod shared;
pub mod source;
pub mod source_catalog;

pub use control_service::{ConfirmPrompt, ControlService, SharedControlService};
pub use error::{ControlError, ControlResult, ServiceError};
pub use operator::OperatorSession;
pub use options::ControllerOptions;
