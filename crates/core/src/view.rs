use crate::classify::ClassifiedError;
use crate::session::Turn;

/// User intent delivered to the controller, independent of how it was sourced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SelectService { service_id: String, email: String },
    SubmitMessage { text: String },
    Reset,
}

/// Notification sinks the presentation layer must provide.
pub trait SessionView: Send + Sync {
    fn render_turn(&self, turn: &Turn);
    fn render_error(&self, error: &ClassifiedError);
    fn render_pending_state(&self, pending: bool);
}
