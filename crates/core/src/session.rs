use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use snafu::ensure;

use crate::error::{InvalidEmailSnafu, Precondition, PreconditionFailedSnafu, SessionResult};
use crate::registry::{ServiceDescriptor, ServiceId, ServiceRegistry};
use crate::transport::HttpVerb;
use crate::validation::is_valid_email;

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One immutable entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Logical clock value; strictly increasing in append order.
    pub timestamp: u64,
    /// Service that produced an assistant turn. Always `None` for user turns.
    pub service_id: Option<ServiceId>,
}

impl Turn {
    pub fn user(content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp,
            service_id: None,
        }
    }

    pub fn assistant(service_id: ServiceId, content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp,
            service_id: Some(service_id),
        }
    }
}

/// Lifecycle phase of the session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Unselected,
    Active(ServiceId),
}

/// Everything the message pipeline needs once the state lock is released.
#[derive(Debug, Clone)]
pub(crate) struct Exchange {
    pub epoch: u64,
    pub service: Arc<ServiceDescriptor>,
    pub address: String,
    pub verb: HttpVerb,
    pub body: Value,
    pub user_turn: Turn,
}

/// Single source of truth for one conversation.
///
/// Mutated only through [`select_service`](Self::select_service),
/// [`reset`](Self::reset) and the crate-private exchange transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    phase: SessionPhase,
    user_identifier: String,
    history: Vec<Turn>,
    pending: bool,
    // Bumped whenever the session is replaced so late replies can be dropped.
    epoch: u64,
    clock: u64,
    message_count: u64,
    started_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn active_service(&self) -> Option<&ServiceId> {
        match &self.phase {
            SessionPhase::Active(service_id) => Some(service_id),
            SessionPhase::Unselected => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, SessionPhase::Active(_))
    }

    pub fn user_identifier(&self) -> &str {
        &self.user_identifier
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of user messages submitted in this session.
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Activates `service_id` for `user_identifier` and seeds the history with
    /// the service's welcome text. On failure the state is left untouched.
    pub fn select_service(
        &mut self,
        registry: &ServiceRegistry,
        service_id: &str,
        user_identifier: &str,
    ) -> SessionResult<Turn> {
        ensure!(
            is_valid_email(user_identifier),
            InvalidEmailSnafu {
                stage: "select-service",
                email: user_identifier,
            }
        );
        let service = registry.lookup(service_id)?;

        self.epoch += 1;
        self.phase = SessionPhase::Active(service.id.clone());
        self.user_identifier = user_identifier.to_string();
        self.history.clear();
        self.pending = false;
        self.message_count = 0;
        self.started_at = Some(Utc::now());

        let welcome = Turn::assistant(
            service.id.clone(),
            service.welcome_text.clone(),
            self.tick(),
        );
        self.history.push(welcome.clone());
        Ok(welcome)
    }

    /// Returns to `Unselected`. Calling it on a pristine state changes nothing.
    pub fn reset(&mut self) {
        if self.is_pristine() {
            return;
        }

        self.epoch += 1;
        self.phase = SessionPhase::Unselected;
        self.user_identifier.clear();
        self.history.clear();
        self.pending = false;
        self.message_count = 0;
        self.started_at = None;
    }

    fn is_pristine(&self) -> bool {
        self.phase == SessionPhase::Unselected
            && self.user_identifier.is_empty()
            && self.history.is_empty()
            && !self.pending
            && self.started_at.is_none()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Checks the send preconditions, raises `pending` and records the user
    /// turn. The turn stays in history whatever the exchange outcome.
    pub(crate) fn begin_exchange(
        &mut self,
        registry: &ServiceRegistry,
        text: &str,
    ) -> SessionResult<Exchange> {
        let Some(service_id) = self.active_service() else {
            return PreconditionFailedSnafu {
                stage: "begin-exchange",
                precondition: Precondition::NoActiveService,
            }
            .fail();
        };
        ensure!(
            !text.trim().is_empty(),
            PreconditionFailedSnafu {
                stage: "begin-exchange",
                precondition: Precondition::EmptyMessage,
            }
        );
        ensure!(
            !self.pending,
            PreconditionFailedSnafu {
                stage: "begin-exchange",
                precondition: Precondition::RequestPending,
            }
        );
        let service = registry.lookup(service_id.as_str())?.clone();

        self.pending = true;
        self.message_count += 1;
        let user_turn = Turn::user(text, self.tick());
        self.history.push(user_turn.clone());

        Ok(Exchange {
            epoch: self.epoch,
            address: service.address(),
            verb: service.transport.verb,
            body: service.build_request(&self.user_identifier, text),
            service,
            user_turn,
        })
    }

    /// Appends the assistant reply if the exchange still belongs to this session.
    pub(crate) fn complete_exchange(&mut self, epoch: u64, content: String) -> Option<Turn> {
        if epoch != self.epoch {
            return None;
        }
        let service_id = self.active_service()?.clone();

        let turn = Turn::assistant(service_id, content, self.tick());
        self.history.push(turn.clone());
        Some(turn)
    }

    /// Clears `pending` for the exchange started in `epoch`. Returns whether
    /// the flag actually changed.
    pub(crate) fn release_pending(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || !self.pending {
            return false;
        }
        self.pending = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::registry::{HR_POLICY_SERVICE_ID, TIMESHEET_SERVICE_ID};

    const EMAIL: &str = "jane@example.com";

    fn active(registry: &ServiceRegistry) -> SessionState {
        let mut state = SessionState::new();
        state
            .select_service(registry, TIMESHEET_SERVICE_ID, EMAIL)
            .unwrap();
        state
    }

    #[test]
    fn new_state_is_unselected() {
        let state = SessionState::new();
        assert_eq!(state.phase(), &SessionPhase::Unselected);
        assert!(state.history().is_empty());
        assert!(!state.is_pending());
        assert_eq!(state.user_identifier(), "");
    }

    #[test]
    fn selecting_seeds_exactly_one_welcome_turn() {
        let registry = ServiceRegistry::builtin();
        for service in registry.services() {
            let mut state = SessionState::new();
            let turn = state
                .select_service(&registry, service.id.as_str(), EMAIL)
                .unwrap();

            assert_eq!(state.phase(), &SessionPhase::Active(service.id.clone()));
            assert_eq!(state.user_identifier(), EMAIL);
            assert_eq!(state.history(), std::slice::from_ref(&turn));
            assert_eq!(turn.role, Role::Assistant);
            assert_eq!(turn.content, service.welcome_text);
            assert!(state.started_at().is_some());
        }
    }

    #[test]
    fn reselecting_clears_previous_history() {
        let registry = ServiceRegistry::builtin();
        let mut state = active(&registry);
        state.begin_exchange(&registry, "hi").unwrap();
        state.release_pending(state.epoch());
        assert_eq!(state.history().len(), 2);

        state
            .select_service(&registry, HR_POLICY_SERVICE_ID, EMAIL)
            .unwrap();
        assert_eq!(state.history().len(), 1);
        assert_eq!(state.message_count(), 0);
        assert_eq!(
            state.active_service().map(ServiceId::as_str),
            Some(HR_POLICY_SERVICE_ID)
        );
    }

    #[test]
    fn invalid_email_leaves_state_unchanged() {
        let registry = ServiceRegistry::builtin();
        for email in ["not-an-email", "", "a@b"] {
            let mut state = active(&registry);
            let before = state.clone();

            let error = state
                .select_service(&registry, HR_POLICY_SERVICE_ID, email)
                .unwrap_err();

            assert!(matches!(error, SessionError::InvalidEmail { .. }));
            assert_eq!(state, before);
        }
    }

    #[test]
    fn unknown_service_leaves_active_session_untouched() {
        let registry = ServiceRegistry::builtin();
        let mut state = active(&registry);
        let before = state.clone();

        let error = state.select_service(&registry, "payroll", EMAIL).unwrap_err();

        assert!(matches!(error, SessionError::InvalidService { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn reset_is_idempotent() {
        let registry = ServiceRegistry::builtin();
        let mut once = active(&registry);
        once.reset();

        let mut twice = active(&registry);
        twice.reset();
        twice.reset();

        assert_eq!(once, twice);
        assert_eq!(once.phase(), &SessionPhase::Unselected);
        assert_eq!(once.user_identifier(), "");
        assert!(once.history().is_empty());
        assert!(!once.is_pending());
    }

    #[test]
    fn begin_exchange_requires_active_session() {
        let registry = ServiceRegistry::builtin();
        let mut state = SessionState::new();

        let error = state.begin_exchange(&registry, "hi").unwrap_err();

        assert!(matches!(
            error,
            SessionError::PreconditionFailed {
                precondition: Precondition::NoActiveService,
                ..
            }
        ));
        assert!(!state.is_pending());
    }

    #[test]
    fn begin_exchange_rejects_blank_text() {
        let registry = ServiceRegistry::builtin();
        let mut state = active(&registry);
        let before = state.clone();

        let error = state.begin_exchange(&registry, "  \n\t").unwrap_err();

        assert!(matches!(
            error,
            SessionError::PreconditionFailed {
                precondition: Precondition::EmptyMessage,
                ..
            }
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn begin_exchange_records_user_turn_and_builds_body() {
        let registry = ServiceRegistry::builtin();
        let mut state = active(&registry);

        let exchange = state.begin_exchange(&registry, "hi").unwrap();

        assert!(state.is_pending());
        assert_eq!(exchange.address, "http://localhost:8000/chat");
        assert_eq!(exchange.verb, HttpVerb::Post);
        assert_eq!(
            exchange.body,
            serde_json::json!({"email": EMAIL, "user_prompt": "hi"})
        );
        assert_eq!(state.history().last(), Some(&exchange.user_turn));
        assert_eq!(state.message_count(), 1);

        let second = state.begin_exchange(&registry, "again").unwrap_err();
        assert!(matches!(
            second,
            SessionError::PreconditionFailed {
                precondition: Precondition::RequestPending,
                ..
            }
        ));
        assert_eq!(state.history().len(), 2);
    }

    #[test]
    fn stale_exchange_does_not_touch_new_session() {
        let registry = ServiceRegistry::builtin();
        let mut state = active(&registry);
        let exchange = state.begin_exchange(&registry, "hi").unwrap();

        state.reset();
        state
            .select_service(&registry, HR_POLICY_SERVICE_ID, EMAIL)
            .unwrap();
        let before = state.clone();

        assert_eq!(state.complete_exchange(exchange.epoch, "late".to_string()), None);
        assert!(!state.release_pending(exchange.epoch));
        assert_eq!(state, before);
    }

    #[test]
    fn timestamps_increase_in_append_order() {
        let registry = ServiceRegistry::builtin();
        let mut state = active(&registry);
        let exchange = state.begin_exchange(&registry, "hi").unwrap();
        state.complete_exchange(exchange.epoch, "ok".to_string());
        state.release_pending(exchange.epoch);

        let timestamps = state
            .history()
            .iter()
            .map(|turn| turn.timestamp)
            .collect::<Vec<_>>();
        assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
