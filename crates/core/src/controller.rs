use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::classify::classify;
use crate::error::{ExchangeSnafu, Precondition, PreconditionFailedSnafu, SessionResult};
use crate::registry::{FALLBACK_RESPONSE_TEXT, ServiceRegistry};
use crate::session::{SessionState, Turn};
use crate::transport::{HttpClient, TransportAdapter};
use crate::view::{Intent, SessionView};

/// Owns one conversation and drives every transition on it.
///
/// State lives behind a short-lived lock that is never held across the
/// transport call, so `pending` stays observable while a reply is awaited.
pub struct SessionController {
    registry: Arc<ServiceRegistry>,
    transport: TransportAdapter,
    view: Arc<dyn SessionView>,
    state: Mutex<SessionState>,
}

impl SessionController {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        client: Arc<dyn HttpClient>,
        view: Arc<dyn SessionView>,
    ) -> Self {
        Self {
            registry,
            transport: TransportAdapter::new(client),
            view,
            state: Mutex::new(SessionState::new()),
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Copy of the current session state.
    pub fn snapshot(&self) -> SessionState {
        self.lock_state().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.lock_state().is_pending()
    }

    pub async fn dispatch(&self, intent: Intent) -> SessionResult<Option<Turn>> {
        match intent {
            Intent::SelectService { service_id, email } => {
                self.select_service(&service_id, &email).map(Some)
            }
            Intent::SubmitMessage { text } => self.send_message(&text).await.map(Some),
            Intent::Reset => {
                self.reset();
                Ok(None)
            }
        }
    }

    pub fn select_service(&self, service_id: &str, user_identifier: &str) -> SessionResult<Turn> {
        let (was_pending, outcome) = {
            let mut state = self.lock_state();
            let was_pending = state.is_pending();
            (
                was_pending,
                state.select_service(&self.registry, service_id, user_identifier),
            )
        };

        match &outcome {
            Ok(welcome) => {
                tracing::info!(service_id = %service_id, "service selected");
                if was_pending {
                    self.view.render_pending_state(false);
                }
                self.view.render_turn(welcome);
            }
            Err(error) => {
                tracing::warn!(service_id = %service_id, error = %error, "service selection rejected");
            }
        }

        outcome
    }

    pub fn reset(&self) {
        let was_pending = {
            let mut state = self.lock_state();
            let was_pending = state.is_pending();
            state.reset();
            was_pending
        };

        tracing::info!("session reset");
        if was_pending {
            self.view.render_pending_state(false);
        }
    }

    /// Sends `text` to the active service and records the reply.
    ///
    /// The user turn is recorded before the request goes out and is kept on
    /// failure; the assistant turn is recorded only on success. `pending` is
    /// cleared on every exit path, including this future being dropped.
    pub async fn send_message(&self, text: &str) -> SessionResult<Turn> {
        let exchange = self.lock_state().begin_exchange(&self.registry, text)?;
        let _pending = PendingGuard {
            controller: self,
            epoch: exchange.epoch,
        };

        self.view.render_pending_state(true);
        self.view.render_turn(&exchange.user_turn);
        tracing::info!(
            service_id = %exchange.service.id,
            epoch = exchange.epoch,
            "sending message"
        );

        let outcome = self
            .transport
            .execute(&exchange.address, exchange.verb, &exchange.body)
            .await;

        match outcome {
            Ok(payload) => {
                let content = exchange.service.parse_response(&payload).unwrap_or_else(|| {
                    tracing::warn!(
                        service_id = %exchange.service.id,
                        "response carried no usable answer; using fallback text"
                    );
                    FALLBACK_RESPONSE_TEXT.to_string()
                });

                let completed = self.lock_state().complete_exchange(exchange.epoch, content);
                let Some(turn) = completed else {
                    tracing::info!(
                        epoch = exchange.epoch,
                        "session changed while the request was in flight; reply dropped"
                    );
                    return PreconditionFailedSnafu {
                        stage: "complete-exchange",
                        precondition: Precondition::SessionChanged,
                    }
                    .fail();
                };

                self.view.render_turn(&turn);
                Ok(turn)
            }
            Err(failure) => {
                let classified = classify(&failure);
                tracing::warn!(
                    service_id = %exchange.service.id,
                    category = %classified.category(),
                    error = %failure,
                    "message exchange failed"
                );

                if self.lock_state().epoch() != exchange.epoch {
                    tracing::info!(
                        epoch = exchange.epoch,
                        "session changed while the request was in flight; failure dropped"
                    );
                    return PreconditionFailedSnafu {
                        stage: "fail-exchange",
                        precondition: Precondition::SessionChanged,
                    }
                    .fail();
                }

                self.view.render_error(&classified);
                ExchangeSnafu {
                    stage: "send-message",
                    error: classified,
                }
                .fail()
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears `pending` when the exchange it guards ends, however it ends.
struct PendingGuard<'a> {
    controller: &'a SessionController,
    epoch: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let released = self.controller.lock_state().release_pending(self.epoch);
        if released {
            self.controller.view.render_pending_state(false);
        }
    }
}
