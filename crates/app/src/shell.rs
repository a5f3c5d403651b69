use std::io::Write;
use std::sync::Arc;

use snafu::ResultExt;
use switchboard_core::{HttpClient, Intent, ServiceRegistry, SessionController};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::command::{Command, HELP_TEXT, parse_line};
use crate::error::{AppResult, ReadInputSnafu};
use crate::terminal::TerminalView;

/// Reads commands line by line and feeds them to one session.
pub struct Shell<W: Write + Send + 'static> {
    controller: SessionController,
    view: Arc<TerminalView<W>>,
    email: Option<String>,
}

impl<W: Write + Send + 'static> Shell<W> {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        client: Arc<dyn HttpClient>,
        out: W,
        email: Option<String>,
    ) -> Self {
        let view = Arc::new(TerminalView::new(registry.clone(), out));
        let controller = SessionController::new(registry, client, view.clone());
        Self {
            controller,
            view,
            email,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn greet(&self) {
        self.view.render_menu(self.email.as_deref());
    }

    /// Runs until `/quit` or end of input.
    pub async fn run<R>(&mut self, input: R) -> AppResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context(ReadInputSnafu {
            stage: "read-terminal-line",
        })? {
            if !self.handle_line(&line).await {
                break;
            }
        }

        tracing::debug!(
            message_count = self.controller.snapshot().message_count(),
            "shell finished"
        );
        Ok(())
    }

    /// Returns `false` once the user asked to leave.
    pub async fn handle_line(&mut self, line: &str) -> bool {
        match parse_line(line) {
            Command::Quit => return false,
            Command::Empty => {}
            Command::Help => self.view.render_notice(HELP_TEXT),
            Command::Services => self.view.render_menu(self.email.as_deref()),
            Command::Invalid(notice) => self.view.render_notice(&notice),
            Command::Select { service_id, email } => {
                self.select(service_id, email).await;
            }
            Command::Intent(Intent::Reset) => {
                self.submit(Intent::Reset).await;
                self.view.render_menu(self.email.as_deref());
            }
            Command::Intent(intent) => {
                self.submit(intent).await;
            }
        }
        true
    }

    pub async fn select(&mut self, service_id: String, email: Option<String>) {
        let email = email.or_else(|| self.email.clone()).unwrap_or_default();
        let intent = Intent::SelectService {
            service_id,
            email: email.clone(),
        };
        if self.submit(intent).await {
            self.view.render_notice(&format!("Connected as {email}"));
            self.email = Some(email);
        }
    }

    async fn submit(&self, intent: Intent) -> bool {
        match self.controller.dispatch(intent).await {
            Ok(_) => true,
            Err(error) => {
                // Exchange failures have already been rendered by the controller.
                if error.classified().is_none() {
                    self.view.render_notice(error.user_message());
                }
                false
            }
        }
    }
}
