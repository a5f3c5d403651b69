use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use switchboard_core::{ClassifiedError, Role, ServiceRegistry, SessionView, Turn};

pub const TYPING_INDICATOR: &str = "assistant is typing...";

/// Line-oriented [`SessionView`] that writes the conversation to `W`.
pub struct TerminalView<W> {
    registry: Arc<ServiceRegistry>,
    out: Mutex<W>,
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(registry: Arc<ServiceRegistry>, out: W) -> Self {
        Self {
            registry,
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lists the services a conversation can be started with.
    pub fn render_menu(&self, default_email: Option<&str>) {
        let mut out = self.lock_out();
        let _ = writeln!(out, "Available services:");
        for service in self.registry.services() {
            let _ = writeln!(
                out,
                "  {:<12} {} - {}",
                service.id.as_str(),
                service.display_name,
                service.description
            );
        }
        let hint = match default_email {
            Some(email) => format!("Start with /select <service> (as {email}) or /help."),
            None => "Start with /select <service> <email> or /help.".to_string(),
        };
        let _ = writeln!(out, "{hint}");
        let _ = out.flush();
    }

    pub fn render_notice(&self, notice: &str) {
        let mut out = self.lock_out();
        let _ = writeln!(out, "{notice}");
        let _ = out.flush();
    }

    fn speaker(&self, turn: &Turn) -> String {
        match (&turn.role, &turn.service_id) {
            (Role::User, _) => "You".to_string(),
            (Role::Assistant, Some(id)) => self
                .registry
                .lookup(id.as_str())
                .map(|service| service.display_name.clone())
                .unwrap_or_else(|_| id.to_string()),
            (Role::Assistant, None) => "Assistant".to_string(),
        }
    }

    fn lock_out(&self) -> MutexGuard<'_, W> {
        self.out.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> SessionView for TerminalView<W> {
    fn render_turn(&self, turn: &Turn) {
        // The prompt line already shows what the user typed.
        if turn.role == Role::User {
            return;
        }

        let speaker = self.speaker(turn);
        let mut out = self.lock_out();
        let _ = writeln!(out, "\n{speaker}:");
        for line in turn.content.lines() {
            let _ = writeln!(out, "  {line}");
        }
        let _ = writeln!(out);
        let _ = out.flush();
    }

    fn render_error(&self, error: &ClassifiedError) {
        let mut out = self.lock_out();
        let _ = writeln!(out, "[{}] {}", error.category(), error.message());
        let _ = out.flush();
    }

    fn render_pending_state(&self, pending: bool) {
        if !pending {
            return;
        }

        let mut out = self.lock_out();
        let _ = writeln!(out, "{TYPING_INDICATOR}");
        let _ = out.flush();
    }
}
