use switchboard_core::Intent;

/// Prefix of the selection message the web client posts on a service click.
pub const LEGACY_SELECT_PREFIX: &str = "SELECT_SERVICE:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Select a service; the email falls back to the remembered one when absent.
    Select {
        service_id: String,
        email: Option<String>,
    },
    Intent(Intent),
    Services,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

/// Interprets one line typed at the prompt. Anything that is not a command is
/// a message for the active service.
pub fn parse_line(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }

    if let Some(rest) = trimmed.strip_prefix(LEGACY_SELECT_PREFIX) {
        let mut parts = rest.splitn(2, ':');
        let service_id = parts.next().unwrap_or_default().trim().to_string();
        let email = parts
            .next()
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());
        if service_id.is_empty() {
            return Command::Invalid(format!("usage: {LEGACY_SELECT_PREFIX}<service>:<email>"));
        }
        return Command::Select { service_id, email };
    }

    // `//text` sends `/text` to the service.
    if trimmed.starts_with("//") {
        return Command::Intent(Intent::SubmitMessage {
            text: line.replacen("//", "/", 1),
        });
    }

    let Some(command) = trimmed.strip_prefix('/') else {
        return Command::Intent(Intent::SubmitMessage {
            text: line.to_string(),
        });
    };

    let mut words = command.split_whitespace();
    match words.next().unwrap_or_default() {
        "select" | "use" => match (words.next(), words.next()) {
            (Some(service_id), email) => Command::Select {
                service_id: service_id.to_string(),
                email: email.map(str::to_string),
            },
            (None, _) => Command::Invalid("usage: /select <service> [email]".to_string()),
        },
        "reset" | "new" => Command::Intent(Intent::Reset),
        "services" => Command::Services,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Invalid(format!("unknown command `/{other}`; type /help")),
    }
}

pub const HELP_TEXT: &str = "\
Commands:
  /select <service> [email]   start a conversation with a service
  /reset                      end the conversation and return to the menu
  /services                   list the available services
  /help                       show this help
  /quit                       leave
Any other line is sent to the active service; start it with // to send a
line that begins with /.";
