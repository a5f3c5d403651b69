use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use snafu::{OptionExt, ensure};

use crate::error::{
    BlankServiceIdSnafu, DuplicateServiceSnafu, InvalidServiceSnafu, RegistryResult,
    SessionResult,
};
use crate::transport::HttpVerb;

pub const TIMESHEET_SERVICE_ID: &str = "timesheet";
pub const HR_POLICY_SERVICE_ID: &str = "hr-policy";
pub const DEFAULT_TIMESHEET_BASE_ADDRESS: &str = "http://localhost:8000";
pub const DEFAULT_HR_POLICY_BASE_ADDRESS: &str = "http://localhost:8001";

/// Answer text used when a successful response carries nothing usable.
pub const FALLBACK_RESPONSE_TEXT: &str = "Response received successfully.";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ServiceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub base_address: String,
    pub path: String,
    pub verb: HttpVerb,
}

impl TransportConfig {
    pub fn new(base_address: impl Into<String>, path: impl Into<String>, verb: HttpVerb) -> Self {
        Self {
            base_address: base_address.into().trim().to_string(),
            path: path.into().trim().to_string(),
            verb,
        }
    }

    /// Full request address, `{base}{path}`.
    pub fn address(&self) -> String {
        format!("{}{}", self.base_address.trim_end_matches('/'), self.path)
    }
}

/// Request shape and response shape of one backend service.
pub trait WireContract: Send + Sync + fmt::Debug {
    fn build_request(&self, user_identifier: &str, content: &str) -> Value;

    /// Extracts the answer text, or `None` when the payload holds nothing usable.
    fn parse_response(&self, payload: &Value) -> Option<String>;
}

/// `POST {base}/chat` with `{email, user_prompt}`; answers in `response` or `message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimesheetContract;

impl WireContract for TimesheetContract {
    fn build_request(&self, user_identifier: &str, content: &str) -> Value {
        json!({
            "email": user_identifier,
            "user_prompt": content,
        })
    }

    fn parse_response(&self, payload: &Value) -> Option<String> {
        first_text_field(payload, &["response", "message"])
    }
}

/// `POST {base}/query` with `{question}`; answers in `answer`, `response` or
/// `message`, with optional `sources` appended.
#[derive(Debug, Clone, Copy, Default)]
pub struct HrPolicyContract;

impl WireContract for HrPolicyContract {
    fn build_request(&self, _user_identifier: &str, content: &str) -> Value {
        json!({ "question": content })
    }

    fn parse_response(&self, payload: &Value) -> Option<String> {
        let answer = first_text_field(payload, &["answer", "response", "message"]);
        let sources = payload
            .get("sources")
            .and_then(Value::as_array)
            .map(|sources| sources.iter().filter_map(Value::as_str).collect::<Vec<_>>())
            .unwrap_or_default();

        if sources.is_empty() {
            return answer;
        }

        let answer = answer.unwrap_or_else(|| FALLBACK_RESPONSE_TEXT.to_string());
        Some(format!("{answer}\n\nSources: {}", sources.join(", ")))
    }
}

fn first_text_field(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        payload
            .get(*key)
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string)
    })
}

/// Static metadata and wire contract for one backend assistant.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub id: ServiceId,
    pub display_name: String,
    pub description: String,
    pub welcome_text: String,
    pub transport: TransportConfig,
    contract: Arc<dyn WireContract>,
}

impl ServiceDescriptor {
    pub fn new(
        id: impl Into<ServiceId>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        transport: TransportConfig,
        contract: Arc<dyn WireContract>,
    ) -> Self {
        let display_name = display_name.into();
        let description = description.into();
        let welcome_text = default_welcome_text(&display_name, &description);

        Self {
            id: id.into(),
            display_name,
            description,
            welcome_text,
            transport,
            contract,
        }
    }

    pub fn address(&self) -> String {
        self.transport.address()
    }

    pub fn build_request(&self, user_identifier: &str, content: &str) -> Value {
        self.contract.build_request(user_identifier, content)
    }

    pub fn parse_response(&self, payload: &Value) -> Option<String> {
        self.contract.parse_response(payload)
    }
}

fn default_welcome_text(display_name: &str, description: &str) -> String {
    let subject = display_name.to_lowercase();
    format!(
        "Hello! I'm your {display_name} assistant.\n\n{description}\n\n\
         I'm ready to help you with {subject}. What would you like to do today?\n\n\
         You can ask me questions, get help, or start working with your {subject}."
    )
}

pub fn timesheet_service(base_address: &str) -> ServiceDescriptor {
    ServiceDescriptor::new(
        TIMESHEET_SERVICE_ID,
        "Timesheet Management",
        "Manage your Oracle and Mars timesheets with AI assistance",
        TransportConfig::new(base_address, "/chat", HttpVerb::Post),
        Arc::new(TimesheetContract),
    )
}

pub fn hr_policy_service(base_address: &str) -> ServiceDescriptor {
    ServiceDescriptor::new(
        HR_POLICY_SERVICE_ID,
        "HR Policy Assistant",
        "Get answers about company policies and HR documents",
        TransportConfig::new(base_address, "/query", HttpVerb::Post),
        Arc::new(HrPolicyContract),
    )
}

/// Read-only table of the supported assistants, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: Vec<Arc<ServiceDescriptor>>,
}

impl ServiceRegistry {
    pub fn new(descriptors: Vec<ServiceDescriptor>) -> RegistryResult<Self> {
        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            ensure!(
                !descriptor.id.as_str().trim().is_empty(),
                BlankServiceIdSnafu {
                    stage: "registry-new",
                }
            );
            ensure!(
                seen.insert(descriptor.id.clone()),
                DuplicateServiceSnafu {
                    stage: "registry-new",
                    service_id: descriptor.id.as_str(),
                }
            );
        }

        Ok(Self {
            services: descriptors.into_iter().map(Arc::new).collect(),
        })
    }

    /// Built-in services at their default addresses.
    pub fn builtin() -> Self {
        Self::builtin_with(DEFAULT_TIMESHEET_BASE_ADDRESS, DEFAULT_HR_POLICY_BASE_ADDRESS)
    }

    pub fn builtin_with(timesheet_base_address: &str, hr_policy_base_address: &str) -> Self {
        Self {
            services: vec![
                Arc::new(timesheet_service(timesheet_base_address)),
                Arc::new(hr_policy_service(hr_policy_base_address)),
            ],
        }
    }

    pub fn lookup(&self, id: &str) -> SessionResult<&Arc<ServiceDescriptor>> {
        self.services
            .iter()
            .find(|descriptor| descriptor.id.as_str() == id)
            .context(InvalidServiceSnafu {
                stage: "registry-lookup",
                service_id: id,
            })
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.iter().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RegistryError, SessionError};

    #[test]
    fn builtin_registry_exposes_both_services_in_order() {
        let registry = ServiceRegistry::builtin();
        let ids = registry
            .services()
            .map(|descriptor| descriptor.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![TIMESHEET_SERVICE_ID, HR_POLICY_SERVICE_ID]);
    }

    #[test]
    fn builtin_addresses_follow_wire_contract() {
        let registry = ServiceRegistry::builtin();
        assert_eq!(
            registry.lookup(TIMESHEET_SERVICE_ID).unwrap().address(),
            "http://localhost:8000/chat"
        );
        assert_eq!(
            registry.lookup(HR_POLICY_SERVICE_ID).unwrap().address(),
            "http://localhost:8001/query"
        );
    }

    #[test]
    fn trailing_slash_on_base_address_is_not_doubled() {
        let descriptor = timesheet_service("https://timesheets.internal/");
        assert_eq!(descriptor.address(), "https://timesheets.internal/chat");
    }

    #[test]
    fn unknown_service_is_a_hard_error() {
        let registry = ServiceRegistry::builtin();
        let error = registry.lookup("payroll").unwrap_err();
        assert!(matches!(
            error,
            SessionError::InvalidService { ref service_id, .. } if service_id == "payroll"
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let error = ServiceRegistry::new(vec![
            timesheet_service(DEFAULT_TIMESHEET_BASE_ADDRESS),
            timesheet_service("http://localhost:9000"),
        ])
        .unwrap_err();
        assert!(matches!(error, RegistryError::DuplicateService { .. }));
    }

    #[test]
    fn timesheet_request_carries_email_and_prompt() {
        let descriptor = timesheet_service(DEFAULT_TIMESHEET_BASE_ADDRESS);
        assert_eq!(
            descriptor.build_request("jane@example.com", "log 8h on ABC"),
            json!({"email": "jane@example.com", "user_prompt": "log 8h on ABC"})
        );
    }

    #[test]
    fn timesheet_response_falls_back_to_message_field() {
        let contract = TimesheetContract;
        assert_eq!(
            contract.parse_response(&json!({"response": "ok"})).as_deref(),
            Some("ok")
        );
        assert_eq!(
            contract.parse_response(&json!({"message": "saved"})).as_deref(),
            Some("saved")
        );
        assert_eq!(contract.parse_response(&json!({"status": "success"})), None);
        assert_eq!(contract.parse_response(&json!({"response": "  "})), None);
    }

    #[test]
    fn hr_policy_request_only_carries_question() {
        let descriptor = hr_policy_service(DEFAULT_HR_POLICY_BASE_ADDRESS);
        assert_eq!(
            descriptor.build_request("jane@example.com", "How many leave days?"),
            json!({"question": "How many leave days?"})
        );
    }

    #[test]
    fn hr_policy_sources_are_appended() {
        let contract = HrPolicyContract;
        let parsed = contract.parse_response(&json!({"answer": "A", "sources": ["doc1", "doc2"]}));
        assert_eq!(parsed.as_deref(), Some("A\n\nSources: doc1, doc2"));
    }

    #[test]
    fn hr_policy_answer_fallback_chain() {
        let contract = HrPolicyContract;
        assert_eq!(
            contract.parse_response(&json!({"response": "R"})).as_deref(),
            Some("R")
        );
        assert_eq!(
            contract.parse_response(&json!({"message": "M", "sources": []})).as_deref(),
            Some("M")
        );
        assert_eq!(
            contract.parse_response(&json!({"sources": ["handbook.pdf"]})).as_deref(),
            Some("Response received successfully.\n\nSources: handbook.pdf")
        );
        assert_eq!(contract.parse_response(&json!({})), None);
    }

    #[test]
    fn welcome_text_names_the_service() {
        let descriptor = hr_policy_service(DEFAULT_HR_POLICY_BASE_ADDRESS);
        assert!(descriptor.welcome_text.starts_with("Hello! I'm your HR Policy Assistant assistant."));
        assert!(descriptor.welcome_text.contains(&descriptor.description));
    }
}
