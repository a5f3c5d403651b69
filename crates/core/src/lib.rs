#![deny(unsafe_code)]

/// Failure classification into the user-facing taxonomy.
pub mod classify;
/// Conversation session controller: lifecycle and message pipeline.
pub mod controller;
pub mod error;
/// Static table of backend assistants and their wire contracts.
pub mod registry;
pub mod session;
/// JSON-over-HTTP boundary and the client contract behind it.
pub mod transport;
pub mod validation;
pub mod view;

pub use classify::{ClassifiedError, ErrorCategory, classify};
pub use controller::SessionController;
pub use error::{Precondition, RegistryError, RegistryResult, SessionError, SessionResult};
pub use registry::{
    DEFAULT_HR_POLICY_BASE_ADDRESS, DEFAULT_TIMESHEET_BASE_ADDRESS, FALLBACK_RESPONSE_TEXT,
    HR_POLICY_SERVICE_ID, HrPolicyContract, ServiceDescriptor, ServiceId, ServiceRegistry,
    TIMESHEET_SERVICE_ID, TimesheetContract, TransportConfig, WireContract, hr_policy_service,
    timesheet_service,
};
pub use session::{Role, SessionPhase, SessionState, Turn};
pub use transport::{
    BoxFuture, HttpClient, HttpRequest, HttpResponse, HttpVerb, TransportAdapter,
    TransportFailure, TransportResult,
};
pub use validation::is_valid_email;
pub use view::{Intent, SessionView};
