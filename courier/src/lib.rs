//! Personalized message delivery through a remote-controlled browser session
//!
//! Contacts are read from a sheet, each message template is personalized and
//! typed into the messaging web client, and every outcome lands in an
//! append-only audit log. Delivery is strictly sequential with jittered pacing
//! between contacts.

pub mod attempt;
pub mod audit;
pub mod config;
pub mod connectivity;
pub mod contact;
pub mod drivers;
pub mod errors;
pub mod locator;
pub mod orchestrator;
pub mod outcome;
pub mod pacing;
pub mod phone;
pub mod render;

pub use attempt::{deep_link, AttemptReport, AttemptState, DeliveryAttempt};
pub use audit::{AuditLog, AuditRecord};
pub use config::{ComposeMode, CourierConfig, ProbeKind};
pub use connectivity::{Connectivity, ConnectivityGuard, ConnectivityProbe, HttpProbe, TcpProbe};
pub use contact::{open_contact_source, Contact, ContactSource, XlsxContactSource};
pub use drivers::{ElementHandle, UiDriver, WebDriverSession};
pub use errors::{AuditError, ConfigError, CourierError, DriverError, ErrorClass, SourceError};
pub use locator::{Locator, Locators};
pub use orchestrator::{Orchestrator, RunSummary};
pub use outcome::{AttemptOutcome, Failure, FailureKind, OutcomeKind};
pub use pacing::JitterRange;
pub use phone::{normalize, NormalizedPhone, PhoneNormalizer};
pub use render::render;
