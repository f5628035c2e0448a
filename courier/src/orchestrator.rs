//! The batch loop
//!
//! Contacts are processed strictly one at a time, in source order. A single
//! contact's failure never stops the batch; only a missing session or an
//! audit log write failure does. The loop owns the driver session and
//! releases it exactly once when [`Orchestrator::run`] returns.

use crate::attempt::DeliveryAttempt;
use crate::audit::{AuditLog, AuditRecord};
use crate::config::CourierConfig;
use crate::connectivity::{Connectivity, ConnectivityGuard};
use crate::contact::Contact;
use crate::drivers::UiDriver;
use crate::errors::CourierError;
use crate::outcome::{AttemptOutcome, OutcomeKind};
use crate::pacing;
use crate::phone::PhoneNormalizer;
use crate::render::render;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Maximum number of message characters written to logs
const MAX_LOG_TEXT_LENGTH: usize = 50;

pub const MISSING_DATA_REASON: &str = "missing data";

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// One record per processed contact, in input order.
    pub records: Vec<AuditRecord>,
    /// The run stopped early because its cancellation token fired.
    pub cancelled: bool,
    /// Attempts stopped after the remote interface changed shape.
    pub halted: bool,
}

impl RunSummary {
    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.records.iter().filter(|r| r.status == kind).count()
    }

    pub fn sent(&self) -> usize {
        self.count(OutcomeKind::Success)
    }

    pub fn skipped(&self) -> usize {
        self.count(OutcomeKind::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(OutcomeKind::Failed)
    }
}

pub struct Orchestrator {
    driver: Box<dyn UiDriver>,
    guard: ConnectivityGuard,
    audit: AuditLog,
    config: CourierConfig,
    normalizer: PhoneNormalizer,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// The loop cancels along with the guard's token.
    pub fn new(
        driver: Box<dyn UiDriver>,
        guard: ConnectivityGuard,
        audit: AuditLog,
        config: CourierConfig,
    ) -> Self {
        let normalizer = PhoneNormalizer::new(config.default_country_code.clone());
        let cancel = guard.cancellation_token().clone();
        Self {
            driver,
            guard,
            audit,
            config,
            normalizer,
            cancel,
        }
    }

    /// Process every contact, then release the session.
    ///
    /// The session is released on every exit path, including fatal errors.
    pub async fn run(mut self, contacts: Vec<Contact>) -> Result<RunSummary, CourierError> {
        let result = self.process(contacts).await;
        self.release().await;
        result
    }

    async fn release(&self) {
        match self.driver.quit().await {
            Ok(()) => info!("Session released"),
            Err(e) => warn!(error = %e, "Failed to release session cleanly"),
        }
    }

    #[instrument(skip(self))]
    async fn await_login(&self) -> Result<(), CourierError> {
        if self.guard.ensure_connectivity().await == Connectivity::Cancelled {
            return Ok(());
        }
        self.driver
            .navigate(&self.config.messaging_base_url)
            .await
            .map_err(CourierError::Session)?;

        info!(
            timeout_secs = self.config.timeouts.login_secs,
            "Waiting for login; scan the QR code in the browser window if prompted"
        );
        let login = self.driver.wait_for_locator(
            &self.config.locators.login_ready,
            self.config.timeouts.login(),
        );
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                // the loop head reports the cancellation
                warn!("Cancelled while waiting for login");
                return Ok(());
            }
            result = login => {
                result.map_err(CourierError::Session)?;
            }
        }
        info!("Logged in");
        Ok(())
    }

    async fn process(&mut self, contacts: Vec<Contact>) -> Result<RunSummary, CourierError> {
        self.await_login().await?;

        let total = contacts.len();
        let mut summary = RunSummary::default();
        let mut halted: Option<String> = None;

        for (index, contact) in contacts.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(remaining = total - index, "Run cancelled; remaining contacts not attempted");
                summary.cancelled = true;
                break;
            }
            let position = index + 1;

            let (record, outcome) = if contact.is_missing_data() {
                warn!(
                    position,
                    name = %contact.display_name(),
                    "Skipping contact: missing phone number or message"
                );
                let outcome = AttemptOutcome::Skipped(MISSING_DATA_REASON.to_string());
                let record = AuditRecord::new(
                    contact.phone().unwrap_or(""),
                    contact.message_template.as_str(),
                    &outcome,
                );
                (record, None)
            } else if let Some(reason) = &halted {
                let outcome = AttemptOutcome::Skipped(reason.clone());
                let record = AuditRecord::new(
                    contact.phone().unwrap_or(""),
                    contact.message_template.as_str(),
                    &outcome,
                );
                (record, None)
            } else {
                let (record, outcome) = self.attempt(contact, position, total).await;
                (record, Some(outcome))
            };

            self.audit.append(&record)?;
            summary.records.push(record);

            let Some(outcome) = outcome else {
                continue;
            };

            if outcome.is_structural_failure() && self.config.halt_on_structural_error {
                error!(
                    reason = outcome.reason(),
                    "Messaging interface changed shape; no further contacts will be attempted"
                );
                halted = Some(format!(
                    "halted: messaging interface changed ({})",
                    outcome.reason()
                ));
                summary.halted = true;
            }

            if position < total && !pacing::pause(&self.config.pacing, &self.cancel).await {
                // cancelled mid-pause; the loop head records the stop
                continue;
            }
        }

        info!(
            total,
            sent = summary.sent(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            cancelled = summary.cancelled,
            "Run finished"
        );
        Ok(summary)
    }

    async fn attempt(
        &self,
        contact: &Contact,
        position: usize,
        total: usize,
    ) -> (AuditRecord, AttemptOutcome) {
        let raw_phone = contact.phone().unwrap_or("");
        let phone = self.normalizer.normalize(raw_phone);
        let message = render(
            &contact.message_template,
            &contact.given_name,
            &contact.family_name,
        );

        info!(
            position,
            total,
            name = %contact.display_name(),
            phone = %phone,
            preview = %preview(&message),
            "Sending message"
        );

        let report = DeliveryAttempt::new(
            self.driver.as_ref(),
            &self.guard,
            &self.config,
            &phone,
            &message,
        )
        .run()
        .await;

        debug!(
            position,
            final_state = %report.final_state(),
            steps = report.path.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Attempt finished"
        );
        let outcome = report.outcome();
        (AuditRecord::new(phone.as_str(), message, &outcome), outcome)
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > MAX_LOG_TEXT_LENGTH {
        let head: String = text.chars().take(MAX_LOG_TEXT_LENGTH).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
