//! Per-contact delivery protocol
//!
//! A [`DeliveryAttempt`] walks a fixed state machine against a [`UiDriver`]:
//!
//! ```text
//! Idle -> AwaitingConnectivity -> Navigating -> AwaitingComposeReady
//!      -> Composing -> AwaitingSendReady -> Sent
//! ```
//!
//! Any step may instead end in `TimedOut`, `ElementMissing` or
//! `UnexpectedError`. There is no retry inside an attempt; every terminal
//! state maps to exactly one [`AttemptOutcome`].

use crate::config::{ComposeMode, CourierConfig};
use crate::connectivity::{Connectivity, ConnectivityGuard};
use crate::drivers::{ElementHandle, UiDriver};
use crate::errors::{DriverError, ErrorClass};
use crate::outcome::{AttemptOutcome, Failure, FailureKind};
use crate::pacing;
use crate::phone::NormalizedPhone;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const UNREACHABLE_REASON: &str =
    "chat not loaded or destination not reachable via the messaging service";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    AwaitingConnectivity,
    Navigating,
    AwaitingComposeReady,
    Composing,
    AwaitingSendReady,
    Sent,
    TimedOut(String),
    ElementMissing(String),
    UnexpectedError(String),
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Sent
                | AttemptState::TimedOut(_)
                | AttemptState::ElementMissing(_)
                | AttemptState::UnexpectedError(_)
        )
    }

    /// The outcome of a terminal state; `None` while the attempt is in flight.
    pub fn outcome(&self) -> Option<AttemptOutcome> {
        let failed = |kind, reason: &String| {
            Some(AttemptOutcome::Failed(Failure::new(kind, reason.clone())))
        };
        match self {
            AttemptState::Sent => Some(AttemptOutcome::Success),
            AttemptState::TimedOut(reason) => failed(FailureKind::TimedOut, reason),
            AttemptState::ElementMissing(reason) => failed(FailureKind::ElementMissing, reason),
            AttemptState::UnexpectedError(reason) => failed(FailureKind::Unexpected, reason),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AttemptState::Idle => "Idle",
            AttemptState::AwaitingConnectivity => "AwaitingConnectivity",
            AttemptState::Navigating => "Navigating",
            AttemptState::AwaitingComposeReady => "AwaitingComposeReady",
            AttemptState::Composing => "Composing",
            AttemptState::AwaitingSendReady => "AwaitingSendReady",
            AttemptState::Sent => "Sent",
            AttemptState::TimedOut(_) => "TimedOut",
            AttemptState::ElementMissing(_) => "ElementMissing",
            AttemptState::UnexpectedError(_) => "UnexpectedError",
        }
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the deep link that opens a chat with `phone`.
///
/// `text` is only included when the compose surface is pre-filled by the link.
pub fn deep_link(base_url: &str, phone: &NormalizedPhone, text: Option<&str>) -> String {
    let mut url = format!("{}/send?phone={}", base_url.trim_end_matches('/'), phone);
    if let Some(text) = text {
        url.push_str("&text=");
        url.push_str(&urlencoding::encode(text));
    }
    url
}

/// Everything an attempt reports back to the loop.
#[derive(Debug, Clone)]
pub struct AttemptReport {
    /// Every state visited, in order, ending with the terminal one.
    pub path: Vec<AttemptState>,
    pub elapsed: Duration,
}

impl AttemptReport {
    pub fn final_state(&self) -> &AttemptState {
        // path always holds at least Idle
        &self.path[self.path.len() - 1]
    }

    pub fn outcome(&self) -> AttemptOutcome {
        self.final_state().outcome().unwrap_or_else(|| {
            AttemptOutcome::Failed(Failure::new(
                FailureKind::Unexpected,
                format!("attempt stopped in non-terminal state {}", self.final_state()),
            ))
        })
    }
}

pub struct DeliveryAttempt<'a> {
    driver: &'a dyn UiDriver,
    guard: &'a ConnectivityGuard,
    config: &'a CourierConfig,
    phone: &'a NormalizedPhone,
    message: &'a str,
    state: AttemptState,
    compose_box: Option<ElementHandle>,
    path: Vec<AttemptState>,
}

impl<'a> DeliveryAttempt<'a> {
    pub fn new(
        driver: &'a dyn UiDriver,
        guard: &'a ConnectivityGuard,
        config: &'a CourierConfig,
        phone: &'a NormalizedPhone,
        message: &'a str,
    ) -> Self {
        Self {
            driver,
            guard,
            config,
            phone,
            message,
            state: AttemptState::Idle,
            compose_box: None,
            path: vec![AttemptState::Idle],
        }
    }

    /// Drive the attempt to a terminal state.
    #[instrument(name = "attempt", skip(self), fields(phone = %self.phone))]
    pub async fn run(mut self) -> AttemptReport {
        let started = Instant::now();
        while !self.state.is_terminal() {
            let next = self.step().await;
            debug!(from = %self.state, to = %next, "Attempt transition");
            self.path.push(next.clone());
            self.state = next;
        }

        let elapsed = started.elapsed();
        match &self.state {
            AttemptState::Sent => info!(elapsed_ms = elapsed.as_millis() as u64, "Message sent"),
            other => warn!(state = %other, reason = ?other.outcome().map(|o| o.reason().to_string()), "Attempt failed"),
        }
        AttemptReport {
            path: self.path,
            elapsed,
        }
    }

    async fn step(&mut self) -> AttemptState {
        match self.state {
            AttemptState::Idle => AttemptState::AwaitingConnectivity,
            AttemptState::AwaitingConnectivity => match self.guard.ensure_connectivity().await {
                Connectivity::Online => AttemptState::Navigating,
                Connectivity::Cancelled => AttemptState::UnexpectedError(
                    "cancelled while waiting for connectivity".to_string(),
                ),
            },
            AttemptState::Navigating => {
                let text = match self.config.compose_mode {
                    ComposeMode::Prefill => Some(self.message),
                    ComposeMode::Keystrokes => None,
                };
                let url = deep_link(&self.config.messaging_base_url, self.phone, text);
                match self.driver.navigate(&url).await {
                    Ok(()) => AttemptState::AwaitingComposeReady,
                    Err(e) => self.failed("the chat to open", e),
                }
            }
            AttemptState::AwaitingComposeReady => {
                let timeout = self.config.timeouts.compose();
                match self
                    .driver
                    .wait_for_locator(&self.config.locators.compose_box, timeout)
                    .await
                {
                    Ok(element) => {
                        self.compose_box = Some(element);
                        match self.config.compose_mode {
                            ComposeMode::Keystrokes => AttemptState::Composing,
                            // the link already filled in the message
                            ComposeMode::Prefill => AttemptState::AwaitingSendReady,
                        }
                    }
                    Err(e) => self.failed("the message box", e),
                }
            }
            AttemptState::Composing => {
                let Some(compose_box) = self.compose_box.as_ref() else {
                    return AttemptState::UnexpectedError(
                        "compose box handle lost before typing".to_string(),
                    );
                };
                match self.driver.send_keys(compose_box, self.message).await {
                    Ok(()) => AttemptState::AwaitingSendReady,
                    Err(e) => self.failed("the message box", e),
                }
            }
            AttemptState::AwaitingSendReady => {
                let timeout = self.config.timeouts.send();
                let button = match self
                    .driver
                    .wait_for_locator(&self.config.locators.send_button, timeout)
                    .await
                {
                    Ok(button) => button,
                    Err(e) => return self.failed("the send button", e),
                };
                if let Err(e) = self.driver.click(&button).await {
                    return self.failed("the send button", e);
                }
                // human-like pause; the message is already out, so cancellation is moot here
                pacing::pause(
                    &self.config.send_jitter,
                    self.guard.cancellation_token(),
                )
                .await;
                AttemptState::Sent
            }
            ref terminal => terminal.clone(),
        }
    }

    /// Classify a driver failure into a terminal state.
    fn failed(&self, element: &str, error: DriverError) -> AttemptState {
        match error.class() {
            ErrorClass::Timing => AttemptState::TimedOut(format!(
                "Timed out waiting for {element} for {}: {UNREACHABLE_REASON} ({error})",
                self.phone
            )),
            ErrorClass::Structural => AttemptState::ElementMissing(format!(
                "Could not find {element} for {}; the messaging interface might have changed ({error})",
                self.phone
            )),
            ErrorClass::Unclassified => AttemptState::UnexpectedError(format!(
                "An unexpected error occurred for {}: {error}",
                self.phone
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phone::normalize;

    #[test]
    fn test_deep_link_without_text() {
        let phone = normalize("9876543210");
        assert_eq!(
            deep_link("https://web.whatsapp.com/", &phone, None),
            "https://web.whatsapp.com/send?phone=+919876543210"
        );
    }

    #[test]
    fn test_deep_link_encodes_text() {
        let phone = normalize("+14155550123");
        assert_eq!(
            deep_link("https://web.whatsapp.com", &phone, Some("Hi Ann & co!\nBye")),
            "https://web.whatsapp.com/send?phone=+14155550123&text=Hi%20Ann%20%26%20co%21%0ABye"
        );
    }

    #[test]
    fn test_terminal_states_map_to_outcomes() {
        assert_eq!(AttemptState::Sent.outcome(), Some(AttemptOutcome::Success));
        assert_eq!(
            AttemptState::TimedOut("t".into()).outcome().unwrap().kind(),
            crate::outcome::OutcomeKind::Failed
        );
        assert!(AttemptState::ElementMissing("e".into())
            .outcome()
            .unwrap()
            .is_structural_failure());
        assert_eq!(AttemptState::Navigating.outcome(), None);
        assert!(!AttemptState::Composing.is_terminal());
    }
}
