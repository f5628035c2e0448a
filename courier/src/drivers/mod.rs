use crate::config::CourierConfig;
use crate::errors::DriverError;
use crate::locator::Locator;
use std::time::Duration;

pub mod webdriver;

pub use webdriver::WebDriverSession;

/// Opaque handle to an element resolved by a [`UiDriver`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// The capability every remote UI session must provide.
///
/// A driver represents one exclusive remote conversation context; callers
/// must not issue commands to it concurrently.
#[async_trait::async_trait]
pub trait UiDriver: Send + Sync {
    /// Load `url` in the session.
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Poll until an element matching `locator` is present, up to `timeout`.
    ///
    /// Returns [`DriverError::Timeout`] when the element never shows up and
    /// [`DriverError::InvalidLocator`] when the locator cannot be evaluated.
    async fn wait_for_locator(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle, DriverError>;

    /// Type `text` into `element`.
    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), DriverError>;

    /// Click `element`.
    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Terminate the session. Calling this more than once is a no-op.
    async fn quit(&self) -> Result<(), DriverError>;
}

/// Start the default driver for this configuration
pub async fn connect(config: &CourierConfig) -> Result<Box<dyn UiDriver>, DriverError> {
    let session = WebDriverSession::start(config).await?;
    Ok(Box::new(session))
}
