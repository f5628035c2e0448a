use serde::{Deserialize, Serialize};

/// How a [`Locator`] is resolved by the remote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorStrategy {
    XPath,
    Css,
}

impl LocatorStrategy {
    /// The W3C WebDriver `using` value for this strategy.
    pub fn as_webdriver(&self) -> &'static str {
        match self {
            LocatorStrategy::XPath => "xpath",
            LocatorStrategy::Css => "css selector",
        }
    }
}

/// Opaque reference to an element of the remote interface.
///
/// Locators are configuration: the core never inspects `value`, it only hands
/// the locator to the driver and waits for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Locator {
    pub strategy: LocatorStrategy,
    pub value: String,
}

impl Locator {
    pub fn xpath(value: impl Into<String>) -> Self {
        Self {
            strategy: LocatorStrategy::XPath,
            value: value.into(),
        }
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self {
            strategy: LocatorStrategy::Css,
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.strategy {
            LocatorStrategy::XPath => write!(f, "xpath:{}", self.value),
            LocatorStrategy::Css => write!(f, "css:{}", self.value),
        }
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        let s = s.trim();
        match s {
            _ if s.to_lowercase().starts_with("xpath:") => Locator::xpath(&s["xpath:".len()..]),
            _ if s.to_lowercase().starts_with("css:") => Locator::css(&s["css:".len()..]),
            // bare XPath expressions
            _ if s.starts_with('/') || s.starts_with('(') => Locator::xpath(s),
            _ => Locator::css(s),
        }
    }
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        Locator::from(s.as_str())
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}

/// The set of locators a delivery attempt depends on.
///
/// `version` tracks which revision of the remote interface these were written
/// against; bump it whenever the locators are updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Locators {
    pub version: String,
    /// Present once the operator is logged in.
    pub login_ready: Locator,
    /// The message compose surface of an open chat.
    pub compose_box: Locator,
    /// The send affordance of an open chat.
    pub send_button: Locator,
}

impl Default for Locators {
    fn default() -> Self {
        Self {
            version: "2024.1".to_string(),
            login_ready: Locator::xpath(r#"//div[@data-testid="chat-list-search"]"#),
            compose_box: Locator::xpath(
                r#"//div[@data-testid="conversation-compose-box"]//div[@role="textbox"]"#,
            ),
            send_button: Locator::xpath(r#"//button[@data-testid="send"]"#),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_locators() {
        assert_eq!(
            Locator::from("xpath://button[@data-testid='send']"),
            Locator::xpath("//button[@data-testid='send']")
        );
        assert_eq!(
            Locator::from("css:div[role=textbox]"),
            Locator::css("div[role=textbox]")
        );
    }

    #[test]
    fn test_bare_locators_infer_strategy() {
        assert_eq!(Locator::from("//footer").strategy, LocatorStrategy::XPath);
        assert_eq!(
            Locator::from("(//span)[1]").strategy,
            LocatorStrategy::XPath
        );
        assert_eq!(
            Locator::from("button[aria-label=Send]").strategy,
            LocatorStrategy::Css
        );
    }

    #[test]
    fn test_locators_deserialize_from_strings() {
        let yaml = r#"
version: "2025.3"
send_button: "css:button[aria-label=Send]"
"#;
        let locators: Locators = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(locators.version, "2025.3");
        assert_eq!(locators.send_button, Locator::css("button[aria-label=Send]"));
        // unspecified locators keep their defaults
        assert_eq!(locators.compose_box, Locators::default().compose_box);
    }
}
