#![allow(dead_code)]

use courier::{
    AuditLog, ConnectivityGuard, ConnectivityProbe, CourierConfig, DriverError, ElementHandle,
    JitterRange, Locator, Orchestrator, UiDriver,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything a [`ScriptedDriver`] was asked to do.
#[derive(Debug, Default)]
pub struct Calls {
    pub navigations: Vec<String>,
    pub waits: Vec<String>,
    pub typed: Vec<String>,
    pub clicks: usize,
    pub quits: usize,
}

/// In-memory driver. Every locator resolves unless a failure was queued for it.
pub struct ScriptedDriver {
    calls: Arc<Mutex<Calls>>,
    failures: Mutex<HashMap<String, VecDeque<DriverError>>>,
    click_failures: Mutex<VecDeque<DriverError>>,
    navigation_failures: Mutex<VecDeque<DriverError>>,
    stalled: HashSet<String>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Calls::default())),
            failures: Mutex::new(HashMap::new()),
            click_failures: Mutex::new(VecDeque::new()),
            navigation_failures: Mutex::new(VecDeque::new()),
            stalled: HashSet::new(),
        }
    }

    /// Waits on `locator` never resolve; they time out after the full timeout.
    pub fn stall_on(mut self, locator: &Locator) -> Self {
        self.stalled.insert(locator.to_string());
        self
    }

    /// The next navigation fails with `error`.
    pub fn fail_next_navigation(self, error: DriverError) -> Self {
        self.navigation_failures.lock().unwrap().push_back(error);
        self
    }

    /// The next click fails with `error`.
    pub fn fail_next_click(self, error: DriverError) -> Self {
        self.click_failures.lock().unwrap().push_back(error);
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Calls>> {
        self.calls.clone()
    }

    /// The next wait on `locator` fails with `error`.
    pub fn fail_next(self, locator: &Locator, error: DriverError) -> Self {
        self.failures
            .lock()
            .unwrap()
            .entry(locator.to_string())
            .or_default()
            .push_back(error);
        self
    }
}

#[async_trait::async_trait]
impl UiDriver for ScriptedDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.calls.lock().unwrap().navigations.push(url.to_string());
        match self.navigation_failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn wait_for_locator(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle, DriverError> {
        let key = locator.to_string();
        self.calls.lock().unwrap().waits.push(key.clone());
        if self.stalled.contains(&key) {
            tokio::time::sleep(timeout).await;
            return Err(DriverError::Timeout(format!("{key} never appeared")));
        }
        if let Some(error) = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        Ok(ElementHandle(format!("el-{key}")))
    }

    async fn send_keys(&self, _element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        self.calls.lock().unwrap().typed.push(text.to_string());
        Ok(())
    }

    async fn click(&self, _element: &ElementHandle) -> Result<(), DriverError> {
        self.calls.lock().unwrap().clicks += 1;
        match self.click_failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn quit(&self) -> Result<(), DriverError> {
        self.calls.lock().unwrap().quits += 1;
        Ok(())
    }
}

pub struct AlwaysOnline;

#[async_trait::async_trait]
impl ConnectivityProbe for AlwaysOnline {
    async fn probe(&self) -> Result<(), String> {
        Ok(())
    }

    fn target(&self) -> String {
        "always-online".to_string()
    }
}

/// Online for the first check only; every later check fails.
#[derive(Default)]
pub struct OnlineOnce {
    checks: AtomicUsize,
}

#[async_trait::async_trait]
impl ConnectivityProbe for OnlineOnce {
    async fn probe(&self) -> Result<(), String> {
        if self.checks.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(())
        } else {
            Err("network unreachable".into())
        }
    }

    fn target(&self) -> String {
        "online-once".to_string()
    }
}

/// Defaults with no pacing and the audit log under `dir`.
pub fn test_config(dir: &Path) -> CourierConfig {
    CourierConfig {
        pacing: JitterRange::ZERO,
        send_jitter: JitterRange::ZERO,
        audit_log: dir.join("message_log.csv"),
        ..Default::default()
    }
}

pub fn orchestrator(
    driver: ScriptedDriver,
    config: &CourierConfig,
    cancel: CancellationToken,
) -> Orchestrator {
    let audit = AuditLog::open(&config.audit_log).unwrap();
    orchestrator_with(driver, config, Box::new(AlwaysOnline), audit, cancel)
}

/// Like [`orchestrator`], with the connectivity check and audit log supplied.
pub fn orchestrator_with(
    driver: ScriptedDriver,
    config: &CourierConfig,
    connectivity: Box<dyn ConnectivityProbe>,
    audit: AuditLog,
    cancel: CancellationToken,
) -> Orchestrator {
    let guard = ConnectivityGuard::new(connectivity, Duration::from_millis(10), cancel);
    Orchestrator::new(Box::new(driver), guard, audit, config.clone())
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
