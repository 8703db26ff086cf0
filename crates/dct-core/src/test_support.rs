//! Test support utilities for dct-core
//!
//! Provides MockCompose for unit testing environments and address resolution
//! without a real compose runtime.

use async_trait::async_trait;
use dct_compose::{ComposeError, ComposeProject, ComposeRunner, Result};
use std::collections::HashMap;
use std::sync::Mutex;

/// Records which methods were called on the mock
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Up {
        project: String,
        force_recreate: bool,
    },
    Down {
        project: String,
    },
    Port {
        service: String,
        port: u16,
        index: u32,
    },
    Logs {
        service: String,
    },
}

/// Exit code and stderr of a simulated compose failure
type Failure = Option<(i32, String)>;

/// Configurable mock compose runner.
///
/// Operations succeed by default. `port` fails for keys without a configured
/// address, like compose does for unknown services.
#[derive(Default)]
pub struct MockCompose {
    calls: Mutex<Vec<MockCall>>,
    /// Projects seen by `up`, in order
    projects: Mutex<Vec<ComposeProject>>,
    ports: Mutex<HashMap<(String, u16, u32), String>>,
    logs: Mutex<HashMap<String, String>>,
    up_failure: Mutex<Failure>,
    down_failure: Mutex<Failure>,
    logs_failure: Mutex<Failure>,
}

impl MockCompose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_port(&self, service: &str, port: u16, index: u32, address: &str) {
        self.ports
            .lock()
            .unwrap()
            .insert((service.to_string(), port, index), address.to_string());
    }

    pub fn set_logs(&self, service: &str, output: &str) {
        self.logs
            .lock()
            .unwrap()
            .insert(service.to_string(), output.to_string());
    }

    pub fn fail_up(&self, exit_code: i32, stderr: &str) {
        *self.up_failure.lock().unwrap() = Some((exit_code, stderr.to_string()));
    }

    pub fn fail_down(&self, exit_code: i32, stderr: &str) {
        *self.down_failure.lock().unwrap() = Some((exit_code, stderr.to_string()));
    }

    pub fn fail_logs(&self, exit_code: i32, stderr: &str) {
        *self.logs_failure.lock().unwrap() = Some((exit_code, stderr.to_string()));
    }

    /// Make every operation succeed again
    pub fn clear_failures(&self) {
        *self.up_failure.lock().unwrap() = None;
        *self.down_failure.lock().unwrap() = None;
        *self.logs_failure.lock().unwrap() = None;
    }

    /// Record a call
    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Check if a specific call was made
    pub fn was_called(&self, call: &MockCall) -> bool {
        self.calls.lock().unwrap().contains(call)
    }

    /// Projects passed to `up`, with their variables
    pub fn brought_up(&self) -> Vec<ComposeProject> {
        self.projects.lock().unwrap().clone()
    }
}

fn check(failure: &Mutex<Failure>, operation: &str) -> Result<()> {
    match failure.lock().unwrap().clone() {
        Some((exit_code, stderr)) => Err(ComposeError::CommandFailed {
            operation: operation.to_string(),
            exit_code: Some(exit_code),
            stderr,
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl ComposeRunner for MockCompose {
    async fn up(&self, project: &ComposeProject, force_recreate: bool) -> Result<()> {
        self.record(MockCall::Up {
            project: project.project_name.clone(),
            force_recreate,
        });
        self.projects.lock().unwrap().push(project.clone());
        check(&self.up_failure, "up")
    }

    async fn down(&self, project: &ComposeProject) -> Result<()> {
        self.record(MockCall::Down {
            project: project.project_name.clone(),
        });
        check(&self.down_failure, "down")
    }

    async fn port(
        &self,
        _project: &ComposeProject,
        service: &str,
        port: u16,
        index: u32,
    ) -> Result<String> {
        self.record(MockCall::Port {
            service: service.to_string(),
            port,
            index,
        });
        self.ports
            .lock()
            .unwrap()
            .get(&(service.to_string(), port, index))
            .cloned()
            .ok_or_else(|| ComposeError::CommandFailed {
                operation: "port".to_string(),
                exit_code: Some(1),
                stderr: format!("no such service: {}", service),
            })
    }

    async fn logs(&self, _project: &ComposeProject, service: &str) -> Result<String> {
        self.record(MockCall::Logs {
            service: service.to_string(),
        });
        check(&self.logs_failure, "logs")?;
        Ok(self
            .logs
            .lock()
            .unwrap()
            .get(service)
            .cloned()
            .unwrap_or_default())
    }

    fn describe(&self) -> String {
        "mock compose".to_string()
    }
}
