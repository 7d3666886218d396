//! Scripted collaborators shared by the unit tests.

#![allow(clippy::cast_possible_truncation)]

use crate::clock::Clock;
use crate::config::{DefaultSettings, TestType, WarmupConfig};
use crate::platform::{DeviceProbe, HardwareInfo};
use crate::registry::WorkloadRegistry;
use crate::runner::PassRunner;
use crate::warmup::Warmup;
use crate::workload::{PassOutput, Target, Workload, WorkloadHandle};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const MB: u64 = 1_048_576;

/// Advances one second per reading.
pub struct StepClock(AtomicU64);

impl StepClock {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }
}

impl Clock for StepClock {
    fn now(&self) -> Duration {
        Duration::from_secs(self.0.fetch_add(1, Ordering::SeqCst))
    }
}

/// Never advances.
pub struct FrozenClock;

impl Clock for FrozenClock {
    fn now(&self) -> Duration {
        Duration::from_secs(1)
    }
}

pub struct FakeProbe {
    pub flushes: AtomicU32,
    pub flush_fails: bool,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self {
            flushes: AtomicU32::new(0),
            flush_fails: false,
        }
    }
}

impl DeviceProbe for FakeProbe {
    fn filesystem_name(&self, _path: &Path) -> String {
        "ext4".to_string()
    }

    fn volume_name(&self, _path: &Path) -> String {
        "scratch".to_string()
    }

    fn hardware_info(&self, _path: &Path) -> HardwareInfo {
        HardwareInfo {
            vendor: "ACME".to_string(),
            ..HardwareInfo::default()
        }
    }

    fn flush_cache(&self, _path: &Path) -> anyhow::Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if self.flush_fails {
            anyhow::bail!("not supported");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct Calls {
    pub setups: AtomicU32,
    pub runs: AtomicU32,
    pub cleanups: AtomicU32,
}

impl Calls {
    pub fn get(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

/// Replays a fixed script of pass outcomes; `None` is a failing pass.
pub struct ScriptedWorkload {
    pub test_type: TestType,
    pub script: Vec<Option<PassOutput>>,
    pub setup_fails: bool,
    pub panics: bool,
    pub calls: Arc<Calls>,
}

impl ScriptedWorkload {
    pub fn new(test_type: TestType, script: Vec<Option<PassOutput>>) -> (Self, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        (
            Self {
                test_type,
                script,
                setup_fails: false,
                panics: false,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

struct ScriptedHandle {
    script: std::vec::IntoIter<Option<PassOutput>>,
    panics: bool,
    calls: Arc<Calls>,
}

impl Workload for ScriptedWorkload {
    fn test_type(&self) -> TestType {
        self.test_type
    }

    fn name(&self) -> &'static str {
        "Scripted"
    }

    fn description(&self) -> &'static str {
        "Replays scripted pass results"
    }

    fn default_settings(&self) -> DefaultSettings {
        DefaultSettings {
            block_size: 4096,
            pass_count: self.script.len() as u32,
        }
    }

    fn setup(&self, _target: &Target, _block_size: u32) -> anyhow::Result<Box<dyn WorkloadHandle>> {
        self.calls.setups.fetch_add(1, Ordering::SeqCst);
        if self.setup_fails {
            anyhow::bail!("no space left");
        }
        Ok(Box::new(ScriptedHandle {
            script: self.script.clone().into_iter(),
            panics: self.panics,
            calls: Arc::clone(&self.calls),
        }))
    }
}

impl WorkloadHandle for ScriptedHandle {
    fn run(&mut self) -> anyhow::Result<PassOutput> {
        self.calls.runs.fetch_add(1, Ordering::SeqCst);
        assert!(!self.panics, "scripted workload panic");
        match self.script.next().flatten() {
            Some(output) => Ok(output),
            None => anyhow::bail!("pass failed"),
        }
    }

    fn cleanup(self: Box<Self>) -> anyhow::Result<()> {
        self.calls.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A pass that moved `n` MiB in `n` operations.
pub fn mb(n: u64) -> Option<PassOutput> {
    Some(PassOutput {
        bytes_processed: n * MB,
        op_count: n,
    })
}

pub fn no_warmup() -> Warmup {
    Warmup::new(WarmupConfig {
        enabled: false,
        ..WarmupConfig::default()
    })
}

pub fn runner_with(workloads: Vec<ScriptedWorkload>, clock: Arc<dyn Clock>, probe: Arc<FakeProbe>) -> PassRunner {
    let mut registry = WorkloadRegistry::new();
    for workload in workloads {
        registry.register(Arc::new(workload));
    }
    PassRunner::new(Arc::new(registry), probe, clock, no_warmup())
}

/// Collects progress lines.
pub struct ProgressLog(pub Mutex<Vec<String>>);

impl ProgressLog {
    pub fn new() -> Self {
        Self(Mutex::new(Vec::new()))
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}
