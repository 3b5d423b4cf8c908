// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OS scheduler-state probe used when selecting a forwarding target.
//!
//! A child in state `R` is on-CPU and treated as possibly busy with previous
//! work; selection prefers a sleeping sibling that is guaranteed to pick up
//! the next channel message. The probe is advisory: a send can still fail
//! after a positive check and the router handles that.

use async_trait::async_trait;

/// Coarse scheduler state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedState {
    /// Sleeping/waiting; will wake for channel input.
    Idle,
    /// Ready to run but not on-CPU (platforms that can distinguish).
    Runnable,
    /// Currently on-CPU (`R` in ps terms).
    Running,
    /// Unknown, unsupported platform, or probe failure.
    Other,
}

impl SchedState {
    /// Whether a worker in this state may be selected as a forwarding target.
    ///
    /// Only `Running` is rejected; `Other` degrades to first-alive selection.
    pub fn eligible(&self) -> bool {
        *self != SchedState::Running
    }
}

/// Platform interface for reading a process's scheduler state.
#[async_trait]
pub trait SchedProbe: Send + Sync + 'static {
    async fn state(&self, pid: u32) -> SchedState;
}

/// `ps -o state= -p <pid>` based probe.
#[derive(Debug, Clone, Default)]
pub struct PsSchedProbe;

#[async_trait]
impl SchedProbe for PsSchedProbe {
    async fn state(&self, pid: u32) -> SchedState {
        let output = tokio::process::Command::new("ps")
            .arg("-o")
            .arg("state=")
            .arg("-p")
            .arg(pid.to_string())
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                parse_ps_state(&String::from_utf8_lossy(&out.stdout))
            }
            _ => SchedState::Other,
        }
    }
}

/// Map a `ps` state column to a [`SchedState`].
///
/// `R` is running; `S`/`I` are interruptible sleeps that wake for channel
/// input; everything else (`D`, `T`, `Z`, ...) is `Other`.
pub fn parse_ps_state(raw: &str) -> SchedState {
    match raw.trim().chars().next() {
        Some('R') => SchedState::Running,
        Some('S') | Some('I') => SchedState::Idle,
        Some(_) | None => SchedState::Other,
    }
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
