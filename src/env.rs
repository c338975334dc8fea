use std::fmt;

use anyhow::Result;

use crate::frame::Frame;

/// Discrete environment action. `0` is always the no-op.
pub type ActionId = u8;

pub const NOOP: ActionId = 0;

/// Per-step metadata reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepInfo {
    /// Lives remaining, for titles that have them.
    pub lives: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub observation: Frame,
    pub reward: f64,
    pub terminal: bool,
    pub info: StepInfo,
}

/// Opaque emulator snapshot. Only ever passed back to `restore_state`.
#[derive(Clone, PartialEq, Eq)]
pub struct EngineState(Vec<u8>);

impl EngineState {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineState({} bytes)", self.0.len())
    }
}

/// Simulation backend driven by the session loop.
pub trait Env {
    fn reset(&mut self) -> Result<Frame>;

    fn step(&mut self, action: ActionId) -> Result<StepResult>;

    /// Frame to show the player, if the backend renders one.
    fn render(&mut self) -> Option<Frame> {
        None
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn clone_state(&mut self) -> Result<EngineState>;

    fn restore_state(&mut self, state: &EngineState) -> Result<()>;

    fn action_count(&self) -> usize;

    /// Whether `StepInfo::lives` is filled in; fixes the table layout.
    fn reports_lives(&self) -> bool {
        false
    }
}
