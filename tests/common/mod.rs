#![allow(dead_code)]

use std::collections::VecDeque;

use anyhow::{Result, bail};

use playtrace::agent::InputSource;
use playtrace::{ActionId, ChannelOrder, EngineState, Env, Frame, InputEvent, StepInfo, StepResult};

/// Deterministic environment whose whole state is one step counter.
///
/// Frames are 2x1 BGR; the first pixel encodes the counter so observations
/// can be compared across rewinds.
#[derive(Debug, Default)]
pub struct CounterEnv {
    pub counter: u32,
    /// (transition index, reward)
    pub rewards: Vec<(u32, f64)>,
    pub terminal_at: Option<u32>,
    pub lives: Option<i32>,
    pub fail_step_at: Option<u32>,
    /// Counter value at which `clone_state` fails.
    pub fail_clone_at: Option<u32>,
    pub resets: u32,
    pub restores: u32,
    pub closes: u32,
}

impl CounterEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reward(mut self, index: u32, reward: f64) -> Self {
        self.rewards.push((index, reward));
        self
    }

    pub fn with_terminal_at(mut self, index: u32) -> Self {
        self.terminal_at = Some(index);
        self
    }

    pub fn with_lives(mut self, lives: i32) -> Self {
        self.lives = Some(lives);
        self
    }

    pub fn failing_at(mut self, index: u32) -> Self {
        self.fail_step_at = Some(index);
        self
    }

    pub fn failing_clone_at(mut self, counter: u32) -> Self {
        self.fail_clone_at = Some(counter);
        self
    }

    pub fn frame(&self) -> Frame {
        counter_frame(self.counter)
    }
}

/// Blue carries the counter, red is fixed at 200.
pub fn counter_frame(counter: u32) -> Frame {
    Frame::new(
        2,
        1,
        ChannelOrder::Bgr,
        vec![counter as u8, 0, 200, 1, 2, 3],
    )
}

impl Env for CounterEnv {
    fn reset(&mut self) -> Result<Frame> {
        self.counter = 0;
        self.resets += 1;
        Ok(self.frame())
    }

    fn step(&mut self, _action: ActionId) -> Result<StepResult> {
        let index = self.counter;
        if self.fail_step_at == Some(index) {
            bail!("emulator fault at step {index}");
        }
        self.counter += 1;
        let reward: f64 = self
            .rewards
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, r)| *r)
            .sum();
        Ok(StepResult {
            observation: self.frame(),
            reward,
            terminal: self.terminal_at == Some(index),
            info: StepInfo { lives: self.lives },
        })
    }

    fn render(&mut self) -> Option<Frame> {
        Some(self.frame())
    }

    fn close(&mut self) -> Result<()> {
        self.closes += 1;
        Ok(())
    }

    fn clone_state(&mut self) -> Result<EngineState> {
        if self.fail_clone_at == Some(self.counter) {
            bail!("snapshot failed at counter {}", self.counter);
        }
        Ok(EngineState::new(self.counter.to_le_bytes().to_vec()))
    }

    fn restore_state(&mut self, state: &EngineState) -> Result<()> {
        let bytes: [u8; 4] = match state.as_bytes().try_into() {
            Ok(bytes) => bytes,
            Err(_) => bail!("bad snapshot length {}", state.len()),
        };
        self.counter = u32::from_le_bytes(bytes);
        self.restores += 1;
        Ok(())
    }

    fn action_count(&self) -> usize {
        18
    }

    fn reports_lives(&self) -> bool {
        self.lives.is_some()
    }
}

pub fn counter_state(counter: u32) -> EngineState {
    EngineState::new(counter.to_le_bytes().to_vec())
}

/// Input source that replays one batch of events per poll.
#[derive(Debug, Default)]
pub struct ScriptedKeys {
    pub ticks: VecDeque<Vec<InputEvent>>,
    pub presented: usize,
}

impl ScriptedKeys {
    pub fn new(ticks: impl IntoIterator<Item = Vec<InputEvent>>) -> Self {
        Self {
            ticks: ticks.into_iter().collect(),
            presented: 0,
        }
    }
}

impl InputSource for ScriptedKeys {
    fn poll(&mut self, events: &mut Vec<InputEvent>) -> Result<()> {
        if let Some(batch) = self.ticks.pop_front() {
            events.extend(batch);
        }
        Ok(())
    }

    fn present(&mut self, _frame: &Frame) -> Result<()> {
        self.presented += 1;
        Ok(())
    }
}
