use std::collections::VecDeque;

use anyhow::Result;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::env::{ActionId, NOOP};
use crate::frame::Frame;
use crate::input::{InputEvent, InputMapper, InputState, MetaCommand, MetaCommands};

/// What an agent wants to happen this tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    pub action: ActionId,
    pub commands: MetaCommands,
}

impl Decision {
    pub fn act(action: ActionId) -> Self {
        Self {
            action,
            commands: MetaCommands::new(),
        }
    }

    pub fn with(mut self, command: MetaCommand) -> Self {
        self.commands.insert(command);
        self
    }
}

/// Anything that picks actions: a person at the keyboard or a program.
pub trait Agent {
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Shows the latest rendered frame, if the agent has a display.
    fn present(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }

    fn act(&mut self, observation: &Frame) -> Result<Decision>;

    /// Marks the key behind `command` released so holding it fires only once.
    fn release_trigger(&mut self, _command: MetaCommand) {}
}

// =============================================================================
// Human Agent
// =============================================================================

/// Delivers press/release events once per tick.
pub trait InputSource {
    fn poll(&mut self, events: &mut Vec<InputEvent>) -> Result<()>;

    fn present(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }
}

pub struct HumanAgent<S: InputSource> {
    source: S,
    mapper: InputMapper,
    state: InputState,
    events: Vec<InputEvent>,
}

impl<S: InputSource> HumanAgent<S> {
    pub fn new(source: S, mapper: InputMapper) -> Self {
        let state = mapper.input_state();
        Self {
            source,
            mapper,
            state,
            events: Vec::new(),
        }
    }

    pub fn input_state(&self) -> &InputState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: InputSource> Agent for HumanAgent<S> {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        self.source.present(frame)
    }

    fn act(&mut self, _observation: &Frame) -> Result<Decision> {
        self.events.clear();
        self.source.poll(&mut self.events)?;
        for event in self.events.drain(..) {
            self.state.apply(event);
        }
        let held = self.state.held();
        Ok(Decision {
            action: self.mapper.compute_action(held),
            commands: self.mapper.compute_meta_commands(held),
        })
    }

    fn release_trigger(&mut self, command: MetaCommand) {
        let bindings = self.mapper.meta_bindings();
        match command {
            MetaCommand::Rewind => self.state.release(bindings.rewind),
            MetaCommand::Save => self.state.release(bindings.save),
            MetaCommand::Close | MetaCommand::EpisodeEnd => {}
        }
    }
}

// =============================================================================
// Programmatic Agents
// =============================================================================

/// Replays a fixed list of decisions, then asks to close.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAgent {
    script: VecDeque<Decision>,
}

impl ScriptedAgent {
    pub fn new(script: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    pub fn from_actions(actions: impl IntoIterator<Item = ActionId>) -> Self {
        Self::new(actions.into_iter().map(Decision::act))
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Agent for ScriptedAgent {
    fn act(&mut self, _observation: &Frame) -> Result<Decision> {
        Ok(self
            .script
            .pop_front()
            .unwrap_or_else(|| Decision::act(NOOP).with(MetaCommand::Close)))
    }
}

/// Uniform random actions for a fixed number of steps, then close.
pub struct RandomAgent {
    rng: SmallRng,
    action_count: usize,
    remaining: u64,
}

impl RandomAgent {
    pub fn new(action_count: usize, steps: u64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Self {
            rng,
            action_count: action_count.max(1),
            remaining: steps,
        }
    }
}

impl Agent for RandomAgent {
    fn act(&mut self, _observation: &Frame) -> Result<Decision> {
        if self.remaining == 0 {
            return Ok(Decision::act(NOOP).with(MetaCommand::Close));
        }
        self.remaining -= 1;
        let action = self.rng.random_range(0..self.action_count);
        Ok(Decision::act(action as ActionId))
    }
}
