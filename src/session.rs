use std::sync::Arc;

use tracing::{debug, error, info};

use crate::agent::Agent;
use crate::config::SessionConfig;
use crate::dispatch::Phase;
use crate::env::{ActionId, EngineState, Env, NOOP};
use crate::error::{AdapterContext, AdapterOp, SessionError};
use crate::frame::Observation;
use crate::ids::IdAllocator;
use crate::input::{MetaCommand, MetaCommands};
use crate::pacing::Pacer;
use crate::trajectory::TrajectoryBuffer;

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub ticks: u64,
    pub trajectories_saved: u64,
    pub transitions_saved: u64,
    pub rewinds: u64,
}

// =============================================================================
// Play Driver
// =============================================================================

/// Drives one environment under one agent, recording every step.
pub struct Session<E: Env, A: Agent, I: IdAllocator> {
    pub(crate) env: E,
    pub(crate) agent: A,
    pub(crate) buffer: TrajectoryBuffer<I>,
    pub(crate) config: SessionConfig,
    pub(crate) phase: Phase,
    pacer: Pacer,
    pub(crate) prev_obs: Observation,
    pub(crate) obs: Observation,
    action: ActionId,
    pending: MetaCommands,
    pub(crate) summary: SessionSummary,
}

impl<E: Env, A: Agent, I: IdAllocator> Session<E, A, I> {
    /// Resets the environment once and seeds both observations with the
    /// initial frame.
    pub fn start(
        mut env: E,
        mut agent: A,
        mut buffer: TrajectoryBuffer<I>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        agent.initialize().map_err(SessionError::Agent)?;
        let initial: Observation = Arc::new(env.reset().adapter(AdapterOp::Reset)?);
        let pacer = Pacer::new(config.ticks_per_second);
        buffer.set_lives_column(env.reports_lives());

        let mut session = Self {
            env,
            agent,
            buffer,
            config,
            phase: Phase::Running,
            pacer,
            prev_obs: initial.clone(),
            obs: initial,
            action: NOOP,
            pending: MetaCommands::new(),
            summary: SessionSummary::default(),
        };
        session.anchor_here()?;
        Ok(session)
    }

    /// Restores `state` and continues from there. The first frame is taken
    /// from the environment's renderer, falling back to the reset frame.
    pub fn resume_from(&mut self, state: &EngineState) -> Result<(), SessionError> {
        self.env
            .restore_state(state)
            .adapter(AdapterOp::RestoreState)?;
        if let Some(frame) = self.env.render() {
            let frame: Observation = Arc::new(frame);
            self.prev_obs = frame.clone();
            self.obs = frame;
        }
        self.buffer.set_anchor(state.clone(), self.obs.clone());
        info!(bytes = state.len(), "resumed from snapshot");
        Ok(())
    }

    /// Records the current engine state as the point a full rewind returns to.
    pub(crate) fn anchor_here(&mut self) -> Result<(), SessionError> {
        if self.buffer.captures_state() {
            let state = self.env.clone_state().adapter(AdapterOp::CloneState)?;
            self.buffer.set_anchor(state, self.obs.clone());
        }
        Ok(())
    }

    /// Runs ticks until the session closes. On an adapter or agent failure a
    /// final save is attempted before the error is returned.
    pub fn run(&mut self) -> Result<SessionSummary, SessionError> {
        self.pacer.reset();
        while !self.is_closed() {
            if let Err(err) = self.tick() {
                if !matches!(err, SessionError::Persistence(_)) {
                    self.salvage();
                }
                return Err(err);
            }
        }
        Ok(self.summary)
    }

    /// One before-step / step / post-step cycle.
    pub fn tick(&mut self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Ok(());
        }
        self.before_step()?;
        self.step()?;
        self.post_step()?;
        self.summary.ticks += 1;
        Ok(())
    }

    fn before_step(&mut self) -> Result<(), SessionError> {
        let decision = self.agent.act(&self.obs).map_err(SessionError::Agent)?;
        self.action = decision.action;
        self.pending = decision.commands;

        if let Some(frame) = self.env.render() {
            self.agent.present(&frame).map_err(SessionError::Agent)?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), SessionError> {
        let result = self.env.step(self.action).adapter(AdapterOp::Step)?;
        self.prev_obs = std::mem::replace(&mut self.obs, Arc::new(result.observation));

        self.buffer.store_transition(
            self.prev_obs.clone(),
            self.obs.clone(),
            self.action,
            result.reward,
            result.terminal,
            result.info,
            &mut self.env,
        )?;
        debug!(
            action = self.action,
            reward = result.reward,
            terminal = result.terminal,
            len = self.buffer.len(),
            "step"
        );

        if result.terminal {
            self.pending.insert(MetaCommand::EpisodeEnd);
        }
        Ok(())
    }

    fn post_step(&mut self) -> Result<(), SessionError> {
        let commands = std::mem::take(&mut self.pending);
        self.dispatch(&commands)?;
        if !self.is_closed() {
            self.pacer.tick();
        }
        Ok(())
    }

    fn salvage(&mut self) {
        if self.is_closed() {
            return;
        }
        match self.buffer.save_trajectory() {
            Ok(Some(n)) => {
                self.summary.trajectories_saved += 1;
                self.summary.transitions_saved += n as u64;
            }
            Ok(None) => {}
            Err(err) => error!(error = %err, "final save failed"),
        }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn buffer(&self) -> &TrajectoryBuffer<I> {
        &self.buffer
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closing
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    pub fn observation(&self) -> &Observation {
        &self.obs
    }

    pub fn prior_observation(&self) -> &Observation {
        &self.prev_obs
    }
}
