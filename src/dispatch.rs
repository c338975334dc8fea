//! Meta-command handling for the session loop.
//!
//! Commands are applied in priority order (close, rewind, save, episode end)
//! and nothing runs after a close.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::env::Env;
use crate::error::{AdapterContext, AdapterOp, SessionError};
use crate::frame::Observation;
use crate::ids::IdAllocator;
use crate::input::{MetaCommand, MetaCommands};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    /// Terminal; entered only through `MetaCommand::Close`.
    Closing,
}

impl<E: Env, A: Agent, I: IdAllocator> Session<E, A, I> {
    pub fn dispatch(&mut self, commands: &MetaCommands) -> Result<(), SessionError> {
        let mut rotated = false;
        for command in commands.iter() {
            if self.is_closed() {
                debug!(?command, "session closed; command dropped");
                break;
            }
            match command {
                MetaCommand::Close => self.on_close()?,
                MetaCommand::Rewind => self.on_rewind()?,
                MetaCommand::Save => {
                    self.on_save()?;
                    rotated = true;
                }
                MetaCommand::EpisodeEnd => self.on_episode_end(rotated)?,
            }
        }
        Ok(())
    }

    fn on_close(&mut self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Ok(());
        }
        self.persist()?;
        self.env.close().adapter(AdapterOp::Close)?;
        self.phase = Phase::Closing;
        info!(
            ticks = self.summary.ticks,
            trajectories = self.summary.trajectories_saved,
            "session closed"
        );
        Ok(())
    }

    fn on_rewind(&mut self) -> Result<(), SessionError> {
        self.agent.release_trigger(MetaCommand::Rewind);
        if !self.buffer.captures_state() {
            warn!("rewind ignored: engine state capture is disabled");
            return Ok(());
        }

        let Some(point) = self.buffer.rewind(self.config.rewind_window()) else {
            warn!(traj = %self.buffer.traj_id(), "rewind ignored: no snapshot available");
            return Ok(());
        };
        self.env
            .restore_state(&point.state)
            .adapter(AdapterOp::RestoreState)?;
        self.prev_obs = point.observation.clone();
        self.obs = point.observation;
        self.summary.rewinds += 1;
        info!(traj = %self.buffer.traj_id(), len = self.buffer.len(), "rewound");
        Ok(())
    }

    fn on_save(&mut self) -> Result<(), SessionError> {
        self.agent.release_trigger(MetaCommand::Save);
        self.persist()?;
        self.buffer.new_trajectory()?;
        Ok(())
    }

    /// `rotated` is set when a save already closed the segment this tick; the
    /// fresh, empty segment is kept instead of being written and replaced.
    fn on_episode_end(&mut self, rotated: bool) -> Result<(), SessionError> {
        let initial: Observation = Arc::new(self.env.reset().adapter(AdapterOp::Reset)?);
        self.prev_obs = initial.clone();
        self.obs = initial;

        if !(rotated && self.buffer.is_empty()) {
            self.persist()?;
            self.buffer.new_trajectory()?;
        }
        self.anchor_here()?;
        info!(traj = %self.buffer.traj_id(), "episode ended");
        Ok(())
    }

    fn persist(&mut self) -> Result<(), SessionError> {
        if let Some(n) = self.buffer.save_trajectory()? {
            self.summary.trajectories_saved += 1;
            self.summary.transitions_saved += n as u64;
        }
        Ok(())
    }
}
