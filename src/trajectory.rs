use tracing::{debug, info};

use crate::env::{ActionId, EngineState, Env, StepInfo};
use crate::error::{AdapterContext, AdapterError, AdapterOp, PersistenceError};
use crate::frame::Observation;
use crate::ids::{IdAllocator, TrajId};
use crate::storage::{self, RunLayout, TableRow, TrajectoryPaths};

/// Rewards at or below this magnitude are not reported.
const REWARD_NOTICE_THRESHOLD: f64 = 0.001;

#[derive(Debug, Clone)]
pub struct Transition {
    pub frame_index: usize,
    pub prior_observation: Observation,
    pub next_observation: Observation,
    pub action: ActionId,
    pub reward: f64,
    pub terminal: bool,
    pub lives: Option<i32>,
    /// State after this transition; `None` when capture is disabled.
    pub engine_state: Option<EngineState>,
}

/// A point play can be resumed from.
#[derive(Debug, Clone)]
pub struct Rewound {
    pub state: EngineState,
    pub observation: Observation,
}

/// In-memory record of one trajectory segment.
pub struct TrajectoryBuffer<I: IdAllocator> {
    layout: RunLayout,
    ids: I,
    capture_state: bool,
    paths: TrajectoryPaths,
    transitions: Vec<Transition>,
    anchor: Option<Rewound>,
    lives_column: bool,
    dirty: bool,
}

impl<I: IdAllocator> TrajectoryBuffer<I> {
    pub fn new(layout: RunLayout, mut ids: I, capture_state: bool) -> Result<Self, PersistenceError> {
        let paths = layout.trajectory(&ids.next_id()?);
        paths.prepare()?;
        info!(traj = %paths.id, "new trajectory");
        Ok(Self {
            layout,
            ids,
            capture_state,
            paths,
            transitions: Vec::new(),
            anchor: None,
            lives_column: false,
            dirty: true,
        })
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn traj_id(&self) -> &TrajId {
        &self.paths.id
    }

    pub fn paths(&self) -> &TrajectoryPaths {
        &self.paths
    }

    pub fn captures_state(&self) -> bool {
        self.capture_state
    }

    /// Always write the `lives` column, even for segments without lives data.
    pub fn set_lives_column(&mut self, enabled: bool) {
        self.lives_column = enabled;
    }

    /// Where a rewind past the first transition lands.
    pub fn set_anchor(&mut self, state: EngineState, observation: Observation) {
        self.anchor = Some(Rewound { state, observation });
    }

    /// Snapshots the environment and appends one transition.
    #[allow(clippy::too_many_arguments)]
    pub fn store_transition<E: Env + ?Sized>(
        &mut self,
        prior: Observation,
        next: Observation,
        action: ActionId,
        reward: f64,
        terminal: bool,
        info: StepInfo,
        env: &mut E,
    ) -> Result<(), AdapterError> {
        let engine_state = if self.capture_state {
            Some(env.clone_state().adapter(AdapterOp::CloneState)?)
        } else {
            None
        };

        let frame_index = self.transitions.len();
        if reward.abs() > REWARD_NOTICE_THRESHOLD {
            info!(traj = %self.paths.id, frame = frame_index, reward, "reward");
        }

        self.transitions.push(Transition {
            frame_index,
            prior_observation: prior,
            next_observation: next,
            action,
            reward,
            terminal,
            lives: info.lives,
            engine_state,
        });
        self.dirty = true;
        Ok(())
    }

    /// Drops the last `steps_back` transitions and returns the point to
    /// resume from: the state after the last kept transition, or the anchor
    /// when nothing is kept. Returns `None` and keeps the buffer intact when
    /// no snapshot is available.
    pub fn rewind(&mut self, steps_back: usize) -> Option<Rewound> {
        let idx = self.transitions.len().saturating_sub(steps_back);
        let point = if idx == 0 {
            self.anchor.clone().or_else(|| {
                self.transitions.first().and_then(|t| {
                    Some(Rewound {
                        state: t.engine_state.clone()?,
                        observation: t.next_observation.clone(),
                    })
                })
            })
        } else {
            let t = &self.transitions[idx - 1];
            t.engine_state.clone().map(|state| Rewound {
                state,
                observation: t.next_observation.clone(),
            })
        };

        let Some(point) = point else {
            debug!(traj = %self.paths.id, "no snapshot to rewind to");
            return None;
        };

        if idx < self.transitions.len() {
            debug!(
                traj = %self.paths.id,
                from = self.transitions.len(),
                to = idx,
                "rewind"
            );
            self.transitions.truncate(idx);
            self.dirty = true;
        }
        Some(point)
    }

    /// Writes the table, one image and (when captured) one state file per
    /// transition. Returns the number of transitions written, or `None` when
    /// nothing changed since the last save and no file was touched.
    pub fn save_trajectory(&mut self) -> Result<Option<usize>, PersistenceError> {
        if !self.dirty {
            debug!(traj = %self.paths.id, "trajectory unchanged since last save");
            return Ok(None);
        }
        self.paths.prepare()?;

        let mut score = 0.0;
        let rows: Vec<TableRow> = self
            .transitions
            .iter()
            .enumerate()
            .map(|(frame, t)| {
                score += t.reward;
                TableRow {
                    frame,
                    reward: t.reward,
                    score,
                    terminal: t.terminal,
                    action: t.action,
                    lives: t.lives,
                }
            })
            .collect();
        let with_lives = self.lives_column || rows.iter().any(|row| row.lives.is_some());
        storage::write_table(&self.paths.table, &rows, with_lives)?;

        for (frame, t) in self.transitions.iter().enumerate() {
            storage::write_png(&self.paths.image_path(frame), &t.next_observation)?;
            if let Some(state) = &t.engine_state {
                storage::write_state(&self.paths.state_path(frame), state)?;
            }
        }

        info!(
            traj = %self.paths.id,
            frames = self.transitions.len(),
            score,
            "saved trajectory"
        );
        self.dirty = false;
        Ok(Some(self.transitions.len()))
    }

    /// Clears the buffer and allocates a fresh id and output paths. The last
    /// stored snapshot becomes the anchor of the new segment.
    pub fn new_trajectory(&mut self) -> Result<(), PersistenceError> {
        if let Some(last) = self.transitions.last() {
            if let Some(state) = &last.engine_state {
                self.anchor = Some(Rewound {
                    state: state.clone(),
                    observation: last.next_observation.clone(),
                });
            }
        }
        self.transitions.clear();

        self.paths = self.layout.trajectory(&self.ids.next_id()?);
        self.paths.prepare()?;
        self.dirty = true;
        info!(traj = %self.paths.id, "new trajectory");
        Ok(())
    }
}
