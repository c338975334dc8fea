pub mod agent;
pub mod config;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod frame;
pub mod ids;
pub mod input;
pub mod nes;
pub mod pacing;
pub mod screen;
pub mod session;
pub mod storage;
pub mod trajectory;

pub use agent::{Agent, Decision, HumanAgent, InputSource, RandomAgent, ScriptedAgent};
pub use config::SessionConfig;
pub use dispatch::Phase;
pub use env::{ActionId, EngineState, Env, NOOP, StepInfo, StepResult};
pub use error::{AdapterError, AdapterOp, PersistenceError, SessionError};
pub use frame::{ChannelOrder, Frame, Observation};
pub use ids::{Counter, DirectoryScan, IdAllocator, TrajId, UniqueIds};
pub use input::{
    InputEvent, InputMapper, InputState, Key, MetaBindings, MetaCommand, MetaCommands,
    SteeringVariant,
};
pub use nes::{NesConfig, NesEnv};
pub use pacing::Pacer;
pub use screen::Screen;
pub use session::{Session, SessionSummary};
pub use storage::{RunLayout, TrajectoryPaths};
pub use trajectory::{Rewound, Transition, TrajectoryBuffer};
