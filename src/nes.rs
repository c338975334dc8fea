use anyhow::{Context, Result};
use std::path::Path;
use tetanes_core::control_deck::HeadlessMode;
use tetanes_core::cpu::Cpu;
use tetanes_core::input::JoypadBtnState;
use tetanes_core::mem::Read;
use tetanes_core::prelude::*;
use tracing::debug;

use crate::env::{ActionId, EngineState, Env, StepInfo, StepResult};
use crate::frame::{ChannelOrder, Frame};
use crate::input::{NES_LAYOUT, Role};

pub const NES_WIDTH: u32 = 256;
pub const NES_HEIGHT: u32 = 240;

// =============================================================================
// Adapter Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct NesConfig {
    pub frame_skip: u32,
    /// Frames clocked with no input after a reset.
    pub warmup_frames: u32,
    pub lives_addr: Option<u16>,
    /// BCD score digits, most significant first.
    pub score_digits: Option<Vec<u16>>,
    pub score_scale: f64,
    pub max_score_delta: u32,
    pub terminal_on_life_loss: bool,
}

impl Default for NesConfig {
    fn default() -> Self {
        Self {
            frame_skip: 1,
            warmup_frames: 0,
            lives_addr: None,
            score_digits: None,
            score_scale: 1.0,
            max_score_delta: 5_000,
            terminal_on_life_loss: false,
        }
    }
}

impl NesConfig {
    /// Kung Fu (Spartan X) RAM map.
    pub fn kung_fu() -> Self {
        Self {
            lives_addr: Some(0x005C),
            score_digits: Some(vec![0x0531, 0x0532, 0x0533, 0x0534, 0x0535, 0x0536]),
            warmup_frames: 30,
            ..Default::default()
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "generic" => Some(Self::default()),
            "kung-fu" | "kungfu" => Some(Self::kung_fu()),
            _ => None,
        }
    }
}

fn role_button(role: Role) -> JoypadBtnState {
    match role {
        Role::Up => JoypadBtnState::UP,
        Role::Down => JoypadBtnState::DOWN,
        Role::Left => JoypadBtnState::LEFT,
        Role::Right => JoypadBtnState::RIGHT,
        Role::Fire => JoypadBtnState::A,
        Role::AltFire => JoypadBtnState::B,
        Role::Start => JoypadBtnState::START,
        Role::Select => JoypadBtnState::SELECT,
    }
}

/// Joypad state for every action id in `NES_LAYOUT`, indexed by id.
fn joypad_table() -> Vec<JoypadBtnState> {
    let count = NES_LAYOUT
        .iter()
        .map(|(_, id)| *id as usize + 1)
        .max()
        .unwrap_or(1);
    let mut table = vec![JoypadBtnState::empty(); count];
    for (roles, id) in NES_LAYOUT {
        let mut state = JoypadBtnState::empty();
        for role in *roles {
            state |= role_button(*role);
        }
        table[*id as usize] = state;
    }
    table
}

// =============================================================================
// NES Environment
// =============================================================================

pub struct NesEnv {
    deck: ControlDeck,
    config: NesConfig,
    joypad: Vec<JoypadBtnState>,
    prev_score: u32,
    prev_lives: Option<u8>,
    steps: u64,
}

impl NesEnv {
    pub fn new(rom_path: &Path, config: NesConfig) -> Result<Self> {
        let mut deck = ControlDeck::new();
        deck.set_headless_mode(HeadlessMode::NO_AUDIO);
        deck.load_rom_path(rom_path)
            .with_context(|| format!("Failed to load ROM: {}", rom_path.display()))?;

        Ok(Self {
            deck,
            config,
            joypad: joypad_table(),
            prev_score: 0,
            prev_lives: None,
            steps: 0,
        })
    }

    pub fn peek(&self, addr: u16) -> u8 {
        self.deck.bus().peek(addr)
    }

    fn read_score(&self) -> u32 {
        let Some(digits) = &self.config.score_digits else {
            return 0;
        };
        digits
            .iter()
            .fold(0u32, |acc, &addr| acc * 10 + (self.peek(addr) & 0x0F) as u32)
    }

    fn read_lives(&self) -> Option<u8> {
        self.config.lives_addr.map(|addr| self.peek(addr))
    }

    fn set_input_state(&mut self, btn_state: JoypadBtnState) {
        let joypad = self.deck.joypad_mut(Player::One);
        for button in [
            JoypadBtnState::LEFT,
            JoypadBtnState::RIGHT,
            JoypadBtnState::UP,
            JoypadBtnState::DOWN,
            JoypadBtnState::A,
            JoypadBtnState::B,
            JoypadBtnState::START,
            JoypadBtnState::SELECT,
        ] {
            joypad.set_button(button, btn_state.contains(button));
        }
    }

    fn capture(&mut self) -> Frame {
        Frame::new(
            NES_WIDTH,
            NES_HEIGHT,
            ChannelOrder::Rgba,
            self.deck.frame_buffer().to_vec(),
        )
    }

    fn sync_trackers(&mut self) {
        self.prev_score = self.read_score();
        self.prev_lives = self.read_lives();
    }
}

impl Env for NesEnv {
    fn reset(&mut self) -> Result<Frame> {
        self.deck.reset(ResetKind::Soft);
        self.set_input_state(JoypadBtnState::empty());
        for _ in 0..self.config.warmup_frames {
            self.deck.clock_frame()?;
        }
        self.sync_trackers();
        self.steps = 0;
        Ok(self.capture())
    }

    fn step(&mut self, action: ActionId) -> Result<StepResult> {
        self.steps += 1;
        let btn_state = self
            .joypad
            .get(action as usize)
            .copied()
            .unwrap_or_else(JoypadBtnState::empty);

        let mut reward = 0.0;
        let mut terminal = false;
        for _ in 0..self.config.frame_skip.max(1) {
            self.set_input_state(btn_state);
            self.deck.clock_frame()?;

            let score = self.read_score();
            let delta = score.saturating_sub(self.prev_score);
            if delta > 0 && delta < self.config.max_score_delta {
                reward += delta as f64 * self.config.score_scale;
            }
            self.prev_score = score;

            let lives = self.read_lives();
            if let (Some(cur), Some(prev)) = (lives, self.prev_lives) {
                if cur < prev {
                    debug!(step = self.steps, lives = cur, "life lost");
                    if cur == 0 || self.config.terminal_on_life_loss {
                        terminal = true;
                    }
                }
            }
            self.prev_lives = lives;

            if terminal {
                break;
            }
        }

        Ok(StepResult {
            observation: self.capture(),
            reward,
            terminal,
            info: StepInfo {
                lives: self.prev_lives.map(i32::from),
            },
        })
    }

    fn render(&mut self) -> Option<Frame> {
        Some(self.capture())
    }

    fn clone_state(&mut self) -> Result<EngineState> {
        let bytes = bincode::serialize(self.deck.cpu()).context("Failed to snapshot NES state")?;
        Ok(EngineState::new(bytes))
    }

    fn restore_state(&mut self, state: &EngineState) -> Result<()> {
        let cpu: Cpu =
            bincode::deserialize(state.as_bytes()).context("Failed to decode NES snapshot")?;
        self.deck.load_cpu(cpu);
        self.sync_trackers();
        Ok(())
    }

    fn action_count(&self) -> usize {
        self.joypad.len()
    }

    fn reports_lives(&self) -> bool {
        self.config.lives_addr.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joypad_table_covers_layout() {
        let table = joypad_table();
        assert_eq!(table.len(), 25);
        assert!(table[0].is_empty());
        assert_eq!(table[1], JoypadBtnState::A);
        assert_eq!(table[10], JoypadBtnState::UP | JoypadBtnState::A);
        assert_eq!(table[18], JoypadBtnState::B);
        assert_eq!(table[23], JoypadBtnState::START);
    }

    #[test]
    fn presets_resolve() {
        assert!(NesConfig::preset("kung-fu").is_some());
        assert!(NesConfig::preset("nope").is_none());
        assert_eq!(NesConfig::kung_fu().lives_addr, Some(0x005C));
    }
}
