use std::collections::BTreeSet;

use anyhow::{Context, Result};

use crate::agent::InputSource;
use crate::frame::Frame;
use crate::input::{InputEvent, Key};

/// minifb window that shows frames and reports keyboard changes.
pub struct Screen {
    window: minifb::Window,
    width: usize,
    height: usize,
    buf: Vec<u32>,
    down: BTreeSet<Key>,
    close_key: Key,
}

impl Screen {
    pub fn open(title: &str, width: usize, height: usize, scale: u32) -> Result<Self> {
        let scale = match scale {
            0 | 1 => minifb::Scale::X1,
            2 => minifb::Scale::X2,
            3 | 4 => minifb::Scale::X4,
            _ => minifb::Scale::X8,
        };
        let window = minifb::Window::new(
            title,
            width,
            height,
            minifb::WindowOptions {
                resize: true,
                scale,
                ..Default::default()
            },
        )
        .with_context(|| format!("Failed to open window '{title}'"))?;

        Ok(Self {
            window,
            width,
            height,
            buf: vec![0u32; width * height],
            down: BTreeSet::new(),
            close_key: Key::Escape,
        })
    }

    /// Key reported as pressed when the window is closed by the user.
    pub fn with_close_key(mut self, key: Key) -> Self {
        self.close_key = key;
        self
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }
}

impl InputSource for Screen {
    fn poll(&mut self, events: &mut Vec<InputEvent>) -> Result<()> {
        let mut now: BTreeSet<Key> = self
            .window
            .get_keys()
            .into_iter()
            .filter_map(map_key)
            .collect();
        if !self.window.is_open() {
            now.insert(self.close_key);
        }
        diff_keys(&self.down, &now, events);
        self.down = now;
        Ok(())
    }

    fn present(&mut self, frame: &Frame) -> Result<()> {
        if frame.width as usize != self.width || frame.height as usize != self.height {
            self.width = frame.width as usize;
            self.height = frame.height as usize;
            self.buf = vec![0u32; self.width * self.height];
        }
        frame.blit_u32(&mut self.buf);
        self.window
            .update_with_buffer(&self.buf, self.width, self.height)
            .context("Failed to update window")?;
        Ok(())
    }
}

/// Releases first, then presses, both in key order.
pub fn diff_keys(before: &BTreeSet<Key>, after: &BTreeSet<Key>, events: &mut Vec<InputEvent>) {
    events.extend(before.difference(after).map(|&k| InputEvent::Released(k)));
    events.extend(after.difference(before).map(|&k| InputEvent::Pressed(k)));
}

fn map_key(key: minifb::Key) -> Option<Key> {
    use minifb::Key as K;
    Some(match key {
        K::A => Key::A,
        K::B => Key::B,
        K::C => Key::C,
        K::D => Key::D,
        K::E => Key::E,
        K::F => Key::F,
        K::G => Key::G,
        K::H => Key::H,
        K::I => Key::I,
        K::J => Key::J,
        K::K => Key::K,
        K::L => Key::L,
        K::M => Key::M,
        K::N => Key::N,
        K::O => Key::O,
        K::P => Key::P,
        K::Q => Key::Q,
        K::R => Key::R,
        K::S => Key::S,
        K::T => Key::T,
        K::U => Key::U,
        K::V => Key::V,
        K::W => Key::W,
        K::X => Key::X,
        K::Y => Key::Y,
        K::Z => Key::Z,
        K::Up => Key::Up,
        K::Down => Key::Down,
        K::Left => Key::Left,
        K::Right => Key::Right,
        K::Space => Key::Space,
        K::Enter => Key::Enter,
        K::Tab => Key::Tab,
        K::Backspace => Key::Backspace,
        K::Escape => Key::Escape,
        K::LeftShift => Key::LeftShift,
        K::RightShift => Key::RightShift,
        K::LeftCtrl => Key::LeftCtrl,
        K::RightCtrl => Key::RightCtrl,
        K::F1 => Key::F1,
        K::F2 => Key::F2,
        K::F3 => Key::F3,
        K::F4 => Key::F4,
        K::F5 => Key::F5,
        K::F6 => Key::F6,
        K::F7 => Key::F7,
        K::F8 => Key::F8,
        K::F9 => Key::F9,
        K::F10 => Key::F10,
        K::F11 => Key::F11,
        K::F12 => Key::F12,
        _ => return None,
    })
}
