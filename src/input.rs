//! Keyboard state and the mapping from held keys to actions and meta-commands.
//!
//! Physical keys are bound to logical roles through steering variants; a
//! canonical role-combination layout is expanded once per variant so several
//! key layouts share one action space. Unknown combinations map to the no-op
//! action.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::env::{ActionId, NOOP};

// =============================================================================
// Keys and Events
// =============================================================================

/// Recognised input identifiers. Ordering defines the canonical combo order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    Up,
    Down,
    Left,
    Right,
    Space,
    Enter,
    Tab,
    Backspace,
    Escape,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Pressed(Key),
    Released(Key),
}

// =============================================================================
// Roles and Layouts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Up,
    Down,
    Left,
    Right,
    Fire,
    AltFire,
    Start,
    Select,
}

/// Role combination -> action id.
pub type Layout = &'static [(&'static [Role], ActionId)];

/// 18-action joystick layout.
pub const ATARI_LAYOUT: Layout = &[
    (&[], 0),
    (&[Role::Fire], 1),
    (&[Role::Up], 2),
    (&[Role::Right], 3),
    (&[Role::Left], 4),
    (&[Role::Down], 5),
    (&[Role::Right, Role::Up], 6),
    (&[Role::Left, Role::Up], 7),
    (&[Role::Down, Role::Right], 8),
    (&[Role::Down, Role::Left], 9),
    (&[Role::Fire, Role::Up], 10),
    (&[Role::Fire, Role::Right], 11),
    (&[Role::Fire, Role::Left], 12),
    (&[Role::Down, Role::Fire], 13),
    (&[Role::Fire, Role::Right, Role::Up], 14),
    (&[Role::Fire, Role::Left, Role::Up], 15),
    (&[Role::Down, Role::Fire, Role::Right], 16),
    (&[Role::Down, Role::Fire, Role::Left], 17),
];

/// Joystick layout plus the second button and start/select of a console pad.
pub const NES_LAYOUT: Layout = &[
    (&[], 0),
    (&[Role::Fire], 1),
    (&[Role::Up], 2),
    (&[Role::Right], 3),
    (&[Role::Left], 4),
    (&[Role::Down], 5),
    (&[Role::Right, Role::Up], 6),
    (&[Role::Left, Role::Up], 7),
    (&[Role::Down, Role::Right], 8),
    (&[Role::Down, Role::Left], 9),
    (&[Role::Fire, Role::Up], 10),
    (&[Role::Fire, Role::Right], 11),
    (&[Role::Fire, Role::Left], 12),
    (&[Role::Down, Role::Fire], 13),
    (&[Role::Fire, Role::Right, Role::Up], 14),
    (&[Role::Fire, Role::Left, Role::Up], 15),
    (&[Role::Down, Role::Fire, Role::Right], 16),
    (&[Role::Down, Role::Fire, Role::Left], 17),
    (&[Role::AltFire], 18),
    (&[Role::AltFire, Role::Left], 19),
    (&[Role::AltFire, Role::Right], 20),
    (&[Role::AltFire, Role::Down], 21),
    (&[Role::AltFire, Role::Up], 22),
    (&[Role::Start], 23),
    (&[Role::Select], 24),
];

/// A physical key layout bound to logical roles.
#[derive(Debug, Clone)]
pub struct SteeringVariant {
    pub name: String,
    pub bindings: BTreeMap<Role, Key>,
}

impl SteeringVariant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: BTreeMap::new(),
        }
    }

    pub fn bind(mut self, role: Role, key: Key) -> Self {
        self.bindings.insert(role, key);
        self
    }

    pub fn wasd() -> Self {
        Self::new("wasd")
            .bind(Role::Up, Key::W)
            .bind(Role::Down, Key::S)
            .bind(Role::Left, Key::A)
            .bind(Role::Right, Key::D)
            .bind(Role::Fire, Key::Space)
            .bind(Role::AltFire, Key::LeftShift)
            .bind(Role::Start, Key::Enter)
            .bind(Role::Select, Key::Tab)
    }

    pub fn arrows() -> Self {
        Self::new("arrows")
            .bind(Role::Up, Key::Up)
            .bind(Role::Down, Key::Down)
            .bind(Role::Left, Key::Left)
            .bind(Role::Right, Key::Right)
            .bind(Role::Fire, Key::Space)
            .bind(Role::AltFire, Key::LeftCtrl)
            .bind(Role::Start, Key::Enter)
            .bind(Role::Select, Key::Tab)
    }

    /// Arrows with Z/X as B/A, the usual emulator pad layout.
    pub fn pad() -> Self {
        Self::new("pad")
            .bind(Role::Up, Key::Up)
            .bind(Role::Down, Key::Down)
            .bind(Role::Left, Key::Left)
            .bind(Role::Right, Key::Right)
            .bind(Role::Fire, Key::X)
            .bind(Role::AltFire, Key::Z)
            .bind(Role::Start, Key::Enter)
            .bind(Role::Select, Key::Tab)
    }

    pub fn key(&self, role: Role) -> Option<Key> {
        self.bindings.get(&role).copied()
    }

    /// Key pairs on the same steering axis.
    pub fn opposing_pairs(&self) -> Vec<(Key, Key)> {
        [(Role::Up, Role::Down), (Role::Left, Role::Right)]
            .into_iter()
            .filter_map(|(a, b)| Some((self.key(a)?, self.key(b)?)))
            .collect()
    }
}

// =============================================================================
// Action Mapping Table
// =============================================================================

#[derive(Debug, Clone)]
pub struct ActionTable {
    combos: HashMap<Vec<Key>, ActionId>,
    relevant: BTreeSet<Key>,
}

impl ActionTable {
    /// Expands `layout` once per variant. Combos using a role the variant
    /// does not bind are skipped for that variant.
    pub fn expand(layout: Layout, variants: &[SteeringVariant]) -> Self {
        let mut combos = HashMap::new();
        for variant in variants {
            for (roles, action) in layout {
                let keys: Option<Vec<Key>> = roles.iter().map(|role| variant.key(*role)).collect();
                let Some(mut keys) = keys else {
                    continue;
                };
                keys.sort();
                keys.dedup();
                combos.insert(keys, *action);
            }
        }
        let relevant = combos.keys().flatten().copied().collect();
        Self { combos, relevant }
    }

    pub fn lookup(&self, held: &BTreeSet<Key>) -> ActionId {
        // BTreeSet iteration is already in canonical order.
        let combo: Vec<Key> = held
            .iter()
            .filter(|key| self.relevant.contains(key))
            .copied()
            .collect();
        self.combos.get(&combo).copied().unwrap_or(NOOP)
    }

    pub fn relevant_keys(&self) -> &BTreeSet<Key> {
        &self.relevant
    }

    pub fn len(&self) -> usize {
        self.combos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }
}

// =============================================================================
// Input State
// =============================================================================

/// Currently held keys, with opposing-pair exclusion on press.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    held: BTreeSet<Key>,
    opposing: HashMap<Key, Vec<Key>>,
}

impl InputState {
    pub fn new(pairs: impl IntoIterator<Item = (Key, Key)>) -> Self {
        let mut opposing: HashMap<Key, Vec<Key>> = HashMap::new();
        for (a, b) in pairs {
            opposing.entry(a).or_default().push(b);
            opposing.entry(b).or_default().push(a);
        }
        Self {
            held: BTreeSet::new(),
            opposing,
        }
    }

    pub fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::Pressed(key) => {
                self.held.insert(key);
                // A lost release event must not leave both directions held.
                if let Some(others) = self.opposing.get(&key) {
                    for other in others {
                        self.held.remove(other);
                    }
                }
            }
            InputEvent::Released(key) => {
                self.held.remove(&key);
            }
        }
    }

    pub fn release(&mut self, key: Key) {
        self.held.remove(&key);
    }

    pub fn held(&self) -> &BTreeSet<Key> {
        &self.held
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }
}

// =============================================================================
// Meta-Commands
// =============================================================================

/// Session-control signals. Declaration order is dispatch priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetaCommand {
    Close,
    Rewind,
    Save,
    EpisodeEnd,
}

/// De-duplicated meta-commands, iterated in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaCommands(BTreeSet<MetaCommand>);

impl MetaCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, command: MetaCommand) {
        self.0.insert(command);
    }

    pub fn contains(&self, command: MetaCommand) -> bool {
        self.0.contains(&command)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = MetaCommand> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<MetaCommand> for MetaCommands {
    fn from_iter<T: IntoIterator<Item = MetaCommand>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaBindings {
    pub close: Key,
    pub rewind: Key,
    pub save: Key,
}

impl Default for MetaBindings {
    fn default() -> Self {
        Self {
            close: Key::Escape,
            rewind: Key::R,
            save: Key::F5,
        }
    }
}

// =============================================================================
// Input Mapper
// =============================================================================

#[derive(Debug, Clone)]
pub struct InputMapper {
    table: ActionTable,
    meta: MetaBindings,
    variants: Vec<SteeringVariant>,
}

impl InputMapper {
    pub fn new(layout: Layout, variants: Vec<SteeringVariant>, meta: MetaBindings) -> Self {
        Self {
            table: ActionTable::expand(layout, &variants),
            meta,
            variants,
        }
    }

    pub fn atari() -> Self {
        Self::new(
            ATARI_LAYOUT,
            vec![SteeringVariant::wasd(), SteeringVariant::arrows()],
            MetaBindings::default(),
        )
    }

    pub fn nes() -> Self {
        Self::new(
            NES_LAYOUT,
            vec![
                SteeringVariant::wasd(),
                SteeringVariant::arrows(),
                SteeringVariant::pad(),
            ],
            MetaBindings::default(),
        )
    }

    pub fn compute_action(&self, held: &BTreeSet<Key>) -> ActionId {
        self.table.lookup(held)
    }

    /// EpisodeEnd is never produced here; the session adds it on termination.
    pub fn compute_meta_commands(&self, held: &BTreeSet<Key>) -> MetaCommands {
        let mut commands = MetaCommands::new();
        if held.contains(&self.meta.close) {
            commands.insert(MetaCommand::Close);
        }
        if held.contains(&self.meta.rewind) {
            commands.insert(MetaCommand::Rewind);
        }
        if held.contains(&self.meta.save) {
            commands.insert(MetaCommand::Save);
        }
        commands
    }

    /// Fresh input state with the opposing pairs of every variant.
    pub fn input_state(&self) -> InputState {
        InputState::new(self.variants.iter().flat_map(|v| v.opposing_pairs()))
    }

    pub fn meta_bindings(&self) -> MetaBindings {
        self.meta
    }

    pub fn table(&self) -> &ActionTable {
        &self.table
    }
}
