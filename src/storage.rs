//! On-disk trajectory layout and the writers for each artifact.
//!
//! ```text
//! <base>/<run_label>/screens/<traj_id>/0000000.png
//! <base>/<run_label>/states/<traj_id>/0000000.state
//! <base>/<run_label>/trajectories/<traj_id>.csv
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::env::{ActionId, EngineState};
use crate::error::PersistenceError;
use crate::frame::{ChannelOrder, Frame};
use crate::ids::{DirectoryScan, TrajId};

pub const IMAGE_EXT: &str = "png";
pub const STATE_EXT: &str = "state";
pub const TABLE_EXT: &str = "csv";

const SCREENS_DIR: &str = "screens";
const STATES_DIR: &str = "states";
const TABLES_DIR: &str = "trajectories";

#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(base: impl AsRef<Path>, run_label: &str) -> Self {
        Self {
            root: base.as_ref().join(run_label),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn screens_dir(&self) -> PathBuf {
        self.root.join(SCREENS_DIR)
    }

    pub fn states_dir(&self) -> PathBuf {
        self.root.join(STATES_DIR)
    }

    pub fn tables_dir(&self) -> PathBuf {
        self.root.join(TABLES_DIR)
    }

    pub fn trajectory(&self, id: &TrajId) -> TrajectoryPaths {
        TrajectoryPaths {
            id: id.clone(),
            image_dir: self.screens_dir().join(id.as_str()),
            state_dir: self.states_dir().join(id.as_str()),
            table: self
                .tables_dir()
                .join(format!("{}.{TABLE_EXT}", id.as_str())),
        }
    }

    /// Allocator that scans the screen directories of this run.
    pub fn id_scanner(&self) -> DirectoryScan {
        DirectoryScan::new(self.screens_dir())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrajectoryPaths {
    pub id: TrajId,
    pub image_dir: PathBuf,
    pub state_dir: PathBuf,
    pub table: PathBuf,
}

impl TrajectoryPaths {
    /// Creates the image, state and table directories.
    pub fn prepare(&self) -> Result<(), PersistenceError> {
        for dir in [&self.image_dir, &self.state_dir] {
            fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;
        }
        if let Some(parent) = self.table.parent() {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }
        Ok(())
    }

    pub fn image_path(&self, frame: usize) -> PathBuf {
        self.image_dir.join(format!("{frame:07}.{IMAGE_EXT}"))
    }

    pub fn state_path(&self, frame: usize) -> PathBuf {
        self.state_dir.join(format!("{frame:07}.{STATE_EXT}"))
    }
}

// =============================================================================
// Writers
// =============================================================================

/// One line of the trajectory table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableRow {
    pub frame: usize,
    pub reward: f64,
    pub score: f64,
    pub terminal: bool,
    pub action: ActionId,
    pub lives: Option<i32>,
}

/// Writes the header and one row per transition. The `lives` column is
/// present only when `with_lives` is set.
pub fn write_table(
    path: &Path,
    rows: &[TableRow],
    with_lives: bool,
) -> Result<(), PersistenceError> {
    let table_err = |source| PersistenceError::Table {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(|e| PersistenceError::io(path, e))?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));

    let mut header = vec!["frame", "reward", "score", "terminal", "action"];
    if with_lives {
        header.push("lives");
    }
    wtr.write_record(&header).map_err(table_err)?;

    for row in rows {
        if with_lives {
            wtr.serialize((
                row.frame,
                row.reward,
                row.score,
                row.terminal,
                row.action,
                row.lives,
            ))
            .map_err(table_err)?;
        } else {
            wtr.serialize((row.frame, row.reward, row.score, row.terminal, row.action))
                .map_err(table_err)?;
        }
    }
    wtr.flush().map_err(|e| PersistenceError::io(path, e))?;
    Ok(())
}

/// Encodes a frame as PNG in RGB(A) order.
pub fn write_png(path: &Path, frame: &Frame) -> Result<(), PersistenceError> {
    if frame.data.len() != frame.expected_len() {
        return Err(PersistenceError::FrameSize {
            path: path.to_path_buf(),
            expected: frame.expected_len(),
            actual: frame.data.len(),
        });
    }
    let image_err = |source| PersistenceError::Image {
        path: path.to_path_buf(),
        source,
    };

    let (order, pixels) = frame.to_storage();
    let file = File::create(path).map_err(|e| PersistenceError::io(path, e))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(match order {
        ChannelOrder::Gray => png::ColorType::Grayscale,
        ChannelOrder::Rgba | ChannelOrder::Bgra => png::ColorType::Rgba,
        ChannelOrder::Rgb | ChannelOrder::Bgr => png::ColorType::Rgb,
    });
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header().map_err(image_err)?;
    writer.write_image_data(&pixels).map_err(image_err)?;
    writer.finish().map_err(image_err)?;
    Ok(())
}

/// Raw snapshot bytes; the format belongs to the backend.
pub fn write_state(path: &Path, state: &EngineState) -> Result<(), PersistenceError> {
    let mut file = File::create(path).map_err(|e| PersistenceError::io(path, e))?;
    file.write_all(state.as_bytes())
        .map_err(|e| PersistenceError::io(path, e))?;
    Ok(())
}

pub fn read_state(path: &Path) -> Result<EngineState, PersistenceError> {
    let bytes = fs::read(path).map_err(|e| PersistenceError::io(path, e))?;
    Ok(EngineState::new(bytes))
}

// =============================================================================
// Maintenance
// =============================================================================

/// Removes trajectories that never recorded a frame: the empty screen
/// directory, its state directory and its table. Returns the removed ids.
pub fn prune_empty(layout: &RunLayout) -> Result<Vec<TrajId>, PersistenceError> {
    let screens = layout.screens_dir();
    if !screens.exists() {
        return Ok(Vec::new());
    }

    let mut removed = Vec::new();
    let entries = fs::read_dir(&screens).map_err(|e| PersistenceError::io(&screens, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| PersistenceError::io(&screens, e))?;
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let mut contents = fs::read_dir(&dir).map_err(|e| PersistenceError::io(&dir, e))?;
        if contents.next().is_some() {
            continue;
        }

        let id = TrajId::new(entry.file_name().to_string_lossy().into_owned());
        let paths = layout.trajectory(&id);
        fs::remove_dir(&paths.image_dir).map_err(|e| PersistenceError::io(&paths.image_dir, e))?;
        if paths.state_dir.exists() {
            fs::remove_dir_all(&paths.state_dir)
                .map_err(|e| PersistenceError::io(&paths.state_dir, e))?;
        }
        if paths.table.exists() {
            fs::remove_file(&paths.table).map_err(|e| PersistenceError::io(&paths.table, e))?;
        }
        info!(traj = %id, "removed empty trajectory");
        removed.push(id);
    }
    removed.sort();
    Ok(removed)
}
