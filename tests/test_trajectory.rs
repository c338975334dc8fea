mod common;

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use common::{CounterEnv, counter_frame, counter_state};
use playtrace::{Counter, Env, Observation, RunLayout, TrajectoryBuffer};
use tempfile::TempDir;

fn buffer(dir: &TempDir, capture_state: bool) -> TrajectoryBuffer<Counter> {
    let layout = RunLayout::new(dir.path(), "test");
    TrajectoryBuffer::new(layout, Counter::default(), capture_state).unwrap()
}

/// Steps `env` `n` times, storing every transition.
fn record(buffer: &mut TrajectoryBuffer<Counter>, env: &mut CounterEnv, n: usize) {
    let mut obs: Observation = Arc::new(env.frame());
    for _ in 0..n {
        let result = env.step(0).unwrap();
        let next = Arc::new(result.observation);
        buffer
            .store_transition(
                obs,
                next.clone(),
                0,
                result.reward,
                result.terminal,
                result.info,
                env,
            )
            .unwrap();
        obs = next;
    }
}

fn read_rows(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let headers = rdr.headers().unwrap().iter().map(str::to_string).collect();
    let rows = rdr
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (headers, rows)
}

fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[test]
fn store_appends_in_frame_order() {
    let dir = TempDir::new().unwrap();
    let mut buf = buffer(&dir, true);
    let mut env = CounterEnv::new();
    record(&mut buf, &mut env, 6);

    assert_eq!(buf.len(), 6);
    for (i, t) in buf.transitions().iter().enumerate() {
        assert_eq!(t.frame_index, i);
        assert_eq!(t.engine_state, Some(counter_state(i as u32 + 1)));
        assert_eq!(*t.next_observation, counter_frame(i as u32 + 1));
        assert_eq!(*t.prior_observation, counter_frame(i as u32));
    }
}

#[test]
fn rewind_truncates_and_returns_boundary_snapshot() {
    let dir = TempDir::new().unwrap();
    let mut buf = buffer(&dir, true);
    let mut env = CounterEnv::new();
    record(&mut buf, &mut env, 10);

    let point = buf.rewind(3).unwrap();
    assert_eq!(buf.len(), 7);
    assert_eq!(point.state, counter_state(7));
    assert_eq!(*point.observation, counter_frame(7));

    let point = buf.rewind(0).unwrap();
    assert_eq!(buf.len(), 7);
    assert_eq!(point.state, counter_state(7));
}

#[test]
fn rewind_past_the_start_uses_the_anchor() {
    let dir = TempDir::new().unwrap();
    let mut buf = buffer(&dir, true);
    let mut env = CounterEnv::new();
    buf.set_anchor(counter_state(0), Arc::new(counter_frame(0)));
    record(&mut buf, &mut env, 4);

    let point = buf.rewind(50).unwrap();
    assert!(buf.is_empty());
    assert_eq!(point.state, counter_state(0));
    assert_eq!(*point.observation, counter_frame(0));
}

#[test]
fn rewind_without_anchor_falls_back_to_earliest_snapshot() {
    let dir = TempDir::new().unwrap();
    let mut buf = buffer(&dir, true);
    let mut env = CounterEnv::new();
    record(&mut buf, &mut env, 4);

    let point = buf.rewind(4).unwrap();
    assert!(buf.is_empty());
    assert_eq!(point.state, counter_state(1));
}

#[test]
fn rewind_without_snapshots_keeps_the_buffer() {
    let dir = TempDir::new().unwrap();
    let mut buf = buffer(&dir, false);
    let mut env = CounterEnv::new();
    record(&mut buf, &mut env, 5);

    assert!(buf.rewind(2).is_none());
    assert_eq!(buf.len(), 5);
    assert!(buf.transitions().iter().all(|t| t.engine_state.is_none()));
}

#[test]
fn empty_save_writes_header_only() {
    let dir = TempDir::new().unwrap();
    let mut buf = buffer(&dir, true);

    assert_eq!(buf.save_trajectory().unwrap(), Some(0));
    let paths = buf.paths().clone();
    assert_eq!(
        fs::read_to_string(&paths.table).unwrap(),
        "frame,reward,score,terminal,action\n"
    );
    assert_eq!(file_count(&paths.image_dir), 0);
    assert_eq!(file_count(&paths.state_dir), 0);
}

#[test]
fn empty_save_keeps_the_lives_column_when_enabled() {
    let dir = TempDir::new().unwrap();
    let mut buf = buffer(&dir, true);
    buf.set_lives_column(true);

    buf.save_trajectory().unwrap();
    assert_eq!(
        fs::read_to_string(&buf.paths().table).unwrap(),
        "frame,reward,score,terminal,action,lives\n"
    );
}

#[test]
fn saved_score_is_running_total() {
    let dir = TempDir::new().unwrap();
    let mut buf = buffer(&dir, true);
    let mut env = CounterEnv::new().with_reward(7, 1.0);
    record(&mut buf, &mut env, 10);
    buf.save_trajectory().unwrap();

    let (headers, rows) = read_rows(&buf.paths().table);
    assert_eq!(headers, ["frame", "reward", "score", "terminal", "action"]);
    assert_eq!(rows.len(), 10);

    let frames: Vec<usize> = rows.iter().map(|r| r[0].parse().unwrap()).collect();
    assert_eq!(frames, (0..10).collect::<Vec<_>>());
    let scores: Vec<f64> = rows.iter().map(|r| r[2].parse().unwrap()).collect();
    assert_eq!(scores, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    assert!(rows.iter().all(|r| r[3] == "false"));
}

#[test]
fn lives_column_follows_the_backend() {
    let dir = TempDir::new().unwrap();
    let mut buf = buffer(&dir, false);
    let mut env = CounterEnv::new().with_lives(3).with_terminal_at(1);
    record(&mut buf, &mut env, 2);
    buf.save_trajectory().unwrap();

    let (headers, rows) = read_rows(&buf.paths().table);
    assert_eq!(headers.last().map(String::as_str), Some("lives"));
    assert_eq!(rows[0][5], "3");
    assert_eq!(rows[1][3], "true");
}

#[test]
fn images_are_stored_as_rgb() {
    let dir = TempDir::new().unwrap();
    let mut buf = buffer(&dir, true);
    let mut env = CounterEnv::new();
    record(&mut buf, &mut env, 3);
    buf.save_trajectory().unwrap();

    let paths = buf.paths().clone();
    assert_eq!(file_count(&paths.image_dir), 3);
    assert_eq!(file_count(&paths.state_dir), 3);

    let image = paths.image_path(0);
    assert!(image.ends_with("0000000.png"));
    let decoder = png::Decoder::new(File::open(&image).unwrap());
    let mut reader = decoder.read_info().unwrap();
    let mut pixels = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut pixels).unwrap();
    assert_eq!((info.width, info.height), (2, 1));
    assert_eq!(info.color_type, png::ColorType::Rgb);
    assert_eq!(&pixels[..info.buffer_size()], &[200, 0, 1, 3, 2, 1]);

    let state = fs::read(paths.state_path(2)).unwrap();
    assert_eq!(state, 3u32.to_le_bytes());
}

#[test]
fn unchanged_buffer_is_not_saved_twice() {
    let dir = TempDir::new().unwrap();
    let mut buf = buffer(&dir, true);
    let mut env = CounterEnv::new();
    record(&mut buf, &mut env, 2);

    assert_eq!(buf.save_trajectory().unwrap(), Some(2));
    assert_eq!(buf.save_trajectory().unwrap(), None);

    record(&mut buf, &mut env, 1);
    assert_eq!(buf.save_trajectory().unwrap(), Some(3));
}

#[test]
fn new_trajectory_rotates_id_and_carries_anchor() {
    let dir = TempDir::new().unwrap();
    let mut buf = buffer(&dir, true);
    let mut env = CounterEnv::new();
    record(&mut buf, &mut env, 4);
    let first = buf.traj_id().clone();

    buf.new_trajectory().unwrap();
    assert_ne!(buf.traj_id(), &first);
    assert_eq!(buf.traj_id().as_str(), "1");
    assert!(buf.is_empty());
    assert!(buf.paths().image_dir.is_dir());

    let point = buf.rewind(10).unwrap();
    assert_eq!(point.state, counter_state(4));
}
