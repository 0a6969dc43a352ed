//! Recording persistence tests

use ga_core::{Params, RecordedOperation};
use ga_recorder::{ExecutorError, OperationRecorder, Sleeper};
use serde_json::json;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

struct CountingSleeper(Vec<Duration>);

impl Sleeper for CountingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.0.push(duration);
    }
}

#[test]
fn test_save_and_load_recording() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("recording.json");

    let mut recorder = OperationRecorder::new();
    recorder.start_recording();
    let mut params = Params::new();
    params.insert("x".to_string(), json!(640));
    params.insert("y".to_string(), json!(360));
    recorder.record_operation("click", params);
    recorder.record_operation("key", Params::new());
    recorder.stop_recording();
    recorder.save(&path).unwrap();

    let mut loaded = OperationRecorder::new();
    assert_eq!(loaded.load(&path), 2);
    assert_eq!(loaded.operations(), recorder.operations());
    assert!(!loaded.is_recording());
}

#[test]
fn test_load_hand_written_recording() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("recording.json");
    fs::write(
        &path,
        r#"[
            {"type": "click", "params": {"x": 100, "y": 200}, "timestamp": 1700000000.0},
            {"type": "wait", "timestamp": 1700000000.75},
            {"type": "key", "params": {"key": "space"}, "timestamp": 1700000002.0}
        ]"#,
    )
    .unwrap();

    let mut recorder = OperationRecorder::new();
    assert_eq!(recorder.load(&path), 3);
    assert_eq!(
        recorder.operations()[1],
        RecordedOperation {
            action_type: "wait".to_string(),
            params: Params::new(),
            timestamp: 1700000000.75,
        }
    );

    let mut executed = Vec::new();
    let mut executor = |action_type: &str, params: &Params| -> Result<(), ExecutorError> {
        executed.push((action_type.to_string(), params.len()));
        Ok(())
    };
    let mut sleeper = CountingSleeper(Vec::new());
    recorder.replay_with(&mut executor, &mut sleeper).unwrap();

    assert_eq!(
        executed,
        vec![
            ("click".to_string(), 2),
            ("wait".to_string(), 0),
            ("key".to_string(), 1)
        ]
    );
    assert_eq!(
        sleeper.0,
        vec![Duration::from_millis(750), Duration::from_millis(1250)]
    );
}

#[test]
fn test_load_failure_resets_to_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("recording.json");

    let mut recorder = OperationRecorder::new();
    recorder.start_recording();
    recorder.record_operation("click", Params::new());

    assert_eq!(recorder.load(dir.path().join("missing.json")), 0);
    assert_eq!(recorder.operation_count(), 0);

    recorder.record_operation("click", Params::new());
    fs::write(&path, "{\"not\": \"a list\"}").unwrap();
    assert_eq!(recorder.load(&path), 0);
    assert_eq!(recorder.operation_count(), 0);
}
