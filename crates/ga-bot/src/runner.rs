//! Live tick loop
//!
//! Observations arrive as JSON lines on an async reader. A background task
//! parses them into a watch channel that only ever holds the latest one; the
//! loop wakes on a fixed interval and runs the decision core against it.

use ga_core::{Clock, Observation};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::decision::DecisionCore;
use crate::dispatch::ActionDispatcher;

/// Parse JSON-line observations into `tx` until the input ends
///
/// Blank lines are ignored; malformed lines are logged and skipped.
pub async fn read_observations<R>(
    input: R,
    tx: watch::Sender<Option<Observation>>,
    clock: Arc<dyn Clock>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut line_no = 0usize;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read observation input");
                break;
            }
        };
        line_no += 1;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Observation::from_json_str(line, clock.now()) {
            Ok(observation) => {
                if tx.send(Some(observation)).is_err() {
                    debug!("Tick loop gone, stopping observation reader");
                    return;
                }
            }
            Err(e) => warn!(line = line_no, error = %e, "Skipping malformed observation"),
        }
    }

    debug!(lines = line_no, "Observation input closed");
}

/// Run the tick loop until `shutdown` resolves or the input closes
///
/// Each tick evaluates the most recent observation, so a slow producer is
/// re-evaluated (and eventually skipped as stale) rather than queued. Once
/// the input closes the latest observation gets one final tick. Returns the
/// number of actions dispatched.
pub async fn run_live<R, F>(
    core: &mut DecisionCore,
    input: R,
    dispatcher: &mut dyn ActionDispatcher,
    tick: Duration,
    clock: Arc<dyn Clock>,
    shutdown: F,
) -> usize
where
    R: AsyncBufRead + Unpin + Send + 'static,
    F: Future<Output = ()>,
{
    let (tx, mut rx) = watch::channel(None);
    let reader = tokio::spawn(read_observations(input, tx, clock));

    let mut interval = tokio::time::interval(tick.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(tick_ms = tick.as_millis() as u64, "Tick loop started");
    let mut dispatched = 0usize;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            _ = interval.tick() => {
                let closed = rx.has_changed().is_err();
                let latest = rx.borrow_and_update().clone();

                if let Some(observation) = latest {
                    if core.tick(&observation, dispatcher).is_some() {
                        dispatched += 1;
                    }
                }

                if closed {
                    info!("Observation input closed");
                    break;
                }
            }
        }
    }

    reader.abort();
    info!(dispatched, "Tick loop stopped");
    dispatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::JsonLinesDispatcher;
    use ga_config::EngineMode;
    use ga_core::SystemClock;
    use serde_json::{json, Value};
    use tokio::io::{AsyncWriteExt, BufReader};

    const START: &str = "{\"text_content\": {\"full_text\": \"Press Start\"}}\n";

    fn core(clock: Arc<dyn Clock>) -> DecisionCore {
        let mut core = DecisionCore::new(EngineMode::Rules, clock);
        core.rules_mut().load_rules_value(json!([{
            "conditions": [{"type": "text_present", "text": "Start"}],
            "action_type": "click",
            "action_params": {"x": 10, "y": 20}
        }]));
        core
    }

    fn output(dispatcher: JsonLinesDispatcher<Vec<u8>>) -> Vec<Value> {
        String::from_utf8(dispatcher.into_inner())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_closed_input_gets_final_tick() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let mut core = core(clock.clone());
        let mut dispatcher = JsonLinesDispatcher::new(Vec::new());
        let input = std::io::Cursor::new(format!("not json\n\n{START}").into_bytes());

        let count = run_live(
            &mut core,
            input,
            &mut dispatcher,
            Duration::from_millis(10),
            clock,
            std::future::pending(),
        )
        .await;

        assert!(count >= 1);
        let out = output(dispatcher);
        assert_eq!(out.len(), count);
        assert_eq!(out[0]["action_type"], "click");
        assert_eq!(out[0]["params"], json!({"x": 10, "y": 20}));
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_loop() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let mut core = core(clock.clone());
        let mut dispatcher = JsonLinesDispatcher::new(Vec::new());
        let (_writer, reader) = tokio::io::duplex(64);

        let count = run_live(
            &mut core,
            BufReader::new(reader),
            &mut dispatcher,
            Duration::from_millis(10),
            clock,
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await;

        assert_eq!(count, 0);
        assert!(output(dispatcher).is_empty());
    }

    #[tokio::test]
    async fn test_latest_observation_is_reevaluated_each_tick() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let mut core = core(clock.clone());
        let mut dispatcher = JsonLinesDispatcher::new(Vec::new());
        let (mut writer, reader) = tokio::io::duplex(256);
        writer.write_all(START.as_bytes()).await.unwrap();

        let count = run_live(
            &mut core,
            BufReader::new(reader),
            &mut dispatcher,
            Duration::from_millis(10),
            clock,
            tokio::time::sleep(Duration::from_millis(200)),
        )
        .await;

        assert!(count >= 2);
        assert_eq!(core.rules().history().len(), count);
        drop(writer);
    }
}
