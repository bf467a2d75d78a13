pub mod driver;

use crate::errors::SimResult;
use crate::state::{AppState, PriceSeries, ReplayStatus, WsMessage};
use driver::{ReplayDriver, ReplayParams};
use portable_atomic::Ordering;
use smallvec::SmallVec;
use std::sync::Arc;

/// The active replay: a driver plus the identity clients see on the wire.
pub struct ReplaySession {
    pub id: uuid::Uuid,
    pub instrument: String,
    pub driver: ReplayDriver,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionStatus {
    pub session_id: Option<String>,
    pub instrument: Option<String>,
    #[serde(flatten)]
    pub status: ReplayStatus,
}

impl SessionStatus {
    pub fn of(session: Option<&ReplaySession>) -> Self {
        match session {
            Some(s) => Self {
                session_id: Some(s.id.to_string()),
                instrument: Some(s.instrument.clone()),
                status: s.driver.status(),
            },
            None => Self {
                session_id: None,
                instrument: None,
                status: ReplayStatus::default(),
            },
        }
    }
}

/// Replace any finished session with a new running one.
/// Rejected with `ReplayActive` while another replay is running.
pub fn start_session(
    state: &AppState,
    series: Arc<PriceSeries>,
    params: ReplayParams,
) -> SimResult<SessionStatus> {
    let instrument = series.instrument.clone();
    let mut driver = ReplayDriver::new(series, params, state.pricer.clone())?;

    let status = {
        let mut slot = state.replay_lock()?;
        if let Some(active) = slot.as_ref().filter(|s| s.driver.is_running()) {
            tracing::warn!(session = %active.id, "replay start rejected, one is already running");
            return Err(crate::errors::SimError::ReplayActive);
        }
        driver.start()?;

        let session = ReplaySession {
            id: uuid::Uuid::new_v4(),
            instrument,
            driver,
        };
        let status = SessionStatus::of(Some(&session));
        *slot = Some(session);
        status
    };

    state.counters.replays_started.fetch_add(1, Ordering::Relaxed);
    state.broadcast(WsMessage::ReplayStateMsg {
        session_id: status.session_id.clone(),
        state: "running".into(),
        reason: "started".into(),
    });
    Ok(status)
}

/// Stop the active replay, if any. Idempotent.
pub fn stop_session(state: &AppState) -> SimResult<SessionStatus> {
    let (was_running, status) = {
        let mut slot = state.replay_lock()?;
        let was_running = slot.as_ref().is_some_and(|s| s.driver.is_running());
        if let Some(session) = slot.as_mut() {
            session.driver.stop();
        }
        (was_running, SessionStatus::of(slot.as_ref()))
    };

    if was_running {
        state.broadcast(WsMessage::ReplayStateMsg {
            session_id: status.session_id.clone(),
            state: "idle".into(),
            reason: "stopped".into(),
        });
    }
    Ok(status)
}

/// Advance the active replay by one tick. Returns what the sink should see:
/// a snapshot, or a completion notice on the tick past the last step.
pub fn advance(state: &AppState) -> SimResult<SmallVec<[WsMessage; 2]>> {
    let mut out: SmallVec<[WsMessage; 2]> = SmallVec::new();
    let mut slot = state.replay_lock()?;

    let Some(session) = slot.as_mut().filter(|s| s.driver.is_running()) else {
        return Ok(out);
    };

    match session.driver.tick() {
        Some(snapshot) => {
            state.counters.snapshots_emitted.fetch_add(1, Ordering::Relaxed);
            out.push(WsMessage::ReplaySnapshot {
                session_id: session.id.to_string(),
                snapshot,
            });
        }
        None => out.push(WsMessage::ReplayStateMsg {
            session_id: Some(session.id.to_string()),
            state: "idle".into(),
            reason: "completed".into(),
        }),
    }
    Ok(out)
}

/// Timer task driving replay ticks at the configured cadence.
pub async fn run_replay_ticker(state: Arc<AppState>) {
    let period = tokio::time::Duration::from_millis(state.config.replay_interval_ms);
    tracing::info!(interval_ms = state.config.replay_interval_ms, "replay ticker started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        match advance(&state) {
            Ok(messages) => {
                for msg in messages {
                    state.broadcast(msg);
                }
            }
            Err(e) => {
                state.counters.errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %e, "replay ticker halted");
                return;
            }
        }
    }
}
