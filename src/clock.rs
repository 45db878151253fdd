// Local projection of the server's per-turn clock.
//
// The server is authoritative: it sends an anchor (how much time the side to move had at some
// point of the turn) and the client counts down from it using local time. A turn is identified by
// its key `(side, turn_started_at)`; only a new key restarts the countdown, while repeated anchors
// for the same turn merely correct drift.

use std::time::Duration;

use instant::Instant;

use crate::event::TimerPayload;
use crate::force::Force;


const MILLIS_PER_SEC: u64 = 1000;
const MILLIS_PER_DECI: u64 = MILLIS_PER_SEC / 10;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TurnKey {
    pub side: Force,
    // Bit pattern of the server timestamp. Compared for equality only.
    turn_started_at: u64,
}

// Validated timer payload.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TimerAnchor {
    pub key: TurnKey,
    pub bank: Duration,
    pub remaining_at_anchor: Duration,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SyncOutcome {
    Restarted,
    Snapped,
    Unchanged,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClockEvent {
    Expired(Force),
}

#[derive(Clone, Debug)]
pub struct ClockShowing {
    pub is_active: bool,
    pub show_separator: bool,
    pub out_of_time: bool,
    pub time_breakdown: TimeBreakdown,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TimeBreakdown {
    NormalTime { minutes: u32, seconds: u32 },
    LowTime { seconds: u32, deciseconds: u32 },
    Unknown,
}

#[derive(Clone, Copy, Debug)]
struct TurnRun {
    key: TurnKey,
    bank: Duration,
    anchor: Instant,
    remaining_at_anchor: Duration,
    // Set when stopped: the showing no longer depends on `now`.
    frozen: bool,
    expired: bool,
}

// Emulates `setInterval`: `tick` fires at most once per `tick_interval` and only for the turn the
// interval was started for.
#[derive(Clone, Copy, Debug)]
struct ClockInterval {
    key: TurnKey,
    next_fire: Instant,
}

#[derive(Clone, Debug)]
pub struct TurnClock {
    drift_tolerance: Duration,
    tick_interval: Duration,
    run: Option<TurnRun>,
    interval: Option<ClockInterval>,
}

impl TurnKey {
    pub fn new(side: Force, turn_started_at: f64) -> Self {
        TurnKey { side, turn_started_at: turn_started_at.to_bits() }
    }
}

impl TimerAnchor {
    pub fn from_payload(payload: &TimerPayload) -> Option<Self> {
        let side = Force::from_wire(&payload.side)?;
        Some(TimerAnchor {
            key: TurnKey::new(side, payload.turn_started_at),
            bank: secs_to_duration(payload.bank_seconds),
            remaining_at_anchor: secs_to_duration(payload.remaining_at_anchor),
        })
    }
}

impl TurnClock {
    pub fn new(drift_tolerance: Duration, tick_interval: Duration) -> Self {
        TurnClock {
            drift_tolerance,
            tick_interval,
            run: None,
            interval: None,
        }
    }

    pub fn current_key(&self) -> Option<TurnKey> { self.run.map(|run| run.key) }
    pub fn active_force(&self) -> Option<Force> {
        self.run.filter(|run| !run.frozen).map(|run| run.key.side)
    }
    pub fn is_ticking(&self) -> bool { self.interval.is_some() }
    pub fn bank(&self) -> Option<Duration> { self.run.map(|run| run.bank) }

    pub fn sync(&mut self, anchor: TimerAnchor, now: Instant) -> SyncOutcome {
        let Some(run) = self.run.as_mut().filter(|run| run.key == anchor.key) else {
            // New turn: forget everything about the previous one, including its interval.
            self.run = Some(TurnRun {
                key: anchor.key,
                bank: anchor.bank,
                anchor: now,
                remaining_at_anchor: anchor.remaining_at_anchor,
                frozen: false,
                expired: anchor.remaining_at_anchor.is_zero(),
            });
            self.restart_interval(anchor.key, now);
            return SyncOutcome::Restarted;
        };
        run.bank = anchor.bank;
        if run.frozen {
            // Same turn resumed after a stop (e.g. back from the quiz): the server value wins.
            run.anchor = now;
            run.remaining_at_anchor = anchor.remaining_at_anchor;
            run.frozen = false;
            run.expired = anchor.remaining_at_anchor.is_zero();
            if self.interval.is_none() && !run.expired {
                self.restart_interval(anchor.key, now);
            }
            return SyncOutcome::Snapped;
        }
        let projected = run.remaining(now);
        let drift = projected.abs_diff(anchor.remaining_at_anchor);
        if drift <= self.drift_tolerance {
            return SyncOutcome::Unchanged;
        }
        log::debug!("Clock drift {drift:?} for {:?}, snapping to server value", anchor.key.side);
        run.anchor = now;
        run.remaining_at_anchor = anchor.remaining_at_anchor;
        run.frozen = false;
        // The server may give time back after the local countdown already hit zero, e.g. when
        // the local clock ran fast. The interval is kept running otherwise.
        if run.expired && !anchor.remaining_at_anchor.is_zero() {
            run.expired = false;
            if self.interval.is_none() {
                self.restart_interval(anchor.key, now);
            }
        }
        SyncOutcome::Snapped
    }

    pub fn tick(&mut self, now: Instant) -> Option<ClockEvent> {
        let interval = self.interval?;
        let Some(run) = self.run.as_mut().filter(|run| run.key == interval.key) else {
            log::debug!("Dropping stale clock interval for {:?}", interval.key);
            self.interval = None;
            return None;
        };
        if now < interval.next_fire {
            return None;
        }
        if run.remaining(now).is_zero() {
            run.expired = true;
            self.interval = None;
            return Some(ClockEvent::Expired(run.key.side));
        }
        self.interval = Some(ClockInterval {
            key: interval.key,
            next_fire: now + self.tick_interval,
        });
        None
    }

    // Freezes the showing and cancels the interval. Used when the game ends or leaves chess.
    pub fn stop(&mut self, now: Instant) {
        if let Some(run) = self.run.as_mut() {
            if !run.frozen {
                run.remaining_at_anchor = run.remaining(now);
                run.anchor = now;
                run.frozen = true;
            }
        }
        self.interval = None;
    }

    pub fn reset(&mut self) {
        self.run = None;
        self.interval = None;
    }

    pub fn remaining(&self, force: Force, now: Instant) -> Option<Duration> {
        self.run.filter(|run| run.key.side == force).map(|run| run.remaining(now))
    }

    pub fn is_out_of_time(&self, force: Force) -> bool {
        self.run.is_some_and(|run| run.key.side == force && run.expired)
    }

    pub fn showing_for(&self, force: Force, now: Instant) -> ClockShowing {
        let Some(time) = self.remaining(force, now) else {
            return ClockShowing {
                is_active: false,
                show_separator: true,
                out_of_time: false,
                time_breakdown: TimeBreakdown::Unknown,
            };
        };
        let is_active = self.active_force() == Some(force);
        let out_of_time = self.is_out_of_time(force);
        let time_breakdown = time.into();
        let show_separator = match (is_active, time_breakdown) {
            (true, TimeBreakdown::NormalTime { .. }) => time.subsec_millis() >= 500,
            _ => true,
        };
        ClockShowing {
            is_active,
            show_separator,
            out_of_time,
            time_breakdown,
        }
    }

    fn restart_interval(&mut self, key: TurnKey, now: Instant) {
        self.interval = Some(ClockInterval { key, next_fire: now + self.tick_interval });
    }
}

impl TurnRun {
    fn remaining(&self, now: Instant) -> Duration {
        if self.frozen {
            return self.remaining_at_anchor;
        }
        self.remaining_at_anchor.saturating_sub(now.saturating_duration_since(self.anchor))
    }
}

impl ClockShowing {
    // Includes padding for TUI. HTML will ignore trailing spaces.
    pub fn ui_string(&self) -> String {
        let separator = |s| if self.show_separator { s } else { " " };
        match self.time_breakdown {
            TimeBreakdown::NormalTime { minutes, seconds } => {
                format!("{:02}{}{:02}", minutes, separator(":"), seconds)
            }
            TimeBreakdown::LowTime { seconds, deciseconds } => {
                format!("{:02}{}{} ", seconds, separator("."), deciseconds)
            }
            TimeBreakdown::Unknown => "-:--".to_string(),
        }
    }
}

impl From<Duration> for TimeBreakdown {
    fn from(time: Duration) -> Self {
        // Always round the time up, so that we never show "0.0" for a side that still has time.
        let millis = u64::try_from(time.as_millis()).unwrap_or(u64::MAX);
        let ds_ceil = millis.div_ceil(MILLIS_PER_DECI);
        if ds_ceil < 200 {
            TimeBreakdown::LowTime {
                seconds: (ds_ceil / 10) as u32,
                deciseconds: (ds_ceil % 10) as u32,
            }
        } else {
            let s_ceil = millis.div_ceil(MILLIS_PER_SEC);
            TimeBreakdown::NormalTime {
                minutes: u32::try_from(s_ceil / 60).unwrap_or(u32::MAX),
                seconds: (s_ceil % 60) as u32,
            }
        }
    }
}

// Negative, NaN and infinite values from the wire all become zero.
pub fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}
