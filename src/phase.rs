// Game phase as seen by the client.
//
// The server only reports lobby, chess and quiz. Two more states are local: a cosmetic lobby
// countdown that runs once both seats are taken, and the game-over overlay. The server is always
// authoritative: a server phase change overrides whatever the local machinery is doing.

use std::time::Duration;

use instant::Instant;

use crate::event::{GameOverPayload, ServerPhase};


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GamePhase {
    Lobby,
    Countdown,
    Chess,
    Quiz,
    GameOver,
}

#[derive(Clone, PartialEq, Debug)]
pub enum PhaseEvent {
    CountdownStarted { seconds: u64 },
    CountdownTick { seconds_left: u64 },
    CountdownCancelled,
    // Both a local countdown expiry and a server transition can start the game; reported once.
    GameStarted,
    // Local countdown expired: the server may have moved on without us noticing.
    FetchSnapshot,
    EnteredQuiz,
    ReturnedFromQuiz,
    GameOver(GameOverPayload),
    ReturnToEntry,
}

#[derive(Clone, Copy, Debug)]
struct LobbyCountdown {
    deadline: Instant,
    last_announced: u64,
}

#[derive(Clone, Debug)]
struct GameOverOverlay {
    payload: GameOverPayload,
    return_at: Instant,
    fired: bool,
}

#[derive(Clone, Debug)]
pub struct PhaseMachine {
    lobby_countdown: Duration,
    game_over_return_delay: Duration,
    server_phase: Option<ServerPhase>,
    started: bool,
    active_players: usize,
    countdown: Option<LobbyCountdown>,
    game_over: Option<GameOverOverlay>,
    quiz_handoff_sent: bool,
}

impl PhaseMachine {
    pub fn new(lobby_countdown: Duration, game_over_return_delay: Duration) -> Self {
        PhaseMachine {
            lobby_countdown,
            game_over_return_delay,
            server_phase: None,
            started: false,
            active_players: 0,
            countdown: None,
            game_over: None,
            quiz_handoff_sent: false,
        }
    }

    pub fn server_phase(&self) -> Option<ServerPhase> { self.server_phase }
    pub fn started(&self) -> bool { self.started }
    pub fn active_players(&self) -> usize { self.active_players }
    pub fn is_counting_down(&self) -> bool { self.countdown.is_some() }
    pub fn game_over(&self) -> Option<&GameOverPayload> {
        self.game_over.as_ref().map(|overlay| &overlay.payload)
    }

    pub fn phase(&self) -> GamePhase {
        if self.game_over.is_some() {
            return GamePhase::GameOver;
        }
        match self.server_phase {
            Some(ServerPhase::Quiz) => GamePhase::Quiz,
            Some(ServerPhase::Chess) => GamePhase::Chess,
            Some(ServerPhase::Lobby | ServerPhase::Unknown) | None => {
                if self.countdown.is_some() {
                    GamePhase::Countdown
                } else if self.started {
                    // Local countdown finished before the server said "chess".
                    GamePhase::Chess
                } else {
                    GamePhase::Lobby
                }
            }
        }
    }

    // Seconds to show in the countdown overlay, rounded up.
    pub fn countdown_seconds_left(&self, now: Instant) -> Option<u64> {
        self.countdown.map(|countdown| seconds_left(countdown.deadline, now))
    }

    pub fn on_server_phase(&mut self, phase: ServerPhase, events: &mut Vec<PhaseEvent>) {
        let previous = self.server_phase.replace(phase);
        match phase {
            ServerPhase::Chess => {
                self.cancel_countdown(events);
                if previous == Some(ServerPhase::Quiz) {
                    events.push(PhaseEvent::ReturnedFromQuiz);
                }
                self.quiz_handoff_sent = false;
                self.mark_started(events);
            }
            ServerPhase::Quiz => {
                self.cancel_countdown(events);
                self.mark_started(events);
                if !self.quiz_handoff_sent {
                    self.quiz_handoff_sent = true;
                    events.push(PhaseEvent::EnteredQuiz);
                }
            }
            ServerPhase::Lobby => {}
            ServerPhase::Unknown => {
                log::debug!("Unknown server phase, keeping local phase {:?}", self.phase());
            }
        }
    }

    pub fn on_player_count(&mut self, count: usize, now: Instant, events: &mut Vec<PhaseEvent>) {
        self.active_players = count;
        if count < 2 {
            self.cancel_countdown(events);
            if !matches!(self.server_phase, Some(ServerPhase::Chess | ServerPhase::Quiz)) {
                self.started = false;
            }
            return;
        }
        let in_lobby = matches!(self.server_phase, None | Some(ServerPhase::Lobby));
        if in_lobby && !self.started && self.countdown.is_none() && self.game_over.is_none() {
            let seconds = self.lobby_countdown.as_secs();
            log::info!("Both players present, starting {seconds}s countdown");
            self.countdown = Some(LobbyCountdown {
                deadline: now + self.lobby_countdown,
                last_announced: seconds,
            });
            events.push(PhaseEvent::CountdownStarted { seconds });
        }
    }

    // Arms the overlay once per game over. Repeated payloads update the details but never restart
    // the return timer.
    pub fn on_game_over(
        &mut self, payload: GameOverPayload, now: Instant, events: &mut Vec<PhaseEvent>,
    ) {
        if let Some(overlay) = self.game_over.as_mut() {
            overlay.payload = payload;
            return;
        }
        self.cancel_countdown(events);
        log::info!("Game over: {:?}", payload.reason);
        self.game_over = Some(GameOverOverlay {
            payload: payload.clone(),
            return_at: now + self.game_over_return_delay,
            fired: false,
        });
        events.push(PhaseEvent::GameOver(payload));
    }

    pub fn tick(&mut self, now: Instant, events: &mut Vec<PhaseEvent>) {
        if let Some(countdown) = self.countdown.as_mut() {
            let left = seconds_left(countdown.deadline, now);
            if left == 0 {
                self.countdown = None;
                log::info!("Lobby countdown finished");
                self.mark_started(events);
                events.push(PhaseEvent::FetchSnapshot);
            } else if left < countdown.last_announced {
                countdown.last_announced = left;
                events.push(PhaseEvent::CountdownTick { seconds_left: left });
            }
        }
        if let Some(overlay) = self.game_over.as_mut() {
            if !overlay.fired && now >= overlay.return_at {
                overlay.fired = true;
                events.push(PhaseEvent::ReturnToEntry);
            }
        }
    }

    // Drops every pending timer. The overlay stays visible, but will never navigate.
    pub fn teardown(&mut self) {
        self.countdown = None;
        if let Some(overlay) = self.game_over.as_mut() {
            overlay.fired = true;
        }
    }

    fn cancel_countdown(&mut self, events: &mut Vec<PhaseEvent>) {
        if self.countdown.take().is_some() {
            events.push(PhaseEvent::CountdownCancelled);
        }
    }

    fn mark_started(&mut self, events: &mut Vec<PhaseEvent>) {
        if !self.started {
            self.started = true;
            events.push(PhaseEvent::GameStarted);
        }
    }
}

fn seconds_left(deadline: Instant, now: Instant) -> u64 {
    let left = deadline.saturating_duration_since(now);
    left.as_millis().div_ceil(1000) as u64
}
