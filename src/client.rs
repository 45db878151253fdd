// Client view model. Owns everything the board view shows and reconciles it with what the server
// sends. Outgoing messages go through `events_tx`; things the driver has to act upon (navigation,
// fetching a snapshot) are queued as `NotableEvent`s.
//
// The server may repeat snapshots, send partial ones or send them out of order with local timers,
// so every step below is written to be idempotent: applying the same snapshot twice must not
// disturb local-only state such as the selected square.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::mpsc;

use enum_map::{EnumMap, enum_map};
use instant::Instant;
use strum::IntoEnumIterator;
use url::Url;

use crate::clock::{ClockEvent, ClockShowing, TimerAnchor, TurnClock};
use crate::config::ClientConfig;
use crate::coord::{BoardShape, Coord};
use crate::display::{
    BoardOrientation, DisplayCoord, DisplayPlayer, from_display_coord, get_display_force,
    resolve_orientation,
};
use crate::event::{
    BoardPayload, ClientEvent, GameOverPayload, PlayersPayload, ServerEvent, ServerPhase,
    StateSnapshot,
};
use crate::force::Force;
use crate::grid::{BoardError, BoardSignature, Grid};
use crate::phase::{GamePhase, PhaseEvent, PhaseMachine};
use crate::preview::preview_moves;
use crate::session::{Session, snapshot_url_for};


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TurnCommandError {
    GameNotStarted,
    QuizInProgress,
    GameOver,
    NotAPlayer,
    NotYourTurn,
    OutOfTime,
    NoBoard,
    OutOfBounds,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClickOutcome {
    Selected,
    Deselected,
    MoveSent,
    Ignored,
}

#[derive(Clone, PartialEq, Debug)]
pub enum NotableEvent {
    // Driver should fetch the pull endpoint and feed the result to `process_snapshot`.
    FetchSnapshot,
    AssignmentChanged(Option<Force>),
    GameStarted,
    TurnChanged(Option<Force>),
    NavigateToQuiz(Session),
    // Fired once, with the first payload. Later payloads only update `game_over()`, which is
    // what renderers should read.
    GameOver(GameOverPayload),
    ReturnToEntry,
    OutOfTime(Force),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    Player1,
    Player2,
    Spectator,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AssignmentSource {
    // Nothing known yet.
    Unknown,
    // `Assigned` message from the server.
    Explicit,
    // Own name found among player slots.
    NameMatch,
    // Own name found in both slots: cannot tell which seat is ours.
    Ambiguous,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Assignment {
    pub role: Role,
    pub source: AssignmentSource,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CheckStatus {
    pub side: Force,
    king: Option<Coord>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Selection {
    pub origin: Coord,
    pub preview: BTreeSet<Coord>,
}

#[derive(Clone, Debug)]
struct BoardState {
    grid: Grid,
    orientation: BoardOrientation,
}

pub struct ClientState {
    config: ClientConfig,
    session: Session,
    my_name: String,
    events_tx: mpsc::Sender<ClientEvent>,
    connected: bool,
    explicit_role: Option<Role>,
    assignment: Assignment,
    players: EnumMap<Force, Option<String>>,
    phase: PhaseMachine,
    clock: TurnClock,
    board: Option<BoardState>,
    turn: Option<Force>,
    turn_started_at: Option<Instant>,
    check: Option<CheckStatus>,
    selection: Option<Selection>,
    last_signature: Option<BoardSignature>,
    last_board_turn: Option<Force>,
    console: VecDeque<String>,
    notable_events: VecDeque<NotableEvent>,
}

impl fmt::Display for TurnCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            TurnCommandError::GameNotStarted => "the game has not started yet",
            TurnCommandError::QuizInProgress => "quiz in progress",
            TurnCommandError::GameOver => "the game is over",
            TurnCommandError::NotAPlayer => "spectators cannot move",
            TurnCommandError::NotYourTurn => "not your turn",
            TurnCommandError::OutOfTime => "out of time",
            TurnCommandError::NoBoard => "no board yet",
            TurnCommandError::OutOfBounds => "square is outside the board",
        };
        f.write_str(msg)
    }
}

impl Role {
    pub fn from_wire(s: &str) -> Option<Role> {
        match s {
            "player1" => Some(Role::Player1),
            "player2" => Some(Role::Player2),
            "spectator" => Some(Role::Spectator),
            _ => None,
        }
    }

    pub fn for_force(force: Force) -> Role {
        match force {
            Force::White => Role::Player1,
            Force::Black => Role::Player2,
        }
    }

    pub fn color(self) -> Option<Force> {
        match self {
            Role::Player1 => Some(Force::White),
            Role::Player2 => Some(Force::Black),
            Role::Spectator => None,
        }
    }
}

impl Assignment {
    fn unknown() -> Self { Assignment { role: Role::Spectator, source: AssignmentSource::Unknown } }
    pub fn color(self) -> Option<Force> { self.role.color() }
}

impl ClientState {
    pub fn new(
        session: Session, config: ClientConfig, events_tx: mpsc::Sender<ClientEvent>,
    ) -> Self {
        let phase = PhaseMachine::new(config.lobby_countdown, config.game_over_return_delay);
        let clock = TurnClock::new(config.clock_drift_tolerance, config.clock_tick_interval);
        let my_name = session.name.trim().to_owned();
        let mut state = ClientState {
            config,
            session,
            my_name,
            events_tx,
            connected: false,
            explicit_role: None,
            assignment: Assignment::unknown(),
            players: enum_map! { _ => None },
            phase,
            clock,
            board: None,
            turn: None,
            turn_started_at: None,
            check: None,
            selection: None,
            last_signature: None,
            last_board_turn: None,
            console: VecDeque::new(),
            notable_events: VecDeque::new(),
        };
        // Socket messages only carry changes: start from a full snapshot.
        state.notable_events.push_back(NotableEvent::FetchSnapshot);
        state
    }

    pub fn config(&self) -> &ClientConfig { &self.config }
    pub fn session(&self) -> &Session { &self.session }
    pub fn my_name(&self) -> &str { &self.my_name }
    pub fn is_connected(&self) -> bool { self.connected }
    pub fn assignment(&self) -> Assignment { self.assignment }
    pub fn my_color(&self) -> Option<Force> { self.assignment.color() }
    pub fn phase(&self) -> GamePhase { self.phase.phase() }
    pub fn started(&self) -> bool { self.phase.started() }
    pub fn active_players(&self) -> usize { self.phase.active_players() }
    pub fn game_over(&self) -> Option<&GameOverPayload> { self.phase.game_over() }
    pub fn grid(&self) -> Option<&Grid> { self.board.as_ref().map(|b| &b.grid) }
    pub fn turn(&self) -> Option<Force> { self.turn }
    pub fn check(&self) -> Option<CheckStatus> { self.check }
    pub fn selection(&self) -> Option<&Selection> { self.selection.as_ref() }
    pub fn last_signature(&self) -> Option<&BoardSignature> { self.last_signature.as_ref() }
    pub fn console_lines(&self) -> impl Iterator<Item = &str> {
        self.console.iter().map(String::as_str)
    }

    pub fn orientation(&self) -> BoardOrientation {
        self.board.as_ref().map_or(BoardOrientation::Normal, |b| b.orientation)
    }

    pub fn preview(&self) -> impl Iterator<Item = Coord> + '_ {
        self.selection.iter().flat_map(|sel| sel.preview.iter().copied())
    }

    pub fn is_my_turn(&self) -> bool { self.my_color().is_some() && self.my_color() == self.turn }

    // Where the pull endpoint is: explicit configuration or next to the socket.
    pub fn snapshot_url(&self) -> Option<Url> {
        self.config.snapshot_url.clone().or_else(|| snapshot_url_for(&self.session.ws_url))
    }

    pub fn next_notable_event(&mut self) -> Option<NotableEvent> { self.notable_events.pop_front() }

    pub fn on_connected(&mut self) {
        self.connected = true;
        self.push_console("Connected.".to_owned());
    }

    pub fn on_disconnected(&mut self) {
        if self.connected {
            self.connected = false;
            self.push_console("Disconnected.".to_owned());
        }
    }

    pub fn process_server_event(&mut self, event: ServerEvent, now: Instant) {
        match event {
            ServerEvent::Assigned { role } => {
                let Some(role) = role.as_deref().and_then(Role::from_wire) else {
                    log::warn!("Ignoring assignment with unknown role {role:?}");
                    return;
                };
                self.explicit_role = Some(role);
                self.resolve_assignment();
            }
            ServerEvent::State(snapshot) => self.apply_snapshot(snapshot, now),
            ServerEvent::MoveMsg { board, turn } => {
                let incoming_turn = turn.as_deref().map(Force::from_wire).unwrap_or(self.turn);
                if let Some(board) = board {
                    self.apply_board(board, incoming_turn);
                }
                if let Some(turn) = turn {
                    self.apply_turn(&turn, now);
                }
            }
            ServerEvent::ConsoleMsg { text } => self.push_console(text),
        }
    }

    // Result of the pull endpoint. Same path as a pushed `state` frame.
    pub fn process_snapshot(&mut self, snapshot: StateSnapshot, now: Instant) {
        self.apply_snapshot(snapshot, now);
    }

    pub fn tick(&mut self, now: Instant) {
        let mut phase_events = vec![];
        self.phase.tick(now, &mut phase_events);
        self.process_phase_events(phase_events, now);
        if let Some(ClockEvent::Expired(side)) = self.clock.tick(now) {
            if Some(side) == self.my_color() {
                self.clear_selection();
                self.push_console("Your time is up.".to_owned());
            }
            self.notable_events.push_back(NotableEvent::OutOfTime(side));
        }
    }

    // Time shown for `force`. Only the side to move has a running clock.
    pub fn clock_showing(&self, force: Force, now: Instant) -> ClockShowing {
        self.clock.showing_for(force, now)
    }

    // Local time since the current turn began, for servers that do not send a timer.
    pub fn turn_elapsed(&self, now: Instant) -> Option<std::time::Duration> {
        self.turn_started_at.map(|t| now.saturating_duration_since(t))
    }

    pub fn countdown_seconds_left(&self, now: Instant) -> Option<u64> {
        self.phase.countdown_seconds_left(now)
    }

    pub fn check_king(&self) -> Option<Coord> {
        let check = self.check?;
        check.king.or_else(|| self.grid()?.find_king(check.side))
    }

    pub fn player_name(&self, force: Force) -> Option<&str> { self.players[force].as_deref() }

    // Name shown next to the board, with a placeholder for empty seats.
    pub fn display_name(&self, player: DisplayPlayer) -> String {
        let viewer = self.my_color();
        let force = get_display_force(player, viewer);
        match (self.player_name(force), viewer) {
            (Some(name), _) => name.to_owned(),
            (None, Some(_)) => "Waiting...".to_owned(),
            (None, None) => match force {
                Force::White => "White".to_owned(),
                Force::Black => "Black".to_owned(),
            },
        }
    }

    pub fn role_string(&self) -> String {
        match (self.assignment.role, self.assignment.source) {
            (_, AssignmentSource::Ambiguous) => "Spectator (name is taken twice)".to_owned(),
            (Role::Player1, _) => "White (player 1)".to_owned(),
            (Role::Player2, _) => "Black (player 2)".to_owned(),
            (Role::Spectator, _) => "Spectator".to_owned(),
        }
    }

    // Text covering the board, if any.
    pub fn overlay_text(&self, now: Instant) -> Option<String> {
        if let Some(game_over) = self.phase.game_over() {
            let mut text = "Game over".to_owned();
            if let Some(winner) = game_over.winner.as_deref() {
                text += &format!(": {winner} wins");
            }
            if let Some(reason) = game_over.reason.as_deref() {
                text += &format!(" ({reason})");
            }
            return Some(text);
        }
        if let Some(seconds) = self.countdown_seconds_left(now) {
            return Some(format!("Starting in {seconds}"));
        }
        if !self.phase.started() && self.phase.active_players() < 2 {
            return Some("Waiting for another player...".to_owned());
        }
        None
    }

    pub fn can_move(&self) -> Result<(), TurnCommandError> {
        match self.phase.phase() {
            GamePhase::GameOver => return Err(TurnCommandError::GameOver),
            GamePhase::Quiz => return Err(TurnCommandError::QuizInProgress),
            GamePhase::Lobby | GamePhase::Countdown => {
                return Err(TurnCommandError::GameNotStarted);
            }
            GamePhase::Chess => {}
        }
        if !self.phase.started() {
            return Err(TurnCommandError::GameNotStarted);
        }
        let my_color = self.my_color().ok_or(TurnCommandError::NotAPlayer)?;
        if self.turn != Some(my_color) {
            return Err(TurnCommandError::NotYourTurn);
        }
        if self.clock.is_out_of_time(my_color) {
            return Err(TurnCommandError::OutOfTime);
        }
        if self.board.is_none() {
            return Err(TurnCommandError::NoBoard);
        }
        Ok(())
    }

    pub fn click_display_square(
        &mut self, display_coord: DisplayCoord,
    ) -> Result<ClickOutcome, TurnCommandError> {
        let board = self.board.as_ref().ok_or(TurnCommandError::NoBoard)?;
        let coord = from_display_coord(display_coord, board.grid.shape(), board.orientation)
            .ok_or(TurnCommandError::OutOfBounds)?;
        self.click_square(coord)
    }

    // First click picks an own piece, a second click on it drops the selection, a click on
    // another own piece switches to it, and any other square is sent to the server as a move.
    pub fn click_square(&mut self, coord: Coord) -> Result<ClickOutcome, TurnCommandError> {
        self.can_move()?;
        let Some(board) = self.board.as_ref() else {
            return Err(TurnCommandError::NoBoard);
        };
        if !board.grid.contains_coord(coord) {
            return Err(TurnCommandError::OutOfBounds);
        }
        let is_own_piece = board.grid.piece_at(coord).map(|p| p.force) == self.my_color();
        match self.selection.as_ref().map(|sel| sel.origin) {
            Some(origin) if origin == coord => {
                self.clear_selection();
                Ok(ClickOutcome::Deselected)
            }
            _ if is_own_piece => {
                let preview = preview_moves(&board.grid, coord);
                self.selection = Some(Selection { origin: coord, preview });
                Ok(ClickOutcome::Selected)
            }
            Some(origin) => {
                self.make_move(origin, coord)?;
                Ok(ClickOutcome::MoveSent)
            }
            None => Ok(ClickOutcome::Ignored),
        }
    }

    // Sends the move without checking it: the preview is only a hint and the server has the
    // final word. The outcome arrives with the next snapshot.
    pub fn make_move(&mut self, from: Coord, to: Coord) -> Result<(), TurnCommandError> {
        self.can_move()?;
        let shape = self.grid().map(Grid::shape).ok_or(TurnCommandError::NoBoard)?;
        if !shape.contains_coord(from) || !shape.contains_coord(to) {
            return Err(TurnCommandError::OutOfBounds);
        }
        self.clear_selection();
        self.send(ClientEvent::Move { from: from.to_pair(), to: to.to_pair() });
        Ok(())
    }

    pub fn resign(&mut self) -> Result<(), TurnCommandError> {
        if self.phase.game_over().is_some() {
            return Err(TurnCommandError::GameOver);
        }
        if self.my_color().is_none() {
            return Err(TurnCommandError::NotAPlayer);
        }
        self.send(ClientEvent::Resign);
        Ok(())
    }

    // Cancels every local timer. The view is about to go away.
    pub fn teardown(&mut self, now: Instant) {
        self.phase.teardown();
        self.clock.stop(now);
        self.clear_selection();
    }

    fn apply_snapshot(&mut self, snapshot: StateSnapshot, now: Instant) {
        let mut phase_events = vec![];

        if let Some(game_over) = snapshot.game_over {
            self.phase.on_game_over(game_over, now, &mut phase_events);
        }

        if let Some(phase) = snapshot.phase {
            let was_chess = self.phase.server_phase() == Some(ServerPhase::Chess);
            let entering_chess = phase == ServerPhase::Chess && !was_chess;
            self.phase.on_server_phase(phase, &mut phase_events);
            if entering_chess {
                self.clear_selection();
            }
        }

        self.check = snapshot.in_check_side.as_deref().and_then(Force::from_wire).map(|side| {
            CheckStatus {
                side,
                king: snapshot.in_check_king.map(|c| Coord::new(c.x, c.y)),
            }
        });

        let incoming_turn = match snapshot.turn.as_deref() {
            Some(turn) => Force::from_wire(turn),
            None => self.turn,
        };
        if let Some(board) = snapshot.board {
            self.apply_board(board, incoming_turn);
        }

        if let Some(players) = snapshot.players {
            self.apply_players(&players, now, &mut phase_events);
        }

        if let Some(turn) = snapshot.turn.as_deref() {
            self.apply_turn(turn, now);
        }

        // A quiz payload without a phase still means the quiz is on.
        if snapshot.phase.is_none() && snapshot.quiz.is_some() {
            self.phase.on_server_phase(ServerPhase::Quiz, &mut phase_events);
        }

        if let Some(timer) = snapshot.timer {
            match TimerAnchor::from_payload(&timer) {
                Some(anchor) => {
                    // Parked during the quiz, resumed by the next chess snapshot.
                    let parked = self.phase.phase() == GamePhase::Quiz;
                    if self.phase.game_over().is_none() && !parked {
                        self.clock.sync(anchor, now);
                    }
                }
                None => log::warn!("Ignoring timer for unknown side {:?}", timer.side),
            }
        }

        self.process_phase_events(phase_events, now);
    }

    fn apply_board(&mut self, payload: BoardPayload, incoming_turn: Option<Force>) {
        let grid = match self.grid_from_payload(payload) {
            Ok(grid) => grid,
            Err(err) => {
                log::warn!("Ignoring board: {err}");
                return;
            }
        };
        let signature = grid.signature(self.config.signature_samples);
        let changed = self.last_signature.as_ref() != Some(&signature)
            || self.last_board_turn != incoming_turn;
        self.last_signature = Some(signature);
        self.last_board_turn = incoming_turn;
        let orientation = resolve_orientation(&grid, self.my_color());
        if changed {
            self.selection = None;
        } else if let Some(sel) = self.selection.as_mut() {
            // Same signature does not guarantee the same board, so keep the preview honest.
            if grid.piece_at(sel.origin).map(|p| p.force) == self.assignment.color() {
                sel.preview = preview_moves(&grid, sel.origin);
            } else {
                self.selection = None;
            }
        }
        self.board = Some(BoardState { grid, orientation });
    }

    fn grid_from_payload(&self, payload: BoardPayload) -> Result<Grid, BoardError> {
        let cells = payload.cells.unwrap_or_default();
        let shape = match (payload.width, payload.height) {
            (Some(width), Some(height)) => {
                let too_large = || BoardError::TooLarge {
                    width: u8::try_from(width).unwrap_or(u8::MAX),
                    height: u8::try_from(height).unwrap_or(u8::MAX),
                };
                let width = u8::try_from(width).map_err(|_| too_large())?;
                let height = u8::try_from(height).map_err(|_| too_large())?;
                BoardShape::new(width, height)
            }
            // Move results may omit dimensions: they did not change.
            _ => self.grid().map(Grid::shape).ok_or(BoardError::ShapeMismatch {
                width: 0,
                height: 0,
                num_cells: cells.len(),
            })?,
        };
        Grid::from_cells(shape, &cells)
    }

    fn apply_players(
        &mut self, players: &PlayersPayload, now: Instant, phase_events: &mut Vec<PhaseEvent>,
    ) {
        self.players = players.names();
        self.resolve_assignment();
        let count = self.players.values().filter(|name| name.is_some()).count();
        self.phase.on_player_count(count, now, phase_events);
    }

    // An explicit `Assigned` always wins. Otherwise look for our own name among the seats.
    fn resolve_assignment(&mut self) {
        let assignment = match self.explicit_role {
            Some(role) => Assignment { role, source: AssignmentSource::Explicit },
            None => {
                let my_name = self.my_name.as_str();
                let players = &self.players;
                let mut seats =
                    Force::iter().filter(|&force| players[force].as_deref() == Some(my_name));
                match (seats.next(), seats.next()) {
                    (None, _) => Assignment::unknown(),
                    (Some(force), None) => Assignment {
                        role: Role::for_force(force),
                        source: AssignmentSource::NameMatch,
                    },
                    (Some(_), Some(_)) => {
                        log::warn!("Both seats are taken by {my_name:?}, watching as spectator");
                        Assignment {
                            role: Role::Spectator,
                            source: AssignmentSource::Ambiguous,
                        }
                    }
                }
            }
        };
        if assignment == self.assignment {
            return;
        }
        let color_changed = assignment.color() != self.assignment.color();
        self.assignment = assignment;
        if color_changed {
            log::info!("Playing as {}", self.role_string());
            self.clear_selection();
            let my_color = self.my_color();
            if let Some(board) = self.board.as_mut() {
                board.orientation = resolve_orientation(&board.grid, my_color);
            }
            self.notable_events.push_back(NotableEvent::AssignmentChanged(my_color));
        }
    }

    fn apply_turn(&mut self, wire: &str, now: Instant) {
        let turn = Force::from_wire(wire);
        if turn == self.turn {
            return;
        }
        self.turn = turn;
        self.turn_started_at = Some(now);
        self.clear_selection();
        if let Some(force) = turn {
            let side = match force {
                Force::White => "White",
                Force::Black => "Black",
            };
            self.push_console(format!("{side} to move."));
        }
        self.notable_events.push_back(NotableEvent::TurnChanged(turn));
    }

    fn process_phase_events(&mut self, events: Vec<PhaseEvent>, now: Instant) {
        for event in events {
            match event {
                PhaseEvent::CountdownStarted { seconds } => {
                    self.push_console(format!("Both players connected. Starting in {seconds}..."));
                }
                PhaseEvent::CountdownTick { seconds_left } => {
                    self.push_console(format!("Starting in {seconds_left}..."));
                }
                PhaseEvent::CountdownCancelled => {
                    log::info!("Lobby countdown cancelled");
                }
                PhaseEvent::GameStarted => {
                    self.push_console("Game started. Good luck!".to_owned());
                    self.notable_events.push_back(NotableEvent::GameStarted);
                }
                PhaseEvent::FetchSnapshot => {
                    self.notable_events.push_back(NotableEvent::FetchSnapshot);
                }
                PhaseEvent::EnteredQuiz => {
                    // Chess state stays as is until the server brings us back.
                    self.clock.stop(now);
                    self.clear_selection();
                    let mut session = self.session.clone();
                    session.name = self.my_name.clone();
                    session.color = self.my_color().or(session.color);
                    self.notable_events.push_back(NotableEvent::NavigateToQuiz(session));
                }
                PhaseEvent::ReturnedFromQuiz => {
                    log::info!("Back to chess after the quiz");
                }
                PhaseEvent::GameOver(payload) => {
                    self.clock.stop(now);
                    self.clear_selection();
                    self.push_console("Game over.".to_owned());
                    self.notable_events.push_back(NotableEvent::GameOver(payload));
                }
                PhaseEvent::ReturnToEntry => {
                    self.notable_events.push_back(NotableEvent::ReturnToEntry);
                }
            }
        }
    }

    fn clear_selection(&mut self) { self.selection = None; }

    fn push_console(&mut self, line: String) {
        self.console.push_back(line);
        while self.console.len() > self.config.max_console_lines {
            self.console.pop_front();
        }
    }

    fn send(&mut self, event: ClientEvent) {
        if let Err(err) = self.events_tx.send(event) {
            log::debug!("Outgoing channel closed, dropping {:?}", err.0);
        }
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use std::time::Duration;

    use super::*;
    use crate::clock::TimeBreakdown;
    use crate::event::TimerPayload;
    use crate::test_util::{cells_json, default_board};

    fn new_client(name: &str) -> (ClientState, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel();
        let ws = Url::parse("ws://localhost:8000/ws").unwrap();
        let session = Session::new(ws, name.to_owned(), None);
        let mut client = ClientState::new(session, ClientConfig::default(), tx);
        assert_eq!(client.next_notable_event(), Some(NotableEvent::FetchSnapshot));
        (client, rx)
    }

    fn state(value: serde_json::Value) -> ServerEvent {
        let mut value = value;
        value["type"] = json!("state");
        serde_json::from_value(value).unwrap()
    }

    fn chess_state(turn: &str) -> ServerEvent {
        state(json!({
            "phase": "chess",
            "board": cells_json(&default_board()),
            "players": [{"name": "Ana"}, {"name": "Bia"}],
            "turn": turn,
        }))
    }

    #[test]
    fn name_match_and_explicit_role() {
        let t0 = Instant::now();
        let (mut client, _rx) = new_client(" Bia ");
        client.process_server_event(chess_state("white"), t0);
        assert_eq!(client.my_color(), Some(Force::Black));
        assert_eq!(client.assignment().source, AssignmentSource::NameMatch);
        assert_eq!(client.orientation(), BoardOrientation::Normal);

        client.process_server_event(ServerEvent::Assigned { role: Some("player1".to_owned()) }, t0);
        assert_eq!(client.my_color(), Some(Force::White));
        assert_eq!(client.orientation(), BoardOrientation::Flipped);
        // Name matching no longer overrides the server.
        client.process_server_event(chess_state("white"), t0);
        assert_eq!(client.my_color(), Some(Force::White));
    }

    #[test]
    fn duplicate_names_are_ambiguous() {
        let (mut client, _rx) = new_client("Ana");
        client.process_server_event(
            state(json!({"players": [{"name": "Ana"}, {"name": "Ana"}]})),
            Instant::now(),
        );
        assert_eq!(client.my_color(), None);
        assert_eq!(client.assignment().source, AssignmentSource::Ambiguous);
    }

    #[test]
    fn click_select_deselect_move() {
        let t0 = Instant::now();
        let (mut client, rx) = new_client("Ana");
        client.process_server_event(chess_state("white"), t0);
        assert!(client.is_my_turn());

        // Empty square without selection.
        assert_eq!(client.click_square(Coord::new(0, 3)), Ok(ClickOutcome::Ignored));
        assert_eq!(client.click_square(Coord::new(0, 1)), Ok(ClickOutcome::Selected));
        assert_eq!(client.preview().collect::<Vec<_>>(), vec![Coord::new(0, 2)]);
        assert_eq!(client.click_square(Coord::new(0, 1)), Ok(ClickOutcome::Deselected));
        assert_eq!(client.selection(), None);

        client.click_square(Coord::new(0, 1)).unwrap();
        assert_eq!(client.click_square(Coord::new(1, 1)), Ok(ClickOutcome::Selected));
        assert_eq!(client.selection().unwrap().origin, Coord::new(1, 1));
        assert_eq!(client.click_square(Coord::new(1, 2)), Ok(ClickOutcome::MoveSent));
        assert_eq!(client.selection(), None);
        assert_eq!(rx.try_recv(), Ok(ClientEvent::Move { from: [1, 1], to: [1, 2] }));
        assert_eq!(client.click_square(Coord::new(9, 9)), Err(TurnCommandError::OutOfBounds));
    }

    #[test]
    fn input_gating() {
        let t0 = Instant::now();
        let (mut client, _rx) = new_client("Bia");
        assert_eq!(client.click_square(Coord::new(0, 4)), Err(TurnCommandError::GameNotStarted));
        client.process_server_event(chess_state("white"), t0);
        assert_eq!(client.click_square(Coord::new(0, 4)), Err(TurnCommandError::NotYourTurn));

        let (mut spectator, _rx) = new_client("Cid");
        spectator.process_server_event(chess_state("white"), t0);
        assert_eq!(spectator.click_square(Coord::new(0, 1)), Err(TurnCommandError::NotAPlayer));
        assert_eq!(spectator.resign(), Err(TurnCommandError::NotAPlayer));
    }

    #[test]
    fn repeated_snapshot_keeps_selection() {
        let t0 = Instant::now();
        let (mut client, _rx) = new_client("Ana");
        client.process_server_event(chess_state("white"), t0);
        client.click_square(Coord::new(2, 1)).unwrap();
        let selection = client.selection().cloned();
        let signature = client.last_signature().cloned();
        client.process_server_event(chess_state("white"), t0);
        assert_eq!(client.selection().cloned(), selection);
        assert_eq!(client.last_signature().cloned(), signature);

        client.process_server_event(chess_state("black"), t0);
        assert_eq!(client.selection(), None);
    }

    #[test]
    fn invalid_board_skips_board_only() {
        let t0 = Instant::now();
        let (mut client, _rx) = new_client("Ana");
        client.process_server_event(
            state(json!({
                "phase": "chess",
                "board": {"cells": [null, "wK"], "width": 5, "height": 6},
                "players": [{"name": "Ana"}, {"name": "Bia"}],
                "turn": "b",
            })),
            t0,
        );
        assert!(client.grid().is_none());
        assert_eq!(client.turn(), Some(Force::Black));
        assert_eq!(client.my_color(), Some(Force::White));
    }

    #[test]
    fn move_msg_keeps_dimensions() {
        let t0 = Instant::now();
        let (mut client, _rx) = new_client("Ana");
        client.process_server_event(chess_state("white"), t0);
        let mut grid = default_board();
        let pawn = grid[Coord::new(0, 1)].take();
        grid[Coord::new(0, 2)] = pawn;
        let board = BoardPayload { cells: Some(grid.to_cells()), width: None, height: None };
        client.process_server_event(
            ServerEvent::MoveMsg { board: Some(board), turn: Some("black".to_owned()) },
            t0,
        );
        assert_eq!(client.grid(), Some(&grid));
        assert_eq!(client.turn(), Some(Force::Black));
    }

    #[test]
    fn check_status_is_replaced() {
        let t0 = Instant::now();
        let (mut client, _rx) = new_client("Ana");
        client.process_server_event(chess_state("white"), t0);
        client.process_server_event(state(json!({"inCheckSide": "white"})), t0);
        assert_eq!(client.check().map(|c| c.side), Some(Force::White));
        assert_eq!(client.check_king(), Some(Coord::new(2, 0)));
        client.process_server_event(state(json!({"turn": "white"})), t0);
        assert_eq!(client.check(), None);
    }

    #[test]
    fn turn_clock_runs_again_after_quiz() {
        let t0 = Instant::now();
        let (mut client, _rx) = new_client("Ana");
        let with_timer = |event: ServerEvent, remaining: f64| {
            let ServerEvent::State(mut snapshot) = event else {
                unreachable!();
            };
            snapshot.timer = Some(TimerPayload {
                side: "white".to_owned(),
                turn_started_at: 1000.0,
                bank_seconds: 20.0,
                remaining_at_anchor: remaining,
            });
            ServerEvent::State(snapshot)
        };
        client.process_server_event(with_timer(chess_state("white"), 20.0), t0);
        client.process_server_event(
            with_timer(state(json!({"phase": "quiz"})), 15.0),
            t0 + Duration::from_secs(5),
        );
        assert_eq!(client.phase(), GamePhase::Quiz);
        client.process_server_event(
            with_timer(state(json!({"phase": "quiz"})), 15.0),
            t0 + Duration::from_secs(10),
        );
        assert!(!client.clock_showing(Force::White, t0 + Duration::from_secs(10)).is_active);

        let t1 = t0 + Duration::from_secs(15);
        client.process_server_event(with_timer(chess_state("white"), 15.0), t1);
        let showing = client.clock_showing(Force::White, t1 + Duration::from_secs(5));
        assert!(showing.is_active);
        assert_eq!(showing.time_breakdown, TimeBreakdown::LowTime { seconds: 10, deciseconds: 0 });
        assert_eq!(client.can_move(), Ok(()));

        client.tick(t1 + Duration::from_secs(16));
        assert_eq!(client.can_move(), Err(TurnCommandError::OutOfTime));
    }

    #[test]
    fn console_is_bounded() {
        let (tx, _rx) = mpsc::channel();
        let ws = Url::parse("ws://localhost/ws").unwrap();
        let config = ClientConfig { max_console_lines: 3, ..ClientConfig::default() };
        let mut client = ClientState::new(Session::new(ws, "Ana".to_owned(), None), config, tx);
        for i in 0..5 {
            let event = ServerEvent::ConsoleMsg { text: i.to_string() };
            client.process_server_event(event, Instant::now());
        }
        assert_eq!(client.console_lines().collect::<Vec<_>>(), vec!["2", "3", "4"]);
    }

    #[test]
    fn display_names() {
        let t0 = Instant::now();
        let (mut client, _rx) = new_client("Bia");
        client.process_server_event(state(json!({"players": [null, {"name": "Bia"}]})), t0);
        assert_eq!(client.display_name(DisplayPlayer::Bottom), "Bia");
        assert_eq!(client.display_name(DisplayPlayer::Top), "Waiting...");
        let (mut spectator, _rx) = new_client("Cid");
        spectator.process_server_event(state(json!({"players": []})), t0);
        assert_eq!(spectator.display_name(DisplayPlayer::Bottom), "White");
        assert_eq!(
            spectator.overlay_text(t0),
            Some("Waiting for another player...".to_owned())
        );
    }
}
