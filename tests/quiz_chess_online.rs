// Improvement potential. Cover the pull endpoint with a fake HTTP layer instead of handing
// snapshots to the client directly.

mod common;

use std::ops;
use std::sync::mpsc;
use std::time::Duration;

use common::{FakeServer, Recipient};
use instant::Instant;
use itertools::Itertools;
use pretty_assertions::assert_eq;
use quiz_chess::client::{ClickOutcome, ClientState, NotableEvent, TurnCommandError};
use quiz_chess::config::ClientConfig;
use quiz_chess::connection::{Connection, ConnectionState};
use quiz_chess::coord::Coord;
use quiz_chess::display::DisplayPlayer;
use quiz_chess::event::{ClientEvent, ServerEvent};
use quiz_chess::force::Force;
use quiz_chess::network;
use quiz_chess::phase::GamePhase;
use quiz_chess::piece::{Piece, PieceKind};
use quiz_chess::quiz::{AnswerFeedback, QuizNotableEvent, QuizResult, QuizStatus, QuizView};
use quiz_chess::session::Session;
use quiz_chess::test_util::RecordingTransport;
use serde_json::json;
use url::Url;


fn secs(s: u64) -> Duration { Duration::from_secs(s) }

fn decode(frame: &str) -> ServerEvent { network::decode(frame).into_message().unwrap() }


struct Client {
    connection: Connection<RecordingTransport>,
    state: ClientState,
    outgoing_rx: mpsc::Receiver<ClientEvent>,
    notable: Vec<NotableEvent>,
}

impl Client {
    fn new(name: &str, config: &ClientConfig, now: Instant) -> Self {
        let ws_url = Url::parse("ws://quiz.local/ws").unwrap();
        let session = Session::new(ws_url.clone(), name.to_owned(), None);
        let (outgoing_tx, outgoing_rx) = mpsc::channel();
        let state = ClientState::new(session, config.clone(), outgoing_tx);
        let transport = RecordingTransport::default();
        let connection =
            Connection::new(transport, ws_url, name.to_owned(), None, config.reconnect.clone());
        let mut client = Client { connection, state, outgoing_rx, notable: vec![] };
        client.open(now);
        client
    }

    fn open(&mut self, now: Instant) {
        if self.connection.state() != ConnectionState::Connecting {
            self.connection.connect(now);
        }
        self.connection.set_color_hint(self.state.my_color());
        self.connection.on_open(now);
        self.state.on_connected();
    }

    fn close(&mut self, now: Instant) {
        self.connection.on_close(now);
        self.state.on_disconnected();
    }

    fn take_notable(&mut self) -> Vec<NotableEvent> {
        while let Some(event) = self.state.next_notable_event() {
            self.notable.push(event);
        }
        std::mem::take(&mut self.notable)
    }

    fn click(&mut self, x: u8, y: u8) -> Result<ClickOutcome, TurnCommandError> {
        self.state.click_square(Coord::new(x, y))
    }
}


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct TestClientId(usize);

struct World {
    server: FakeServer,
    clients: Vec<Client>,
    config: ClientConfig,
    creation_instant: Instant,
    time_elapsed: Duration,
}

impl World {
    fn new() -> Self {
        World {
            server: FakeServer::new(),
            clients: vec![],
            config: ClientConfig::default(),
            creation_instant: Instant::now(),
            time_elapsed: Duration::ZERO,
        }
    }

    fn now(&self) -> Instant { self.creation_instant + self.time_elapsed }

    fn advance(&mut self, duration: Duration) {
        self.time_elapsed += duration;
        let now = self.now();
        for client in self.clients.iter_mut() {
            client.state.tick(now);
            client.connection.tick(now);
        }
    }

    fn new_client(&mut self, name: &str) -> TestClientId {
        let client = Client::new(name, &self.config, self.now());
        self.clients.push(client);
        let id = TestClientId(self.clients.len() - 1);
        self.process_all_events();
        id
    }

    fn process_all_events(&mut self) {
        loop {
            let mut frames = vec![];
            for (idx, client) in self.clients.iter_mut().enumerate() {
                while let Ok(event) = client.outgoing_rx.try_recv() {
                    client.connection.send(&event);
                }
                for raw in std::mem::take(&mut client.connection.transport_mut().sent) {
                    frames.push((idx, raw));
                }
            }
            if frames.is_empty() {
                break;
            }
            for (idx, raw) in frames {
                println!("{idx} >>> {raw}");
                for (recipient, frame) in self.server.handle(idx, &raw) {
                    self.deliver(recipient, &frame);
                }
            }
        }
    }

    fn deliver(&mut self, recipient: Recipient, frame: &str) {
        let now = self.now();
        for (idx, client) in self.clients.iter_mut().enumerate() {
            let addressed = match recipient {
                Recipient::One(one) => one == idx,
                Recipient::All => true,
            };
            if addressed && client.connection.is_open() {
                println!("{idx} <<< {frame}");
                if let Some(event) = client.connection.on_message(frame) {
                    client.state.process_server_event(event, now);
                }
            }
        }
    }

    fn broadcast_state(&mut self) {
        let frame = self.server.state_frame();
        self.deliver(Recipient::All, &frame);
    }

    // Two seated players, server already in chess.
    fn default_clients(&mut self) -> (TestClientId, TestClientId) {
        let ana = self.new_client("Ana");
        let bia = self.new_client("Bia");
        self.server.phase = "chess";
        self.broadcast_state();
        (ana, bia)
    }
}

impl ops::Index<TestClientId> for World {
    type Output = Client;
    fn index(&self, id: TestClientId) -> &Self::Output { &self.clients[id.0] }
}
impl ops::IndexMut<TestClientId> for World {
    fn index_mut(&mut self, id: TestClientId) -> &mut Self::Output { &mut self.clients[id.0] }
}


#[test]
fn lobby_countdown_starts_game() {
    let mut world = World::new();
    let ana = world.new_client("Ana");
    assert_eq!(world[ana].state.my_color(), Some(Force::White));
    assert_eq!(world[ana].state.phase(), GamePhase::Lobby);
    assert_eq!(
        world[ana].state.overlay_text(world.now()),
        Some("Waiting for another player...".to_owned())
    );

    let bia = world.new_client("Bia");
    assert_eq!(world[bia].state.my_color(), Some(Force::Black));
    for id in [ana, bia] {
        assert_eq!(world[id].state.phase(), GamePhase::Countdown);
        assert_eq!(world[id].state.countdown_seconds_left(world.now()), Some(10));
    }
    // Repeated snapshots do not restart the countdown.
    world.advance(secs(4));
    world.broadcast_state();
    assert_eq!(world[ana].state.countdown_seconds_left(world.now()), Some(6));

    world.advance(secs(6));
    for id in [ana, bia] {
        assert!(world[id].state.started());
        assert_eq!(world[id].state.phase(), GamePhase::Chess);
        let events = world[id].take_notable();
        assert!(events.contains(&NotableEvent::GameStarted));
        assert!(events.contains(&NotableEvent::FetchSnapshot));
    }

    world.server.phase = "chess";
    world.broadcast_state();
    assert!(!world[ana].take_notable().contains(&NotableEvent::GameStarted));
    assert!(world[ana].state.console_lines().contains(&"Game started. Good luck!"));
}

#[test]
fn move_round_trip() {
    let mut world = World::new();
    let (ana, bia) = world.default_clients();
    assert!(world[ana].state.is_my_turn());
    assert_eq!(world[bia].click(0, 4), Err(TurnCommandError::NotYourTurn));

    assert_eq!(world[ana].click(0, 1), Ok(ClickOutcome::Selected));
    assert_eq!(world[ana].click(0, 2), Ok(ClickOutcome::MoveSent));
    world.process_all_events();

    let pawn = Some(Piece::new(Force::White, PieceKind::Pawn));
    for id in [ana, bia] {
        let grid = world[id].state.grid().unwrap();
        assert_eq!(grid.piece_at(Coord::new(0, 2)), pawn);
        assert_eq!(grid.piece_at(Coord::new(0, 1)), None);
        assert_eq!(world[id].state.turn(), Some(Force::Black));
        assert!(world[id].state.console_lines().contains(&"Black to move."));
    }
    assert!(!world[ana].state.is_my_turn());
    assert!(world[bia].state.is_my_turn());
    assert_eq!(world[ana].click(1, 1), Err(TurnCommandError::NotYourTurn));
    assert_eq!(world[bia].click(1, 4), Ok(ClickOutcome::Selected));
}

#[test]
fn spectator_watches() {
    let mut world = World::new();
    let (_ana, _bia) = world.default_clients();
    let cid = world.new_client("Cid");
    assert_eq!(world[cid].state.my_color(), None);
    assert_eq!(world[cid].state.role_string(), "Spectator");
    assert_eq!(world[cid].click(0, 1), Err(TurnCommandError::NotAPlayer));
    assert_eq!(world[cid].state.display_name(DisplayPlayer::Bottom), "Ana");
    assert_eq!(world[cid].state.display_name(DisplayPlayer::Top), "Bia");
}

#[test]
fn reconnect_keeps_seat() {
    let mut world = World::new();
    let (ana, _bia) = world.default_clients();
    let now = world.now();
    world[ana].close(now);
    assert!(world[ana].state.console_lines().contains(&"Disconnected."));
    assert_eq!(
        world[ana].connection.state(),
        ConnectionState::WaitingToReconnect { reconnect_at: now + secs(2) }
    );

    world.advance(secs(2));
    assert_eq!(world[ana].connection.transport().opened, 2);
    let now = world.now();
    world[ana].open(now);
    assert_eq!(
        world[ana].connection.transport().sent_json(),
        vec![json!({"type": "join", "name": "Ana", "color": "white"})]
    );
    world.process_all_events();
    assert_eq!(world[ana].state.my_color(), Some(Force::White));
    assert!(world[ana].state.is_my_turn());
}

#[test]
fn quiz_handoff_and_return() {
    let mut world = World::new();
    let (ana, bia) = world.default_clients();
    world[ana].click(2, 1).unwrap();

    world.server.phase = "quiz";
    world.server.quiz = Some(json!({
        "question": "2 + 2?",
        "choices": ["3", "4", "5"],
        "timer": 10,
        "currentSide": "white",
        "correctIndex": 1,
    }));
    world.broadcast_state();
    world.broadcast_state();

    assert_eq!(world[ana].state.selection(), None);
    assert_eq!(world[ana].click(2, 1), Err(TurnCommandError::QuizInProgress));
    let handoffs = world[ana]
        .take_notable()
        .into_iter()
        .filter_map(|event| match event {
            NotableEvent::NavigateToQuiz(session) => Some(session),
            _ => None,
        })
        .collect_vec();
    assert_eq!(handoffs.len(), 1);
    let session = handoffs.into_iter().next().unwrap();
    assert_eq!(session.name, "Ana");
    assert_eq!(session.color, Some(Force::White));
    assert_eq!(&session.token, &world[ana].state.session().token);

    let mut quiz = QuizView::new(session, &world.config);
    quiz.process_server_event(decode(&world.server.state_frame()), world.now());
    assert_eq!(quiz.status(), QuizStatus::Question);
    assert!(quiz.can_answer(world.now()));
    let (answer, feedback) = quiz.answer(1, world.now()).unwrap();
    assert_eq!(feedback, AnswerFeedback::Correct);
    world[ana].connection.send(&answer);
    world.process_all_events();
    assert_eq!(world.server.answers, vec!["1".to_owned()]);

    // Black fails the next question and the server returns to chess.
    world.server.quiz = Some(json!({
        "question": "3 * 3?",
        "choices": ["6", "9"],
        "currentSide": "black",
    }));
    quiz.process_server_event(decode(&world.server.state_frame()), world.now());
    assert!(!quiz.is_my_turn());
    world.server.phase = "chess";
    world.server.quiz = None;
    quiz.process_server_event(decode(&world.server.state_frame()), world.now());
    assert_eq!(quiz.status(), QuizStatus::Finished(QuizResult::Victory));

    quiz.tick(world.now() + Duration::from_millis(2499));
    let before_return = std::iter::from_fn(|| quiz.next_notable_event()).collect_vec();
    assert!(!before_return.iter().any(|e| matches!(e, QuizNotableEvent::ReturnToBoard(_))));
    quiz.tick(world.now() + Duration::from_millis(2500));
    assert!(matches!(quiz.next_notable_event(), Some(QuizNotableEvent::ReturnToBoard(_))));

    world.broadcast_state();
    assert_eq!(world[bia].state.phase(), GamePhase::Chess);
    assert_eq!(world[ana].click(2, 1), Ok(ClickOutcome::Selected));
}

#[test]
fn resign_ends_game_once() {
    let mut world = World::new();
    let (ana, bia) = world.default_clients();
    world[ana].state.resign().unwrap();
    world.process_all_events();

    for id in [ana, bia] {
        assert_eq!(world[id].state.phase(), GamePhase::GameOver);
        assert_eq!(
            world[id].state.overlay_text(world.now()),
            Some("Game over: black wins (resign)".to_owned())
        );
        assert!(world[id].take_notable().iter().any(|e| matches!(e, NotableEvent::GameOver(_))));
    }
    assert_eq!(world[ana].click(0, 1), Err(TurnCommandError::GameOver));
    assert_eq!(world[ana].state.resign(), Err(TurnCommandError::GameOver));

    world.advance(secs(3));
    world.broadcast_state();
    world.advance(secs(1));
    assert!(!world[ana].take_notable().contains(&NotableEvent::ReturnToEntry));
    world.advance(secs(1));
    assert!(world[ana].take_notable().contains(&NotableEvent::ReturnToEntry));
    world.advance(secs(10));
    world.broadcast_state();
    world.advance(secs(10));
    assert!(!world[ana].take_notable().contains(&NotableEvent::ReturnToEntry));
}

#[test]
fn turn_timer_expires() {
    let mut world = World::new();
    let (ana, bia) = world.default_clients();
    world.server.timer = Some(json!({
        "side": "white",
        "turnStartedAt": 1000.0,
        "bankSeconds": 30.0,
        "remainingAtAnchor": 3.0,
    }));
    world.broadcast_state();
    assert!(world[ana].state.clock_showing(Force::White, world.now()).is_active);
    assert!(!world[bia].state.clock_showing(Force::Black, world.now()).is_active);

    world.advance(secs(2));
    // Same turn and the server agrees on the remaining time: nothing restarts.
    world.server.timer.as_mut().unwrap()["remainingAtAnchor"] = json!(1.0);
    world.broadcast_state();
    assert_eq!(world[ana].click(0, 1), Ok(ClickOutcome::Selected));

    world.advance(secs(1));
    assert!(world[ana].take_notable().contains(&NotableEvent::OutOfTime(Force::White)));
    assert_eq!(world[ana].state.selection(), None);
    assert_eq!(world[ana].click(0, 1), Err(TurnCommandError::OutOfTime));
    assert!(world[ana].state.clock_showing(Force::White, world.now()).out_of_time);
}
