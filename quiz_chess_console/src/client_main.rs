use std::fmt;
use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crossterm::style::{self, Stylize};
use crossterm::{cursor, event as term_event, execute, terminal};
use instant::Instant;
use quiz_chess::client::{ClientState, NotableEvent};
use quiz_chess::config::ClientConfig;
use quiz_chess::connection::Connection;
use quiz_chess::event::{ClientEvent, ServerEvent};
use quiz_chess::force::Force;
use quiz_chess::network;
use quiz_chess::quiz::{QuizNotableEvent, QuizView};
use quiz_chess::session::Session;
use scopeguard::defer;
use url::Url;

use crate::network::{SocketEvent, TungsteniteTransport, fetch_snapshot};
use crate::tui;


const TICK_INTERVAL: Duration = Duration::from_millis(100);

pub struct ClientArgs {
    pub ws_url: Url,
    pub player_name: String,
    pub color: Option<Force>,
    pub config: ClientConfig,
}

enum IncomingEvent {
    Socket(SocketEvent),
    Snapshot(String),
    Terminal(term_event::Event),
    Tick,
}

impl From<SocketEvent> for IncomingEvent {
    fn from(event: SocketEvent) -> Self { IncomingEvent::Socket(event) }
}

// Board and quiz never show at the same time. The board state keeps following the server while
// the quiz is up, so that it is current when we come back.
struct App {
    connection: Connection<TungsteniteTransport<IncomingEvent>>,
    client: ClientState,
    outgoing_rx: mpsc::Receiver<ClientEvent>,
    quiz: Option<QuizView>,
    // Replayed into a new quiz view: the frame that started the quiz usually carries the question.
    last_state: Option<ServerEvent>,
    events_tx: mpsc::Sender<IncomingEvent>,
    keyboard_input: String,
    command_error: Option<String>,
}

fn writeln_raw(stdout: &mut io::Stdout, v: impl fmt::Display) -> io::Result<()> {
    let s = v.to_string();
    // Note. Not using `lines()` because it removes trailing new line.
    for line in s.split('\n') {
        execute!(stdout, style::Print(line), cursor::MoveToNextLine(1), cursor::Hide)?;
    }
    Ok(())
}

fn render(stdout: &mut io::Stdout, app_start_time: Instant, app: &App) -> io::Result<()> {
    let now = Instant::now();
    execute!(stdout, cursor::MoveTo(0, 0))?;
    let (screen, highlight_input) = match &app.quiz {
        Some(quiz) => (tui::render_quiz_view(quiz, now), quiz.can_answer(now)),
        None => (tui::render_board_view(&app.client, now), app.client.can_move().is_ok()),
    };
    writeln_raw(stdout, screen)?;
    // Note. Don't clear the board to avoid blinking.
    execute!(stdout, terminal::Clear(terminal::ClearType::FromCursorDown))?;

    // Simulate cursor: real cursor blinking is broken with Show/Hide.
    let show_cursor = now.duration_since(app_start_time).as_millis() % 1000 >= 500;
    let cursor = if show_cursor { '▂' } else { ' ' };
    let input_with_cursor = format!("{}{}", app.keyboard_input, cursor);
    let input_style = if highlight_input { style::Color::White } else { style::Color::DarkGrey };
    writeln_raw(stdout, format!("{}\n", input_with_cursor.with(input_style)))?;
    if let Some(err) = &app.command_error {
        writeln_raw(stdout, err.clone().with(style::Color::Red))?;
    }
    Ok(())
}

impl App {
    fn process_socket_event(&mut self, event: SocketEvent, now: Instant) {
        match event {
            SocketEvent::Opened { generation, writer } => {
                if self.connection.transport_mut().attach(generation, writer) {
                    self.connection.set_color_hint(self.client.my_color());
                    self.connection.on_open(now);
                    self.client.on_connected();
                }
            }
            SocketEvent::Text { generation, text } => {
                if !self.connection.transport().is_current(generation) {
                    return;
                }
                if let Some(event) = self.connection.on_message(&text) {
                    if let ServerEvent::State(_) = event {
                        self.last_state = Some(event.clone());
                    }
                    if let Some(quiz) = self.quiz.as_mut() {
                        quiz.process_server_event(event.clone(), now);
                    }
                    self.client.process_server_event(event, now);
                }
            }
            SocketEvent::Closed { generation, reason } => {
                if !self.connection.transport().is_current(generation) {
                    return;
                }
                log::info!("Socket closed: {reason}");
                self.connection.on_close(now);
                self.client.on_disconnected();
            }
        }
    }

    fn process_snapshot(&mut self, raw: &str, now: Instant) {
        match network::decode_snapshot(raw) {
            network::Decoded::Message(ServerEvent::State(snapshot)) => {
                self.client.process_snapshot(snapshot, now);
            }
            network::Decoded::Message(_) => {}
            network::Decoded::Ignored(err) => log::warn!("Ignoring snapshot: {err}"),
        }
    }

    fn fetch_snapshot(&self) {
        let Some(url) = self.client.snapshot_url() else {
            log::warn!("No snapshot endpoint for {}", self.client.session().ws_url);
            return;
        };
        let events_tx = self.events_tx.clone();
        thread::spawn(move || match fetch_snapshot(url) {
            Ok(raw) => {
                let _ = events_tx.send(IncomingEvent::Snapshot(raw));
            }
            Err(err) => log::warn!("Cannot fetch snapshot: {err}"),
        });
    }

    // Returns false when the user asked to quit.
    fn process_command(&mut self, now: Instant) -> bool {
        let input = std::mem::take(&mut self.keyboard_input);
        let input = input.trim();
        self.command_error = None;
        if let Some(cmd) = input.strip_prefix('/') {
            match cmd {
                "quit" => return false,
                "resign" => {
                    if let Err(err) = self.client.resign() {
                        self.command_error = Some(format!("Cannot resign: {err}"));
                    }
                }
                _ => self.command_error = Some(format!("Unknown command: '{cmd}'")),
            }
            return true;
        }
        if let Some(quiz) = self.quiz.as_mut() {
            let choice = input.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
            let Some(choice) = choice else {
                self.command_error = Some(format!("Not a choice: '{input}'"));
                return true;
            };
            match quiz.answer(choice, now) {
                Ok((event, _feedback)) => {
                    self.connection.send(&event);
                }
                Err(err) => self.command_error = Some(format!("Cannot answer: {err}")),
            }
            return true;
        }
        let Some(shape) = self.client.grid().map(|grid| grid.shape()) else {
            self.command_error = Some("No board yet".to_owned());
            return true;
        };
        let Some(square) = tui::parse_square(input, shape) else {
            self.command_error = Some(format!("Not a square: '{input}'"));
            return true;
        };
        if let Err(err) = self.client.click_display_square(square) {
            self.command_error = Some(format!("Cannot move: {err}"));
        }
        true
    }

    fn process_notable_events(&mut self, stdout: &mut io::Stdout) -> io::Result<bool> {
        while let Some(event) = self.client.next_notable_event() {
            match event {
                NotableEvent::FetchSnapshot => self.fetch_snapshot(),
                NotableEvent::AssignmentChanged(color) => self.connection.set_color_hint(color),
                NotableEvent::NavigateToQuiz(session) => {
                    execute!(stdout, terminal::Clear(terminal::ClearType::All))?;
                    let mut quiz = QuizView::new(session, self.client.config());
                    if let Some(state) = self.last_state.clone() {
                        quiz.process_server_event(state, Instant::now());
                    }
                    self.quiz = Some(quiz);
                }
                NotableEvent::ReturnToEntry => return Ok(false),
                NotableEvent::GameStarted
                | NotableEvent::TurnChanged(_)
                | NotableEvent::GameOver(_)
                | NotableEvent::OutOfTime(_) => {}
            }
        }
        if let Some(quiz) = self.quiz.as_mut() {
            while let Some(event) = quiz.next_notable_event() {
                if let QuizNotableEvent::ReturnToBoard(_) = event {
                    quiz.teardown();
                    self.quiz = None;
                    execute!(stdout, terminal::Clear(terminal::ClearType::All))?;
                    break;
                }
            }
        }
        Ok(true)
    }

    fn send_outgoing_events(&mut self) {
        while let Ok(event) = self.outgoing_rx.try_recv() {
            self.connection.send(&event);
        }
    }
}

pub fn run(args: ClientArgs) -> anyhow::Result<()> {
    let ClientArgs { ws_url, player_name, color, config } = args;
    let player_name = player_name.trim().to_owned();
    let (tx, rx) = mpsc::channel();
    let (outgoing_tx, outgoing_rx) = mpsc::channel();
    let session = Session::new(ws_url.clone(), player_name.clone(), color);
    let transport = TungsteniteTransport::new(tx.clone());
    let connection =
        Connection::new(transport, ws_url, player_name, color, config.reconnect.clone());
    let client = ClientState::new(session, config, outgoing_tx);
    let mut app = App {
        connection,
        client,
        outgoing_rx,
        quiz: None,
        last_state: None,
        events_tx: tx.clone(),
        keyboard_input: String::new(),
        command_error: None,
    };

    let mut stdout = io::stdout();
    terminal::enable_raw_mode()?;
    execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;
    defer! {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(io::stdout(), terminal::LeaveAlternateScreen, cursor::Show);
    };
    let app_start_time = Instant::now();

    let tx_local = tx.clone();
    let tx_tick = tx;
    thread::spawn(move || {
        while let Ok(ev) = term_event::read() {
            if tx_local.send(IncomingEvent::Terminal(ev)).is_err() {
                return;
            }
        }
    });
    thread::spawn(move || {
        loop {
            thread::sleep(TICK_INTERVAL);
            if tx_tick.send(IncomingEvent::Tick).is_err() {
                return;
            }
        }
    });

    app.connection.connect(Instant::now());
    for event in rx {
        let now = Instant::now();
        match event {
            IncomingEvent::Socket(event) => app.process_socket_event(event, now),
            IncomingEvent::Snapshot(raw) => app.process_snapshot(&raw, now),
            IncomingEvent::Terminal(term_event::Event::Key(key)) => match key.code {
                term_event::KeyCode::Char('c')
                    if key.modifiers.contains(term_event::KeyModifiers::CONTROL) =>
                {
                    break;
                }
                term_event::KeyCode::Char(ch) => app.keyboard_input.push(ch),
                term_event::KeyCode::Backspace => {
                    app.keyboard_input.pop();
                }
                term_event::KeyCode::Enter => {
                    if !app.process_command(now) {
                        break;
                    }
                }
                term_event::KeyCode::Esc => app.keyboard_input.clear(),
                _ => {}
            },
            IncomingEvent::Terminal(_) => {}
            IncomingEvent::Tick => {
                app.connection.tick(now);
                app.client.tick(now);
                if let Some(quiz) = app.quiz.as_mut() {
                    quiz.tick(now);
                }
            }
        }
        app.send_outgoing_events();
        if !app.process_notable_events(&mut stdout)? {
            break;
        }
        render(&mut stdout, app_start_time, &app)?;
    }
    app.client.teardown(Instant::now());
    app.connection.teardown();
    Ok(())
}
