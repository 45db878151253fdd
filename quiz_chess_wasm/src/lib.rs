// Browser binding. JS owns the socket, the page layout and navigation; the core owns all state.
// JS forwards socket callbacks, clicks and a periodic `tick`, then drains socket requests and
// notable events and calls `update_state` to redraw.
//
// TODO: Draw the board on canvas with piece sprites instead of a table with pictograms.

#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod web_document;
pub mod web_element_ext;
pub mod web_error_handling;
pub mod web_quiz;
pub mod web_socket;

use std::collections::BTreeSet;
use std::sync::mpsc;

use instant::Instant;
use itertools::Itertools;
use quiz_chess::client::{ClientState, NotableEvent};
use quiz_chess::clock::ClockShowing;
use quiz_chess::connection::Connection;
use quiz_chess::coord::Coord;
use quiz_chess::display::{DisplayCoord, DisplayPlayer, get_display_force, to_display_coord};
use quiz_chess::event::{ClientEvent, ServerEvent};
use quiz_chess::network;
use quiz_chess::piece::piece_to_pictogram;
use quiz_chess::session::{Session, default_ws_url};
use strum::IntoEnumIterator;
use url::Url;
use wasm_bindgen::prelude::*;
use web_document::web_document;
use web_element_ext::WebElementExt;
use web_error_handling::JsResult;
use web_socket::{JsTransport, new_connection, page_url, parse_config};


#[wasm_bindgen]
pub struct JsEventNoop {} // in contrast to `null`, indicates that event list is not over

#[wasm_bindgen]
pub struct JsEventGameStarted {}

#[wasm_bindgen]
pub struct JsEventTurnChanged {}

#[wasm_bindgen]
pub struct JsEventOutOfTime {}

#[wasm_bindgen(getter_with_clone)]
pub struct JsEventFetchSnapshot {
    pub url: String,
}

#[wasm_bindgen(getter_with_clone)]
pub struct JsEventNavigate {
    pub url: String,
}

#[wasm_bindgen(getter_with_clone)]
pub struct JsEventGameOver {
    pub winner: Option<String>,
    pub reason: Option<String>,
}


// Restores the session from the page URL. Pages opened by hand only need `name`.
fn session_from_page(page: &Url) -> JsResult<Session> {
    Session::from_query(page).ok_or_else(|| rust_error!("Page URL has no player name: {page}"))
}

fn parse_page_url(page_url: &str) -> JsResult<Url> {
    Url::parse(page_url).map_err(|err| rust_error!("Invalid page URL {page_url}: {err}"))
}

#[wasm_bindgen]
pub struct WebClient {
    connection: Connection<JsTransport>,
    state: ClientState,
    outgoing_rx: mpsc::Receiver<ClientEvent>,
    page_url: Url,
    quiz_page: String,
    entry_page: String,
}

#[wasm_bindgen]
impl WebClient {
    pub fn new_client(
        page_url: &str, quiz_page: &str, entry_page: &str, config_json: &str,
    ) -> JsResult<WebClient> {
        let page_url = parse_page_url(page_url)?;
        let config = parse_config(config_json).map_err(|err| rust_error!("{err}"))?;
        let session = session_from_page(&page_url)?;
        let connection = new_connection(&session, &config);
        let (outgoing_tx, outgoing_rx) = mpsc::channel();
        Ok(WebClient {
            connection,
            state: ClientState::new(session, config, outgoing_tx),
            outgoing_rx,
            page_url,
            quiz_page: quiz_page.to_owned(),
            entry_page: entry_page.to_owned(),
        })
    }

    // Socket URL to use when the page has no `ws` parameter.
    pub fn default_socket_url(page_url: &str) -> Option<String> {
        let page_url = Url::parse(page_url).ok()?;
        default_ws_url(&page_url).map(String::from)
    }

    pub fn connect(&mut self) { self.connection.connect(Instant::now()); }

    pub fn next_socket_open(&mut self) -> Option<String> {
        self.connection.transport_mut().take_open_request().map(String::from)
    }
    pub fn next_socket_send(&mut self) -> Option<String> {
        while let Ok(event) = self.outgoing_rx.try_recv() {
            self.connection.send(&event);
        }
        self.connection.transport_mut().next_outgoing()
    }
    pub fn socket_close_requested(&mut self) -> bool {
        self.connection.transport_mut().take_close_request()
    }

    pub fn on_socket_open(&mut self) {
        self.connection.set_color_hint(self.state.my_color());
        self.connection.on_open(Instant::now());
        self.state.on_connected();
    }
    pub fn on_socket_message(&mut self, text: &str) {
        if let Some(event) = self.connection.on_message(text) {
            self.state.process_server_event(event, Instant::now());
        }
    }
    pub fn on_socket_close(&mut self) {
        self.connection.on_close(Instant::now());
        self.state.on_disconnected();
    }
    pub fn on_socket_error(&mut self, message: &str) { self.connection.on_error(message); }

    // Body of the pull endpoint response.
    pub fn process_snapshot(&mut self, text: &str) {
        match network::decode_snapshot(text) {
            network::Decoded::Message(event) => {
                self.state.process_server_event(event, Instant::now());
            }
            network::Decoded::Ignored(err) => {
                let text = format!("Cannot read game state: {err}");
                self.state.process_server_event(ServerEvent::ConsoleMsg { text }, Instant::now());
            }
        }
    }

    pub fn click_square(&mut self, display_x: u8, display_y: u8) -> JsResult<()> {
        let result = self.state.click_display_square(DisplayCoord { x: display_x, y: display_y });
        let info_string = web_document()?.get_existing_element_by_id("info-string")?;
        info_string.set_text_content(result.err().map(|err| err.to_string()).as_deref());
        Ok(())
    }

    pub fn resign(&mut self) -> JsResult<()> {
        self.state.resign().map_err(|err| rust_error!("Cannot resign: {err}"))
    }

    pub fn tick(&mut self) {
        let now = Instant::now();
        self.connection.tick(now);
        self.state.tick(now);
    }

    pub fn next_notable_event(&mut self) -> JsResult<JsValue> {
        let Some(event) = self.state.next_notable_event() else {
            return Ok(JsValue::NULL);
        };
        match event {
            NotableEvent::FetchSnapshot => match self.state.snapshot_url() {
                Some(url) => Ok(JsEventFetchSnapshot { url: url.into() }.into()),
                None => Ok(JsEventNoop {}.into()),
            },
            NotableEvent::AssignmentChanged(color) => {
                self.connection.set_color_hint(color);
                Ok(JsEventNoop {}.into())
            }
            NotableEvent::GameStarted => Ok(JsEventGameStarted {}.into()),
            NotableEvent::TurnChanged(_) => Ok(JsEventTurnChanged {}.into()),
            NotableEvent::NavigateToQuiz(session) => {
                let url = page_url(&self.page_url, &self.quiz_page, &session)
                    .map_err(|err| rust_error!("{err}"))?;
                Ok(JsEventNavigate { url: url.into() }.into())
            }
            NotableEvent::GameOver(first) => {
                // Prefer the latest payload: the event only carries the first one.
                let payload = self.state.game_over().cloned().unwrap_or(first);
                Ok(JsEventGameOver { winner: payload.winner, reason: payload.reason }.into())
            }
            NotableEvent::ReturnToEntry => {
                let mut url = self
                    .page_url
                    .join(&self.entry_page)
                    .map_err(|err| rust_error!("Invalid page {}: {err}", self.entry_page))?;
                url.set_query(None);
                Ok(JsEventNavigate { url: url.into() }.into())
            }
            NotableEvent::OutOfTime(_) => Ok(JsEventOutOfTime {}.into()),
        }
    }

    pub fn update_state(&self) -> JsResult<()> {
        let document = web_document()?;
        let now = Instant::now();
        self.update_board()?;
        for player in DisplayPlayer::iter() {
            let suffix = display_player_suffix(player);
            let force = get_display_force(player, self.state.my_color());
            let name_node = document.get_existing_element_by_id(&format!("player-{suffix}"))?;
            name_node.set_text_content(Some(&self.state.display_name(player)));
            let clock_node = document.get_existing_element_by_id(&format!("clock-{suffix}"))?;
            update_clock(&clock_node, self.state.clock_showing(force, now))?;
        }
        let role_node = document.get_existing_element_by_id("role")?;
        role_node.set_text_content(Some(&self.state.role_string()));
        let overlay = document.get_existing_element_by_id("overlay")?;
        let overlay_text = self.state.overlay_text(now);
        overlay.set_text_content(overlay_text.as_deref());
        overlay.set_displayed(overlay_text.is_some())?;
        let console_log = document.get_existing_element_by_id("console-log")?;
        console_log.set_text_content(Some(&self.state.console_lines().join("\n")));
        scroll_to_bottom(&console_log);
        Ok(())
    }

    pub fn teardown(&mut self) {
        self.state.teardown(Instant::now());
        self.connection.teardown();
    }
}

impl WebClient {
    // Rebuilds the board table. Cells carry display coordinates for the click handler.
    fn update_board(&self) -> JsResult<()> {
        let board_node = web_document()?.get_existing_element_by_id("board")?;
        board_node.remove_all_children();
        let Some(grid) = self.state.grid() else {
            return Ok(());
        };
        let shape = grid.shape();
        let orientation = self.state.orientation();
        let selection = self.state.selection().map(|sel| sel.origin);
        let check_king = self.state.check_king();
        let preview: BTreeSet<Coord> = self.state.preview().collect();
        let mut cells = vec![vec![None; shape.width as usize]; shape.height as usize];
        for coord in shape.coords() {
            let DisplayCoord { x, y } = to_display_coord(coord, shape, orientation);
            cells[y as usize][x as usize] = Some(coord);
        }
        for (y, row) in cells.into_iter().enumerate() {
            let row_node = board_node.append_new_element("tr")?;
            for (x, coord) in row.into_iter().enumerate() {
                let Some(coord) = coord else {
                    continue;
                };
                let shade = if (coord.x + coord.y) % 2 == 0 { "light" } else { "dark" };
                let mut classes = vec!["square", shade];
                if Some(coord) == selection {
                    classes.push("selected");
                }
                if preview.contains(&coord) {
                    classes.push("preview");
                }
                if Some(coord) == check_king {
                    classes.push("in-check");
                }
                let text = grid.piece_at(coord).map(piece_to_pictogram).map(String::from);
                let cell = row_node
                    .append_new_element("td")?
                    .with_classes(classes)?
                    .with_attribute("data-x", &x.to_string())?
                    .with_attribute("data-y", &y.to_string())?;
                cell.set_text_content(text.as_deref());
            }
        }
        Ok(())
    }
}

fn display_player_suffix(player: DisplayPlayer) -> &'static str {
    match player {
        DisplayPlayer::Top => "top",
        DisplayPlayer::Bottom => "bottom",
    }
}

fn update_clock(clock_node: &web_sys::Element, showing: ClockShowing) -> JsResult<()> {
    clock_node.set_text_content(Some(&showing.ui_string()));
    clock_node.set_class("clock-active", showing.is_active)?;
    clock_node.set_class("clock-flag", showing.out_of_time)?;
    Ok(())
}

fn scroll_to_bottom(e: &web_sys::Element) {
    // Do not try to compute the real scroll position, as it is very slow!
    e.set_scroll_top(1_000_000_000);
}
