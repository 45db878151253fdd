// JS owns the actual `WebSocket`. It asks the core what to do with it (open, send, close) and
// reports socket callbacks back; `JsTransport` is just the queue in between.

use std::collections::VecDeque;

use quiz_chess::config::ClientConfig;
use quiz_chess::connection::{Connection, Transport, TransportError};
use quiz_chess::session::Session;
use url::Url;


#[derive(Debug, Default)]
pub struct JsTransport {
    pending_open: Option<Url>,
    close_requested: bool,
    outgoing: VecDeque<String>,
}

impl JsTransport {
    pub fn take_open_request(&mut self) -> Option<Url> { self.pending_open.take() }
    pub fn take_close_request(&mut self) -> bool { std::mem::take(&mut self.close_requested) }
    pub fn next_outgoing(&mut self) -> Option<String> { self.outgoing.pop_front() }
}

impl Transport for JsTransport {
    fn open(&mut self, url: &Url) -> Result<(), TransportError> {
        self.pending_open = Some(url.clone());
        self.close_requested = false;
        self.outgoing.clear();
        Ok(())
    }

    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.outgoing.push_back(text);
        Ok(())
    }

    fn close(&mut self) {
        self.pending_open = None;
        self.outgoing.clear();
        self.close_requested = true;
    }
}

pub fn new_connection(session: &Session, config: &ClientConfig) -> Connection<JsTransport> {
    Connection::new(
        JsTransport::default(),
        session.ws_url.clone(),
        session.name.clone(),
        session.color,
        config.reconnect.clone(),
    )
}

// Empty string means defaults.
pub fn parse_config(config_json: &str) -> Result<ClientConfig, String> {
    if config_json.trim().is_empty() {
        return Ok(ClientConfig::default());
    }
    ClientConfig::from_json(config_json).map_err(|err| format!("Invalid config: {err}"))
}

// URL of a sibling page. The current query is carried over as is; session fields are only added
// where it lacks them.
pub fn page_url(current_page: &Url, page: &str, session: &Session) -> Result<Url, String> {
    let mut url = current_page.join(page).map_err(|err| format!("Invalid page {page}: {err}"))?;
    url.set_query(current_page.query());
    url.set_fragment(None);
    session.write_query(&mut url);
    Ok(url)
}


#[cfg(test)]
mod tests {
    use instant::Instant;
    use pretty_assertions::assert_eq;
    use quiz_chess::event::ClientEvent;
    use quiz_chess::force::Force;

    use super::*;

    fn session() -> Session {
        let ws_url = Url::parse("ws://quiz.local/ws").unwrap();
        Session::new(ws_url, "Ana".to_owned(), Some(Force::Black))
    }

    #[test]
    fn socket_requests_flow_through_queue() {
        let t0 = Instant::now();
        let mut connection = new_connection(&session(), &ClientConfig::default());
        connection.connect(t0);
        assert_eq!(
            connection.transport_mut().take_open_request(),
            Some(Url::parse("ws://quiz.local/ws").unwrap())
        );
        assert_eq!(connection.transport_mut().take_open_request(), None);

        connection.on_open(t0);
        connection.send(&ClientEvent::Resign);
        let transport = connection.transport_mut();
        assert_eq!(
            transport.next_outgoing().as_deref(),
            Some(r#"{"type":"join","name":"Ana","color":"black"}"#)
        );
        assert_eq!(transport.next_outgoing().as_deref(), Some(r#"{"type":"resign"}"#));
        assert_eq!(transport.next_outgoing(), None);

        connection.teardown();
        assert!(connection.transport_mut().take_close_request());
        assert!(!connection.transport_mut().take_close_request());
    }

    #[test]
    fn config_from_page() {
        assert_eq!(parse_config(" "), Ok(ClientConfig::default()));
        assert!(parse_config("{\"lobby_countdown\": 3}").is_err());
    }

    #[test]
    fn sibling_page_carries_session() {
        let current = Url::parse("http://quiz.local/game/chess.html#board").unwrap();
        let url = page_url(&current, "quiz.html", &session()).unwrap();
        assert_eq!(
            url.as_str(),
            "http://quiz.local/game/quiz.html?ws=ws%3A%2F%2Fquiz.local%2Fws&name=Ana&color=black"
        );
    }

    #[test]
    fn sibling_page_keeps_existing_query() {
        let current =
            Url::parse("http://quiz.local/game/chess.html?name=Bia&color=pretas&room=7#board")
                .unwrap();
        let url = page_url(&current, "quiz.html", &session()).unwrap();
        assert_eq!(
            url.as_str(),
            "http://quiz.local/game/quiz.html?name=Bia&color=pretas&room=7\
             &ws=ws%3A%2F%2Fquiz.local%2Fws"
        );
    }
}
