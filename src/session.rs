// What the board view hands over to the quiz view (and back).
//
// Pages used to pass `ws`, `name` and `color` through the query string. `Session` is the explicit
// replacement; the query string is still written (only for keys that are absent) so that pages
// which read it keep working.

use rand::Rng;
use rand::distr::Alphanumeric;
use url::Url;

use crate::force::Force;


const TOKEN_LENGTH: usize = 16;

pub const WS_PARAM: &str = "ws";
pub const NAME_PARAM: &str = "name";
pub const COLOR_PARAM: &str = "color";

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Session {
    pub ws_url: Url,
    pub name: String,
    pub color: Option<Force>,
    // Identifies this client across page switches and reconnects.
    pub token: String,
}

impl Session {
    pub fn new(ws_url: Url, name: String, color: Option<Force>) -> Self {
        Session { ws_url, name, color, token: new_session_token() }
    }

    // Adds session fields that the URL does not carry yet. Existing values win: they were put
    // there by whoever opened the page.
    pub fn write_query(&self, url: &mut Url) {
        let present = |key: &str| url.query_pairs().any(|(k, _)| k == key);
        let mut missing = vec![];
        if !present(WS_PARAM) {
            missing.push((WS_PARAM, self.ws_url.to_string()));
        }
        if !present(NAME_PARAM) {
            missing.push((NAME_PARAM, self.name.clone()));
        }
        if let Some(color) = self.color {
            if !present(COLOR_PARAM) {
                missing.push((COLOR_PARAM, color.to_wire().to_owned()));
            }
        }
        if !missing.is_empty() {
            url.query_pairs_mut().extend_pairs(missing);
        }
    }

    // Restores a session from page URL parameters. The socket URL defaults to the page's own
    // `/ws` endpoint. Returns `None` without a usable name.
    pub fn from_query(url: &Url) -> Option<Self> {
        let param = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        let name = param(NAME_PARAM)?;
        let ws_url = match param(WS_PARAM) {
            Some(ws) => Url::parse(&ws).ok()?,
            None => default_ws_url(url)?,
        };
        let color = param(COLOR_PARAM).and_then(|c| Force::from_color_hint(&c));
        Some(Session::new(ws_url, name, color))
    }
}

pub fn new_session_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

// `http://host/page` -> `ws://host/ws`, `https://...` -> `wss://...`.
pub fn default_ws_url(page: &Url) -> Option<Url> {
    let scheme = match page.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => page.scheme(),
        _ => return None,
    };
    let mut url = page.clone();
    url.set_scheme(scheme).ok()?;
    url.set_path("/ws");
    url.set_query(None);
    url.set_fragment(None);
    Some(url)
}

// The pull endpoint lives next to the socket: `ws://host/ws` -> `http://host/state`.
pub fn snapshot_url_for(ws_url: &Url) -> Option<Url> {
    let scheme = match ws_url.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        _ => return None,
    };
    let mut url = ws_url.clone();
    url.set_scheme(scheme).ok()?;
    url.set_path("/state");
    url.set_query(None);
    url.set_fragment(None);
    Some(url)
}
