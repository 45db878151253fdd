// Blocking WebSocket transport for the console client.
//
// Each `open` spawns a reader thread that reports through the client event channel. Events are
// tagged with a generation so that a socket replaced by a reconnect cannot feed stale frames.

use std::net::TcpStream;
use std::sync::mpsc;
use std::thread;

use quiz_chess::connection::{Transport, TransportError};
use tungstenite::protocol::Role;
use tungstenite::{Message, WebSocket};
use url::Url;


pub enum SocketEvent {
    Opened { generation: u64, writer: WebSocket<TcpStream> },
    Text { generation: u64, text: String },
    Closed { generation: u64, reason: String },
}

pub struct TungsteniteTransport<E> {
    events_tx: mpsc::Sender<E>,
    generation: u64,
    writer: Option<WebSocket<TcpStream>>,
}

impl<E: From<SocketEvent> + Send + 'static> TungsteniteTransport<E> {
    pub fn new(events_tx: mpsc::Sender<E>) -> Self {
        TungsteniteTransport { events_tx, generation: 0, writer: None }
    }

    pub fn is_current(&self, generation: u64) -> bool { generation == self.generation }

    // Takes the write half once the handshake is done. Returns false for a superseded socket.
    pub fn attach(&mut self, generation: u64, writer: WebSocket<TcpStream>) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.writer = Some(writer);
        true
    }
}

impl<E: From<SocketEvent> + Send + 'static> Transport for TungsteniteTransport<E> {
    fn open(&mut self, url: &Url) -> Result<(), TransportError> {
        // TODO: Support wss. The reader/writer split relies on cloning a plain TcpStream.
        if url.scheme() != "ws" {
            return Err(TransportError::Open(format!("unsupported scheme {}", url.scheme())));
        }
        self.generation += 1;
        self.writer = None;
        let generation = self.generation;
        let url = url.clone();
        let events_tx = self.events_tx.clone();
        thread::spawn(move || {
            let send = |event: SocketEvent| events_tx.send(event.into()).is_ok();
            let mut reader = match connect(&url) {
                Ok(socket) => socket,
                Err(reason) => {
                    send(SocketEvent::Closed { generation, reason });
                    return;
                }
            };
            let writer = match clone_websocket(&reader, Role::Client) {
                Ok(writer) => writer,
                Err(reason) => {
                    send(SocketEvent::Closed { generation, reason });
                    return;
                }
            };
            if !send(SocketEvent::Opened { generation, writer }) {
                return;
            }
            loop {
                let event = match reader.read() {
                    Ok(Message::Text(text)) => {
                        SocketEvent::Text { generation, text: text.as_str().to_owned() }
                    }
                    Ok(Message::Close(frame)) => {
                        let reason =
                            frame.map_or_else(String::new, |f| f.reason.as_str().to_owned());
                        SocketEvent::Closed { generation, reason }
                    }
                    Ok(_) => continue,
                    Err(err) => SocketEvent::Closed { generation, reason: err.to_string() },
                };
                let closed = matches!(event, SocketEvent::Closed { .. });
                if !send(event) || closed {
                    return;
                }
            }
        });
        Ok(())
    }

    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TransportError::Send("socket is not open".to_owned()))?;
        writer.send(Message::text(text)).map_err(|err| TransportError::Send(err.to_string()))
    }

    fn close(&mut self) {
        // Anything the old reader thread still sends is stale from now on.
        self.generation += 1;
        if let Some(mut writer) = self.writer.take() {
            if let Err(err) = writer.close(None).and_then(|()| writer.flush()) {
                log::debug!("Error closing socket: {err}");
            }
        }
    }
}

fn connect(url: &Url) -> Result<WebSocket<TcpStream>, String> {
    let addrs = url.socket_addrs(|| None).map_err(|err| err.to_string())?;
    let stream = TcpStream::connect(&addrs[..]).map_err(|err| err.to_string())?;
    let (socket, _) = tungstenite::client(url.as_str(), stream).map_err(|err| err.to_string())?;
    Ok(socket)
}

// Improvement potential: Instead of cloning the socket, consider calling
//   TcpStream.set_nonblocking on the underlying stream and doing read/writes in the same thread.
pub fn clone_websocket(
    socket: &WebSocket<TcpStream>, role: Role,
) -> Result<WebSocket<TcpStream>, String> {
    let stream = socket.get_ref().try_clone().map_err(|err| err.to_string())?;
    let config = *socket.get_config();
    Ok(WebSocket::from_raw_socket(stream, role, Some(config)))
}

pub fn fetch_snapshot(url: Url) -> Result<String, reqwest::Error> {
    reqwest::blocking::get(url)?.error_for_status()?.text()
}
