//! Live-reload notification channel.
//!
//! A plain TCP listener accepts WebSocket connections from open browser
//! tabs; a second thread broadcasts reload signals to every connected
//! client. The channel accepts two signals: a full page reload and a
//! stylesheet-only refresh, which the client script applies by re-linking
//! `<link rel="stylesheet">` elements in place.

use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tungstenite::WebSocket;

use crate::watch::Reload;

pub(crate) type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

pub(crate) fn reserve_port() -> std::io::Result<(TcpListener, u16)> {
    let listener = match TcpListener::bind("127.0.0.1:1337") {
        Ok(sock) => sock,
        Err(_) => TcpListener::bind("127.0.0.1:0")?,
    };

    let addr = listener.local_addr()?;
    let port = addr.port();
    Ok((listener, port))
}

pub(crate) fn new_thread_ws_incoming(server: TcpListener, client: Clients) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for stream in server.incoming() {
            let Ok(stream) = stream else { continue };
            match tungstenite::accept(stream) {
                Ok(socket) => client.lock().unwrap().push(socket),
                Err(err) => tracing::error!("websocket handshake failed: {err}"),
            }
        }
    })
}

pub(crate) fn new_thread_ws_reload(client: Clients) -> (Sender<Reload>, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel();

    let thread = std::thread::spawn(move || {
        while let Ok(signal) = rx.recv() {
            let message = match signal {
                Reload::Page => "reload",
                Reload::Styles => "reload:styles",
                Reload::None => continue,
            };

            let mut clients = client.lock().unwrap();
            let mut broken = vec![];

            for (i, socket) in clients.iter_mut().enumerate() {
                match socket.send(message.into()) {
                    Ok(_) => {}
                    Err(tungstenite::error::Error::Io(e)) => {
                        if e.kind() == std::io::ErrorKind::BrokenPipe {
                            broken.push(i);
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error: {e:?}");
                    }
                }
            }

            for i in broken.into_iter().rev() {
                clients.remove(i);
            }

            // Close all but the last 10 connections
            let len = clients.len();
            if len > 10 {
                for mut socket in clients.drain(0..len - 10) {
                    socket.close(None).ok();
                }
            }
        }
    });

    (tx, thread)
}
