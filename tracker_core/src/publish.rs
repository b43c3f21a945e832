//! Frame publisher for presentation clients.
//!
//! Frames are JSON [`TrackerFrame`]s prefixed with their length as a
//! little-endian `u32`. A client that connects late first receives the most
//! recent frame.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;

use crate::{
    cycle::{CycleOutcome, TrackerEventSink},
    graph::PlayerId,
    hints::HintRow,
    overlay::PinUpdate,
};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum TrackerFrame<'a> {
    Connected {
        player: PlayerId,
        game: &'a str,
    },
    Room {
        report: &'a [String],
        locations: &'a [String],
        regions: &'a [String],
        events: &'a [String],
        pins: &'a [PinUpdate],
    },
    Hints {
        rows: &'a [HintRow],
    },
}

type Clients = Arc<Mutex<Vec<TcpStream>>>;

pub struct FramePublisher {
    sender: Sender<Vec<u8>>,
    latest_frame: Arc<Mutex<Option<Vec<u8>>>>,
    local_addr: SocketAddr,
}

impl FramePublisher {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn publish(&self, frame: &TrackerFrame<'_>) {
        let bytes = match serde_json::to_vec(frame) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(target: "tracker::publish", error = %err, "frame.encode_failed");
                return;
            }
        };
        *self.latest_frame.lock() = Some(bytes.clone());
        if let Err(err) = self.sender.send(bytes) {
            tracing::error!(target: "tracker::publish", error = %err, "frame.queue_failed");
        }
    }
}

impl TrackerEventSink for FramePublisher {
    fn on_session_connected(&mut self, player: PlayerId, game: &str) {
        self.publish(&TrackerFrame::Connected { player, game });
    }

    fn on_room_update(&mut self, outcome: &CycleOutcome) {
        self.publish(&TrackerFrame::Room {
            report: &outcome.report,
            locations: &outcome.locations,
            regions: &outcome.regions,
            events: &outcome.events,
            pins: &outcome.pins,
        });
    }

    fn on_hints_updated(&mut self, rows: &[HintRow]) {
        self.publish(&TrackerFrame::Hints { rows });
    }
}

/// Bind `bind_addr` and serve frames from a background thread. `None` when
/// the address cannot be bound; tracking continues without publishing.
pub fn start_frame_publisher(bind_addr: SocketAddr) -> Option<FramePublisher> {
    let listener = match TcpListener::bind(bind_addr) {
        Ok(listener) => listener,
        Err(err) => {
            tracing::warn!(
                target: "tracker::publish",
                bind = %bind_addr,
                error = %err,
                "publisher.bind_failed"
            );
            return None;
        }
    };
    let local_addr = match listener.local_addr().and_then(|addr| {
        listener.set_nonblocking(true)?;
        Ok(addr)
    }) {
        Ok(addr) => addr,
        Err(err) => {
            tracing::warn!(target: "tracker::publish", error = %err, "publisher.setup_failed");
            return None;
        }
    };

    let (sender, receiver) = unbounded::<Vec<u8>>();
    let latest_frame: Arc<Mutex<Option<Vec<u8>>>> = Arc::new(Mutex::new(None));
    let accept_latest = Arc::clone(&latest_frame);
    thread::spawn(move || run_publisher(listener, Clients::default(), accept_latest, receiver));

    tracing::info!(target: "tracker::publish", bind = %local_addr, "publisher.listening");
    Some(FramePublisher {
        sender,
        latest_frame,
        local_addr,
    })
}

fn run_publisher(
    listener: TcpListener,
    clients: Clients,
    latest_frame: Arc<Mutex<Option<Vec<u8>>>>,
    receiver: Receiver<Vec<u8>>,
) {
    loop {
        match listener.accept() {
            Ok((mut stream, addr)) => {
                if let Err(err) = stream.set_nodelay(true) {
                    tracing::warn!(target: "tracker::publish", %addr, error = %err, "client.nodelay_failed");
                }
                if let Err(err) = stream.set_nonblocking(false) {
                    tracing::warn!(target: "tracker::publish", %addr, error = %err, "client.blocking_failed");
                }
                let latest = latest_frame.lock().clone();
                if let Some(frame) = latest {
                    if let Err(err) = write_frame(&mut stream, &frame) {
                        tracing::warn!(target: "tracker::publish", %addr, error = %err, "client.initial_frame_failed");
                        continue;
                    }
                }
                clients.lock().push(stream);
                tracing::info!(target: "tracker::publish", %addr, "client.connected");
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                tracing::error!(target: "tracker::publish", error = %err, "client.accept_failed");
                thread::sleep(Duration::from_millis(200));
            }
        }

        loop {
            match receiver.try_recv() {
                Ok(frame) => broadcast_frame(&clients, &frame),
                Err(crossbeam_channel::TryRecvError::Empty) => break,
                Err(crossbeam_channel::TryRecvError::Disconnected) => return,
            }
        }
    }
}

fn write_frame(stream: &mut TcpStream, frame: &[u8]) -> io::Result<()> {
    let len = frame.len() as u32;
    let mut buffer = Vec::with_capacity(4 + frame.len());
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(frame);
    stream.write_all(&buffer)
}

fn broadcast_frame(clients: &Clients, frame: &[u8]) {
    clients.lock().retain_mut(|stream| match write_frame(stream, frame) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(target: "tracker::publish", error = %err, "client.dropped");
            false
        }
    });
}
