use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{info, warn};

use tracker_core::publish::start_frame_publisher;
use tracker_core::{
    load_tracker_config, spawn_watcher, ChangeSignal, CycleStatus, DefinitionGenerator, MapCatalog,
    Overlay, ReportLog, SessionFeed, SessionFixture, ShutdownFlag, Tracker, TrackerSettings,
};
use tracker_runtime::{parse_command_line, TrackerCommand};

#[derive(Debug, Parser)]
#[command(name = "tracker", about = "Headless progress tracker")]
struct Args {
    /// Settings file; overrides TRACKER_CONFIG_PATH.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Recorded session to replay into the tracker.
    #[arg(long)]
    session: Option<PathBuf>,
    #[arg(long)]
    games: Option<PathBuf>,
    #[arg(long)]
    players: Option<PathBuf>,
    #[arg(long)]
    maps: Option<PathBuf>,
}

struct Request {
    command: TrackerCommand,
    reply: Option<Sender<Vec<String>>>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let (mut config, metadata) = load_tracker_config(args.config);
    if let Some(games) = args.games {
        config.games_path = games;
    }
    if let Some(players) = args.players {
        config.player_files_path = players;
    }
    if args.maps.is_some() {
        config.maps_path = args.maps;
    }
    info!(
        target: "tracker::server",
        config = ?metadata.path(),
        games = %config.games_path.display(),
        players = %config.player_files_path.display(),
        "config.resolved"
    );

    let generator = DefinitionGenerator::from_dirs(&config.games_path, &config.player_files_path)
        .context("loading game and player files")?;

    let overlay = match &config.maps_path {
        Some(path) => match MapCatalog::from_file(path) {
            Ok(catalog) => Overlay::new(catalog),
            Err(err) => {
                warn!(target: "tracker::server", error = %err, "maps.load_failed");
                Overlay::default()
            }
        },
        None => Overlay::default(),
    };

    let shutdown = ShutdownFlag::new();
    let signal = ChangeSignal::new();
    let feed = SessionFeed::new(signal.clone());

    let mut tracker = Tracker::new(
        Arc::new(generator),
        TrackerSettings::from(&config),
        ReportLog::new(),
    )
    .with_overlay(overlay)
    .with_cancel(shutdown.clone());
    if let Some(publisher) = start_frame_publisher(config.publish_bind) {
        tracker.add_sink(publisher);
    }
    let tracker = Arc::new(Mutex::new(tracker));

    let watcher = {
        let tracker = Arc::clone(&tracker);
        let feed = feed.clone();
        spawn_watcher(
            signal.clone(),
            shutdown.clone(),
            config.watcher_poll(),
            move || {
                let session = feed.snapshot();
                let mut tracker = tracker.lock();
                let status = tracker.update(&session)?;
                if status == CycleStatus::Updated {
                    print_lines(tracker.report().lines());
                }
                info!(target: "tracker::server", ?status, "cycle.completed");
                Ok(())
            },
        )
    };

    if let Some(path) = &args.session {
        let fixture = SessionFixture::from_file(path)
            .with_context(|| format!("loading session {}", path.display()))?;
        fixture.replay(&feed);
        info!(
            target: "tracker::server",
            events = fixture.events.len(),
            "session.replayed"
        );
    }

    let (command_rx, command_tx) = spawn_command_listener(config.command_bind)
        .with_context(|| format!("binding command listener on {}", config.command_bind))?;
    spawn_console_reader(command_tx);

    info!(
        target: "tracker::server",
        command_bind = %config.command_bind,
        publish_bind = %config.publish_bind,
        "tracker ready"
    );

    while let Ok(request) = command_rx.recv() {
        let session = feed.snapshot();
        let lines = match tracker.lock().execute(&request.command, &session) {
            Ok(lines) => lines,
            Err(err) => {
                warn!(target: "tracker::server", error = %err, "command.failed");
                vec![err.to_string()]
            }
        };
        info!(
            target: "tracker::server",
            command = ?request.command,
            lines = lines.len(),
            "command.applied"
        );
        match request.reply {
            Some(reply) => {
                let _ = reply.send(lines);
            }
            None => print_lines(&lines),
        }
        if request.command == TrackerCommand::Quit {
            break;
        }
    }

    shutdown.trigger();
    signal.notify();
    match watcher.join() {
        Ok(stats) => info!(
            target: "tracker::server",
            cycles = stats.cycles,
            failures = stats.failures,
            panics = stats.panics,
            "tracker stopped"
        ),
        Err(_) => warn!(target: "tracker::server", "watcher.join_failed"),
    }
    Ok(())
}

fn print_lines(lines: &[String]) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in lines {
        let _ = writeln!(out, "{line}");
    }
}

fn spawn_command_listener(
    bind_addr: SocketAddr,
) -> io::Result<(Receiver<Request>, Sender<Request>)> {
    let listener = TcpListener::bind(bind_addr)?;
    listener.set_nonblocking(true)?;

    let (sender, receiver) = unbounded::<Request>();
    let accept_sender = sender.clone();
    thread::spawn(move || loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                info!(target: "tracker::server", %addr, "command_client.connected");
                let sender = accept_sender.clone();
                thread::spawn(move || handle_client(stream, sender));
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                warn!(target: "tracker::server", error = %err, "command_client.accept_failed");
                thread::sleep(Duration::from_millis(200));
            }
        }
    });

    Ok((receiver, sender))
}

fn spawn_console_reader(sender: Sender<Request>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command_line(&line) {
                Ok(command) => {
                    if sender.send(Request { command, reply: None }).is_err() {
                        break;
                    }
                }
                Err(err) => warn!(target: "tracker::server", error = %err, "command.invalid"),
            }
        }
    });
}

fn handle_client(stream: TcpStream, sender: Sender<Request>) {
    if let Err(err) = stream.set_nonblocking(false) {
        warn!(target: "tracker::server", error = %err, "command_client.blocking_failed");
    }
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(err) => {
            warn!(target: "tracker::server", error = %err, "command_client.clone_failed");
            return;
        }
    };
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let lines = match parse_command_line(trimmed) {
                    Ok(command) => {
                        let (reply_tx, reply_rx) = unbounded();
                        let request = Request {
                            command,
                            reply: Some(reply_tx),
                        };
                        if sender.send(request).is_err() {
                            break;
                        }
                        match reply_rx.recv() {
                            Ok(lines) => lines,
                            Err(_) => break,
                        }
                    }
                    Err(err) => {
                        warn!(target: "tracker::server", error = %err, "command.invalid");
                        vec![err.to_string()]
                    }
                };
                let mut reply = lines.join("\n");
                reply.push('\n');
                if let Err(err) = writer.write_all(reply.as_bytes()) {
                    warn!(target: "tracker::server", error = %err, "command_client.write_failed");
                    break;
                }
            }
            Err(err) => {
                warn!(target: "tracker::server", error = %err, "command_client.read_failed");
                break;
            }
        }
    }
}
