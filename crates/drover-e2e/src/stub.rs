//! A worker that honours the supervisor's launch contract and little else.
//!
//! Without `--foreground` the worker re-executes itself detached and returns
//! at once, like a daemonising server. The foreground process refuses to
//! bind when told to fail, binds its port on the loopback interface, writes
//! its pidfile, answers [`HEALTH_PATH`] and [`STOP_PATH`], and leaves on
//! SIGTERM unless told to ignore it. Per-port quirks come from the JSON file
//! passed as `--config`.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use serde::{Deserialize, Serialize};
use signal_hook::consts::signal::SIGTERM;
use thiserror::Error;

/// Path answered with `200 OK` by healthy workers.
pub const HEALTH_PATH: &str = "/status/";

/// Path that asks the worker to shut down.
pub const STOP_PATH: &str = "/stop/";

const ACCEPT_POLL: Duration = Duration::from_millis(20);
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Command line accepted by `drover-stub-worker`.
#[derive(Parser, Debug, Clone)]
#[command(name = "drover-stub-worker")]
pub struct StubArgs {
    /// JSON behaviour file.
    #[arg(long)]
    pub config: Utf8PathBuf,
    /// Loopback port to listen on.
    #[arg(long)]
    pub port: u16,
    /// Pidfile written once the port is bound.
    #[arg(long)]
    pub pidfile: Utf8PathBuf,
    /// Optional log file receiving one line per lifecycle event.
    #[arg(long)]
    pub logfile: Option<Utf8PathBuf>,
    /// Serve in this process instead of detaching.
    #[arg(long)]
    pub foreground: bool,
}

/// Per-port quirks read from the worker configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StubBehaviour {
    /// Ports whose worker keeps running after SIGTERM.
    pub ignore_sigterm: Vec<u16>,
    /// Ports whose worker exits before binding.
    pub fail_to_bind: Vec<u16>,
    /// Ports whose worker answers the health path with `503`.
    pub unhealthy: Vec<u16>,
}

impl StubBehaviour {
    /// Reads the behaviour file; a missing file means default behaviour.
    ///
    /// # Errors
    ///
    /// Returns [`StubError::Behaviour`] when the file exists but cannot be
    /// read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self, StubError> {
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| StubError::Behaviour {
                path: path.to_owned(),
                source: source.into(),
            }),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(StubError::Behaviour {
                path: path.to_owned(),
                source: Box::new(source),
            }),
        }
    }
}

/// Failures that end a stub worker with a non-zero status.
#[derive(Debug, Error)]
pub enum StubError {
    /// The behaviour file is unreadable or malformed.
    #[error("failed to read behaviour file {path}: {source}")]
    Behaviour {
        /// Behaviour file path.
        path: Utf8PathBuf,
        /// Read or parse failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The behaviour file told this port to fail.
    #[error("refusing to bind port {port}")]
    Refused {
        /// Port the worker was launched for.
        port: u16,
    },
    /// Binding the listening socket failed.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        /// Port the worker was launched for.
        port: u16,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Re-executing in the background failed.
    #[error("failed to detach worker: {0}")]
    Detach(#[source] io::Error),
    /// Installing the SIGTERM flag failed.
    #[error("failed to install SIGTERM handler: {0}")]
    Signals(#[source] io::Error),
    /// Writing the pidfile failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Pidfile path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Accepting connections failed.
    #[error("listener failed: {0}")]
    Listener(#[source] io::Error),
}

/// Runs the worker described by `args`.
///
/// # Errors
///
/// Returns an error when detaching, binding, or writing the pidfile fails,
/// or when the behaviour file tells this port to fail.
pub fn run(args: &StubArgs) -> Result<(), StubError> {
    if args.foreground {
        serve(args)
    } else {
        detach(args)
    }
}

fn detach(args: &StubArgs) -> Result<(), StubError> {
    let program = std::env::current_exe().map_err(StubError::Detach)?;
    let mut command = Command::new(program);
    command
        .arg(format!("--config={}", args.config))
        .arg(format!("--port={}", args.port))
        .arg(format!("--pidfile={}", args.pidfile))
        .arg("--foreground")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if let Some(logfile) = &args.logfile {
        command.arg(format!("--logfile={logfile}"));
    }
    command.spawn().map_err(StubError::Detach)?;
    Ok(())
}

fn serve(args: &StubArgs) -> Result<(), StubError> {
    let behaviour = StubBehaviour::load(&args.config)?;
    let port = args.port;
    if behaviour.fail_to_bind.contains(&port) {
        log_event(args, "refusing to bind");
        return Err(StubError::Refused { port });
    }

    let terminate = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, Arc::clone(&terminate)).map_err(StubError::Signals)?;

    let listener =
        TcpListener::bind(("127.0.0.1", port)).map_err(|source| StubError::Bind { port, source })?;
    listener.set_nonblocking(true).map_err(StubError::Listener)?;
    fs::write(&args.pidfile, format!("{}\n", std::process::id())).map_err(|source| {
        StubError::Write {
            path: args.pidfile.clone(),
            source,
        }
    })?;
    log_event(args, "listening");

    let honour_sigterm = !behaviour.ignore_sigterm.contains(&port);
    let healthy = !behaviour.unhealthy.contains(&port);
    loop {
        if honour_sigterm && terminate.load(Ordering::Relaxed) {
            log_event(args, "received SIGTERM");
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if respond(stream, healthy) == Reply::Stop {
                    log_event(args, "stop requested");
                    break;
                }
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(StubError::Listener(error)),
        }
    }

    let _ = fs::remove_file(&args.pidfile);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Continue,
    Stop,
}

fn respond(stream: TcpStream, healthy: bool) -> Reply {
    let Some(path) = read_request_path(&stream) else {
        return Reply::Continue;
    };
    let (status, reply) = match path.as_str() {
        HEALTH_PATH if healthy => ("200 OK", Reply::Continue),
        HEALTH_PATH => ("503 Service Unavailable", Reply::Continue),
        STOP_PATH => ("200 OK", Reply::Stop),
        _ => ("404 Not Found", Reply::Continue),
    };
    let mut stream = stream;
    let _ = write!(
        stream,
        "HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    );
    let _ = stream.flush();
    reply
}

/// Reads the request line and drains the headers so closing the socket
/// does not reset the connection under the client.
fn read_request_path(stream: &TcpStream) -> Option<String> {
    stream.set_nonblocking(false).ok()?;
    stream.set_read_timeout(Some(READ_TIMEOUT)).ok()?;
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut header = String::new();
    loop {
        header.clear();
        match reader.read_line(&mut header) {
            Ok(0) | Err(_) => break,
            Ok(_) if header.trim_end().is_empty() => break,
            Ok(_) => {}
        }
    }
    request_line.split_whitespace().nth(1).map(str::to_owned)
}

fn log_event(args: &StubArgs, event: &str) {
    let Some(logfile) = &args.logfile else {
        return;
    };
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(logfile) {
        let _ = writeln!(file, "worker {}: {event}", args.port);
    }
}
