//! Reporting listener state to a supervising parent process.
//!
//! The registrars report, per transport, either the bound address or the
//! reason it failed, then signal once that all listeners were processed.
//! [`StdoutControl`] writes one line per event; [`MemoryControl`] keeps the
//! events for inspection.

use std::io::{self, Write};
use std::net::SocketAddr;

use parking_lot::Mutex;
use tracing::warn;

/// One recorded control event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    ClientMethod {
        name: String,
        protocol: String,
        addr: SocketAddr,
    },
    ClientMethodError {
        name: String,
        msg: String,
    },
    ClientMethodsDone,
    ServerMethod {
        name: String,
        addr: SocketAddr,
    },
    ServerMethodError {
        name: String,
        msg: String,
    },
    ServerMethodsDone,
}

impl ControlEvent {
    /// Render the event as a single control line.
    pub fn to_line(&self) -> String {
        match self {
            ControlEvent::ClientMethod {
                name,
                protocol,
                addr,
            } => format!("CMETHOD {name} {protocol} {addr}"),
            ControlEvent::ClientMethodError { name, msg } => {
                format!("CMETHOD-ERROR {name} {}", single_line(msg))
            }
            ControlEvent::ClientMethodsDone => "CMETHODS DONE".to_string(),
            ControlEvent::ServerMethod { name, addr } => format!("SMETHOD {name} {addr}"),
            ControlEvent::ServerMethodError { name, msg } => {
                format!("SMETHOD-ERROR {name} {}", single_line(msg))
            }
            ControlEvent::ServerMethodsDone => "SMETHODS DONE".to_string(),
        }
    }
}

fn single_line(msg: &str) -> String {
    msg.replace(['\r', '\n'], " ")
}

/// Sink for listener registration events.
///
/// Implementors only provide [`Control::emit`]; the reporting methods used
/// by the registrars are expressed in terms of it.
pub trait Control: Send + Sync {
    /// Deliver one event.
    fn emit(&self, event: ControlEvent);

    /// A client-role listener is ready at `addr`, speaking `protocol`.
    fn client_method(&self, name: &str, protocol: &str, addr: SocketAddr) {
        self.emit(ControlEvent::ClientMethod {
            name: name.to_string(),
            protocol: protocol.to_string(),
            addr,
        });
    }

    /// A client-role transport could not be launched.
    fn client_method_error(&self, name: &str, msg: &str) {
        self.emit(ControlEvent::ClientMethodError {
            name: name.to_string(),
            msg: msg.to_string(),
        });
    }

    /// All client-role transports were processed.
    fn client_methods_done(&self) {
        self.emit(ControlEvent::ClientMethodsDone);
    }

    /// A server-role listener is ready at `addr`.
    fn server_method(&self, name: &str, addr: SocketAddr) {
        self.emit(ControlEvent::ServerMethod {
            name: name.to_string(),
            addr,
        });
    }

    /// A server-role transport could not be launched.
    fn server_method_error(&self, name: &str, msg: &str) {
        self.emit(ControlEvent::ServerMethodError {
            name: name.to_string(),
            msg: msg.to_string(),
        });
    }

    /// All server-role transports were processed.
    fn server_methods_done(&self) {
        self.emit(ControlEvent::ServerMethodsDone);
    }
}

/// Writes control lines to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutControl;

impl Control for StdoutControl {
    fn emit(&self, event: ControlEvent) {
        let mut out = io::stdout().lock();
        if let Err(e) = writeln!(out, "{}", event.to_line()).and_then(|_| out.flush()) {
            warn!(error = %e, "failed to write control line");
        }
    }
}

/// Records control events in memory.
#[derive(Debug, Default)]
pub struct MemoryControl {
    events: Mutex<Vec<ControlEvent>>,
}

impl MemoryControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<ControlEvent> {
        self.events.lock().clone()
    }
}

impl Control for MemoryControl {
    fn emit(&self, event: ControlEvent) {
        self.events.lock().push(event);
    }
}
