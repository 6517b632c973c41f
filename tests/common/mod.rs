//! In-memory stand-ins for the rig used by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncWrite, DuplexStream};

use barbot_lib::serial::link::{LinkConfig, LinkConnector, LinkIo};
use barbot_lib::serial::SerialError;

/// Lines the driver put on the wire, with the time each one was written.
#[derive(Clone, Default)]
pub struct WireLog {
    lines: Arc<Mutex<Vec<(Instant, String)>>>,
}

impl WireLog {
    fn record(&self, line: String) {
        self.lines.lock().unwrap().push((Instant::now(), line));
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().iter().map(|(_, l)| l.clone()).collect()
    }

    pub fn timestamps(&self) -> Vec<Instant> {
        self.lines.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

/// Write half that records complete lines, optionally failing after a
/// number of lines to simulate a pulled cable.
pub struct RecordingWriter {
    log: WireLog,
    pending: Vec<u8>,
    written: usize,
    fail_after: Option<usize>,
}

impl RecordingWriter {
    pub fn new(log: WireLog) -> Self {
        Self { log, pending: Vec::new(), written: 0, fail_after: None }
    }

    pub fn failing_after(log: WireLog, lines: usize) -> Self {
        Self { fail_after: Some(lines), ..Self::new(log) }
    }
}

impl AsyncWrite for RecordingWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.fail_after.map_or(false, |limit| this.written >= limit) {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "cable pulled")));
        }
        this.pending.extend_from_slice(buf);
        while let Some(pos) = this.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = this.pending.drain(..=pos).collect();
            this.log.record(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
            this.written += 1;
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Write half of a device that stopped reading.
pub struct StalledWriter;

impl AsyncWrite for StalledWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Pending
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Hands out prepared connections in order; fails once they run out.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    sessions: Arc<Mutex<VecDeque<LinkIo>>>,
    attempts: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn push(&self, io: LinkIo) {
        self.sessions.lock().unwrap().push_back(io);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkConnector for ScriptedConnector {
    async fn connect(&self) -> barbot_lib::serial::Result<LinkIo> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.sessions.lock().unwrap().pop_front();
        next.ok_or_else(|| SerialError::ConnectionFailed("no device attached".into()))
    }

    fn describe(&self) -> String {
        "scripted test rig".to_string()
    }
}

/// A healthy connection. Keep the returned device end alive: dropping it
/// looks like the rig hanging up.
pub fn session(log: &WireLog) -> (LinkIo, DuplexStream) {
    let (device, host) = tokio::io::duplex(1024);
    (LinkIo::new(host, RecordingWriter::new(log.clone())), device)
}

pub fn failing_session(log: &WireLog, fail_after: usize) -> (LinkIo, DuplexStream) {
    let (device, host) = tokio::io::duplex(1024);
    (LinkIo::new(host, RecordingWriter::failing_after(log.clone(), fail_after)), device)
}

pub fn stalled_session() -> (LinkIo, DuplexStream) {
    let (device, host) = tokio::io::duplex(1024);
    (LinkIo::new(host, StalledWriter), device)
}

pub fn fast_config() -> LinkConfig {
    LinkConfig {
        command_delay: Duration::from_millis(10),
        write_timeout: Duration::from_millis(200),
        read_idle_timeout: Duration::from_secs(5),
        reconnect_initial: Duration::from_millis(30),
        reconnect_max: Duration::from_millis(60),
        max_reconnect_attempts: None,
        queue_capacity: 1,
        line_capacity: 64,
    }
}
