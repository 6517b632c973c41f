//! Inbound side of the hardware link.
//!
//! The rig reports status and acknowledgements as free-form ASCII lines at
//! any time. They are logged and fanned out to subscribers; nothing is
//! correlated with outbound commands.
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::time::timeout;

use super::driver::shutdown_signalled;
use super::types::{BoxedReader, LinkMetrics};

/// Read lines until the connection fails or shutdown is signalled. On failure
/// the reason is reported through `failed_tx` so the supervisor can degrade
/// the link.
pub(crate) async fn read_lines(
    reader: BoxedReader,
    idle_timeout: Duration,
    lines_tx: broadcast::Sender<String>,
    metrics_tx: Arc<watch::Sender<LinkMetrics>>,
    mut shutdown_rx: watch::Receiver<bool>,
    failed_tx: oneshot::Sender<String>,
) {
    let mut reader = BufReader::new(reader);
    // Bytes of a partially received line survive an idle timeout here.
    let mut buf = Vec::with_capacity(128);

    let reason = loop {
        let read = tokio::select! {
            _ = shutdown_signalled(&mut shutdown_rx) => return,
            read = timeout(idle_timeout, reader.read_until(b'\n', &mut buf)) => read,
        };

        match read {
            Err(_) => {
                log::debug!("No traffic from device for {:?}", idle_timeout);
            }
            Ok(Ok(0)) => {
                if !buf.is_empty() {
                    publish_line(&buf, &lines_tx, &metrics_tx);
                }
                break "device closed the connection".to_string();
            }
            Ok(Ok(_)) => {
                publish_line(&buf, &lines_tx, &metrics_tx);
                buf.clear();
            }
            Ok(Err(e)) => break format!("read failed: {}", e),
        }
    };

    log::error!("Hardware link reader stopped: {}", reason);
    metrics_tx.send_modify(|m| m.read_failures += 1);
    let _ = failed_tx.send(reason);
}

fn publish_line(
    raw: &[u8],
    lines_tx: &broadcast::Sender<String>,
    metrics_tx: &watch::Sender<LinkMetrics>,
) {
    let decoded = String::from_utf8_lossy(raw);
    let line = decoded.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return;
    }

    log::info!("< {}", line);
    metrics_tx.send_modify(|m| m.lines_read += 1);
    // No subscribers is the common case.
    let _ = lines_tx.send(line.to_string());
}
