//! Listener consumption loop: drains one [`Listener`] onto one connection.
//!
//! Framing follows server-sent events: a comment record announcing the
//! date, then one `data:` record per change event. Every record ends with a
//! blank line.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;

use dayboard_core::{BoardDate, ChangeEvent};

use crate::error::DaemonError;
use crate::fanout::Listener;

const CONNECTED_PREFIX: &str = ": connected date=";
const DATA_PREFIX: &str = "data: ";

/// Why a stream loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamExit {
    PeerClosed,
    WriteFailed,
    QueueClosed,
    Shutdown,
}

/// One decoded record of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRecord {
    Connected { date: BoardDate },
    Event(ChangeEvent),
}

pub fn connected_record(date: &BoardDate) -> String {
    format!("{CONNECTED_PREFIX}{date}\n\n")
}

pub fn event_record(event: &ChangeEvent) -> Result<String, DaemonError> {
    Ok(format!("{DATA_PREFIX}{}\n\n", serde_json::to_string(event)?))
}

/// Decode one record (the lines before a blank line).
///
/// Returns `Ok(None)` for comments other than the connect announcement.
pub fn parse_record(block: &str) -> Result<Option<StreamRecord>, DaemonError> {
    let mut data = Vec::new();
    for line in block.lines() {
        if let Some(date) = line.strip_prefix(CONNECTED_PREFIX) {
            let date: BoardDate = date.trim().parse()?;
            return Ok(Some(StreamRecord::Connected { date }));
        }
        if let Some(payload) = line.strip_prefix("data:") {
            data.push(payload.strip_prefix(' ').unwrap_or(payload));
        }
    }
    if data.is_empty() {
        return Ok(None);
    }
    let event: ChangeEvent = serde_json::from_str(&data.join("\n"))?;
    Ok(Some(StreamRecord::Event(event)))
}

/// Forward events from `listener` to `writer` until the connection ends.
///
/// `reader` is the peer's half of the connection; it is only watched for EOF.
/// The listener is closed on every exit path.
pub async fn stream_events<R, W>(
    mut listener: Listener,
    date: BoardDate,
    mut reader: R,
    mut writer: W,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<StreamExit, DaemonError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let id = listener.id();
    tracing::info!(listener = id, %date, "stream opened");

    let exit = if write_record(&mut writer, &connected_record(&date)).await {
        pump(&mut listener, &mut reader, &mut writer, &mut shutdown).await?
    } else {
        StreamExit::WriteFailed
    };

    listener.close();
    tracing::info!(listener = id, exit = ?exit, "stream closed");
    Ok(exit)
}

async fn pump<R, W>(
    listener: &mut Listener,
    reader: &mut R,
    writer: &mut W,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<StreamExit, DaemonError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut scratch = [0u8; 256];
    loop {
        tokio::select! {
            _ = shutdown.recv() => return Ok(StreamExit::Shutdown),
            read = reader.read(&mut scratch) => match read {
                Ok(0) | Err(_) => return Ok(StreamExit::PeerClosed),
                // Anything the peer sends after `stream` is ignored.
                Ok(_) => continue,
            },
            event = listener.next() => {
                let Some(event) = event else {
                    return Ok(StreamExit::QueueClosed);
                };
                let record = event_record(&event)?;
                if !write_record(writer, &record).await {
                    return Ok(StreamExit::WriteFailed);
                }
            }
        }
    }
}

async fn write_record<W: AsyncWrite + Unpin>(writer: &mut W, record: &str) -> bool {
    let written = async {
        writer.write_all(record.as_bytes()).await?;
        writer.flush().await
    }
    .await;
    match written {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(error = %err, "stream write failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::Broadcaster;
    use dayboard_core::{StatusChange, TaskId};
    use tokio::io::{duplex, AsyncBufReadExt, BufReader};

    fn date() -> BoardDate {
        "2025-01-01".parse().expect("date")
    }

    fn changes() -> Vec<StatusChange> {
        vec![StatusChange {
            task_id: TaskId(3),
            completed: true,
            reviewed: false,
        }]
    }

    #[test]
    fn records_round_trip_through_parse() {
        let connected = connected_record(&date());
        assert_eq!(connected, ": connected date=2025-01-01\n\n");
        assert_eq!(
            parse_record(connected.trim_end()).expect("parse"),
            Some(StreamRecord::Connected { date: date() })
        );

        let event = ChangeEvent {
            date: date(),
            changes: changes(),
            sequence: 42,
        };
        let record = event_record(&event).expect("encode");
        assert!(record.starts_with("data: {"));
        assert!(record.ends_with("}\n\n"));
        assert_eq!(
            parse_record(record.trim_end()).expect("parse"),
            Some(StreamRecord::Event(event))
        );
        assert_eq!(parse_record(": keep-alive").expect("parse"), None);
    }

    #[tokio::test]
    async fn connected_record_comes_first_then_events() {
        let broadcaster = Broadcaster::new(16);
        let listener = broadcaster.open_listener();
        let (server, client) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let (client_read, client_write) = tokio::io::split(client);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(stream_events(
            listener,
            date(),
            server_read,
            server_write,
            shutdown_rx,
        ));

        let mut lines = BufReader::new(client_read).lines();
        assert_eq!(
            lines.next_line().await.expect("read").as_deref(),
            Some(": connected date=2025-01-01")
        );
        assert_eq!(lines.next_line().await.expect("read").as_deref(), Some(""));

        let event = broadcaster.notify_change(date(), changes());
        let data = lines.next_line().await.expect("read").expect("line");
        assert_eq!(
            parse_record(&data).expect("parse"),
            Some(StreamRecord::Event(event))
        );

        shutdown_tx.send(()).expect("shutdown");
        assert_eq!(task.await.expect("join").expect("stream"), StreamExit::Shutdown);
        assert!(broadcaster.registry().is_empty());
        drop(client_write);
    }

    #[tokio::test]
    async fn peer_close_deregisters_the_listener() {
        let broadcaster = Broadcaster::new(16);
        let listener = broadcaster.open_listener();
        let (server, client) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(stream_events(
            listener,
            date(),
            server_read,
            server_write,
            shutdown_rx,
        ));
        drop(client);

        let exit = task.await.expect("join").expect("stream");
        assert!(matches!(exit, StreamExit::PeerClosed | StreamExit::WriteFailed));
        assert!(broadcaster.registry().is_empty());

        let report = broadcaster.publish(&ChangeEvent {
            date: date(),
            changes: vec![],
            sequence: 1,
        });
        assert_eq!(report.delivered, 0);
    }
}
