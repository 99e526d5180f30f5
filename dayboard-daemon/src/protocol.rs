use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use dayboard_core::{BoardDate, DailyStatus, StatusChange, TaskId};

use crate::error::{io_err, DaemonError};
use crate::listener::{parse_record, StreamRecord};
use crate::paths::socket_path;

/// JSON newline-delimited request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed: Option<bool>,
}

impl DaemonRequest {
    pub fn new(cmd: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
            ..Self::default()
        }
    }

    pub fn for_date(cmd: &str, date: &BoardDate) -> Self {
        Self {
            date: Some(date.to_string()),
            ..Self::new(cmd)
        }
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Send one JSON request to the daemon socket and return one response.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let (stream, socket) = connect(home)?;
    let mut reader = write_request(stream, request, &socket)?;

    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }

    let response: DaemonResponse = serde_json::from_str(line.trim_end())?;
    Ok(response)
}

pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let request = DaemonRequest::new("status");

    let mut last_not_running: Option<DaemonError> = None;
    for attempt in 0..5 {
        match send_request(home, &request) {
            Ok(response) => return response_into_data(response),
            Err(err @ DaemonError::DaemonNotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        DaemonError::Protocol("daemon status retry loop exited unexpectedly".to_string())
    }))
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    let response = send_request(home, &DaemonRequest::new("stop"))?;
    response_into_data(response).map(|_| ())
}

/// Persist one status change through the daemon so live listeners see it.
pub fn request_set(
    home: &Path,
    date: &BoardDate,
    change: &StatusChange,
) -> Result<DailyStatus, DaemonError> {
    let request = DaemonRequest {
        task_id: Some(change.task_id.0),
        completed: Some(change.completed),
        reviewed: Some(change.reviewed),
        ..DaemonRequest::for_date("set", date)
    };
    let data = response_into_data(send_request(home, &request)?)?;
    Ok(serde_json::from_value(data)?)
}

/// Open a live stream for `date`. The first record is always `Connected`.
pub fn open_stream(home: &Path, date: &BoardDate) -> Result<EventStream, DaemonError> {
    let (stream, socket) = connect(home)?;
    let reader = write_request(stream, &DaemonRequest::for_date("stream", date), &socket)?;
    Ok(EventStream { reader })
}

/// Blocking reader over the records of an open stream.
///
/// Yields `None` once the daemon closes the connection.
pub struct EventStream {
    reader: BufReader<UnixStream>,
}

impl EventStream {
    pub fn next_record(&mut self) -> Result<Option<StreamRecord>, DaemonError> {
        let mut block = String::new();
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .map_err(|e| io_err("daemon stream read", e))?;
            if read == 0 {
                return Ok(None);
            }
            if line.trim_end_matches(['\r', '\n']).is_empty() {
                if block.is_empty() {
                    continue;
                }
                if let Some(record) = parse_record(&block)? {
                    return Ok(Some(record));
                }
                block.clear();
                continue;
            }
            block.push_str(&line);
        }
    }
}

impl Iterator for EventStream {
    type Item = Result<StreamRecord, DaemonError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

fn connect(home: &Path) -> Result<(UnixStream, std::path::PathBuf), DaemonError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    let stream = UnixStream::connect(&socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::DaemonNotRunning {
                socket: socket.clone(),
            }
        } else {
            io_err(&socket, err)
        }
    })?;
    Ok((stream, socket))
}

fn write_request(
    mut stream: UnixStream,
    request: &DaemonRequest,
    socket: &Path,
) -> Result<BufReader<UnixStream>, DaemonError> {
    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(socket, e))?;
    stream.flush().map_err(|e| io_err(socket, e))?;
    Ok(BufReader::new(stream))
}

fn response_into_data(response: DaemonResponse) -> Result<Value, DaemonError> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(DaemonError::Protocol(
            response
                .error
                .unwrap_or_else(|| "unknown daemon error".to_string()),
        ))
    }
}

/// Task id of a request, treating a missing or zero id as absent.
pub(crate) fn requested_task_id(request: &DaemonRequest) -> Option<TaskId> {
    request.task_id.filter(|id| *id != 0).map(TaskId)
}
