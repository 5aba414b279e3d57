//! Inter-process communication between stint and stintctl
//!
//! We use Unix domain sockets for local IPC - they're fast, secure,
//! and perfect for this use case. Every message is a single line of JSON,
//! one request and one response per connection.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

pub mod format;

/// A completed start-to-pause timing segment. Times are milliseconds since
/// the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    pub id: u64,
    pub start_time: i64,
    pub end_time: i64,
    pub duration: i64,
    #[serde(default)]
    pub comment: String,
}

impl Interval {
    pub fn new(id: u64, start_time: i64, end_time: i64) -> Self {
        Self {
            id,
            start_time,
            end_time,
            duration: end_time - start_time,
            comment: String::new(),
        }
    }

    /// `end_time >= start_time` and the stored duration matches the bounds.
    pub fn is_consistent(&self) -> bool {
        self.end_time >= self.start_time && self.duration == self.end_time - self.start_time
    }
}

/// Commands that stintctl can send to stint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Start,
    Pause,
    Toggle,
    Reset,
    Status,
    ListIntervals,
    DeleteInterval { id: u64 },
    Comment { id: u64, text: String },
    EditInterval { id: u64, start_time: i64, end_time: i64 },
}

/// Responses from stint back to stintctl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Started,
    Paused(Interval),
    /// The command was valid but the timer was already in the requested state.
    Unchanged,
    Status(TimerStatus),
    Intervals(Vec<Interval>),
    Interval(Interval),
    NotFound(u64),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub state: TimerState,
    pub total_ms: i64,
    pub current_ms: i64,
    pub current_start_time: Option<i64>,
    pub intervals: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerState {
    Idle,
    Running,
}

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection refused - is stint running?")]
    ConnectionRefused,

    #[error("Connection closed before a message was received")]
    ConnectionClosed,
}

pub const SOCKET_PATH: &str = "/tmp/stint.sock";

/// Writes `msg` as one line of JSON.
pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut buf = serde_json::to_vec(msg)?;
    buf.push(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one line of JSON.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T, IpcError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(IpcError::ConnectionClosed);
    }
    Ok(serde_json::from_str(&line)?)
}

pub async fn send_command(cmd: Command) -> Result<Response, IpcError> {
    send_command_to(Path::new(SOCKET_PATH), cmd).await
}

pub async fn send_command_to(path: &Path, cmd: Command) -> Result<Response, IpcError> {
    let stream = UnixStream::connect(path).await.map_err(|e| match e.kind() {
        ErrorKind::ConnectionRefused | ErrorKind::NotFound => IpcError::ConnectionRefused,
        _ => IpcError::Io(e),
    })?;
    let (reader, mut writer) = stream.into_split();

    write_message(&mut writer, &cmd).await?;

    let mut reader = BufReader::new(reader);
    read_message(&mut reader).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn interval_serializes_with_snapshot_field_names() {
        let mut interval = Interval::new(7, 1_000, 6_000);
        interval.comment = "standup".to_string();

        let value = serde_json::to_value(&interval).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "id": 7,
                "startTime": 1000,
                "endTime": 6000,
                "duration": 5000,
                "comment": "standup",
            })
        );
    }

    #[test]
    fn missing_comment_defaults_to_empty() {
        let interval: Interval =
            serde_json::from_str(r#"{"id":1,"startTime":0,"endTime":10,"duration":10}"#).unwrap();
        assert_eq!(interval.comment, "");
        assert!(interval.is_consistent());
    }

    #[test]
    fn inconsistent_intervals_are_detected() {
        let mut interval = Interval::new(1, 100, 50);
        assert!(!interval.is_consistent());

        interval = Interval::new(1, 0, 100);
        interval.duration = 99;
        assert!(!interval.is_consistent());
    }

    #[tokio::test]
    async fn messages_are_framed_one_per_line() {
        let (client, server) = tokio::io::duplex(1024);
        let (_, mut client_writer) = tokio::io::split(client);
        let (server_reader, _) = tokio::io::split(server);

        write_message(&mut client_writer, &Command::Comment { id: 3, text: "a\nb".to_string() })
            .await
            .unwrap();
        write_message(&mut client_writer, &Command::Status).await.unwrap();
        drop(client_writer);

        let mut reader = BufReader::new(server_reader);
        let first: Command = read_message(&mut reader).await.unwrap();
        let second: Command = read_message(&mut reader).await.unwrap();
        assert_eq!(first, Command::Comment { id: 3, text: "a\nb".to_string() });
        assert_eq!(second, Command::Status);

        let closed = read_message::<_, Command>(&mut reader).await;
        assert!(matches!(closed, Err(IpcError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn missing_socket_reports_connection_refused() {
        let result = send_command_to(Path::new("/nonexistent/stint-test.sock"), Command::Status).await;
        assert!(matches!(result, Err(IpcError::ConnectionRefused)));
    }
}
