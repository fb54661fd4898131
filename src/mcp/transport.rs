//! Byte channels carrying line-delimited records
//!
//! A transport moves whole records: `send` writes one encoded record,
//! `receive` returns the next line with its terminator stripped.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
    WriteHalf,
};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, trace, warn};

use crate::error::TransportError;

#[async_trait]
pub trait Transport: Send {
    /// Write one already-terminated record and flush it
    async fn send(&mut self, record: &[u8]) -> Result<(), TransportError>;

    /// Read one record, without its terminator
    async fn receive(&mut self) -> Result<String, TransportError>;

    /// Release the channel
    async fn close(&mut self) -> Result<(), TransportError>;
}

async fn read_record<R>(reader: &mut R) -> Result<String, TransportError>
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(TransportError::Closed);
        }

        let trimmed_len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed_len);
        if line.trim().is_empty() {
            continue;
        }

        trace!(record = %line, "Received record");
        return Ok(line);
    }
}

/// Transport over any duplex byte stream (TCP, in-memory pipes)
pub struct StreamTransport<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite,
{
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }
}

impl StreamTransport<TcpStream> {
    /// Open a TCP connection to a running server
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        debug!(peer = ?stream.peer_addr().ok(), "Connected to MCP server");
        Ok(Self::new(stream))
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send,
{
    async fn send(&mut self, record: &[u8]) -> Result<(), TransportError> {
        self.writer.write_all(record).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<String, TransportError> {
        read_record(&mut self.reader).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Transport that spawns the server as a child process and talks to it over
/// its stdin/stdout. The child is killed on close and on drop.
pub struct StdioTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    command: String,
}

impl StdioTransport {
    pub fn spawn<I, A>(program: &str, args: I) -> Result<Self, TransportError>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| TransportError::Spawn(format!("{}: {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("failed to capture stdout".to_string()))?;

        debug!(command = %program, pid = ?child.id(), "Spawned MCP server process");

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            command: program.to_string(),
        })
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&mut self, record: &[u8]) -> Result<(), TransportError> {
        let stdin = self.stdin.as_mut().ok_or(TransportError::Closed)?;
        stdin.write_all(record).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<String, TransportError> {
        read_record(&mut self.stdout).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // Closing stdin lets a well-behaved server see EOF and exit.
        drop(self.stdin.take());

        let exited =
            tokio::time::timeout(std::time::Duration::from_millis(500), self.child.wait()).await;
        match exited {
            Ok(status) => {
                let status = status?;
                debug!(command = %self.command, ?status, "MCP server process exited");
            }
            Err(_) => {
                warn!(command = %self.command, "MCP server did not exit, killing it");
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}
