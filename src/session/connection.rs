//! Per-connection command session

use crate::command::{Dispatcher, Outcome};
use anyhow::Result;
use armctl_shared::{
    codec::{self, FrameDecoder},
    Ack, ErrorKind, RawCommand,
};
use bytes::Bytes;
use embedded_hal::digital::OutputPin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

/// Counters reported when a session ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Commands answered with an acknowledgment
    pub acknowledged: u64,
    /// Frames whose payload could not be decoded
    pub malformed: u64,
}

/// One command session over a byte stream
///
/// Reads length-prefixed frames, dispatches each decoded command and writes
/// exactly one acknowledgment per command. A frame with an undecodable
/// payload is logged and skipped without an acknowledgment; the session keeps
/// going. Framing and I/O errors end the session.
pub struct CommandSession<S, P> {
    stream: S,
    peer: String,
    dispatcher: Arc<Dispatcher<P>>,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
    stats: SessionStats,
}

impl<S, P> CommandSession<S, P>
where
    S: AsyncRead + AsyncWrite + Unpin,
    P: OutputPin + Send + 'static,
{
    pub fn new(stream: S, peer: impl Into<String>, dispatcher: Arc<Dispatcher<P>>) -> Self {
        Self {
            stream,
            peer: peer.into(),
            dispatcher,
            decoder: FrameDecoder::new(),
            read_buf: vec![0u8; 4096],
            stats: SessionStats::default(),
        }
    }

    /// Serve the peer until it closes the connection
    pub async fn run(mut self) -> Result<SessionStats> {
        loop {
            // Drain every complete frame before reading again
            while let Some(frame) = self.decoder.next_frame()? {
                self.handle_frame(frame).await?;
            }

            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                let pending = self.decoder.buffer_len();
                if pending > 0 {
                    warn!(
                        "[SESSION] {} closed mid-frame, discarding {} bytes",
                        self.peer, pending
                    );
                }
                info!("[SESSION] {} closed the connection", self.peer);
                return Ok(self.stats);
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }

    async fn handle_frame(&mut self, frame: Bytes) -> Result<()> {
        let message = match RawCommand::decode(&frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("[SESSION] {} sent a malformed message: {}", self.peer, e);
                self.stats.malformed += 1;
                return Ok(());
            }
        };

        let ack = self.respond(&message).await;
        let encoded = codec::encode(&ack)?;
        self.stream.write_all(&encoded).await?;
        self.stats.acknowledged += 1;
        Ok(())
    }

    async fn respond(&self, message: &RawCommand) -> Ack {
        let max_angle = self.dispatcher.settings().max_angle_deg;
        let command = match message.validate(max_angle) {
            Ok(command) => command,
            Err(e) => {
                warn!("[SESSION] {} rejected command: {}", self.peer, e);
                return Ack::error(ErrorKind::InvalidCommand, e.to_string());
            }
        };

        debug!("[SESSION] {} -> {:?}", self.peer, command);

        match self.dispatcher.execute(&command).await {
            Ok(Outcome::Completed) => {
                info!("[SESSION] {} {} completed", self.peer, command.action());
                Ack::ok()
            }
            Ok(Outcome::Status(reports)) => Ack::status(reports),
            Err(e) => {
                error!("[SESSION] {} {} failed: {}", self.peer, command.action(), e);
                Ack::error(e.kind(), e.to_string())
            }
        }
    }
}
