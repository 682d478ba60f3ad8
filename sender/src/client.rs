//! Client side of the command link

use anyhow::{anyhow, bail, Result};
use armctl_shared::{
    codec::{self, FrameDecoder},
    Ack, Command, Direction, PatternName, Target,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Configuration for the sender
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Controller address
    pub target: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// How long to wait for an acknowledgment (long rotations are slow)
    pub ack_timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            target: format!("127.0.0.1:{}", armctl_shared::protocol::DEFAULT_PORT),
            connect_timeout: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(600),
        }
    }
}

/// Persistent connection to a motor controller
pub struct SignalSender {
    stream: TcpStream,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
    ack_timeout: Duration,
}

impl SignalSender {
    /// Connect to the controller named in `config`
    pub async fn connect(config: &SenderConfig) -> Result<Self> {
        let stream = timeout(config.connect_timeout, TcpStream::connect(&config.target))
            .await
            .map_err(|_| anyhow!("Connection to {} timed out", config.target))??;

        Ok(Self {
            stream,
            decoder: FrameDecoder::new(),
            read_buf: vec![0u8; 1024],
            ack_timeout: config.ack_timeout,
        })
    }

    /// Send one command and wait for its acknowledgment
    pub async fn send(&mut self, command: Command) -> Result<Ack> {
        let frame = codec::encode(&command.to_message())?;
        self.stream.write_all(&frame).await?;
        debug!("Sent {:?}", command);

        let ack_timeout = self.ack_timeout;
        timeout(ack_timeout, self.recv_ack())
            .await
            .map_err(|_| anyhow!("No acknowledgment for {} within {:?}", command.action(), ack_timeout))?
    }

    async fn recv_ack(&mut self) -> Result<Ack> {
        loop {
            if let Some(ack) = self.decoder.decode_next::<Ack>()? {
                return Ok(ack);
            }

            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                bail!("Controller closed the connection");
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }

    pub async fn rotate(&mut self, target: Target, angle: f64, direction: Direction) -> Result<Ack> {
        self.send(Command::Rotate {
            target,
            angle,
            direction,
            mirror: false,
        })
        .await
    }

    pub async fn enable(&mut self, target: Target) -> Result<Ack> {
        self.send(Command::Enable { target }).await
    }

    pub async fn disable(&mut self, target: Target) -> Result<Ack> {
        self.send(Command::Disable { target }).await
    }

    pub async fn run_pattern(&mut self, name: PatternName) -> Result<Ack> {
        self.send(Command::Pattern { name }).await
    }

    pub async fn stop(&mut self) -> Result<Ack> {
        self.send(Command::Stop).await
    }

    pub async fn status(&mut self) -> Result<Ack> {
        self.send(Command::Status).await
    }
}
