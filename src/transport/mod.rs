//! Transport layer for the radio link.
//!
//! The RN2483 is driven over a line based text protocol. [`Transport`]
//! abstracts the byte stream so the driver can run over a serial port or an
//! in-memory pipe.

pub mod serial;

use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::protocol::{LineDecoder, encode_line};

/// Trait for line oriented transport implementations.
pub trait Transport: Send {
    /// Sends a single line; the terminator is appended.
    fn send_line<'a>(
        &'a mut self,
        line: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Receives the next non-empty line, without its terminator.
    fn recv_line(&mut self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;

    /// Returns true if connected.
    fn is_connected(&self) -> bool;
}

/// Line transport over any async byte stream.
pub struct StreamTransport<S> {
    stream: S,
    decoder: LineDecoder,
    connected: bool,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: LineDecoder::new(),
            connected: true,
        }
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn send_line<'a>(
        &'a mut self,
        line: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if !self.connected {
                return Err(Error::NotConnected);
            }

            tracing::trace!("> {}", line);
            let frame = encode_line(line);
            self.stream.write_all(&frame).await.map_err(Error::Io)?;
            self.stream.flush().await.map_err(Error::Io)?;
            Ok(())
        })
    }

    fn recv_line(&mut self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async move {
            let mut buf = [0u8; 256];

            loop {
                if let Some(line) = self.decoder.decode()? {
                    tracing::trace!("< {}", line);
                    return Ok(line);
                }

                if !self.connected {
                    return Err(Error::NotConnected);
                }

                let n = match self.stream.read(&mut buf).await {
                    Ok(0) => {
                        tracing::debug!("radio stream closed");
                        self.connected = false;
                        return Err(Error::Io(io::Error::new(
                            io::ErrorKind::ConnectionReset,
                            "radio stream closed",
                        )));
                    }
                    Ok(n) => n,
                    Err(e) => {
                        tracing::error!("radio read error: {}", e);
                        self.connected = false;
                        return Err(Error::Io(e));
                    }
                };

                self.decoder.feed(&buf[..n]);
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

pub use serial::{SerialConfig, list_ports, open_serial};
