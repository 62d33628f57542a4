//! Length-delimited TCP transport.
//!
//! Each HTLC stream is a dedicated TCP connection carrying bincode frames
//! behind a big-endian `u32` length prefix. Events flow from the node,
//! resolutions flow back on the same socket through a single writer task.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use socket2::{SockRef, TcpKeepalive};
use tokio::{
    net::{TcpSocket, TcpStream, lookup_host, tcp::OwnedWriteHalf},
    sync::mpsc,
};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use super::{
    HtlcStream,
    PluginChannel,
    PluginTransport,
    ResolutionSink,
    TransportError,
    WireMessage,
};
use crate::{
    config::{DEFAULT_MAX_FRAME_LENGTH, InterceptorConfig, KeepaliveConfig},
    model::{HtlcEvent, Resolution},
};

/// Resolutions queued per stream before handlers wait on the writer.
const SINK_CAPACITY: usize = 64;

/// Dials the plugin over TCP.
#[derive(Clone, Debug)]
pub struct TcpTransport {
    address: String,
    keepalive: KeepaliveConfig,
    max_frame_length: usize,
}

impl TcpTransport {
    /// Transport for `address` with default keepalive and frame limit.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            keepalive: KeepaliveConfig::default(),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    /// Build a transport from the plugin address, keepalive and frame limit in
    /// `config`.
    #[must_use]
    pub fn from_config(config: &InterceptorConfig) -> Self {
        Self {
            address: config.plugin_address().to_owned(),
            keepalive: config.keepalive_config(),
            max_frame_length: config.max_frame_len(),
        }
    }

    /// Override the socket keepalive settings.
    #[must_use]
    pub fn keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Override the largest frame accepted in either direction.
    #[must_use]
    pub fn max_frame_length(mut self, len: usize) -> Self {
        self.max_frame_length = len;
        self
    }
}

#[async_trait]
impl PluginTransport for TcpTransport {
    async fn dial(&self) -> Result<Box<dyn PluginChannel>, TransportError> {
        let addrs: Vec<SocketAddr> = lookup_host(self.address.as_str())
            .await
            .map_err(|source| TransportError::Resolve {
                address: self.address.clone(),
                source,
            })?
            .collect();
        if addrs.is_empty() {
            return Err(TransportError::NoAddress(self.address.clone()));
        }
        debug!("plugin address resolved: address={}, candidates={addrs:?}", self.address);
        Ok(Box::new(TcpChannel {
            addrs,
            keepalive: self.keepalive,
            max_frame_length: self.max_frame_length,
        }))
    }
}

struct TcpChannel {
    addrs: Vec<SocketAddr>,
    keepalive: KeepaliveConfig,
    max_frame_length: usize,
}

impl TcpChannel {
    fn codec(&self) -> LengthDelimitedCodec {
        LengthDelimitedCodec::builder()
            .max_frame_length(self.max_frame_length)
            .new_codec()
    }

    async fn connect(&self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in &self.addrs {
            match connect_with_keepalive(*addr, self.keepalive).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("connect attempt failed: addr={addr}, error={e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable)))
    }
}

#[async_trait]
impl PluginChannel for TcpChannel {
    async fn open_htlc_stream(&self) -> Result<HtlcStream, TransportError> {
        let stream = self.connect().await?;
        let (read_half, write_half) = stream.into_split();
        let (sink, rx) = ResolutionSink::channel(SINK_CAPACITY);
        tokio::spawn(write_resolutions(
            FramedWrite::new(write_half, self.codec()),
            rx,
        ));
        let events = FramedRead::new(read_half, self.codec())
            .map(|frame| {
                let frame = frame?;
                HtlcEvent::from_frame(&frame)
            })
            .boxed();
        Ok(HtlcStream::new(events, sink))
    }
}

async fn connect_with_keepalive(addr: SocketAddr, cfg: KeepaliveConfig) -> io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    let keepalive = TcpKeepalive::new()
        .with_time(cfg.time)
        .with_interval(cfg.interval);
    SockRef::from(&socket).set_tcp_keepalive(&keepalive)?;
    socket.set_nodelay(true)?;
    socket.connect(addr).await
}

/// Drain queued resolutions onto the socket until every sink is dropped or
/// the peer goes away.
async fn write_resolutions(
    mut writer: FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>,
    mut rx: mpsc::Receiver<Resolution>,
) {
    while let Some(resolution) = rx.recv().await {
        let frame = match resolution.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(
                    "dropping unencodable resolution: correlation_id={}, error={e}",
                    resolution.correlation_id
                );
                continue;
            }
        };
        if let Err(e) = writer.send(frame).await {
            warn!("resolution writer stopped: error={e}");
            break;
        }
    }
    if let Err(e) = SinkExt::<Bytes>::close(&mut writer).await {
        debug!("resolution writer close failed: error={e}");
    }
}
