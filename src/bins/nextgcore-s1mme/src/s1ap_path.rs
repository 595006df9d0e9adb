//! S1AP Path - Server for eNB Associations
//!
//! eNB associations are carried over TCP with each S1AP PDU framed by a
//! 4-byte big-endian length. Socket tasks only frame bytes; every event is
//! pushed into one channel and the event loop owns the context store, so a
//! unit is fully dispatched before the next one is taken.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::context::{AssociationId, S1apContext};
use crate::error::MmeError;
use crate::s1ap_dispatch::S1apDispatcher;

// ============================================================================
// Constants
// ============================================================================

/// Maximum S1AP message size
pub const MAX_S1AP_MSG_SIZE: usize = 65535;

/// Frame length prefix size
pub const FRAME_HEADER_LEN: usize = 4;

/// Pause after a failed accept that is not tied to one connection
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

// ============================================================================
// Transport
// ============================================================================

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Unknown association: {0}")]
    UnknownAssociation(AssociationId),
    #[error("Association {0} is closed")]
    Closed(AssociationId),
    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound half of the transport seen by the dispatcher
pub trait S1apTransport {
    /// Queue a PDU on an association, returning the number of bytes accepted
    fn send(&mut self, association_id: AssociationId, data: Bytes) -> Result<usize, TransportError>;
}

/// Transport events consumed by the event loop
#[derive(Debug)]
pub enum S1apEvent {
    /// eNB connected
    NewAssociation {
        association_id: AssociationId,
        remote_addr: SocketAddr,
        writer: mpsc::UnboundedSender<Bytes>,
    },
    /// One framed PDU received
    Data { association_id: AssociationId, data: Bytes },
    /// eNB disconnected or framing lost
    AssociationClosed { association_id: AssociationId, reason: String },
    /// Stop the event loop
    Shutdown,
}

/// Open associations and their writer queues
#[derive(Debug, Default)]
pub struct AssociationTable {
    associations: HashMap<AssociationId, (SocketAddr, mpsc::UnboundedSender<Bytes>)>,
}

impl AssociationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        association_id: AssociationId,
        remote_addr: SocketAddr,
        writer: mpsc::UnboundedSender<Bytes>,
    ) {
        self.associations.insert(association_id, (remote_addr, writer));
    }

    /// Drop an association; its writer task ends once the queue drains
    pub fn remove(&mut self, association_id: AssociationId) -> Option<SocketAddr> {
        self.associations.remove(&association_id).map(|(addr, _)| addr)
    }

    pub fn remote_addr(&self, association_id: AssociationId) -> Option<SocketAddr> {
        self.associations.get(&association_id).map(|(addr, _)| *addr)
    }

    pub fn len(&self) -> usize {
        self.associations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }
}

impl S1apTransport for AssociationTable {
    fn send(&mut self, association_id: AssociationId, data: Bytes) -> Result<usize, TransportError> {
        if data.len() > MAX_S1AP_MSG_SIZE {
            return Err(TransportError::MessageTooLarge(data.len()));
        }
        let (_, writer) = self
            .associations
            .get(&association_id)
            .ok_or(TransportError::UnknownAssociation(association_id))?;
        let len = data.len();
        writer.send(data).map_err(|_| TransportError::Closed(association_id))?;
        Ok(len)
    }
}

// ============================================================================
// Framing
// ============================================================================

/// Read one length-prefixed PDU; `None` on a clean close between frames
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Bytes>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_S1AP_MSG_SIZE {
        return Err(TransportError::MessageTooLarge(len));
    }

    let mut buf = BytesMut::zeroed(len);
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf.freeze()))
}

/// Write one length-prefixed PDU
pub async fn write_frame<W>(writer: &mut W, data: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if data.len() > MAX_S1AP_MSG_SIZE {
        return Err(TransportError::MessageTooLarge(data.len()));
    }
    writer.write_u32(data.len() as u32).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

// ============================================================================
// Server
// ============================================================================

/// S1AP server accepting eNB associations
pub struct S1apServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    next_association_id: AssociationId,
    events: mpsc::UnboundedSender<S1apEvent>,
}

impl S1apServer {
    /// Bind the listener
    pub async fn bind(
        addr: SocketAddr,
        events: mpsc::UnboundedSender<S1apEvent>,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        log::info!("S1AP server listening on {}", local_addr);
        Ok(Self { listener, local_addr, next_association_id: 1, events })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept associations until the event channel closes
    ///
    /// Accept errors are logged and the loop keeps listening.
    pub async fn run(mut self) -> Result<(), TransportError> {
        loop {
            let (stream, remote_addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::warn!("S1AP accept failed on {}: {}", self.local_addr, e);
                    if let Some(delay) = accept_retry_delay(&e) {
                        tokio::time::sleep(delay).await;
                    }
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                log::warn!("Failed to set TCP_NODELAY for {}: {}", remote_addr, e);
            }

            let association_id = self.next_association_id;
            self.next_association_id += 1;

            let (reader, writer) = stream.into_split();
            let (writer_tx, writer_rx) = mpsc::unbounded_channel();

            let event = S1apEvent::NewAssociation { association_id, remote_addr, writer: writer_tx };
            if self.events.send(event).is_err() {
                log::debug!("Event loop gone, S1AP server stops accepting");
                return Ok(());
            }

            tokio::spawn(write_frames(association_id, writer, writer_rx));
            tokio::spawn(read_frames(association_id, reader, self.events.clone()));
        }
    }
}

/// Backoff before the next accept; failures of a single peer retry at once
fn accept_retry_delay(e: &std::io::Error) -> Option<Duration> {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::Interrupted => None,
        _ => Some(ACCEPT_RETRY_DELAY),
    }
}

async fn read_frames(
    association_id: AssociationId,
    mut reader: OwnedReadHalf,
    events: mpsc::UnboundedSender<S1apEvent>,
) {
    let reason = loop {
        match read_frame(&mut reader).await {
            Ok(Some(data)) => {
                if events.send(S1apEvent::Data { association_id, data }).is_err() {
                    return;
                }
            }
            Ok(None) => break "closed by peer".to_string(),
            Err(e) => break e.to_string(),
        }
    };
    let _ = events.send(S1apEvent::AssociationClosed { association_id, reason });
}

async fn write_frames(
    association_id: AssociationId,
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(data) = queue.recv().await {
        if let Err(e) = write_frame(&mut writer, &data).await {
            log::warn!("Write to association {} failed: {}", association_id, e);
            break;
        }
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Process transport events until `Shutdown`, then release every context
pub async fn run_event_loop(
    ctx: &mut S1apContext,
    dispatcher: &mut S1apDispatcher,
    events: &mut mpsc::UnboundedReceiver<S1apEvent>,
) {
    let mut associations = AssociationTable::new();

    while let Some(event) = events.recv().await {
        match event {
            S1apEvent::NewAssociation { association_id, remote_addr, writer } => {
                log::info!("eNB connected from {} (association {})", remote_addr, association_id);
                associations.insert(association_id, remote_addr, writer);
            }
            S1apEvent::Data { association_id, data } => {
                match dispatcher.handle_rx_pdu(ctx, association_id, &data, &mut associations) {
                    Ok(out) => log::trace!("{:?}", out),
                    Err(e) => log::warn!("Association {}: {}", association_id, e),
                }
            }
            S1apEvent::AssociationClosed { association_id, reason } => {
                let addr = associations.remove(association_id);
                log::info!(
                    "eNB disconnected (association {}, {:?}): {}",
                    association_id,
                    addr,
                    reason
                );
                match ctx.remove_enb(association_id) {
                    Ok(_) => {}
                    Err(MmeError::UnknownAssociation(_)) => {
                        log::debug!("No eNB registered on association {}", association_id)
                    }
                    Err(e) => log::warn!("Association {} teardown: {}", association_id, e),
                }
            }
            S1apEvent::Shutdown => {
                log::info!("S1AP event loop stopping");
                break;
            }
        }
    }

    ctx.clear();
}
