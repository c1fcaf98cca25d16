//! Tokio event loop for one connection.
//!
//! Inbound packets, owner commands and timer fires are all handled on the
//! driver task, which gives the timing core the serialized execution context
//! it assumes. Nothing fires after the driver has shut down.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::core::{ConnectionDelegate, SocketConfig};

use super::error::{TransportError, TransportResult};
use super::header::PacketHeader;
use super::scheduler::TimerQueue;
use super::timers::ConnTimers;

#[cfg(feature = "simulation")]
use super::simulator::PacketDropper;

/// Capacity of the event channel between handles and the driver.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Closure run against the delegate on the driver task.
pub type DelegateTask<D> = Box<dyn FnOnce(&mut D, Instant) + Send>;

/// Events delivered to a [`ConnectionDriver`].
pub enum ConnectionEvent<D> {
    /// A packet arrived.
    Packet(PacketHeader),
    /// Data traffic went out.
    SentPacket,
    /// The handshake completed.
    ConnectionOpened,
    /// Reliable data was added to the send buffer.
    DataRegistered,
    /// Run a closure against the delegate.
    Exec(DelegateTask<D>),
    /// Stop the driver and hand back the delegate.
    Shutdown,
}

impl<D> std::fmt::Debug for ConnectionEvent<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionEvent::Packet(header) => f.debug_tuple("Packet").field(header).finish(),
            ConnectionEvent::SentPacket => f.write_str("SentPacket"),
            ConnectionEvent::ConnectionOpened => f.write_str("ConnectionOpened"),
            ConnectionEvent::DataRegistered => f.write_str("DataRegistered"),
            ConnectionEvent::Exec(_) => f.write_str("Exec"),
            ConnectionEvent::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Sends events to a running [`ConnectionDriver`].
pub struct ConnectionHandle<D> {
    tx: mpsc::Sender<ConnectionEvent<D>>,
}

impl<D> ConnectionHandle<D> {
    /// Deliver an event. Fails once the driver has stopped.
    pub async fn send(&self, event: ConnectionEvent<D>) -> TransportResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// A packet arrived.
    pub async fn got_packet(&self, header: PacketHeader) -> TransportResult<()> {
        self.send(ConnectionEvent::Packet(header)).await
    }

    /// Data traffic went out.
    pub async fn sent_packet(&self) -> TransportResult<()> {
        self.send(ConnectionEvent::SentPacket).await
    }

    /// The handshake completed.
    pub async fn connection_opened(&self) -> TransportResult<()> {
        self.send(ConnectionEvent::ConnectionOpened).await
    }

    /// Reliable data was added to the send buffer.
    pub async fn data_registered(&self) -> TransportResult<()> {
        self.send(ConnectionEvent::DataRegistered).await
    }

    /// Run `task` against the delegate on the driver task.
    pub async fn exec<F>(&self, task: F) -> TransportResult<()>
    where
        F: FnOnce(&mut D, Instant) + Send + 'static,
    {
        self.send(ConnectionEvent::Exec(Box::new(task))).await
    }

    /// Stop the driver.
    pub async fn shutdown(&self) -> TransportResult<()> {
        self.send(ConnectionEvent::Shutdown).await
    }

    /// Whether the driver has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<D> Clone for ConnectionHandle<D> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<D> std::fmt::Debug for ConnectionHandle<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// What woke the driver loop.
enum Wake<D> {
    Event(Option<ConnectionEvent<D>>),
    Timer,
}

/// Runs one connection's timers on a tokio task.
///
/// # Example
///
/// ```ignore
/// let (driver, handle) = ConnectionDriver::new(config, delegate)?;
/// let task = tokio::spawn(driver.run());
///
/// handle.connection_opened().await?;
/// handle.got_packet(PacketHeader::new(1)).await?;
///
/// handle.shutdown().await?;
/// let delegate = task.await??;
/// ```
pub struct ConnectionDriver<D> {
    timers: ConnTimers<TimerQueue>,
    delegate: D,
    events: mpsc::Receiver<ConnectionEvent<D>>,
    #[cfg(feature = "simulation")]
    dropper: Option<PacketDropper>,
}

impl<D: ConnectionDelegate> ConnectionDriver<D> {
    /// Create a driver and the handle that feeds it.
    ///
    /// Must be called within a tokio runtime; the timers start on the
    /// runtime clock.
    pub fn new(
        config: Arc<SocketConfig>,
        delegate: D,
    ) -> TransportResult<(Self, ConnectionHandle<D>)> {
        let (tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        #[cfg(feature = "simulation")]
        let dropper = (config.fabricated_packet_drop_rate > 0.0)
            .then(|| PacketDropper::from_config(&config));

        let timers = ConnTimers::new(config, TimerQueue::new(), now())?;
        let driver = Self {
            timers,
            delegate,
            events,
            #[cfg(feature = "simulation")]
            dropper,
        };
        Ok((driver, ConnectionHandle { tx }))
    }

    /// Drive the connection until shutdown, then return the delegate.
    ///
    /// Dropping every handle counts as shutdown. A fatal transport error
    /// stops the loop and cancels the timers.
    pub async fn run(mut self) -> TransportResult<D> {
        let result = self.event_loop().await;
        self.timers.deschedule();
        result.map(|()| self.delegate)
    }

    async fn event_loop(&mut self) -> TransportResult<()> {
        loop {
            let deadline = self.timers.next_deadline();
            let wake = tokio::select! {
                event = self.events.recv() => Wake::Event(event),
                _ = sleep_until(deadline) => Wake::Timer,
            };

            let now = now();
            match wake {
                Wake::Event(None) | Wake::Event(Some(ConnectionEvent::Shutdown)) => {
                    tracing::debug!("connection driver shutting down");
                    return Ok(());
                }
                Wake::Event(Some(event)) => self.handle(event, now)?,
                Wake::Timer => {
                    self.timers.advance(now, &mut self.delegate)?;
                }
            }
        }
    }

    fn handle(&mut self, event: ConnectionEvent<D>, now: Instant) -> TransportResult<()> {
        match event {
            ConnectionEvent::Packet(header) => {
                #[cfg(feature = "simulation")]
                if let Some(dropper) = self.dropper.as_mut() {
                    if dropper.should_drop() {
                        tracing::trace!(seq = header.sequence_number, "fabricated drop");
                        return Ok(());
                    }
                }
                self.timers.got_packet(&header, now, &mut self.delegate)
            }
            ConnectionEvent::SentPacket => {
                self.timers.sent_packet();
                Ok(())
            }
            ConnectionEvent::ConnectionOpened => self.timers.connection_opened(now),
            ConnectionEvent::DataRegistered => {
                self.timers.update_rto_timeout(now, &mut self.delegate)?;
                self.timers.ensure_tick_timeout(now)
            }
            ConnectionEvent::Exec(task) => {
                task(&mut self.delegate, now);
                Ok(())
            }
            ConnectionEvent::Shutdown => Ok(()),
        }
    }
}

impl<D> std::fmt::Debug for ConnectionDriver<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDriver")
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}
