//! Per-connection timer orchestration.
//!
//! [`ConnTimers`] is the single entry point for a connection's timing
//! behavior. It owns the RTT estimator, the loss list, the liveness timer and
//! the NAK, tick and heartbeat timers, and calls back into the owning
//! connection through [`ConnectionDelegate`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::{ConnectionDelegate, LivenessHost, SocketConfig};

use super::error::TransportResult;
use super::header::PacketHeader;
use super::liveness::{LivenessState, LivenessTimer};
use super::loss::LossList;
use super::scheduler::{Scheduler, TimerKind, TimerQueue};
use super::timing::{ConnTime, RttEstimator};

/// Exposes the liveness capability of a connection delegate.
struct DelegateHost<'a, D: ?Sized>(&'a mut D);

impl<D: ConnectionDelegate + ?Sized> LivenessHost for DelegateHost<'_, D> {
    fn sender_buffer_is_empty(&self) -> bool {
        self.0.sender_buffer_is_empty()
    }

    fn rto_timeout(&mut self, now: Instant, rto_at_schedule: Duration) {
        self.0.rto_timeout(now, rto_at_schedule);
    }

    fn connection_timeout(&mut self) {
        self.0.connection_timeout();
    }

    fn connection_lost(&mut self) {
        self.0.connection_lost();
    }

    fn connection_regained(&mut self) {
        self.0.connection_regained();
    }

    fn connection_warning(&mut self) {
        self.0.connection_warning();
    }
}

/// Timers of one connection.
///
/// Every method takes the current monotonic time from the caller. Once
/// [`deschedule`](Self::deschedule) has been called no delegate callback is
/// ever invoked again.
#[derive(Debug)]
pub struct ConnTimers<S: Scheduler = TimerQueue> {
    config: Arc<SocketConfig>,
    scheduler: S,
    time: ConnTime,
    loss_list: LossList,
    liveness: LivenessTimer,
    /// Data went out since the last heartbeat window began.
    sent_packet: bool,
    descheduled: bool,
}

impl<S: Scheduler> ConnTimers<S> {
    /// Create the timers of a connection starting at `now`.
    ///
    /// The liveness timer is armed right away so that a handshake that never
    /// completes is reported through `connection_timeout`.
    pub fn new(config: Arc<SocketConfig>, mut scheduler: S, now: Instant) -> TransportResult<Self> {
        let time = ConnTime::new(now, RttEstimator::from_config(&config));
        let loss_list = LossList::new(config.loss_list_capacity());
        let mut liveness = LivenessTimer::from_config(&config, now);
        liveness.start(now, &mut scheduler)?;

        Ok(Self {
            config,
            scheduler,
            time,
            loss_list,
            liveness,
            sent_packet: false,
            descheduled: false,
        })
    }

    /// Cancel every timer. Terminal: later calls are ignored.
    pub fn deschedule(&mut self) {
        if self.descheduled {
            return;
        }
        tracing::debug!("connection timers descheduled");
        self.descheduled = true;
        self.liveness.deschedule(&mut self.scheduler);
        self.scheduler.deschedule_all();
    }

    /// Whether [`deschedule`](Self::deschedule) has been called.
    pub fn is_descheduled(&self) -> bool {
        self.descheduled
    }

    /// Record that data traffic went out, suppressing the next heartbeat.
    pub fn sent_packet(&mut self) {
        self.sent_packet = true;
    }

    /// Process an inbound packet.
    pub fn got_packet<D: ConnectionDelegate + ?Sized>(
        &mut self,
        header: &PacketHeader,
        now: Instant,
        delegate: &mut D,
    ) -> TransportResult<()> {
        if self.descheduled {
            return Ok(());
        }

        if let Some(sample) = self.time.got_packet(header, now) {
            tracing::trace!(
                sample_ms = sample.as_millis() as u64,
                rto_ms = self.time.rto().as_millis() as u64,
                "rtt sample"
            );
        }
        self.loss_list.got_packet(now, header.sequence_number);
        self.liveness
            .got_packet(now, &mut DelegateHost(delegate), &mut self.scheduler)
    }

    /// Start a new heartbeat window: forget earlier traffic and re-arm the
    /// heartbeat timer one heartbeat interval from `now`.
    pub fn reset_heartbeat_timeout(&mut self, now: Instant) -> TransportResult<()> {
        self.sent_packet = false;
        if self.inactive() {
            return Ok(());
        }
        let interval = self.config.heartbeat_interval();
        self.scheduler
            .schedule(TimerKind::Heartbeat, now, interval, false, true)?;
        Ok(())
    }

    /// Arm the NAK timer for the current NAK interval unless it is armed.
    pub fn ensure_nak_timeout(&mut self, now: Instant) -> TransportResult<()> {
        if self.inactive() {
            return Ok(());
        }
        let interval = self.time.nak_interval();
        self.scheduler
            .schedule(TimerKind::Nak, now, interval, false, false)?;
        Ok(())
    }

    /// Arm the tick timer unless it is armed, then ensure the NAK timer.
    pub fn ensure_tick_timeout(&mut self, now: Instant) -> TransportResult<()> {
        if self.descheduled {
            return Ok(());
        }
        let interval = self.config.tick_interval();
        self.scheduler
            .schedule(TimerKind::Tick, now, interval, false, false)?;
        self.ensure_nak_timeout(now)
    }

    /// Arm the retransmission deadline after reliable data was registered.
    pub fn update_rto_timeout<D: ConnectionDelegate + ?Sized>(
        &mut self,
        now: Instant,
        delegate: &mut D,
    ) -> TransportResult<()> {
        if self.descheduled {
            return Ok(());
        }
        let rto = self.time.rto();
        self.liveness
            .update_rto_timeout(now, rto, &DelegateHost(delegate), &mut self.scheduler)
    }

    /// Restart the retransmission deadline from `now` with the current RTO.
    pub fn force_reset_rto_timer(&mut self, now: Instant) -> TransportResult<()> {
        if self.descheduled {
            return Ok(());
        }
        let rto = self.time.rto();
        self.liveness
            .force_reset_rto_timer(now, rto, &mut self.scheduler)
    }

    /// The handshake completed: leave Opening and start heartbeats and NAKs.
    pub fn connection_opened(&mut self, now: Instant) -> TransportResult<()> {
        if self.descheduled {
            return Ok(());
        }
        self.liveness.connection_opened(now, &mut self.scheduler)?;
        self.reset_heartbeat_timeout(now)?;
        self.ensure_nak_timeout(now)
    }

    /// Handle timer `kind` coming due at `now`.
    pub fn fire<D: ConnectionDelegate + ?Sized>(
        &mut self,
        kind: TimerKind,
        now: Instant,
        delegate: &mut D,
    ) -> TransportResult<()> {
        if self.descheduled {
            return Ok(());
        }

        match kind {
            TimerKind::Nak => self.nak_fired(now, delegate),
            TimerKind::Tick => self.tick_fired(now, delegate),
            TimerKind::Heartbeat => self.heartbeat_fired(now, delegate),
            TimerKind::Liveness => {
                let rto = self.time.rto();
                self.liveness
                    .fire(now, rto, &mut DelegateHost(delegate), &mut self.scheduler)
            }
        }
    }

    fn nak_fired<D: ConnectionDelegate + ?Sized>(
        &mut self,
        now: Instant,
        delegate: &mut D,
    ) -> TransportResult<()> {
        if !delegate.is_opening() {
            if let Some(seq) = self.loss_list.calculate_nak(now, self.time.rto()) {
                tracing::debug!(seq, "nak");
                delegate.enqueue_nak(seq);
                self.ensure_tick_timeout(now)?;
            }
        }

        let interval = self.time.nak_interval();
        self.scheduler
            .schedule(TimerKind::Nak, now, interval, false, true)?;
        Ok(())
    }

    fn tick_fired<D: ConnectionDelegate + ?Sized>(
        &mut self,
        now: Instant,
        delegate: &mut D,
    ) -> TransportResult<()> {
        if delegate.tick(now) {
            self.reset_heartbeat_timeout(now)?;
        }
        Ok(())
    }

    fn heartbeat_fired<D: ConnectionDelegate + ?Sized>(
        &mut self,
        now: Instant,
        delegate: &mut D,
    ) -> TransportResult<()> {
        if !self.sent_packet && !delegate.is_opening() {
            tracing::trace!("heartbeat");
            delegate.enqueue_heartbeat();
            self.ensure_tick_timeout(now)?;
        }
        self.reset_heartbeat_timeout(now)
    }

    /// Heartbeat and NAK timers stay off while opening and after teardown.
    fn inactive(&self) -> bool {
        self.descheduled || self.liveness.state() == LivenessState::Opening
    }

    /// Current liveness state.
    pub fn liveness_state(&self) -> LivenessState {
        self.liveness.state()
    }

    /// Whether a connection warning is outstanding.
    pub fn issued_connection_warning(&self) -> bool {
        self.liveness.issued_connection_warning()
    }

    /// RTT state and timestamp echo bookkeeping.
    pub fn time(&self) -> &ConnTime {
        &self.time
    }

    /// Current retransmission timeout.
    pub fn rto(&self) -> Duration {
        self.time.rto()
    }

    /// Receive-side gaps.
    pub fn loss_list(&self) -> &LossList {
        &self.loss_list
    }

    /// The timer substrate.
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// The socket configuration.
    pub fn config(&self) -> &Arc<SocketConfig> {
        &self.config
    }
}

impl ConnTimers<TimerQueue> {
    /// Create timers backed by a fresh [`TimerQueue`].
    pub fn with_queue(config: Arc<SocketConfig>, now: Instant) -> TransportResult<Self> {
        Self::new(config, TimerQueue::new(), now)
    }

    /// Fire every timer due at or before `now`, in deadline order.
    ///
    /// Returns the number of timers fired.
    pub fn advance<D: ConnectionDelegate + ?Sized>(
        &mut self,
        now: Instant,
        delegate: &mut D,
    ) -> TransportResult<usize> {
        let mut fired = 0;
        while let Some(kind) = self.scheduler.pop_expired(now) {
            self.fire(kind, now, delegate)?;
            fired += 1;
        }
        Ok(fired)
    }

    /// Earliest pending timer deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }
}
