//! Connection liveness state machine.
//!
//! One timer covers two concerns: the retransmission deadline for reliable
//! data, and detection of a silent peer. It sleeps until the earliest
//! relevant deadline and is fully suspended once the connection is lost and
//! nothing is waiting for retransmission.

use std::time::{Duration, Instant};

use crate::core::{LivenessHost, SocketConfig};

use super::error::TransportResult;
use super::scheduler::{Scheduler, TimerKind};

/// Detected responsiveness of the remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessState {
    /// Handshake in progress. No warning or loss detection.
    Opening,
    /// Peer is responsive.
    Normal,
    /// Peer has been silent longer than the warning threshold.
    Warned,
    /// Peer has been silent for the full connection timeout.
    Lost,
}

/// Liveness and retransmission deadline tracking for one connection.
#[derive(Debug, Clone)]
pub struct LivenessTimer {
    state: LivenessState,
    time_before_warning: Duration,
    connection_timeout: Duration,
    initial_connection_timeout: Duration,
    created_at: Instant,
    /// When the last packet arrived (or the connection opened).
    last_packet: Instant,
    /// Pending retransmission deadline.
    rto_deadline: Option<Instant>,
    /// RTO in effect when `rto_deadline` was armed.
    rto_at_schedule: Duration,
    issued_warning: bool,
    /// The handshake timed out; the timer is finished.
    expired: bool,
}

impl LivenessTimer {
    /// Create a timer in the opening state.
    pub fn new(
        time_before_warning: Duration,
        connection_timeout: Duration,
        initial_connection_timeout: Duration,
        now: Instant,
    ) -> Self {
        Self {
            state: LivenessState::Opening,
            time_before_warning,
            connection_timeout,
            initial_connection_timeout,
            created_at: now,
            last_packet: now,
            rto_deadline: None,
            rto_at_schedule: Duration::ZERO,
            issued_warning: false,
            expired: false,
        }
    }

    /// Create a timer with the thresholds of a socket.
    pub fn from_config(config: &SocketConfig, now: Instant) -> Self {
        Self::new(
            config.time_before_connection_warning(),
            config.connection_timeout,
            config.initial_connection_timeout,
            now,
        )
    }

    /// Current liveness state.
    pub fn state(&self) -> LivenessState {
        self.state
    }

    /// Whether a connection warning is outstanding.
    pub fn issued_connection_warning(&self) -> bool {
        self.issued_warning
    }

    /// Pending retransmission deadline, if any.
    pub fn rto_deadline(&self) -> Option<Instant> {
        self.rto_deadline
    }

    /// Arm the timer for the current state. Used right after construction.
    pub fn start<S: Scheduler>(&mut self, now: Instant, scheduler: &mut S) -> TransportResult<()> {
        self.reschedule(now, scheduler)
    }

    /// Leave the opening state.
    pub fn connection_opened<S: Scheduler>(
        &mut self,
        now: Instant,
        scheduler: &mut S,
    ) -> TransportResult<()> {
        if self.state == LivenessState::Opening && !self.expired {
            tracing::debug!("connection opened");
            self.state = LivenessState::Normal;
            self.last_packet = now;
        }
        self.reschedule(now, scheduler)
    }

    /// A packet arrived: push the warning and loss deadlines forward.
    pub fn got_packet<H: LivenessHost, S: Scheduler>(
        &mut self,
        now: Instant,
        host: &mut H,
        scheduler: &mut S,
    ) -> TransportResult<()> {
        if self.expired {
            return Ok(());
        }

        self.last_packet = now;
        match self.state {
            LivenessState::Lost => {
                tracing::debug!("connection regained");
                self.state = LivenessState::Normal;
                self.issued_warning = false;
                host.connection_regained();
            }
            LivenessState::Warned => {
                tracing::debug!("connection warning cleared");
                self.state = LivenessState::Normal;
                self.issued_warning = false;
            }
            LivenessState::Opening | LivenessState::Normal => {}
        }
        self.reschedule(now, scheduler)
    }

    /// Arm the retransmission deadline if it is not armed and reliable data
    /// is outstanding. Resumes a suspended timer.
    pub fn update_rto_timeout<H: LivenessHost, S: Scheduler>(
        &mut self,
        now: Instant,
        rto: Duration,
        host: &H,
        scheduler: &mut S,
    ) -> TransportResult<()> {
        if self.expired {
            return Ok(());
        }
        if self.rto_deadline.is_none() && !host.sender_buffer_is_empty() {
            self.arm_rto(now, rto);
        }
        self.reschedule(now, scheduler)
    }

    /// Re-arm the retransmission deadline from `now` without touching the
    /// liveness countdown.
    pub fn force_reset_rto_timer<S: Scheduler>(
        &mut self,
        now: Instant,
        rto: Duration,
        scheduler: &mut S,
    ) -> TransportResult<()> {
        if self.expired {
            return Ok(());
        }
        self.arm_rto(now, rto);
        self.reschedule(now, scheduler)
    }

    /// Handle the liveness timer firing at `now`.
    pub fn fire<H: LivenessHost, S: Scheduler>(
        &mut self,
        now: Instant,
        rto: Duration,
        host: &mut H,
        scheduler: &mut S,
    ) -> TransportResult<()> {
        if self.expired {
            scheduler.deschedule(TimerKind::Liveness);
            return Ok(());
        }

        let silence = now.saturating_duration_since(self.last_packet);
        match self.state {
            LivenessState::Opening => {
                if now.saturating_duration_since(self.created_at) >= self.initial_connection_timeout
                {
                    tracing::warn!(
                        timeout_ms = self.initial_connection_timeout.as_millis() as u64,
                        "initial connection timeout"
                    );
                    self.expired = true;
                    self.rto_deadline = None;
                    scheduler.deschedule(TimerKind::Liveness);
                    host.connection_timeout();
                    return Ok(());
                }
            }
            LivenessState::Normal | LivenessState::Warned => {
                if silence >= self.connection_timeout {
                    tracing::warn!(silence_ms = silence.as_millis() as u64, "connection lost");
                    self.state = LivenessState::Lost;
                    host.connection_lost();
                } else if self.state == LivenessState::Normal && silence >= self.time_before_warning
                {
                    tracing::warn!(silence_ms = silence.as_millis() as u64, "connection warning");
                    self.state = LivenessState::Warned;
                    self.issued_warning = true;
                    host.connection_warning();
                }
            }
            LivenessState::Lost => {}
        }

        if let Some(deadline) = self.rto_deadline {
            if now >= deadline {
                self.rto_deadline = None;
                if !host.sender_buffer_is_empty() {
                    let rto_at_schedule = self.rto_at_schedule;
                    self.arm_rto(now, rto);
                    host.rto_timeout(now, rto_at_schedule);
                }
            }
        }

        self.reschedule(now, scheduler)
    }

    /// Stop the timer.
    pub fn deschedule<S: Scheduler>(&mut self, scheduler: &mut S) {
        self.rto_deadline = None;
        scheduler.deschedule(TimerKind::Liveness);
    }

    fn arm_rto(&mut self, now: Instant, rto: Duration) {
        self.rto_deadline = now.checked_add(rto);
        self.rto_at_schedule = rto;
    }

    /// Earliest instant the timer needs to wake up, if any.
    fn next_wake(&self) -> Option<Instant> {
        if self.expired {
            return None;
        }

        let liveness = match self.state {
            LivenessState::Opening => self.created_at.checked_add(self.initial_connection_timeout),
            LivenessState::Normal => self
                .last_packet
                .checked_add(self.time_before_warning.min(self.connection_timeout)),
            LivenessState::Warned => self.last_packet.checked_add(self.connection_timeout),
            LivenessState::Lost => None,
        };

        [liveness, self.rto_deadline].into_iter().flatten().min()
    }

    fn reschedule<S: Scheduler>(&mut self, now: Instant, scheduler: &mut S) -> TransportResult<()> {
        match self.next_wake() {
            Some(wake) => {
                let delay = wake.saturating_duration_since(now);
                scheduler.schedule(TimerKind::Liveness, now, delay, false, true)?;
            }
            None => scheduler.deschedule(TimerKind::Liveness),
        }
        Ok(())
    }
}
