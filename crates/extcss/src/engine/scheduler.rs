//! Reapplication scheduling.
//!
//! Mutation bursts are coalesced into one run. A run is requested on the
//! next animation frame, or after the rest of [`THROTTLE_DELAY`] if the
//! previous run finished less than that long ago. The host owns the clock
//! and the callbacks through [`EventLoop`].
//!
//! Every request carries a [`Ticket`]. Only the ticket of the request still
//! pending can start a run; an explicit run or a cancel retires it, so a late
//! callback cannot slip a run into the throttle window.

use std::time::Duration;

/// Minimum spacing between two runs.
pub const THROTTLE_DELAY: Duration = Duration::from_millis(150);

/// Identifies one callback request. The host hands it back when the
/// callback fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// Timing primitives supplied by the host.
pub trait EventLoop {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;
    /// Ask for [`crate::ExtCss::on_animation_frame`] with `ticket` at the
    /// next paint.
    fn request_animation_frame(&mut self, ticket: Ticket);
    /// Ask for [`crate::ExtCss::on_timeout`] with `ticket` after `delay`.
    fn set_timeout(&mut self, delay: Duration, ticket: Ticket);
}

/// `Idle → Scheduled → Running → Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// Nothing pending.
    #[default]
    Idle,
    /// A callback has been requested from the host.
    Scheduled,
    /// A cycle is in progress.
    Running,
}

/// Per-engine run coalescing.
#[derive(Debug, Clone)]
pub struct Scheduler {
    state: SchedulerState,
    throttle: Duration,
    last_run: Option<Duration>,
    issued: u64,
    pending: Option<Ticket>,
}

impl Scheduler {
    /// A scheduler spacing runs at least `throttle` apart.
    #[must_use]
    pub const fn new(throttle: Duration) -> Self {
        Self {
            state: SchedulerState::Idle,
            throttle,
            last_run: None,
            issued: 0,
            pending: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Record a mutation notification. Returns `true` if a callback was
    /// requested; a pending or running cycle absorbs the notification.
    pub fn notify(&mut self, host: &mut impl EventLoop) -> bool {
        if self.state != SchedulerState::Idle {
            return false;
        }
        self.state = SchedulerState::Scheduled;
        self.issued += 1;
        let ticket = Ticket(self.issued);
        self.pending = Some(ticket);
        let since_last = self.last_run.map(|last| host.now().saturating_sub(last));
        match since_last {
            Some(elapsed) if elapsed < self.throttle => {
                host.set_timeout(self.throttle - elapsed, ticket);
            }
            _ => host.request_animation_frame(ticket),
        }
        true
    }

    /// Enter `Running` from a host callback. Returns `false` if `ticket` is
    /// not the pending request (cancelled, superseded or already run).
    pub fn begin_scheduled(&mut self, ticket: Ticket) -> bool {
        if self.state != SchedulerState::Scheduled || self.pending != Some(ticket) {
            return false;
        }
        self.state = SchedulerState::Running;
        self.pending = None;
        true
    }

    /// Enter `Running` for an explicit run. Retires any pending request.
    pub const fn begin(&mut self) {
        self.state = SchedulerState::Running;
        self.pending = None;
    }

    /// Leave `Running`.
    pub const fn finish(&mut self, now: Duration) {
        self.state = SchedulerState::Idle;
        self.last_run = Some(now);
    }

    /// Drop any pending run.
    pub const fn cancel(&mut self) {
        self.state = SchedulerState::Idle;
        self.pending = None;
    }
}
