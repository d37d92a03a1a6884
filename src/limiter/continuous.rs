//! Blocking continuous-rate limiter with FIFO-fair queueing.
//!
//! Grants "tickets" no faster than one per configured interval. Capacity
//! accrues while the limiter sits idle, so up to `saved_tickets` grants may
//! be issued back-to-back after a quiet period; once contended, callers are
//! served strictly in the order they began waiting.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                        ContinuousLimiter                             │
//!   │                                                                      │
//!   │   production_interval: Duration     saved_tickets: usize             │
//!   │                                                                      │
//!   │   Mutex<MintState>                                                   │
//!   │   ┌────────────────────────────────────────────────────────────┐     │
//!   │   │ mint_history: HistoryRing<Option<Instant>>  (N = saved)    │     │
//!   │   │ queue_arrival: u64   next arrival number to hand out       │     │
//!   │   │ queue_service: u64   next arrival number to be served      │     │
//!   │   └────────────────────────────────────────────────────────────┘     │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   acquire()
//!        │
//!        ▼
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │ queue_arrival != queue_service?  → threads already waiting:          │
//!   │                                     join the back of the queue       │
//!   │ interval elapsed since head?     → mint now, grant immediately       │
//!   │ saved_tickets > 1 and enough     → mint now, grant immediately       │
//!   │   whole intervals since at(-1)?                                      │
//!   │ otherwise                        → enqueue and wait                  │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   wait loop (lock released while sleeping):
//!     sleep ≈ remaining-time-to-slot + position × interval × 0.95
//!     recheck: my turn AND interval elapsed → advance queue_service, grant
//! ```
//!
//! ## Ordering
//!
//! Grants occur in strictly non-decreasing arrival-number order. A caller
//! takes a fast path only when nobody is queued, so program order among
//! contending callers maps to grant order.
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//!
//! use ratekit::limiter::ContinuousLimiter;
//!
//! let limiter = ContinuousLimiter::with_interval(Duration::from_millis(5))?;
//!
//! for _ in 0..3 {
//!     let ticket = limiter.acquire()?;
//!     // The protected section runs here. The ticket was consumed at grant
//!     // time; dropping it releases nothing.
//!     drop(ticket);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Thread Safety
//!
//! `ContinuousLimiter` is `Send + Sync`; share it behind an `Arc` and call
//! [`acquire`](ContinuousLimiter::acquire) from any number of threads. The
//! internal mutex is never held across a sleep, so it serializes only the
//! bookkeeping, not the waiting.
//!
//! ## Limitations
//!
//! - A caller that begins acquiring blocks until granted; there is no
//!   cancellation or timeout path.
//! - The queue is unbounded; backpressure is the caller's concern.

use std::marker::PhantomData;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::ds::HistoryRing;
use crate::error::{ConfigError, InvariantError};

/// Fraction of the projected remaining wait actually slept per iteration.
///
/// Waking slightly early and re-checking under the lock absorbs timer and
/// scheduler imprecision; the final grant decision is always made against
/// the mint history, never against the sleep itself.
const WAKE_FRACTION: f64 = 0.95;

// ---------------------------------------------------------------------------
// MintState — everything guarded by the limiter's mutex
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct MintState {
    /// Timestamps of the last `saved_tickets` grants, most recent at the
    /// head. `None` slots predate the first grant and compare as
    /// "infinitely long ago" in every elapsed-time check.
    mint_history: HistoryRing<Option<Instant>>,
    /// Next arrival number to hand out to a waiting caller.
    queue_arrival: u64,
    /// Next arrival number eligible to be served.
    queue_service: u64,
}

impl MintState {
    /// Mints a ticket if the production interval has fully elapsed since the
    /// most recent grant. Must be called with the limiter's lock held.
    fn try_trivial_mint(&mut self, interval: Duration) -> Option<Instant> {
        let now = Instant::now();
        let due = match *self.mint_history.head() {
            Some(last) => now.saturating_duration_since(last) > interval,
            None => true,
        };
        if due {
            self.mint_history.append(Some(now));
            Some(now)
        } else {
            None
        }
    }

    /// Mints a ticket if enough whole intervals have elapsed since the
    /// oldest remembered grant to cover the full burst capacity. Must be
    /// called with the limiter's lock held.
    ///
    /// The comparison is deliberately against the oldest history slot, not a
    /// running accrued-ticket counter; see `DESIGN.md` for the recorded
    /// decision to preserve this accrual policy as-is.
    fn try_burst_mint(&mut self, interval: Duration, saved_tickets: usize) -> Option<Instant> {
        let now = Instant::now();
        let accrued_units = match *self.mint_history.at(-1) {
            Some(oldest) => {
                now.saturating_duration_since(oldest).as_nanos() / interval.as_nanos()
            },
            None => u128::MAX,
        };
        if accrued_units > saved_tickets as u128 {
            self.mint_history.append(Some(now));
            Some(now)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// ContinuousLimiter
// ---------------------------------------------------------------------------

/// Blocking admission-control primitive: at most one grant per interval,
/// with idle-accrued burst capacity and FIFO-fair waiting.
///
/// Constructed once and shared; all state lives behind one per-instance
/// mutex. See the [module docs](self) for the grant algorithm.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use std::time::Duration;
///
/// use ratekit::limiter::ContinuousLimiter;
///
/// let limiter = Arc::new(ContinuousLimiter::with_interval(Duration::from_millis(2))?);
///
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let limiter = Arc::clone(&limiter);
///         thread::spawn(move || {
///             let _ticket = limiter.acquire().unwrap();
///             // rate-limited work
///         })
///     })
///     .collect();
///
/// for handle in handles {
///     handle.join().unwrap();
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct ContinuousLimiter {
    production_interval: Duration,
    saved_tickets: usize,
    state: Mutex<MintState>,
}

impl ContinuousLimiter {
    /// Creates a limiter granting at most one ticket per
    /// `production_interval`, with up to `saved_tickets` grants of burst
    /// capacity accrued while idle.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `production_interval` is zero or
    /// `saved_tickets` is zero.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use ratekit::limiter::ContinuousLimiter;
    ///
    /// let limiter = ContinuousLimiter::new(Duration::from_millis(100), 4)?;
    /// assert_eq!(limiter.saved_tickets(), 4);
    /// # Ok::<(), ratekit::error::ConfigError>(())
    /// ```
    pub fn new(production_interval: Duration, saved_tickets: usize) -> Result<Self, ConfigError> {
        if production_interval.is_zero() {
            return Err(ConfigError::new("production_interval must be positive"));
        }
        if saved_tickets < 1 {
            return Err(ConfigError::new("saved_tickets must be at least 1"));
        }
        Ok(Self {
            production_interval,
            saved_tickets,
            state: Mutex::new(MintState {
                mint_history: HistoryRing::new(saved_tickets, None),
                queue_arrival: 0,
                queue_service: 0,
            }),
        })
    }

    /// Creates a limiter with no burst capacity (`saved_tickets = 1`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `production_interval` is zero.
    pub fn with_interval(production_interval: Duration) -> Result<Self, ConfigError> {
        Self::new(production_interval, 1)
    }

    /// Returns the minimum spacing between grants.
    pub fn production_interval(&self) -> Duration {
        self.production_interval
    }

    /// Returns the configured burst capacity.
    pub fn saved_tickets(&self) -> usize {
        self.saved_tickets
    }

    /// Returns the number of callers currently enqueued and not yet served.
    pub fn queue_len(&self) -> usize {
        let state = self.state.lock();
        (state.queue_arrival - state.queue_service) as usize
    }

    /// Blocks the calling thread until a ticket is granted.
    ///
    /// Decides among three outcomes under the internal lock: an immediate
    /// grant when the interval has elapsed since the last one, a burst grant
    /// when enough capacity accrued while idle, or enqueue-and-wait behind
    /// any caller already queued. Waiting callers sleep with the lock
    /// released and are served strictly in arrival order.
    ///
    /// The returned [`Ticket`] is consumed at grant time: dropping it —
    /// normally or during a panic in the protected section — releases
    /// nothing and never re-enters the blocking logic.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantError`] if the queue-ordering invariant is
    /// observed broken (the service counter overtook this caller's arrival
    /// number). This is an internal-consistency failure; it is surfaced
    /// rather than swallowed because continuing would risk out-of-order
    /// grants. Contention and timing jitter are retried internally and are
    /// never errors.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::{Duration, Instant};
    ///
    /// use ratekit::limiter::ContinuousLimiter;
    ///
    /// let limiter = ContinuousLimiter::with_interval(Duration::from_millis(10))?;
    ///
    /// let first = limiter.acquire()?;
    /// let second = limiter.acquire()?; // blocks ~10ms
    /// assert!(second.minted_at() - first.minted_at() > Duration::from_millis(10));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn acquire(&self) -> Result<Ticket<'_>, InvariantError> {
        {
            let mut state = self.state.lock();
            // Fast paths apply only when nobody is already waiting;
            // otherwise this caller belongs at the back of the queue.
            if state.queue_arrival == state.queue_service {
                if let Some(minted_at) = state.try_trivial_mint(self.production_interval) {
                    return Ok(Ticket::new(minted_at));
                }
                if self.saved_tickets > 1 {
                    if let Some(minted_at) =
                        state.try_burst_mint(self.production_interval, self.saved_tickets)
                    {
                        return Ok(Ticket::new(minted_at));
                    }
                }
            }
        }
        self.wait_in_queue()
    }

    /// Enqueues the caller and loops sleep → recheck until it is served.
    ///
    /// The loop is iterative rather than recursive: queue depth is unbounded
    /// and each retry would otherwise add a stack frame.
    fn wait_in_queue(&self) -> Result<Ticket<'_>, InvariantError> {
        let my_ticket = {
            let mut state = self.state.lock();
            let arrival = state.queue_arrival;
            state.queue_arrival += 1;
            arrival
        };

        loop {
            let (time_to_next, position_in_queue) = {
                let state = self.state.lock();
                let now = Instant::now();
                // None = the next slot is already due (either the interval
                // fully elapsed, or no grant has been recorded yet).
                let time_to_next = (*state.mint_history.head()).and_then(|last| {
                    self.production_interval
                        .checked_sub(now.saturating_duration_since(last))
                });
                let position_in_queue = match my_ticket.checked_sub(state.queue_service) {
                    Some(position) => position,
                    None => {
                        return Err(InvariantError::new(format!(
                            "queue ordering violated: service counter {} overtook arrival {}",
                            state.queue_service, my_ticket
                        )));
                    },
                };
                (time_to_next, position_in_queue)
            };

            // Skip the sleep entirely when this caller is next in line and
            // the slot is already due; any other combination waits out the
            // remaining slot time plus most of the queue ahead of it.
            if !(time_to_next.is_none() && position_in_queue == 0) {
                let queue_backoff = self
                    .production_interval
                    .mul_f64(position_in_queue as f64 * WAKE_FRACTION);
                thread::sleep(time_to_next.unwrap_or(Duration::ZERO) + queue_backoff);
            }

            {
                let mut state = self.state.lock();
                if my_ticket == state.queue_service {
                    if let Some(minted_at) = state.try_trivial_mint(self.production_interval) {
                        state.queue_service += 1;
                        return Ok(Ticket::new(minted_at));
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

/// Authorization for one admission, returned by
/// [`ContinuousLimiter::acquire`].
///
/// The ticket is consumed when it is granted: the grant time is already
/// recorded in the limiter's mint history, so dropping the guard — at the
/// end of the protected section or mid-panic — performs no bookkeeping and
/// cannot wedge or re-enter the limiter.
#[must_use = "acquiring blocks for rate-limit capacity; drop the ticket when the protected work is done"]
#[derive(Debug)]
pub struct Ticket<'a> {
    minted_at: Instant,
    _limiter: PhantomData<&'a ContinuousLimiter>,
}

impl Ticket<'_> {
    fn new(minted_at: Instant) -> Self {
        Self {
            minted_at,
            _limiter: PhantomData,
        }
    }

    /// Returns the instant this ticket was minted into the limiter's
    /// history. Consecutive tickets from one limiter are spaced by more
    /// than its production interval, except within a burst.
    pub fn minted_at(&self) -> Instant {
        self.minted_at
    }
}
