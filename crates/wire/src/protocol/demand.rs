//! Demand driven streaming between a producer and its consumer.
//!
//! Each edge of a pipeline carries two directions of signals:
//!
//! - consumer to producer, through [`Subscription`]: `request(n)` grants the
//!   producer `n` more units, `cancel()` stops it for good
//! - producer to consumer, through [`Subscriber`]: `on_next` delivers one unit
//!   against previously granted demand, `on_error` / `on_close` terminate the edge
//!
//! A producer keeps the granted amount in a [`Demand`] ledger and never delivers a
//! unit without consuming one from it. Stages in this crate are plain state
//! machines owned by one connection context, so all of this is synchronous: a
//! stage without demand is simply not called again until someone requests more.

/// Outstanding demand granted by a consumer.
///
/// The count saturates instead of overflowing, so `request(u64::MAX)` works as an
/// unbounded grant, and it never goes below zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Demand {
    outstanding: u64,
}

impl Demand {
    pub const fn new() -> Self {
        Self { outstanding: 0 }
    }

    /// Grants `n` more units. `request(0)` is a no-op.
    #[inline]
    pub fn request(&mut self, n: u64) {
        self.outstanding = self.outstanding.saturating_add(n);
    }

    #[inline]
    pub fn outstanding(&self) -> u64 {
        self.outstanding
    }

    #[inline]
    pub fn has_demand(&self) -> bool {
        self.outstanding > 0
    }

    /// Takes one unit of demand if any is outstanding.
    #[inline]
    pub fn try_consume(&mut self) -> bool {
        if self.outstanding == 0 {
            return false;
        }
        self.outstanding -= 1;
        true
    }

    /// Takes one unit of demand for a delivery that is about to happen.
    ///
    /// Delivering without demand is a bug in the producer, not a runtime condition,
    /// so it is asserted on in debug builds only.
    #[inline]
    pub fn consume(&mut self) {
        debug_assert!(self.outstanding > 0, "unit delivered without outstanding demand");
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    #[inline]
    pub fn reset(&mut self) {
        self.outstanding = 0;
    }
}

/// Consumer to producer signals.
pub trait Subscription {
    /// Allows the producer to deliver up to `n` more units.
    fn request(&mut self, n: u64);

    /// Stops the producer permanently and releases what it holds for the
    /// in-flight unit. Must be idempotent; a cancelled producer never calls its
    /// subscriber again.
    fn cancel(&mut self);
}

/// Producer to consumer signals.
pub trait Subscriber<T> {
    type Error;

    /// Receives one unit. Only called while the subscriber has outstanding demand.
    fn on_next(&mut self, item: T);

    /// The producer failed; no further signal follows.
    fn on_error(&mut self, error: Self::Error);

    /// The producer finished; no further signal follows.
    fn on_close(&mut self);
}

/// Signals sent from a consumer to a producer living on another task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DemandSignal {
    Request(u64),
    Cancel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accumulates() {
        let mut demand = Demand::new();
        demand.request(2);
        demand.request(3);
        assert_eq!(demand.outstanding(), 5);
    }

    #[test]
    fn request_zero_grants_nothing() {
        let mut demand = Demand::new();
        demand.request(0);
        assert!(!demand.has_demand());
        assert!(!demand.try_consume());
    }

    #[test]
    fn at_most_n_units_per_request() {
        let mut demand = Demand::new();
        demand.request(3);

        let mut delivered = 0;
        while demand.try_consume() {
            delivered += 1;
        }

        assert_eq!(delivered, 3);
        assert_eq!(demand.outstanding(), 0);
    }

    #[test]
    fn request_saturates() {
        let mut demand = Demand::new();
        demand.request(u64::MAX);
        demand.request(1);
        assert_eq!(demand.outstanding(), u64::MAX);
    }

    #[test]
    #[should_panic(expected = "without outstanding demand")]
    #[cfg(debug_assertions)]
    fn consume_without_demand_is_a_bug() {
        let mut demand = Demand::new();
        demand.consume();
    }
}
