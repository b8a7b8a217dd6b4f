//! Tellers and the shared wait queue.

use std::collections::{BTreeSet, VecDeque};

use des::{Agent, Response};
use serde::Serialize;
use tracing::debug;

use crate::error::SimError;
use crate::{Event, Stats};

/// Observable state of the teller pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TellerPoolStats {
    pub capacity: usize,
    pub busy: usize,
    pub queue_length: usize,
    pub peak_busy: usize,
    pub peak_queue_length: usize,
    pub total_arrivals: usize,
    pub total_queued: usize,
    pub total_granted: usize,
    pub total_released: usize,
}

impl TellerPoolStats {
    pub fn is_at_capacity(&self) -> bool {
        self.busy == self.capacity
    }

    pub fn has_queue(&self) -> bool {
        self.queue_length > 0
    }
}

/// `capacity` interchangeable tellers in front of one unbounded FIFO queue.
///
/// A fresh grant takes the lowest-numbered idle teller; a customer promoted
/// from the queue on release takes the teller that was just freed.
pub struct TellerPool {
    capacity: usize,
    idle: BTreeSet<usize>,
    queue: VecDeque<(usize, f64)>, // customer ID, arrival time
    stats: TellerPoolStats,
}

impl TellerPool {
    pub fn new(capacity: usize) -> Result<TellerPool, SimError> {
        if capacity < 1 {
            return Err(SimError::invalid(
                "teller_count",
                "at least one teller is required",
            ));
        }
        Ok(TellerPool::with_capacity(capacity))
    }

    pub(crate) fn with_capacity(capacity: usize) -> TellerPool {
        TellerPool {
            capacity,
            idle: (0..capacity).collect(),
            queue: VecDeque::new(),
            stats: TellerPoolStats {
                capacity,
                ..TellerPoolStats::default()
            },
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn busy(&self) -> usize {
        self.capacity - self.idle.len()
    }

    pub fn queue_length(&self) -> usize {
        self.queue.len()
    }

    /// Grant a teller if one is idle.
    pub fn try_acquire(&mut self) -> Option<usize> {
        let teller_id = self.idle.pop_first()?;
        self.stats.total_granted += 1;
        self.refresh();
        Some(teller_id)
    }

    pub fn enqueue(&mut self, customer_id: usize, arrival_t: f64) {
        self.queue.push_back((customer_id, arrival_t));
        self.stats.total_queued += 1;
        self.refresh();
    }

    /// Free `teller_id` and hand it straight to the head of the queue, if
    /// anyone is waiting. Returns `(customer_id, teller_id)` for that grant.
    ///
    /// # Panics
    ///
    /// Panics if `teller_id` is not currently busy; only a broken event
    /// sequence can do that.
    pub fn release(&mut self, teller_id: usize) -> Option<(usize, usize)> {
        assert!(
            teller_id < self.capacity && self.idle.insert(teller_id),
            "teller {} released while not serving anyone",
            teller_id
        );
        self.stats.total_released += 1;

        let granted = self.queue.pop_front().map(|(customer_id, _)| {
            self.idle.remove(&teller_id);
            self.stats.total_granted += 1;
            (customer_id, teller_id)
        });
        self.refresh();
        granted
    }

    pub fn pool_stats(&self) -> TellerPoolStats {
        self.stats.clone()
    }

    fn refresh(&mut self) {
        self.stats.busy = self.busy();
        self.stats.queue_length = self.queue.len();
        self.stats.peak_busy = self.stats.peak_busy.max(self.stats.busy);
        self.stats.peak_queue_length = self.stats.peak_queue_length.max(self.queue.len());
    }
}

impl Agent<Event, Stats> for TellerPool {
    fn act(&mut self, current_t: f64, data: &Event) -> Response<Event, Stats> {
        match data {
            Event::Arrival { customer_id } => {
                self.stats.total_arrivals += 1;
                match self.try_acquire() {
                    Some(teller_id) => Response::event(
                        current_t,
                        Event::ServiceStart {
                            customer_id: *customer_id,
                            teller_id,
                        },
                    ),
                    None => {
                        self.enqueue(*customer_id, current_t);
                        debug!(
                            t = current_t,
                            customer_id,
                            queue_length = self.queue.len(),
                            "all tellers busy, customer queued"
                        );
                        Response::new()
                    }
                }
            }
            Event::ServiceEnd { teller_id, .. } => match self.release(*teller_id) {
                Some((customer_id, teller_id)) => Response::event(
                    current_t,
                    Event::ServiceStart {
                        customer_id,
                        teller_id,
                    },
                ),
                None => Response::new(),
            },
            Event::ServiceStart { .. } => Response::new(),
        }
    }

    fn stats(&self) -> Stats {
        Stats::Tellers(self.pool_stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            TellerPool::new(0),
            Err(SimError::InvalidParameter {
                name: "teller_count",
                ..
            })
        ));
    }

    #[test]
    fn test_acquire_until_full() {
        let mut pool = TellerPool::new(2).unwrap();

        assert_eq!(pool.try_acquire(), Some(0));
        assert_eq!(pool.try_acquire(), Some(1));
        assert_eq!(pool.try_acquire(), None);
        assert_eq!(pool.busy(), 2);
    }

    #[test]
    fn test_lowest_idle_teller_granted() {
        let mut pool = TellerPool::new(3).unwrap();
        pool.try_acquire();
        pool.try_acquire();
        pool.try_acquire();

        assert_eq!(pool.release(1), None);
        assert_eq!(pool.release(0), None);
        assert_eq!(pool.try_acquire(), Some(0));
    }

    #[test]
    fn test_release_hands_teller_to_queue_head() {
        let mut pool = TellerPool::new(1).unwrap();
        pool.try_acquire();
        pool.enqueue(7, 1.0);
        pool.enqueue(8, 2.0);

        assert_eq!(pool.release(0), Some((7, 0)));
        assert_eq!(pool.busy(), 1);
        assert_eq!(pool.queue_length(), 1);

        assert_eq!(pool.release(0), Some((8, 0)));
        assert_eq!(pool.release(0), None);
        assert_eq!(pool.busy(), 0);
    }

    #[test]
    #[should_panic(expected = "released while not serving")]
    fn test_releasing_idle_teller_panics() {
        let mut pool = TellerPool::new(2).unwrap();
        pool.release(1);
    }

    #[test]
    fn test_peaks_tracked() {
        let mut pool = TellerPool::new(1).unwrap();
        pool.act(0.0, &Event::Arrival { customer_id: 0 });
        pool.act(1.0, &Event::Arrival { customer_id: 1 });
        pool.act(2.0, &Event::Arrival { customer_id: 2 });
        pool.act(3.0, &Event::ServiceEnd { customer_id: 0, teller_id: 0 });

        let stats = pool.pool_stats();
        assert_eq!(stats.peak_busy, 1);
        assert_eq!(stats.peak_queue_length, 2);
        assert_eq!(stats.queue_length, 1);
        assert_eq!(stats.total_queued, 2);
        assert_eq!(stats.total_granted, 2);
    }
}
