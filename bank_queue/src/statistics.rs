//! Statistics collection
//!
//! [`StatisticsCollector`] sees every dispatched event and keeps
//! [`RunStatistics`]: one [`CustomerRecord`] per arrival, running sums over
//! served customers, busy time per teller and the time-weighted queue length.
//! [`RunStatistics::finalize`] turns those into [`DerivedMetrics`] over an
//! observation window.
//!
//! Only customers whose service has ended count as served. Someone still
//! queued or at a teller when the run stops contributes nothing to the sums
//! or to teller busy time.

use des::{Agent, Response};
use serde::{Deserialize, Serialize};

use crate::{Event, Stats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: usize,
    pub arrival_time: f64,
    pub service_start_time: Option<f64>,
    pub departure_time: Option<f64>,
    pub teller_id: Option<usize>,
}

impl CustomerRecord {
    pub fn new(customer_id: usize, arrival_time: f64) -> Self {
        CustomerRecord {
            customer_id,
            arrival_time,
            service_start_time: None,
            departure_time: None,
            teller_id: None,
        }
    }

    pub fn wait_time(&self) -> Option<f64> {
        self.service_start_time.map(|start| start - self.arrival_time)
    }

    pub fn service_time(&self) -> Option<f64> {
        Some(self.departure_time? - self.service_start_time?)
    }

    pub fn system_time(&self) -> Option<f64> {
        self.departure_time.map(|end| end - self.arrival_time)
    }

    pub fn is_served(&self) -> bool {
        self.departure_time.is_some()
    }
}

/// Running totals for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    pub customers: Vec<CustomerRecord>,
    pub served_count: usize,
    pub wait_sum: f64,
    pub system_sum: f64,
    pub service_sum: f64,
    pub max_wait: Option<f64>,
    pub teller_busy: Vec<f64>,
    /// Integral of queue length over time up to `queue_changed_at`.
    pub queue_area: f64,
    pub queue_length: usize,
    pub queue_changed_at: f64,
    pub last_event_t: f64,
}

/// Averages and ratios derived from [`RunStatistics`].
///
/// Per-customer averages are `None` when nobody was served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub served_count: usize,
    pub average_wait_minutes: Option<f64>,
    pub average_system_time_minutes: Option<f64>,
    pub average_service_minutes: Option<f64>,
    pub max_wait_minutes: Option<f64>,
    pub average_queue_length: f64,
    pub utilization: Vec<f64>,
}

impl RunStatistics {
    pub fn new(teller_count: usize) -> Self {
        RunStatistics {
            customers: Vec::new(),
            served_count: 0,
            wait_sum: 0.0,
            system_sum: 0.0,
            service_sum: 0.0,
            max_wait: None,
            teller_busy: vec![0.0; teller_count],
            queue_area: 0.0,
            queue_length: 0,
            queue_changed_at: 0.0,
            last_event_t: 0.0,
        }
    }

    /// Customers that arrived but were not served.
    pub fn in_flight(&self) -> usize {
        self.customers.len() - self.served_count
    }

    fn set_queue_length(&mut self, t: f64, queue_length: usize) {
        self.queue_area += self.queue_length as f64 * (t - self.queue_changed_at);
        self.queue_changed_at = t;
        self.queue_length = queue_length;
    }

    fn record_arrival(&mut self, t: f64, customer_id: usize) {
        debug_assert_eq!(self.customers.len(), customer_id);
        self.customers.push(CustomerRecord::new(customer_id, t));
        self.set_queue_length(t, self.queue_length + 1);
    }

    fn record_service_start(&mut self, t: f64, customer_id: usize, teller_id: usize) {
        if let Some(record) = self.customers.get_mut(customer_id) {
            record.service_start_time = Some(t);
            record.teller_id = Some(teller_id);
        }
        self.set_queue_length(t, self.queue_length.saturating_sub(1));
    }

    fn record_service_end(&mut self, t: f64, customer_id: usize, teller_id: usize) {
        let Some(record) = self.customers.get_mut(customer_id) else {
            return;
        };
        record.departure_time = Some(t);
        let (Some(wait), Some(service), Some(system)) =
            (record.wait_time(), record.service_time(), record.system_time())
        else {
            return;
        };

        self.served_count += 1;
        self.wait_sum += wait;
        self.service_sum += service;
        self.system_sum += system;
        self.max_wait = Some(self.max_wait.map_or(wait, |max| max.max(wait)));
        if let Some(busy) = self.teller_busy.get_mut(teller_id) {
            *busy += service;
        }
    }

    /// Derive averages over an observation window of `window` minutes.
    ///
    /// The queue-length integral is closed at `window`; with a zero window
    /// the time averages are reported as zero.
    pub fn finalize(&self, window: f64) -> DerivedMetrics {
        let served = self.served_count;
        let per_customer = |sum: f64| (served > 0).then(|| sum / served as f64);

        let (average_queue_length, utilization) = if window > 0.0 {
            let tail = (window - self.queue_changed_at).max(0.0);
            let area = self.queue_area + self.queue_length as f64 * tail;
            let utilization = self
                .teller_busy
                .iter()
                .map(|busy| (busy / window).clamp(0.0, 1.0))
                .collect();
            (area / window, utilization)
        } else {
            (0.0, vec![0.0; self.teller_busy.len()])
        };

        DerivedMetrics {
            served_count: served,
            average_wait_minutes: per_customer(self.wait_sum),
            average_system_time_minutes: per_customer(self.system_sum),
            average_service_minutes: per_customer(self.service_sum),
            max_wait_minutes: self.max_wait,
            average_queue_length,
            utilization,
        }
    }
}

/// Observes every event and keeps [`RunStatistics`] current.
pub struct StatisticsCollector {
    stats: RunStatistics,
}

impl StatisticsCollector {
    pub fn new(teller_count: usize) -> Self {
        StatisticsCollector {
            stats: RunStatistics::new(teller_count),
        }
    }

    pub fn run_statistics(&self) -> &RunStatistics {
        &self.stats
    }
}

impl Agent<Event, Stats> for StatisticsCollector {
    fn act(&mut self, current_t: f64, data: &Event) -> Response<Event, Stats> {
        self.stats.last_event_t = current_t;
        match *data {
            Event::Arrival { customer_id } => self.stats.record_arrival(current_t, customer_id),
            Event::ServiceStart {
                customer_id,
                teller_id,
            } => self
                .stats
                .record_service_start(current_t, customer_id, teller_id),
            Event::ServiceEnd {
                customer_id,
                teller_id,
            } => self
                .stats
                .record_service_end(current_t, customer_id, teller_id),
        }
        Response::new()
    }

    fn stats(&self) -> Stats {
        Stats::Collector(self.stats.clone())
    }
}
