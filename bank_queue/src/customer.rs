//! Customer lifecycle: the arrival chain and each customer's service.

use des::{Agent, Response};
use serde::Serialize;
use tracing::debug;

use crate::config::ValidConfig;
use crate::generators::RandomStreams;
use crate::{Event, Stats};

/// Where a customer is in `Arrived -> InService -> Departed`.
///
/// A customer that found a free teller passes through `Arrived` and into
/// `InService` at the same instant; one that did not stays `Arrived`
/// (waiting in the queue) until the pool grants it a teller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Arrived,
    InService,
    Departed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomerStats {
    pub arrivals: usize,
    pub waiting: usize,
    pub in_service: usize,
    pub departed: usize,
    /// Arrivals that were drawn but fell beyond the horizon.
    pub arrivals_cut_off: usize,
}

impl CustomerStats {
    /// Customers still inside the bank.
    pub fn in_flight(&self) -> usize {
        self.waiting + self.in_service
    }
}

/// Generates arrivals and schedules service completions.
///
/// Each `Arrival` schedules the next one, so the whole stream of customers
/// hangs off the first arrival returned by [`CustomerProcess::first_arrival`].
/// The chain stops as soon as a drawn arrival would land after the horizon.
pub struct CustomerProcess {
    horizon: f64,
    streams: RandomStreams,
    next_customer_id: usize,
    phases: Vec<Phase>,
    arrivals_cut_off: usize,
}

impl CustomerProcess {
    pub fn new(horizon: f64, streams: RandomStreams) -> CustomerProcess {
        CustomerProcess {
            horizon,
            streams,
            next_customer_id: 0,
            phases: Vec::new(),
            arrivals_cut_off: 0,
        }
    }

    pub fn for_config(config: &ValidConfig, seed: u64) -> CustomerProcess {
        CustomerProcess::new(
            config.horizon_minutes,
            RandomStreams::for_config(config, seed),
        )
    }

    /// The first customer's arrival, or `None` if even that falls beyond the
    /// horizon.
    pub fn first_arrival(&mut self) -> Option<(f64, Event)> {
        self.next_arrival(0.0)
    }

    pub fn phase(&self, customer_id: usize) -> Option<Phase> {
        self.phases.get(customer_id).copied()
    }

    fn next_arrival(&mut self, current_t: f64) -> Option<(f64, Event)> {
        let t = current_t + self.streams.next_interarrival();
        if t > self.horizon {
            self.arrivals_cut_off += 1;
            return None;
        }
        let customer_id = self.next_customer_id;
        self.next_customer_id += 1;
        Some((t, Event::Arrival { customer_id }))
    }

    fn transition(&mut self, customer_id: usize, from: Phase, to: Phase) {
        match self.phases.get_mut(customer_id) {
            Some(phase) if *phase == from => *phase = to,
            other => panic!(
                "customer {} cannot move {:?} -> {:?} (currently {:?})",
                customer_id, from, to, other
            ),
        }
    }
}

impl Agent<Event, Stats> for CustomerProcess {
    fn act(&mut self, current_t: f64, data: &Event) -> Response<Event, Stats> {
        match data {
            Event::Arrival { customer_id } => {
                debug_assert_eq!(self.phases.len(), *customer_id);
                self.phases.push(Phase::Arrived);
                debug!(t = current_t, customer_id, "customer arrives");

                match self.next_arrival(current_t) {
                    Some((t, event)) => Response::event(t, event),
                    None => {
                        debug!(t = current_t, "no further arrivals before the horizon");
                        Response::new()
                    }
                }
            }
            Event::ServiceStart {
                customer_id,
                teller_id,
            } => {
                self.transition(*customer_id, Phase::Arrived, Phase::InService);
                let service_time = self.streams.next_service_time();
                debug!(
                    t = current_t,
                    customer_id,
                    teller_id,
                    service_time,
                    "customer starts service"
                );
                Response::event(
                    current_t + service_time,
                    Event::ServiceEnd {
                        customer_id: *customer_id,
                        teller_id: *teller_id,
                    },
                )
            }
            Event::ServiceEnd { customer_id, .. } => {
                self.transition(*customer_id, Phase::InService, Phase::Departed);
                debug!(t = current_t, customer_id, "customer leaves");
                Response::new()
            }
        }
    }

    fn stats(&self) -> Stats {
        let mut stats = CustomerStats {
            arrivals: self.phases.len(),
            arrivals_cut_off: self.arrivals_cut_off,
            ..CustomerStats::default()
        };
        for phase in &self.phases {
            match phase {
                Phase::Arrived => stats.waiting += 1,
                Phase::InService => stats.in_service += 1,
                Phase::Departed => stats.departed += 1,
            }
        }
        Stats::Customers(stats)
    }
}
