//! Minimal discrete event engine.
//!
//! Agents receive every dispatched event (broadcast) and reply with a
//! [`Response`] carrying follow-up events and newly spawned agents. Time is
//! simulated minutes as `f64`; events sharing a timestamp dispatch in the
//! order they were scheduled.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use thiserror::Error;
use tracing::{debug, trace};

pub mod parallel;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DesError {
    #[error("event scheduled at t={scheduled} but the clock is already at t={now}")]
    InvalidEventOrder { scheduled: f64, now: f64 },
}

struct Event<T> {
    t: f64,
    seq: u64,
    data: T,
}

impl<T> PartialEq for Event<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Event<T> {}

impl<T> Ord for Event<T> {
    // BinaryHeap is a max-heap: earliest time, then lowest seq, must compare greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .t
            .total_cmp(&self.t)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for Event<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct Response<T, S> {
    pub events: Vec<(f64, T)>,
    pub agents: Vec<Box<dyn Agent<T, S>>>,
}

impl<T, S> Response<T, S> {
    pub fn new() -> Response<T, S> {
        Response {
            events: Vec::new(),
            agents: Vec::new(),
        }
    }

    pub fn event(t: f64, data: T) -> Response<T, S> {
        Response {
            events: vec![(t, data)],
            agents: Vec::new(),
        }
    }

    pub fn events(events: Vec<(f64, T)>) -> Response<T, S> {
        Response {
            events,
            agents: Vec::new(),
        }
    }
}

impl<T, S> Default for Response<T, S> {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Agent<T, S> {
    fn act(&mut self, _current_t: f64, _data: &T) -> Response<T, S> {
        Response::new()
    }

    fn stats(&self) -> S;
}

/// Why [`EventLoop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No pending events remain.
    Exhausted,
    /// The next pending event lies beyond the requested end time.
    ReachedHorizon,
    /// A [`StopSignal`] was raised.
    Stopped,
}

/// Request early termination of a running loop from outside its handlers.
///
/// The flag is checked between dispatches, so the event in flight always
/// completes before the loop returns.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }
}

pub struct EventLoop<T, S> {
    queue: BinaryHeap<Event<T>>,
    current_t: f64,
    next_seq: u64,
    dispatched: usize,
    agents: Vec<Box<dyn Agent<T, S>>>,
    stop: Option<StopSignal>,
}

impl<T, S> EventLoop<T, S> {
    pub fn new(events: Vec<(f64, T)>, agents: Vec<Box<dyn Agent<T, S>>>) -> EventLoop<T, S> {
        let mut event_loop = EventLoop {
            queue: BinaryHeap::with_capacity(events.len()),
            current_t: 0.0,
            next_seq: 0,
            dispatched: 0,
            agents,
            stop: None,
        };
        for (t, data) in events {
            event_loop.push(t, data);
        }
        event_loop
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn current_t(&self) -> f64 {
        self.current_t
    }

    /// Number of events waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Number of events dispatched so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Timestamp of the next event to dispatch, if any.
    pub fn peek_t(&self) -> Option<f64> {
        self.queue.peek().map(|event| event.t)
    }

    pub fn schedule(&mut self, t: f64, data: T) -> Result<(), DesError> {
        // `!(t >= now)` also rejects NaN
        if !(t >= self.current_t) {
            return Err(DesError::InvalidEventOrder {
                scheduled: t,
                now: self.current_t,
            });
        }
        self.push(t, data);
        Ok(())
    }

    fn push(&mut self, t: f64, data: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Event { t, seq, data });
    }

    fn broadcast(&mut self) -> Result<(), DesError> {
        let Some(event) = self.queue.pop() else {
            return Ok(());
        };
        self.current_t = event.t;
        self.dispatched += 1;
        trace!(t = event.t, seq = event.seq, "dispatch");

        let mut scheduled = Vec::new();
        let mut new_agents = Vec::<Box<dyn Agent<T, S>>>::new();
        for agent in &mut self.agents {
            let response = agent.act(self.current_t, &event.data);
            scheduled.extend(response.events);
            new_agents.extend(response.agents);
        }
        for (t, data) in scheduled {
            self.schedule(t, data)?;
        }
        self.agents.extend(new_agents);
        Ok(())
    }

    /// Dispatch events until none are left, the next one is later than
    /// `until`, or the stop signal is raised.
    ///
    /// The clock is left at the last dispatched event; it is never moved to
    /// `until` itself.
    pub fn run(&mut self, until: f64) -> Result<RunOutcome, DesError> {
        let outcome = loop {
            if self.stop.as_ref().is_some_and(StopSignal::is_stopped) {
                break RunOutcome::Stopped;
            }
            match self.peek_t() {
                None => break RunOutcome::Exhausted,
                Some(t) if t > until => break RunOutcome::ReachedHorizon,
                Some(_) => self.broadcast()?,
            }
        };
        debug!(
            ?outcome,
            t = self.current_t,
            dispatched = self.dispatched,
            pending = self.queue.len(),
            "event loop returned"
        );
        Ok(outcome)
    }

    pub fn stats(&self) -> Vec<S> {
        self.agents.iter().map(|agent| agent.stats()).collect()
    }
}
