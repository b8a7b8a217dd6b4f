use des::{Agent, Response};
use serde::{Deserialize, Serialize};

use crate::{Event, Stats};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub t: f64,
    pub event: Event,
}

/// Keeps every dispatched event, in dispatch order.
#[derive(Default)]
pub struct TraceRecorder {
    entries: Vec<TraceEntry>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Agent<Event, Stats> for TraceRecorder {
    fn act(&mut self, current_t: f64, data: &Event) -> Response<Event, Stats> {
        self.entries.push(TraceEntry {
            t: current_t,
            event: *data,
        });
        Response::new()
    }

    fn stats(&self) -> Stats {
        Stats::Trace(self.entries.clone())
    }
}

/// Busy teller count after each entry of `trace`.
pub fn busy_profile(trace: &[TraceEntry]) -> Vec<(f64, usize)> {
    let mut busy = 0usize;
    trace
        .iter()
        .map(|entry| {
            match entry.event {
                Event::ServiceStart { .. } => busy += 1,
                Event::ServiceEnd { .. } => busy = busy.saturating_sub(1),
                Event::Arrival { .. } => {}
            }
            (entry.t, busy)
        })
        .collect()
}
