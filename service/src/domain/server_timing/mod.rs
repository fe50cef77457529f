use crate::domain::server_timing::timing::Timing;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub mod timing;

/// Accumulates phase timings for the `Server-Timing` response header.
#[derive(Debug, Clone, Default)]
pub struct ServerTiming {
    timings: Vec<Timing>,
}

impl Display for ServerTiming {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = self
            .timings
            .iter()
            .map(|tim| tim.to_string())
            .collect::<Vec<String>>()
            .join(", ");

        write!(f, "{display}")
    }
}

impl ServerTiming {
    pub fn new(timings: Vec<Timing>) -> ServerTiming {
        ServerTiming { timings }
    }

    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }

    /// Records the time elapsed since `start` under `name`.
    pub fn record(&mut self, name: &str, start: Instant) {
        self.timings.push(Timing::new(name, start.elapsed(), None));
    }
}
