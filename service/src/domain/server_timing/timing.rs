use std::fmt::{Display, Formatter};
use std::time::Duration;

/// One `Server-Timing` entry, e.g. `db;dur=4`.
#[derive(Debug, Clone)]
pub struct Timing {
    pub name: String,
    pub duration: String,
    pub description: Option<String>,
}

impl Display for Timing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.description {
            Some(desc) => write!(f, "{};desc=\"{}\";dur={}", self.name, desc, self.duration),
            None => write!(f, "{};dur={}", self.name, self.duration),
        }
    }
}

impl Timing {
    pub fn new(name: &str, duration: Duration, description: Option<String>) -> Timing {
        Timing {
            name: name.to_string(),
            duration: duration.as_millis().to_string(),
            description,
        }
    }
}
