use std::fmt;
use std::time::{Duration, Instant};

/// Records how long each named stage of a job took.
#[derive(Debug)]
pub struct StageTimer {
    started: Instant,
    stage_started: Instant,
    stages: Vec<(&'static str, Duration)>,
}

impl Default for StageTimer {
    fn default() -> Self {
        Self::start()
    }
}

impl StageTimer {
    #[must_use]
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            stage_started: now,
            stages: Vec::new(),
        }
    }

    /// Closes the current stage under `name` and starts the next one.
    pub fn lap(&mut self, name: &'static str) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.stage_started);
        self.stage_started = now;
        self.stages.push((name, elapsed));

        metrics::histogram!("report_stage_duration_seconds", "stage" => name)
            .record(elapsed.as_secs_f64());
        elapsed
    }

    #[must_use]
    pub fn total(&self) -> Duration {
        self.started.elapsed()
    }
}

/// `read_source=12ms fetch_users=2031ms ...`
impl fmt::Display for StageTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (name, elapsed)) in self.stages.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}={}ms", elapsed.as_millis())?;
        }
        Ok(())
    }
}
