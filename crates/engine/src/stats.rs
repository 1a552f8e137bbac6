use marionette_scene::FrameReport;
use std::collections::VecDeque;
use std::time::Duration;

/// One timed update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSample {
    pub elapsed: Duration,
    /// Behavior updates that completed during the pass.
    pub behaviors: usize,
}

/// Rolling window over the most recent update passes.
///
/// Keeps the behavior count next to each duration, so a slow pass can be
/// told apart from a pass that simply had more work.
#[derive(Debug)]
pub struct PassTimer {
    samples: VecDeque<PassSample>,
    capacity: usize,
}

impl PassTimer {
    /// `capacity` of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, elapsed: Duration, behaviors: usize) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(PassSample { elapsed, behaviors });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<PassSample> {
        self.samples.back().copied()
    }

    fn total(&self) -> Duration {
        self.samples.iter().map(|s| s.elapsed).sum()
    }

    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        self.total() / self.samples.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.samples
            .iter()
            .map(|s| s.elapsed)
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Mean behavior updates per pass over the window.
    pub fn behaviors_per_pass(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let behaviors: usize = self.samples.iter().map(|s| s.behaviors).sum();
        behaviors as f64 / self.samples.len() as f64
    }

    /// Window time divided by behavior updates; zero when nothing ran.
    pub fn per_behavior(&self) -> Duration {
        let behaviors: usize = self.samples.iter().map(|s| s.behaviors).sum();
        match u32::try_from(behaviors) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.total() / n,
        }
    }
}

/// Counters the engine keeps across frames.
#[derive(Debug)]
pub struct EngineStats {
    pub frames: u64,
    pub faults: u64,
    pub behaviors_updated: u64,
    pub last_frame: Option<FrameReport>,
    pub timer: PassTimer,
}

impl Default for EngineStats {
    fn default() -> Self {
        Self {
            frames: 0,
            faults: 0,
            behaviors_updated: 0,
            last_frame: None,
            timer: PassTimer::new(120),
        }
    }
}

impl EngineStats {
    pub(crate) fn record(&mut self, report: FrameReport, elapsed: Duration) {
        self.frames += 1;
        self.faults += report.faults.len() as u64;
        self.behaviors_updated += report.behaviors_updated as u64;
        self.timer.record(elapsed, report.behaviors_updated);
        self.last_frame = Some(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn pass_timer_keeps_only_the_latest_passes() {
        let mut timer = PassTimer::new(2);
        timer.record(ms(10), 1);
        timer.record(ms(20), 2);
        timer.record(ms(30), 4);

        assert_eq!(timer.len(), 2);
        assert_eq!(timer.average(), ms(25));
        assert_eq!(timer.max(), ms(30));
        assert_eq!(
            timer.last(),
            Some(PassSample {
                elapsed: ms(30),
                behaviors: 4
            })
        );
    }

    #[test]
    fn cost_is_split_across_behaviors() {
        let mut timer = PassTimer::new(8);
        timer.record(ms(6), 2);
        timer.record(ms(6), 4);
        assert_eq!(timer.behaviors_per_pass(), 3.0);
        assert_eq!(timer.per_behavior(), ms(2));
    }

    #[test]
    fn passes_without_behaviors_cost_nothing_per_behavior() {
        let mut timer = PassTimer::new(0);
        assert!(timer.is_empty());
        assert_eq!(timer.average(), Duration::ZERO);
        assert_eq!(timer.per_behavior(), Duration::ZERO);

        timer.record(ms(5), 0);
        assert_eq!(timer.len(), 1);
        assert_eq!(timer.per_behavior(), Duration::ZERO);
        assert_eq!(timer.behaviors_per_pass(), 0.0);
    }

    #[test]
    fn stats_accumulate_reports() {
        let mut stats = EngineStats::default();
        stats.record(
            FrameReport {
                frame: 1,
                behaviors_updated: 4,
                ..FrameReport::default()
            },
            Duration::from_micros(50),
        );
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.behaviors_updated, 4);
        assert_eq!(stats.timer.last().map(|s| s.behaviors), Some(4));
        assert_eq!(stats.last_frame.as_ref().map(|r| r.frame), Some(1));
    }
}
