use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

/// Registration with a [`TickSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

impl Subscription {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Host per-frame callback source.
///
/// The engine subscribes once per start and unsubscribes once per stop,
/// then pulls the raw deltas delivered to its subscription.
pub trait TickSource {
    fn subscribe(&mut self) -> Subscription;

    /// Returns false if the subscription was not active.
    fn unsubscribe(&mut self, sub: Subscription) -> bool;

    /// Oldest undelivered raw delta for `sub`, in the source's own unit.
    fn next_tick(&mut self, sub: Subscription) -> Option<f64>;
}

/// Tick source driven by hand: every `push` is delivered to all current
/// subscribers. Ticks pushed while nobody is subscribed are dropped.
#[derive(Debug, Default)]
pub struct ManualTicker {
    next_id: u64,
    queues: BTreeMap<u64, VecDeque<f64>>,
    subscribe_calls: usize,
    unsubscribe_calls: usize,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, raw_delta: f64) {
        for queue in self.queues.values_mut() {
            queue.push_back(raw_delta);
        }
    }

    pub fn push_many(&mut self, raw_delta: f64, count: usize) {
        for _ in 0..count {
            self.push(raw_delta);
        }
    }

    pub fn pending(&self, sub: Subscription) -> usize {
        self.queues.get(&sub.0).map_or(0, VecDeque::len)
    }

    pub fn subscriber_count(&self) -> usize {
        self.queues.len()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls
    }
}

impl TickSource for ManualTicker {
    fn subscribe(&mut self) -> Subscription {
        self.next_id += 1;
        self.subscribe_calls += 1;
        self.queues.insert(self.next_id, VecDeque::new());
        Subscription(self.next_id)
    }

    fn unsubscribe(&mut self, sub: Subscription) -> bool {
        self.unsubscribe_calls += 1;
        self.queues.remove(&sub.0).is_some()
    }

    fn next_tick(&mut self, sub: Subscription) -> Option<f64> {
        self.queues.get_mut(&sub.0).and_then(VecDeque::pop_front)
    }
}

/// Wall-clock tick source paced to a target frame rate.
///
/// Yields the elapsed seconds since the previous tick once at least one
/// frame interval has passed, and nothing otherwise.
#[derive(Debug)]
pub struct FrameClock {
    interval: Duration,
    next_id: u64,
    active: Option<(u64, Instant)>,
}

impl FrameClock {
    /// `target_fps` below 1 is treated as 1.
    pub fn new(target_fps: f64) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / target_fps.max(1.0)),
            next_id: 0,
            active: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl TickSource for FrameClock {
    fn subscribe(&mut self) -> Subscription {
        self.next_id += 1;
        self.active = Some((self.next_id, Instant::now()));
        Subscription(self.next_id)
    }

    fn unsubscribe(&mut self, sub: Subscription) -> bool {
        match self.active {
            Some((id, _)) if id == sub.0 => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    fn next_tick(&mut self, sub: Subscription) -> Option<f64> {
        let (id, last) = self.active.as_mut()?;
        if *id != sub.0 {
            return None;
        }
        let elapsed = last.elapsed();
        if elapsed < self.interval {
            return None;
        }
        *last = Instant::now();
        Some(elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_ticker_delivers_to_subscribers() {
        let mut ticker = ManualTicker::new();
        ticker.push(1.0);
        let sub = ticker.subscribe();
        ticker.push(2.0);
        ticker.push(3.0);
        assert_eq!(ticker.pending(sub), 2);
        assert_eq!(ticker.next_tick(sub), Some(2.0));
        assert_eq!(ticker.next_tick(sub), Some(3.0));
        assert_eq!(ticker.next_tick(sub), None);
    }

    #[test]
    fn manual_ticker_unsubscribe_drops_queue() {
        let mut ticker = ManualTicker::new();
        let sub = ticker.subscribe();
        ticker.push_many(1.0, 3);
        assert!(ticker.unsubscribe(sub));
        assert!(!ticker.unsubscribe(sub));
        assert_eq!(ticker.next_tick(sub), None);
        assert_eq!(ticker.subscriber_count(), 0);
        assert_eq!(ticker.unsubscribe_calls(), 2);
    }

    #[test]
    fn frame_clock_paces_ticks() {
        let mut clock = FrameClock::new(100.0);
        let sub = clock.subscribe();
        assert_eq!(clock.next_tick(sub), None);

        std::thread::sleep(clock.interval() + Duration::from_millis(2));
        let dt = clock.next_tick(sub).unwrap();
        assert!(dt >= 0.01);
        assert_eq!(clock.next_tick(sub), None);

        assert!(clock.unsubscribe(sub));
        assert!(!clock.unsubscribe(sub));
    }

    #[test]
    fn frame_clock_clamps_rate() {
        assert_eq!(FrameClock::new(0.0).interval(), Duration::from_secs(1));
    }
}
