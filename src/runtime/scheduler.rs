//! The periodic telemetry tick.

use embassy_time::{Duration, Instant};

use super::traits::{Clock, PublishOutbox, TickPublisher};
use crate::error::OrchestratorError;
use crate::sensor::SensorSource;

/// A single repeating timer that drives the publishers.
///
/// The scheduler holds at most one pending deadline. It is armed once when
/// the session comes up and afterwards only re-armed by [`fire`](Self::fire),
/// each time one period after the tick finished.
#[derive(Debug)]
pub struct PeriodicScheduler {
    period: Duration,
    deadline: Option<Instant>,
    ticks: u32,
}

impl PeriodicScheduler {
    /// Create a disarmed scheduler.
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: None,
            ticks: 0,
        }
    }

    /// The tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Arm for an immediate first tick.
    pub fn on_connected(&mut self, now: Instant) -> Result<(), OrchestratorError> {
        if self.deadline.is_some() {
            return Err(OrchestratorError::SchedulerAlreadyArmed);
        }
        self.deadline = Some(now);
        Ok(())
    }

    /// Whether a tick is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the pending tick is due.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the pending tick is due at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Cancel the pending tick.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Number of ticks fired so far.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Run one tick: every publisher in order, then re-arm one period later.
    ///
    /// Returns the number of publishes queued, or `None` if no tick was
    /// pending.
    pub fn fire(
        &mut self,
        sensors: &mut dyn SensorSource,
        publishers: &mut [&mut dyn TickPublisher],
        outbox: &mut dyn PublishOutbox,
        clock: &dyn Clock,
    ) -> Option<usize> {
        self.deadline.take()?;

        trace!("telemetry tick {}", self.ticks);
        let mut queued = 0;
        for publisher in publishers.iter_mut() {
            if publisher.tick(sensors, outbox) {
                queued += 1;
            }
        }
        self.ticks = self.ticks.wrapping_add(1);

        self.deadline = Some(clock.now() + self.period);
        Some(queued)
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::packet::QoS;
    use crate::runtime::BufferedOutbox;
    use crate::sensor::TemperatureUnit;

    struct ManualClock(Cell<Instant>);

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.0.get()
        }
    }

    struct Fixed;

    impl SensorSource for Fixed {
        fn temperature(&mut self, _unit: TemperatureUnit) -> f32 {
            20.0
        }

        fn button_pressed(&mut self) -> bool {
            false
        }
    }

    /// Records the order publishers ran in.
    struct Probe<'a> {
        name: &'static str,
        log: &'a core::cell::RefCell<std::vec::Vec<&'static str>>,
    }

    impl TickPublisher for Probe<'_> {
        fn topic(&self) -> &str {
            self.name
        }

        fn tick(&mut self, _sensors: &mut dyn SensorSource, outbox: &mut dyn PublishOutbox) -> bool {
            self.log.borrow_mut().push(self.name);
            outbox.publish(self.name, b"x", QoS::AtLeastOnce, true)
        }
    }

    #[test]
    fn arms_once_for_immediate_tick() {
        let start = Instant::from_secs(5);
        let mut scheduler = PeriodicScheduler::new(Duration::from_secs(10));
        assert!(!scheduler.is_armed());

        scheduler.on_connected(start).unwrap();
        assert!(scheduler.is_due(start));
        assert_eq!(
            scheduler.on_connected(start),
            Err(OrchestratorError::SchedulerAlreadyArmed)
        );
    }

    #[test]
    fn fires_publishers_in_order_and_rearms_after_tick() {
        let log = core::cell::RefCell::new(std::vec::Vec::new());
        let mut first = Probe {
            name: "temperature",
            log: &log,
        };
        let mut second = Probe {
            name: "button",
            log: &log,
        };
        let clock = ManualClock(Cell::new(Instant::from_secs(1)));
        let mut outbox = BufferedOutbox::<4, 16, 4>::new();
        let mut scheduler = PeriodicScheduler::new(Duration::from_secs(10));

        scheduler.on_connected(Instant::from_secs(0)).unwrap();
        let mut publishers: [&mut dyn TickPublisher; 2] = [&mut first, &mut second];
        let queued = scheduler.fire(&mut Fixed, &mut publishers, &mut outbox, &clock);

        assert_eq!(queued, Some(2));
        assert_eq!(*log.borrow(), ["temperature", "button"]);
        assert_eq!(scheduler.deadline(), Some(Instant::from_secs(11)));
        assert!(!scheduler.is_due(Instant::from_secs(10)));
        assert!(scheduler.is_due(Instant::from_secs(11)));
        assert_eq!(scheduler.ticks(), 1);
    }

    #[test]
    fn disarmed_scheduler_does_not_fire() {
        let clock = ManualClock(Cell::new(Instant::from_secs(0)));
        let mut outbox = BufferedOutbox::<4, 16, 4>::new();
        let mut scheduler = PeriodicScheduler::new(Duration::from_secs(10));
        let mut none: [&mut dyn TickPublisher; 0] = [];

        assert_eq!(scheduler.fire(&mut Fixed, &mut none, &mut outbox, &clock), None);

        scheduler.on_connected(Instant::from_secs(0)).unwrap();
        scheduler.disarm();
        assert_eq!(scheduler.fire(&mut Fixed, &mut none, &mut outbox, &clock), None);
        assert_eq!(scheduler.ticks(), 0);
    }
}
