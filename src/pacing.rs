use std::time::{Duration, Instant};

/// Caps a loop at a fixed tick rate by sleeping until the next deadline.
#[derive(Debug, Clone)]
pub struct Pacer {
    period: Option<Duration>,
    next_deadline: Option<Instant>,
}

impl Pacer {
    /// `ticks_per_second == 0` never sleeps.
    pub fn new(ticks_per_second: u32) -> Self {
        let period = (ticks_per_second > 0)
            .then(|| Duration::from_nanos(1_000_000_000 / ticks_per_second as u64));
        Self {
            period,
            next_deadline: None,
        }
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    pub fn tick(&mut self) {
        let Some(period) = self.period else {
            return;
        };
        let now = Instant::now();
        match self.next_deadline {
            Some(deadline) if deadline > now => {
                std::thread::sleep(deadline - now);
                self.next_deadline = Some(deadline + period);
            }
            _ => {
                // Running late: restart the schedule instead of bursting.
                self.next_deadline = Some(now + period);
            }
        }
    }

    pub fn reset(&mut self) {
        self.next_deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_from_rate() {
        assert_eq!(
            Pacer::new(60).period(),
            Some(Duration::from_nanos(16_666_666))
        );
        assert_eq!(Pacer::new(0).period(), None);
    }

    #[test]
    fn caps_rate() {
        let mut pacer = Pacer::new(200);
        let start = Instant::now();
        for _ in 0..6 {
            pacer.tick();
        }
        // First tick only arms the deadline; the next five each wait one period.
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn unpaced_never_sleeps() {
        let mut pacer = Pacer::new(0);
        let start = Instant::now();
        for _ in 0..1000 {
            pacer.tick();
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
