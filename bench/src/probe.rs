//! Time and memory measurement, injected so tests can script both.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, System};

pub trait Clock {
    /// Monotonic time since an arbitrary, fixed origin.
    fn monotonic(&self) -> Duration;

    /// Wall-clock time as Unix epoch milliseconds (entity `created_at_utc`).
    fn unix_millis(&self) -> i64;
}

pub trait MemorySampler {
    /// Resident memory of the current process in bytes; 0 when unavailable.
    fn resident_bytes(&mut self) -> u64;
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn unix_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Process RSS via `sysinfo`.
pub struct ProcessMemory {
    system: System,
    pid: Option<Pid>,
}

impl ProcessMemory {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| log::warn!("process memory sampling disabled: {e}"))
            .ok();
        Self {
            system: System::new(),
            pid,
        }
    }
}

impl Default for ProcessMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler for ProcessMemory {
    fn resident_bytes(&mut self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        self.system
            .refresh_process_specifics(pid, ProcessRefreshKind::new().with_memory());
        self.system.process(pid).map(|p| p.memory()).unwrap_or(0)
    }
}

/// Clock that advances by a scripted step on every `monotonic` reading.
///
/// Readings come out as `0, step[0], step[0] + step[1], ...`, cycling through
/// the steps. Two consecutive readings around a timed section therefore
/// measure exactly one step.
pub struct ScriptedClock {
    state: Mutex<(Duration, usize)>,
    steps: Vec<Duration>,
    unix_millis: i64,
}

impl ScriptedClock {
    pub fn new(steps: Vec<Duration>) -> Self {
        Self {
            state: Mutex::new((Duration::ZERO, 0)),
            steps,
            unix_millis: 1_700_000_000_000,
        }
    }

    pub fn fixed_step(step: Duration) -> Self {
        Self::new(vec![step])
    }
}

impl Clock for ScriptedClock {
    fn monotonic(&self) -> Duration {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (now, idx) = *guard;
        if !self.steps.is_empty() {
            guard.0 = now + self.steps[idx % self.steps.len()];
            guard.1 = idx + 1;
        }
        now
    }

    fn unix_millis(&self) -> i64 {
        self.unix_millis
    }
}

/// Sampler returning a scripted sequence of readings, then repeating the last.
pub struct ScriptedMemory {
    readings: Vec<u64>,
    next: usize,
}

impl ScriptedMemory {
    pub fn new(readings: Vec<u64>) -> Self {
        Self { readings, next: 0 }
    }
}

impl MemorySampler for ScriptedMemory {
    fn resident_bytes(&mut self) -> u64 {
        let idx = self.next.min(self.readings.len().saturating_sub(1));
        self.next += 1;
        self.readings.get(idx).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_clock_measures_one_step_per_pair_of_readings() {
        let clock = ScriptedClock::new(vec![Duration::from_millis(10), Duration::from_millis(3)]);
        assert_eq!(clock.monotonic(), Duration::ZERO);
        assert_eq!(clock.monotonic(), Duration::from_millis(10));
        assert_eq!(clock.monotonic(), Duration::from_millis(13));
        assert_eq!(clock.monotonic(), Duration::from_millis(23));
    }

    #[test]
    fn scripted_memory_repeats_last_reading() {
        let mut mem = ScriptedMemory::new(vec![100, 250]);
        assert_eq!(mem.resident_bytes(), 100);
        assert_eq!(mem.resident_bytes(), 250);
        assert_eq!(mem.resident_bytes(), 250);
        assert_eq!(ScriptedMemory::new(vec![]).resident_bytes(), 0);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.monotonic();
        let b = clock.monotonic();
        assert!(b >= a);
        assert!(clock.unix_millis() > 1_600_000_000_000);
    }

    #[test]
    fn process_memory_reports_something_on_supported_platforms() {
        let mut mem = ProcessMemory::new();
        // Never panics; value is platform dependent.
        let _ = mem.resident_bytes();
    }
}
