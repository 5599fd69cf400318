use log::Level;
use std::time::Instant;

/// Logs how long a phase took when dropped. Interactive engine calls use
/// `Level::Debug`; batch phases log at `Info`.
pub struct ScopedTimer {
    name: &'static str,
    level: Level,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(name: &'static str) -> Self {
        Self::with_level(name, Level::Info)
    }

    pub fn debug(name: &'static str) -> Self {
        Self::with_level(name, Level::Debug)
    }

    fn with_level(name: &'static str, level: Level) -> Self {
        Self {
            name,
            level,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        log::log!(self.level, "{} took {:?}", self.name, self.start.elapsed());
    }
}
