// Tue Jan 13 2026 - Alex

use log::LevelFilter;

pub struct LoggingUtils;

impl LoggingUtils {
    pub fn init_logger(level: LevelFilter) {
        let _ = env_logger::Builder::new()
            .filter_level(level)
            .format_timestamp(None)
            .try_init();
    }

    pub fn level_from_str(s: &str) -> LevelFilter {
        match s.to_lowercase().as_str() {
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Info,
        }
    }
}

pub struct ScopedTimer {
    name: String,
    start: std::time::Instant,
}

impl ScopedTimer {
    pub fn new(name: &str) -> Self {
        log::debug!("[TIMER] {} started", name);
        Self {
            name: name.to_string(),
            start: std::time::Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        log::debug!("[TIMER] {} took {:.2}ms", self.name, elapsed.as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_str() {
        assert_eq!(LoggingUtils::level_from_str("DEBUG"), LevelFilter::Debug);
        assert_eq!(LoggingUtils::level_from_str("warning"), LevelFilter::Warn);
        assert_eq!(LoggingUtils::level_from_str("nonsense"), LevelFilter::Info);
    }
}
