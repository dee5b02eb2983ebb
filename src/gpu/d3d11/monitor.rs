use super::native::{HResult, HrResult};

/// Sticky record of device removal.
///
/// Every native result goes through [`DeviceLossMonitor::check`]. Once a
/// removed/reset code has been seen the monitor stays tripped; recovering
/// means dropping the context and creating a new one.
#[derive(Debug, Default)]
pub struct DeviceLossMonitor {
    lost: Option<HResult>,
}

impl DeviceLossMonitor {
    pub fn check<T>(&mut self, what: &str, result: HrResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(hr) => {
                self.record(what, hr);
                None
            }
        }
    }

    pub fn record(&mut self, what: &str, hr: HResult) {
        if hr.is_device_lost() {
            log::error!("{what}: device lost ({hr}, {})", hr.name());
            if self.lost.is_none() {
                self.lost = Some(hr);
            }
        } else {
            log::error!("{what} failed: {hr} ({})", hr.name());
        }
    }

    pub fn is_lost(&self) -> bool {
        self.lost.is_some()
    }

    /// The code that tripped the monitor.
    pub fn reason(&self) -> Option<HResult> {
        self.lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_failures_are_not_loss() {
        let mut monitor = DeviceLossMonitor::default();
        assert_eq!(monitor.check("ok", Ok(3)), Some(3));
        assert_eq!(monitor.check::<()>("oom", Err(HResult::E_OUTOFMEMORY)), None);
        assert!(!monitor.is_lost());
    }

    #[test]
    fn loss_is_sticky() {
        let mut monitor = DeviceLossMonitor::default();
        monitor.record("present", HResult::DEVICE_RESET);
        assert!(monitor.is_lost());
        monitor.record("present", HResult::DEVICE_REMOVED);
        assert_eq!(monitor.check("draw", Ok(())), Some(()));
        assert!(monitor.is_lost());
        assert_eq!(monitor.reason(), Some(HResult::DEVICE_RESET));
    }
}
