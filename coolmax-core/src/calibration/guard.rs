//! Boot-time reconciliation of the live calibration segment and its backup

use coolmax_hal::RestoreOutcome;

use super::segment::CalibrationSegment;

/// What to do with the live segment and its flash backup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Decision {
    /// Backup matches a valid live segment
    InSync,
    /// Copy the live segment into the backup block
    BackUp,
    /// Rewrite the live segment from the backup
    Restore,
    /// Neither copy is usable; the device stays uncalibrated
    Unrecoverable,
}

/// Decision table over the two validity flags and the content comparison
pub const fn decide(live_valid: bool, backup_valid: bool, differ: bool) -> Decision {
    match (live_valid, backup_valid) {
        (true, false) => Decision::BackUp,
        (true, true) if differ => Decision::BackUp,
        (true, true) => Decision::InSync,
        (false, true) => Decision::Restore,
        (false, false) => Decision::Unrecoverable,
    }
}

/// Decide from the two segments
pub fn reconcile(live: &CalibrationSegment, backup: &CalibrationSegment) -> Decision {
    decide(live.is_valid(), backup.is_valid(), live.differs_from(backup))
}

/// Result of the boot-time calibration check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationReport {
    pub live_valid: bool,
    pub backup_valid: bool,
    pub decision: Decision,
    /// Set when a restore was attempted
    pub restore: Option<RestoreOutcome>,
}

impl CalibrationReport {
    /// Whether the device ends up with a usable calibration segment
    pub fn calibrated(&self) -> bool {
        self.live_valid || self.restore == Some(RestoreOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::segment::sealed_segment;

    #[test]
    fn test_decision_table() {
        assert_eq!(decide(true, false, true), Decision::BackUp);
        assert_eq!(decide(true, false, false), Decision::BackUp);
        assert_eq!(decide(true, true, true), Decision::BackUp);
        assert_eq!(decide(true, true, false), Decision::InSync);
        assert_eq!(decide(false, true, true), Decision::Restore);
        assert_eq!(decide(false, true, false), Decision::Restore);
        assert_eq!(decide(false, false, true), Decision::Unrecoverable);
        assert_eq!(decide(false, false, false), Decision::Unrecoverable);
    }

    #[test]
    fn test_reconcile_segments() {
        let a = sealed_segment(0x10);
        let b = sealed_segment(0x20);
        let blank = CalibrationSegment::blank();

        assert_eq!(reconcile(&a, &a), Decision::InSync);
        assert_eq!(reconcile(&a, &b), Decision::BackUp);
        assert_eq!(reconcile(&a, &blank), Decision::BackUp);
        assert_eq!(reconcile(&blank, &b), Decision::Restore);
        assert_eq!(reconcile(&blank, &blank), Decision::Unrecoverable);
    }

    #[test]
    fn test_calibrated_after_restore() {
        let report = CalibrationReport {
            live_valid: false,
            backup_valid: true,
            decision: Decision::Restore,
            restore: Some(RestoreOutcome::Unsupported),
        };
        assert!(!report.calibrated());
        let applied = CalibrationReport {
            restore: Some(RestoreOutcome::Applied),
            ..report
        };
        assert!(applied.calibrated());
    }
}
