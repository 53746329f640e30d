//! Display status of a meter record
//!
//! Classification for list views and badges. Branch order matters: the
//! overdue check runs first and uses `pea_no_old` absence as its
//! "not yet installed" signal.

use chrono::{DateTime, Duration, FixedOffset, Utc};

use crate::entities::meters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    PickerOverdue,
    Installed,
    WaitInstallation,
}

impl DisplayStatus {
    pub fn label(self) -> &'static str {
        match self {
            DisplayStatus::PickerOverdue => "เบิกเกินกำหนด",
            DisplayStatus::Installed => "ติดตั้งแล้ว",
            DisplayStatus::WaitInstallation => "รอติดตั้ง",
        }
    }

    /// Badge color token
    pub fn color(self) -> &'static str {
        match self {
            DisplayStatus::PickerOverdue => "#fd2e16",
            DisplayStatus::Installed => "#16fd2b",
            DisplayStatus::WaitInstallation => "#fd9b16",
        }
    }
}

impl std::fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn has_old_pea_no(meter: &meters::Model) -> bool {
    meter
        .pea_no_old
        .as_deref()
        .map(|s| !s.is_empty())
        .unwrap_or(false)
}

/// Classify `meter` as seen at `now`, with calendar days taken in `offset`
pub fn derive_status(meter: &meters::Model, now: DateTime<Utc>, offset: FixedOffset) -> DisplayStatus {
    let yesterday = (now.with_timezone(&offset) - Duration::days(1)).date_naive();
    let picked_on = meter.picker_date.with_timezone(&offset).date_naive();

    if !has_old_pea_no(meter) && picked_on <= yesterday {
        DisplayStatus::PickerOverdue
    } else if has_old_pea_no(meter) {
        DisplayStatus::Installed
    } else {
        DisplayStatus::WaitInstallation
    }
}
