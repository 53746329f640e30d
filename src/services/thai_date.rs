//! Thai calendar formatting (Buddhist era, year + 543)

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Timelike};

const BUDDHIST_ERA_OFFSET: i32 = 543;

const THAI_MONTHS: [&str; 12] = [
    "มกราคม",
    "กุมภาพันธ์",
    "มีนาคม",
    "เมษายน",
    "พฤษภาคม",
    "มิถุนายน",
    "กรกฎาคม",
    "สิงหาคม",
    "กันยายน",
    "ตุลาคม",
    "พฤศจิกายน",
    "ธันวาคม",
];

pub fn buddhist_year(year: i32) -> i32 {
    year + BUDDHIST_ERA_OFFSET
}

/// "31 มกราคม 2568"
pub fn format_long_date<Tz: TimeZone>(at: &DateTime<Tz>, offset: FixedOffset) -> String {
    let local = at.with_timezone(&offset);
    format!(
        "{} {} {}",
        local.day(),
        THAI_MONTHS[local.month0() as usize],
        buddhist_year(local.year())
    )
}

/// "31/1/2568 14:05:09"
pub fn format_date_time<Tz: TimeZone>(at: &DateTime<Tz>, offset: FixedOffset) -> String {
    let local = at.with_timezone(&offset);
    format!(
        "{}/{}/{} {:02}:{:02}:{:02}",
        local.day(),
        local.month(),
        buddhist_year(local.year()),
        local.hour(),
        local.minute(),
        local.second()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::bangkok_offset;
    use chrono::Utc;

    #[test]
    fn test_long_date() {
        let at = bangkok_offset().with_ymd_and_hms(2025, 1, 31, 9, 0, 0).unwrap();
        assert_eq!(format_long_date(&at, bangkok_offset()), "31 มกราคม 2568");
    }

    #[test]
    fn test_long_date_converts_to_local_day() {
        // 20:00 UTC on Dec 31 is already Jan 1 in Bangkok
        let at = Utc.with_ymd_and_hms(2025, 12, 31, 20, 0, 0).unwrap();
        assert_eq!(format_long_date(&at, bangkok_offset()), "1 มกราคม 2569");
    }

    #[test]
    fn test_date_time() {
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 7, 5, 9).unwrap();
        assert_eq!(format_date_time(&at, bangkok_offset()), "17/10/2569 14:05:09");
    }
}
