//! Meter filter predicate builder
//!
//! Turns a [`MeterFilter`] into a [`MeterPredicate`]: a conjunction of
//! conditions on the meters table plus a sort order on `picker_date`.
//! The builder is pure; the evaluation instant is passed in, never read
//! from the system clock here.
//!
//! A predicate has two renderings that must agree: a SeaORM [`Condition`]
//! for the database and [`MeterPredicate::matches`] for in-memory records.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ColumnTrait, Condition, Order,
};

use crate::entities::meters;
use crate::models::meter::{MeterFilter, SortOrder, StatusFilter};

/// Text columns that support case-insensitive substring search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    PeaNoNew,
    PeaNoOld,
    Ca,
}

impl TextField {
    fn column(self) -> meters::Column {
        match self {
            TextField::PeaNoNew => meters::Column::PeaNoNew,
            TextField::PeaNoOld => meters::Column::PeaNoOld,
            TextField::Ca => meters::Column::Ca,
        }
    }

    fn value(self, meter: &meters::Model) -> Option<&str> {
        match self {
            TextField::PeaNoNew => Some(meter.pea_no_new.as_str()),
            TextField::PeaNoOld => meter.pea_no_old.as_deref(),
            TextField::Ca => meter.ca.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextCondition {
    pub field: TextField,
    pub needle: String,
}

/// Conjunction of conditions on meter records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeterPredicate {
    /// `Some(false)`: installation date absent, `Some(true)`: present
    pub installed: Option<bool>,
    pub text: Vec<TextCondition>,
    pub picker_date_gte: Option<DateTime<FixedOffset>>,
    /// Every bound applies at once, so the tightest one decides
    pub picker_date_lte: Vec<DateTime<FixedOffset>>,
    pub sort_order: SortOrder,
}

impl MeterPredicate {
    /// True when no condition is set (matches every record)
    pub fn is_unconstrained(&self) -> bool {
        self.installed.is_none()
            && self.text.is_empty()
            && self.picker_date_gte.is_none()
            && self.picker_date_lte.is_empty()
    }

    /// Tightest upper bound on `picker_date`, if any
    pub fn effective_upper_bound(&self) -> Option<DateTime<FixedOffset>> {
        self.picker_date_lte.iter().min().copied()
    }

    pub fn order(&self) -> Order {
        match self.sort_order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }

    /// Render as a SeaORM condition on the meters table
    pub fn to_condition(&self) -> Condition {
        let mut condition = Condition::all();

        match self.installed {
            Some(false) => condition = condition.add(meters::Column::InstallationDate.is_null()),
            Some(true) => condition = condition.add(meters::Column::InstallationDate.is_not_null()),
            None => {}
        }

        for text in &self.text {
            let pattern = format!("%{}%", escape_like(&text.needle.to_lowercase()));
            condition = condition.add(
                Expr::expr(Func::lower(Expr::col(text.field.column())))
                    .like(LikeExpr::new(pattern).escape('\\')),
            );
        }

        if let Some(start) = self.picker_date_gte {
            condition = condition.add(meters::Column::PickerDate.gte(start));
        }
        for end in &self.picker_date_lte {
            condition = condition.add(meters::Column::PickerDate.lte(*end));
        }

        condition
    }

    /// Evaluate against a loaded record
    pub fn matches(&self, meter: &meters::Model) -> bool {
        if let Some(installed) = self.installed {
            if meter.installation_date.is_some() != installed {
                return false;
            }
        }

        let text_ok = self.text.iter().all(|cond| {
            cond.field
                .value(meter)
                .map(|value| value.to_lowercase().contains(&cond.needle.to_lowercase()))
                .unwrap_or(false)
        });
        if !text_ok {
            return false;
        }

        if let Some(start) = self.picker_date_gte {
            if meter.picker_date < start {
                return false;
            }
        }
        self.picker_date_lte.iter().all(|end| meter.picker_date <= *end)
    }
}

/// Escape LIKE wildcards with a backslash
pub(crate) fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Midnight at the start of the calendar day of `at`, in its own offset
pub fn start_of_day(at: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    // A fixed offset has no gaps or folds, so the local midnight is unique
    at.offset()
        .from_local_datetime(&at.date_naive().and_time(NaiveTime::MIN))
        .single()
        .unwrap_or(at)
}

/// 23:59:59.999 on the calendar day of `at`, in its own offset
pub fn end_of_day(at: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    start_of_day(at) + Duration::days(1) - Duration::milliseconds(1)
}

/// Last instant of the previous local calendar day (start of today minus 1 ms)
pub fn end_of_yesterday(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<FixedOffset> {
    start_of_day(now.with_timezone(&offset)) - Duration::milliseconds(1)
}

/// Upper bound actually used for the date range under `picker_overdue`
///
/// A user-supplied end later than the cutoff is pulled back to the cutoff so
/// an overdue query never reaches into days that are not overdue yet.
pub fn clamp_overdue_end(
    picker_date_end: Option<DateTime<FixedOffset>>,
    cutoff: DateTime<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    match picker_date_end {
        Some(end) if end > cutoff => Some(cutoff),
        other => other,
    }
}

/// Build the predicate for `filter` as evaluated at `now`
pub fn build_predicate(filter: &MeterFilter, now: DateTime<Utc>, offset: FixedOffset) -> MeterPredicate {
    let cutoff = end_of_yesterday(now, offset);
    let mut predicate = MeterPredicate {
        sort_order: filter.sort_order.unwrap_or_default(),
        ..Default::default()
    };
    let mut effective_end = filter.picker_date_end;

    // 1. Status, 2. overdue clamp
    match filter.status {
        Some(StatusFilter::WaitInstallation) => predicate.installed = Some(false),
        Some(StatusFilter::IsInstalled) => predicate.installed = Some(true),
        Some(StatusFilter::PickerOverdue) => {
            predicate.installed = Some(false);
            predicate.picker_date_lte.push(cutoff);
            effective_end = clamp_overdue_end(filter.picker_date_end, cutoff);
        }
        Some(StatusFilter::All) | None => {}
    }

    // 3. Text search, empty strings ignored
    let searches = [
        (TextField::PeaNoNew, &filter.search_pea_no_new),
        (TextField::PeaNoOld, &filter.search_pea_no_old),
        (TextField::Ca, &filter.search_ca),
    ];
    for (field, search) in searches {
        if let Some(needle) = search.as_deref().filter(|s| !s.is_empty()) {
            predicate.text.push(TextCondition {
                field,
                needle: needle.to_string(),
            });
        }
    }

    // 4. Date range, merged with the overdue bound
    if let Some(start) = filter.picker_date_start {
        predicate.picker_date_gte = Some(start);
    }
    if let Some(end) = effective_end {
        predicate.picker_date_lte.push(end_of_day(end.with_timezone(&offset)));
    }

    predicate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::bangkok_offset;
    use crate::test_support::meter_fixture;
    use sea_orm::{DbBackend, EntityTrait, QueryFilter, QueryTrait};

    fn bkk(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        bangkok_offset().with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    /// 2026-10-17 10:30 in Bangkok
    fn now() -> DateTime<Utc> {
        bkk(2026, 10, 17, 10, 30).with_timezone(&Utc)
    }

    fn build(filter: &MeterFilter) -> MeterPredicate {
        build_predicate(filter, now(), bangkok_offset())
    }

    #[test]
    fn test_end_of_yesterday_is_midnight_minus_one_ms() {
        let cutoff = end_of_yesterday(now(), bangkok_offset());
        assert_eq!(cutoff.to_rfc3339(), "2026-10-16T23:59:59.999+07:00");
    }

    #[test]
    fn test_end_of_yesterday_uses_local_calendar_day() {
        // 2026-10-16 20:00 UTC is already 2026-10-17 03:00 in Bangkok
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 20, 0, 0).single().unwrap();
        let cutoff = end_of_yesterday(now, bangkok_offset());
        assert_eq!(cutoff.to_rfc3339(), "2026-10-16T23:59:59.999+07:00");
    }

    #[test]
    fn test_end_of_day() {
        let end = end_of_day(bkk(2026, 10, 1, 8, 15));
        assert_eq!(end.to_rfc3339(), "2026-10-01T23:59:59.999+07:00");
    }

    #[test]
    fn test_empty_filter_is_unconstrained() {
        let predicate = build(&MeterFilter::default());
        assert!(predicate.is_unconstrained());
        assert_eq!(predicate.sort_order, SortOrder::Desc);
        assert_eq!(predicate.order(), Order::Desc);
    }

    #[test]
    fn test_all_status_adds_nothing() {
        let filter = MeterFilter {
            status: Some(StatusFilter::All),
            ..Default::default()
        };
        assert!(build(&filter).is_unconstrained());
    }

    #[test]
    fn test_wait_installation_and_is_installed() {
        let wait = build(&MeterFilter {
            status: Some(StatusFilter::WaitInstallation),
            ..Default::default()
        });
        assert_eq!(wait.installed, Some(false));
        assert!(wait.picker_date_lte.is_empty());

        let installed = build(&MeterFilter {
            status: Some(StatusFilter::IsInstalled),
            ..Default::default()
        });
        assert_eq!(installed.installed, Some(true));
    }

    #[test]
    fn test_picker_overdue_adds_cutoff() {
        let predicate = build(&MeterFilter {
            status: Some(StatusFilter::PickerOverdue),
            ..Default::default()
        });
        assert_eq!(predicate.installed, Some(false));
        assert_eq!(
            predicate.effective_upper_bound(),
            Some(end_of_yesterday(now(), bangkok_offset()))
        );
    }

    #[test]
    fn test_overdue_clamps_late_end_date() {
        let cutoff = end_of_yesterday(now(), bangkok_offset());
        let late = bkk(2026, 10, 20, 0, 0);
        assert_eq!(clamp_overdue_end(Some(late), cutoff), Some(cutoff));

        let predicate = build(&MeterFilter {
            status: Some(StatusFilter::PickerOverdue),
            picker_date_end: Some(late),
            ..Default::default()
        });
        assert_eq!(predicate.picker_date_lte, vec![cutoff, cutoff]);
        assert_eq!(predicate.effective_upper_bound(), Some(cutoff));
    }

    #[test]
    fn test_overdue_keeps_earlier_end_date() {
        let cutoff = end_of_yesterday(now(), bangkok_offset());
        let early = bkk(2026, 10, 10, 0, 0);
        assert_eq!(clamp_overdue_end(Some(early), cutoff), Some(early));
        assert_eq!(clamp_overdue_end(None, cutoff), None);

        let predicate = build(&MeterFilter {
            status: Some(StatusFilter::PickerOverdue),
            picker_date_end: Some(early),
            ..Default::default()
        });
        assert_eq!(
            predicate.effective_upper_bound().unwrap().to_rfc3339(),
            "2026-10-10T23:59:59.999+07:00"
        );
    }

    #[test]
    fn test_end_date_without_overdue_is_not_clamped() {
        let predicate = build(&MeterFilter {
            status: Some(StatusFilter::WaitInstallation),
            picker_date_end: Some(bkk(2026, 10, 20, 0, 0)),
            ..Default::default()
        });
        assert_eq!(
            predicate.effective_upper_bound().unwrap().to_rfc3339(),
            "2026-10-20T23:59:59.999+07:00"
        );
    }

    #[test]
    fn test_date_range_start_only() {
        let start = bkk(2026, 10, 1, 0, 0);
        let predicate = build(&MeterFilter {
            picker_date_start: Some(start),
            ..Default::default()
        });
        assert_eq!(predicate.picker_date_gte, Some(start));
        assert!(predicate.picker_date_lte.is_empty());
    }

    #[test]
    fn test_empty_search_strings_are_ignored() {
        let predicate = build(&MeterFilter {
            search_ca: Some(String::new()),
            search_pea_no_new: Some(String::new()),
            search_pea_no_old: Some(String::new()),
            ..Default::default()
        });
        assert!(predicate.text.is_empty());
        assert!(predicate.matches(&meter_fixture("P-1", bkk(2026, 10, 1, 9, 0))));
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let predicate = build(&MeterFilter {
            search_pea_no_new: Some("abc".to_string()),
            ..Default::default()
        });
        assert!(predicate.matches(&meter_fixture("XABCX", bkk(2026, 10, 1, 9, 0))));
        assert!(!predicate.matches(&meter_fixture("XABX", bkk(2026, 10, 1, 9, 0))));
    }

    #[test]
    fn test_search_on_absent_column_does_not_match() {
        let predicate = build(&MeterFilter {
            search_pea_no_old: Some("12".to_string()),
            ..Default::default()
        });
        let meter = meter_fixture("P-1", bkk(2026, 10, 1, 9, 0));
        assert!(meter.pea_no_old.is_none());
        assert!(!predicate.matches(&meter));
    }

    #[test]
    fn test_picked_three_days_ago_not_installed() {
        let meter = meter_fixture("P-1", bkk(2026, 10, 14, 9, 0));
        let status = |status| {
            build(&MeterFilter {
                status: Some(status),
                ..Default::default()
            })
            .matches(&meter)
        };
        assert!(status(StatusFilter::PickerOverdue));
        assert!(status(StatusFilter::WaitInstallation));
        assert!(!status(StatusFilter::IsInstalled));
    }

    #[test]
    fn test_picked_today_is_never_overdue() {
        for hour in [0, 6, 10] {
            let meter = meter_fixture("P-1", bkk(2026, 10, 17, hour, 0));
            let overdue = build(&MeterFilter {
                status: Some(StatusFilter::PickerOverdue),
                ..Default::default()
            });
            let wait = build(&MeterFilter {
                status: Some(StatusFilter::WaitInstallation),
                ..Default::default()
            });
            assert!(!overdue.matches(&meter));
            assert!(wait.matches(&meter));
        }
    }

    #[test]
    fn test_picked_late_yesterday_is_overdue() {
        let meter = meter_fixture("P-1", bkk(2026, 10, 16, 23, 59));
        let overdue = build(&MeterFilter {
            status: Some(StatusFilter::PickerOverdue),
            ..Default::default()
        });
        assert!(overdue.matches(&meter));
    }

    #[test]
    fn test_installed_meter_excluded_from_overdue() {
        let mut meter = meter_fixture("P-1", bkk(2026, 10, 1, 9, 0));
        meter.installation_date = Some(bkk(2026, 10, 2, 9, 0));
        let overdue = build(&MeterFilter {
            status: Some(StatusFilter::PickerOverdue),
            ..Default::default()
        });
        assert!(!overdue.matches(&meter));
    }

    #[test]
    fn test_date_range_is_inclusive_of_end_day() {
        let predicate = build(&MeterFilter {
            picker_date_start: Some(bkk(2026, 10, 5, 0, 0)),
            picker_date_end: Some(bkk(2026, 10, 6, 0, 0)),
            ..Default::default()
        });
        assert!(predicate.matches(&meter_fixture("A", bkk(2026, 10, 5, 0, 0))));
        assert!(predicate.matches(&meter_fixture("B", bkk(2026, 10, 6, 23, 59))));
        assert!(!predicate.matches(&meter_fixture("C", bkk(2026, 10, 7, 0, 0))));
        assert!(!predicate.matches(&meter_fixture("D", bkk(2026, 10, 4, 23, 59))));
    }

    #[test]
    fn test_builder_is_deterministic_and_leaves_input_untouched() {
        let filter = MeterFilter {
            status: Some(StatusFilter::PickerOverdue),
            search_ca: Some("020".to_string()),
            picker_date_end: Some(bkk(2026, 12, 31, 0, 0)),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        };
        let before = filter.clone();
        assert_eq!(build(&filter), build(&filter));
        assert_eq!(filter, before);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_condition_renders_status_and_search() {
        let predicate = build(&MeterFilter {
            status: Some(StatusFilter::WaitInstallation),
            search_pea_no_new: Some("AbC".to_string()),
            ..Default::default()
        });
        let sql = meters::Entity::find()
            .filter(predicate.to_condition())
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains("\"installation_date\" IS NULL"), "{}", sql);
        assert!(sql.contains("LOWER(\"pea_no_new\") LIKE '%abc%'"), "{}", sql);
    }

    #[test]
    fn test_condition_renders_both_upper_bounds() {
        let predicate = build(&MeterFilter {
            status: Some(StatusFilter::PickerOverdue),
            picker_date_start: Some(bkk(2026, 10, 1, 0, 0)),
            picker_date_end: Some(bkk(2026, 10, 5, 0, 0)),
            ..Default::default()
        });
        let sql = meters::Entity::find()
            .filter(predicate.to_condition())
            .build(DbBackend::Postgres)
            .to_string();
        assert_eq!(sql.matches("\"picker_date\" <=").count(), 2, "{}", sql);
        assert_eq!(sql.matches("\"picker_date\" >=").count(), 1, "{}", sql);
        assert!(sql.contains("\"installation_date\" IS NULL"), "{}", sql);
    }

    #[test]
    fn test_unconstrained_condition_renders_no_where_clause() {
        let sql = meters::Entity::find()
            .filter(MeterPredicate::default().to_condition())
            .build(DbBackend::Postgres)
            .to_string();
        assert!(!sql.contains("WHERE"), "{}", sql);
    }
}
