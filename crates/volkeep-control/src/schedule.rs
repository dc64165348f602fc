//! Period naming.
//!
//! Computes, for a group and a reference day, which period suffixes should
//! currently exist and which volumes they correspond to.
//!
//! ```text
//!   offset:   -retention  ...  -1     0     +1  ...  +ahead
//!   Day:       20240103   ... 20240104 20240105 20240106 ...
//!   Month:     20231101   ... 20231201 20240101 20240201 ...
//!   Year:      20210101   ... 20230101 20240101 20250101 ...
//! ```

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{Datelike, Days, Months, NaiveDate, NaiveTime};
use tracing::{error, warn};
use volkeep_config::GroupSpec;
use volkeep_core::{volume_name, CreationInterval, VolumeInstance};

/// Desired volumes keyed by name.
pub type TargetSet = BTreeMap<String, VolumeInstance>;

/// Suffix format used for purge comparisons and suffix dates.
const DAY_FORMAT: &str = "%Y%m%d";

/// Compute the period suffixes that should exist around `today`.
///
/// Returns one suffix per offset in `-retention..=ahead`, oldest first. A
/// `None` interval yields a single empty suffix whatever the window says.
#[must_use]
pub fn generate_suffixes(
    interval: CreationInterval,
    retention: u32,
    ahead: u32,
    today: NaiveDate,
) -> Vec<String> {
    let Some(format) = interval.suffix_format() else {
        return vec![String::new()];
    };

    (-i64::from(retention)..=i64::from(ahead))
        .filter_map(|offset| period_start(interval, today, offset))
        .map(|date| date.format(format).to_string())
        .collect()
}

/// The first day of the period `offset` periods away from the one holding
/// `today`.
///
/// Returns `None` for a `None` interval or a date outside chrono's range.
#[must_use]
pub fn period_start(interval: CreationInterval, today: NaiveDate, offset: i64) -> Option<NaiveDate> {
    let magnitude = offset.unsigned_abs();
    match interval {
        CreationInterval::Day => {
            let days = Days::new(magnitude);
            if offset < 0 {
                today.checked_sub_days(days)
            } else {
                today.checked_add_days(days)
            }
        }
        CreationInterval::Month => {
            let months = Months::new(u32::try_from(magnitude).ok()?);
            let first = today.with_day(1)?;
            if offset < 0 {
                first.checked_sub_months(months)
            } else {
                first.checked_add_months(months)
            }
        }
        CreationInterval::Year => {
            let year = i64::from(today.year()).checked_add(offset)?;
            NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, 1, 1)
        }
        CreationInterval::None => None,
    }
}

/// Parse an eight digit `YYYYMMDD` suffix into a date.
#[must_use]
pub fn suffix_date(suffix: &str) -> Option<NaiveDate> {
    if suffix.len() != 8 {
        return None;
    }
    NaiveDate::parse_from_str(suffix, DAY_FORMAT).ok()
}

/// The numeric `YYYYMMDD` form of a date, comparable with period suffixes.
#[must_use]
pub fn day_number(date: NaiveDate) -> u64 {
    let year = u64::try_from(date.year()).unwrap_or(0);
    year * 10_000 + u64::from(date.month()) * 100 + u64::from(date.day())
}

/// Render a group's path pattern for a date.
///
/// Returns `None` if the pattern cannot be rendered.
#[must_use]
pub fn mount_path(path_format: &str, date: NaiveDate) -> Option<String> {
    let mut path = String::new();
    match write!(path, "{}", date.and_time(NaiveTime::MIN).format(path_format)) {
        Ok(()) => Some(path),
        Err(_) => {
            error!(path_format = %path_format, "Path pattern cannot be rendered");
            None
        }
    }
}

/// Build the volume a group would create for `suffix`.
///
/// The mount path uses the date encoded in the suffix, or `today` for the
/// empty suffix of a static group.
#[must_use]
pub fn instance_for_suffix(spec: &GroupSpec, suffix: &str, today: NaiveDate) -> Option<VolumeInstance> {
    let date = if suffix.is_empty() {
        today
    } else {
        suffix_date(suffix)?
    };
    let path = mount_path(&spec.path_format, date)?;
    Some(VolumeInstance::planned(
        volume_name(&spec.name, suffix),
        path,
        spec.properties.clone(),
    ))
}

/// The volumes one group should currently have.
#[must_use]
pub fn plan_group(spec: &GroupSpec, today: NaiveDate) -> Vec<VolumeInstance> {
    if spec.interval == CreationInterval::None && (spec.retention != 0 || spec.ahead != 0) {
        warn!(
            group = %spec.name,
            retention = spec.retention,
            ahead = spec.ahead,
            "Static group with a retention window, creating a single volume"
        );
    }

    generate_suffixes(spec.interval, spec.retention, spec.ahead, today)
        .iter()
        .filter_map(|suffix| instance_for_suffix(spec, suffix, today))
        .collect()
}

/// The desired volumes of every group. Later groups replace earlier ones
/// with the same volume name.
#[must_use]
pub fn target_set(specs: &[GroupSpec], today: NaiveDate) -> TargetSet {
    let mut targets = TargetSet::new();
    for spec in specs {
        for instance in plan_group(spec, today) {
            targets.insert(instance.name.clone(), instance);
        }
    }
    targets
}
