//! Chart-data windowing.
//!
//! All selectors borrow from the source set and keep its order, so they chain:
//! `recent_window` → `band_filter` → `group_by_name`.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, TimeDelta};

use crate::data::Observation;

/// Inclusive rank range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Band {
    pub lo: u32,
    pub hi: u32,
}

impl Band {
    pub const fn new(lo: u32, hi: u32) -> Self { Self { lo, hi } }

    #[inline]
    pub fn contains(&self, rank: u32) -> bool { self.lo <= rank && rank <= self.hi }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.lo, self.hi)
    }
}

/// Observations with `now - timestamp <= duration`. The boundary is inclusive.
pub fn recent_window<'a, I>(obs: I, now: NaiveDateTime, duration: TimeDelta) -> Vec<&'a Observation>
where
    I: IntoIterator<Item = &'a Observation>,
{
    obs.into_iter().filter(|o| now - o.timestamp <= duration).collect()
}

/// Observations whose rank value lies in `band`. Filters on the rank field,
/// never on list position.
pub fn band_filter<'a, I>(obs: I, band: Band) -> Vec<&'a Observation>
where
    I: IntoIterator<Item = &'a Observation>,
{
    obs.into_iter().filter(|o| band.contains(o.rank)).collect()
}

/// One ordered run of observations per name, in the order they appear in `obs`.
pub fn group_by_name<'a, I>(obs: I) -> BTreeMap<String, Vec<&'a Observation>>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut by_name: BTreeMap<String, Vec<&'a Observation>> = BTreeMap::new();
    for o in obs {
        match by_name.get_mut(o.name.as_str()) {
            Some(run) => run.push(o),
            None => { by_name.insert(o.name.clone(), vec![o]); }
        }
    }
    by_name
}

/// Plot-ready series: name → (timestamp, score) points.
pub type Series = BTreeMap<String, Vec<(NaiveDateTime, f64)>>;

pub fn to_series(grouped: &BTreeMap<String, Vec<&Observation>>) -> Series {
    grouped
        .iter()
        .map(|(name, run)| (name.clone(), run.iter().map(|o| (o.timestamp, o.score)).collect()))
        .collect()
}

/// Full chart pipeline for one band.
pub fn band_series<'a, I>(obs: I, now: NaiveDateTime, window: TimeDelta, band: Band) -> Series
where
    I: IntoIterator<Item = &'a Observation>,
{
    let recent = recent_window(obs, now, window);
    let in_band = band_filter(recent, band);
    to_series(&group_by_name(in_band))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn band_display_and_bounds() {
        let b = Band::new(6, 10);
        assert_eq!(b.to_string(), "6-10");
        assert!(b.contains(6) && b.contains(10));
        assert!(!b.contains(5) && !b.contains(11));
    }

    #[test]
    fn group_keeps_per_name_order() {
        let obs = vec![
            Observation::new(1, "A", 3.0, t(3)),
            Observation::new(2, "B", 2.0, t(1)),
            Observation::new(1, "A", 1.0, t(1)),
            Observation::new(2, "B", 5.0, t(5)),
        ];
        let grouped = group_by_name(&obs);
        assert_eq!(grouped.len(), 2);
        let a: Vec<f64> = grouped["A"].iter().map(|o| o.score).collect();
        assert_eq!(a, vec![3.0, 1.0]);
        let series = to_series(&grouped);
        assert_eq!(series["B"], vec![(t(1), 2.0), (t(5), 5.0)]);
    }

    #[test]
    fn band_series_applies_window_then_band() {
        let now = t(20);
        let obs = vec![
            Observation::new(1, "Old", 1.0, now - TimeDelta::hours(25)),
            Observation::new(1, "A", 1.0, now - TimeDelta::hours(2)),
            Observation::new(7, "Low", 1.0, now - TimeDelta::hours(2)),
        ];
        let series = band_series(&obs, now, TimeDelta::days(1), Band::new(1, 5));
        assert_eq!(series.keys().collect::<Vec<_>>(), vec!["A"]);
    }
}
