use std::collections::BTreeMap;

use time::{Date, OffsetDateTime, UtcOffset};

/// Temperature input for one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DailyTemperature {
    Average(f64),
    HighLow { high: f64, low: f64 },
}

impl DailyTemperature {
    pub fn average(&self) -> f64 {
        match *self {
            Self::Average(avg) => avg,
            Self::HighLow { high, low } => (high + low) / 2.0,
        }
    }
}

/// A (date, HDD) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DegreeDaySample {
    pub date: Date,
    pub hdd: f64,
}

/// `max(0, base - avg)`. Sub-daily samples must be averaged per day first.
pub fn heating_degree_days(base_f: f64, temperature: DailyTemperature) -> f64 {
    let avg = temperature.average();
    if avg >= base_f {
        0.0
    } else {
        base_f - avg
    }
}

pub fn total_hdd(samples: &[DegreeDaySample]) -> f64 {
    samples.iter().map(|s| s.hdd).sum()
}

/// Mean temperature per local calendar date, ordered by date.
pub fn daily_mean_temperatures<I>(samples: I, offset: UtcOffset) -> Vec<(Date, f64)>
where
    I: IntoIterator<Item = (OffsetDateTime, f64)>,
{
    let mut days: BTreeMap<Date, (f64, u32)> = BTreeMap::new();
    for (ts, temp) in samples {
        let entry = days.entry(ts.to_offset(offset).date()).or_insert((0.0, 0));
        entry.0 += temp;
        entry.1 += 1;
    }

    days.into_iter()
        .map(|(date, (sum, n))| (date, sum / f64::from(n)))
        .collect()
}

/// Aggregate sub-daily samples into per-day HDD values.
pub fn degree_day_samples<I>(base_f: f64, samples: I, offset: UtcOffset) -> Vec<DegreeDaySample>
where
    I: IntoIterator<Item = (OffsetDateTime, f64)>,
{
    daily_mean_temperatures(samples, offset)
        .into_iter()
        .map(|(date, avg)| DegreeDaySample {
            date,
            hdd: heating_degree_days(base_f, DailyTemperature::Average(avg)),
        })
        .collect()
}
