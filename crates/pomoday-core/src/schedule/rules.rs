use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone,
    Timelike, Utc, Weekday,
};
use serde::{Deserialize, Serialize};

use super::interval::{Day, Interval, IntervalId, IntervalKind};
use crate::error::ValidationError;

/// How a day's intervals are laid out.
///
/// Stored as the `[schedule]` table of `config.toml`; times of day are
/// written as `HH:MM`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRules {
    #[serde(default = "default_day_start", with = "hhmm")]
    pub day_start: NaiveTime,
    #[serde(default = "default_day_end", with = "hhmm")]
    pub day_end: NaiveTime,
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
    /// Gap left after each focus/break pair.
    #[serde(default)]
    pub buffer_minutes: u32,
    /// 1-based pomodoro positions replaced by one long break; adjacent
    /// positions merge, e.g. `[7, 8]` gives an hour for lunch.
    #[serde(default)]
    pub long_break_slots: Vec<u32>,
    /// Saturdays and Sundays get an empty schedule.
    #[serde(default)]
    pub weekend_off: bool,
    /// How long the session keeps prompting for an intention.
    #[serde(default = "default_intention_grace_minutes")]
    pub intention_grace_minutes: u32,
    /// Time of day at which the logical date changes.
    #[serde(default = "default_rollover", with = "hhmm")]
    pub rollover: NaiveTime,
    /// Fixed UTC offset for day boundaries; the system offset when unset.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

fn default_day_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()
}
fn default_day_end() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default()
}
fn default_focus_minutes() -> u32 {
    25
}
fn default_break_minutes() -> u32 {
    5
}
fn default_intention_grace_minutes() -> u32 {
    4
}
fn default_rollover() -> NaiveTime {
    NaiveTime::from_hms_opt(4, 0, 0).unwrap_or_default()
}

impl Default for ScheduleRules {
    fn default() -> Self {
        Self {
            day_start: default_day_start(),
            day_end: default_day_end(),
            focus_minutes: default_focus_minutes(),
            break_minutes: default_break_minutes(),
            buffer_minutes: 0,
            long_break_slots: Vec::new(),
            weekend_off: false,
            intention_grace_minutes: default_intention_grace_minutes(),
            rollover: default_rollover(),
            utc_offset_minutes: None,
        }
    }
}

impl ScheduleRules {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.focus_minutes == 0 {
            return Err(ValidationError::InvalidValue {
                field: "focus_minutes".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.break_minutes == 0 {
            return Err(ValidationError::InvalidValue {
                field: "break_minutes".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.day_start == self.day_end {
            return Err(ValidationError::InvalidValue {
                field: "day_end".into(),
                message: "must differ from day_start".into(),
            });
        }
        if let Some(offset) = self.utc_offset_minutes {
            if offset.abs() >= 24 * 60 {
                return Err(ValidationError::InvalidValue {
                    field: "utc_offset_minutes".into(),
                    message: format!("{offset} is outside one day"),
                });
            }
        }
        Ok(())
    }

    pub fn focus_length(&self) -> Duration {
        Duration::minutes(i64::from(self.focus_minutes))
    }

    pub fn break_length(&self) -> Duration {
        Duration::minutes(i64::from(self.break_minutes))
    }

    pub fn buffer(&self) -> Duration {
        Duration::minutes(i64::from(self.buffer_minutes))
    }

    pub fn intention_grace(&self) -> Duration {
        Duration::minutes(i64::from(self.intention_grace_minutes))
    }

    pub fn offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .and_then(|m| FixedOffset::east_opt(m * 60))
            .unwrap_or_else(|| Local::now().offset().fix())
    }

    /// The date a moment belongs to, with the day changing at `rollover`.
    pub fn logical_date(&self, at: DateTime<Utc>) -> NaiveDate {
        let local = at.with_timezone(&self.offset());
        let shift = Duration::seconds(i64::from(self.rollover.num_seconds_from_midnight()));
        (local - shift).date_naive()
    }

    /// UTC bounds of `date`'s working span. An end time at or before the
    /// start time falls on the following calendar day.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let offset = self.offset();
        let start = local_instant(&offset, date, self.day_start);
        let mut end = local_instant(&offset, date, self.day_end);
        if end <= start {
            end = end + Duration::days(1);
        }
        (start, end)
    }
}

fn local_instant(offset: &FixedOffset, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = date.and_time(time);
    match offset.from_local_datetime(&naive).single() {
        Some(local) => local.with_timezone(&Utc),
        // A fixed offset always maps one-to-one.
        None => Utc.from_utc_datetime(&naive),
    }
}

/// Lay out the intervals for `date`.
///
/// Deterministic for the same `(date, rules)`; the first interval starts
/// exactly at the day start.
pub fn generate(date: NaiveDate, rules: &ScheduleRules) -> Day {
    let (day_start, day_end) = rules.day_bounds(date);
    let mut day = Day {
        date,
        base_day_start: day_start,
        intervals: Vec::new(),
        sealed: false,
    };
    if rules.weekend_off && matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        return day;
    }
    if rules.focus_minutes == 0 || rules.break_minutes == 0 {
        return day;
    }

    let focus = rules.focus_length();
    let pause = rules.break_length();
    let buffer = rules.buffer();

    let mut next_id = 1u32;
    let mut push = |intervals: &mut Vec<Interval>, kind, start, end| {
        intervals.push(Interval {
            id: IntervalId(next_id),
            kind,
            start,
            end,
        });
        next_id += 1;
    };

    let mut cursor = day_start;
    let mut pom_count = 0u32;
    let mut long_break: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

    while cursor + focus <= day_end {
        pom_count += 1;
        let pom_start = cursor;
        let pom_end = cursor + focus;
        let break_end = (pom_end + pause).min(day_end);

        if rules.long_break_slots.contains(&pom_count) {
            let start = long_break.map_or(pom_start, |(s, _)| s);
            long_break = Some((start, break_end));
            if !rules.long_break_slots.contains(&(pom_count + 1)) {
                if let Some((s, e)) = long_break.take() {
                    push(&mut day.intervals, IntervalKind::Break, s, e);
                }
            }
        } else {
            push(&mut day.intervals, IntervalKind::Focus, pom_start, pom_end);
            if break_end > pom_end {
                push(&mut day.intervals, IntervalKind::Break, pom_end, break_end);
            }
        }
        cursor = pom_end + pause + buffer;
    }
    if let Some((s, e)) = long_break {
        push(&mut day.intervals, IntervalKind::Break, s, e);
    }
    day
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}
