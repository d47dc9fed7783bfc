use chrono::{DateTime, Days, Local, LocalResult, NaiveDateTime, NaiveTime, TimeZone};

use crate::error::{AlarmError, AlarmResult};

/// Parses an exact, zero-padded 24-hour `HH:MM:SS` string.
pub fn parse_time_of_day(input: &str) -> AlarmResult<NaiveTime> {
    let bytes = input.as_bytes();
    if bytes.len() != 8 || bytes[2] != b':' || bytes[5] != b':' {
        return Err(AlarmError::InvalidTimeFormat);
    }

    let field = |start: usize| -> AlarmResult<u32> {
        let (tens, ones) = (bytes[start], bytes[start + 1]);
        if !tens.is_ascii_digit() || !ones.is_ascii_digit() {
            return Err(AlarmError::InvalidTimeFormat);
        }
        Ok(u32::from(tens - b'0') * 10 + u32::from(ones - b'0'))
    };

    let (hour, minute, second) = (field(0)?, field(3)?, field(6)?);
    if hour > 23 || minute > 59 || second > 59 {
        return Err(AlarmError::InvalidTimeFormat);
    }
    NaiveTime::from_hms_opt(hour, minute, second).ok_or(AlarmError::InvalidTimeFormat)
}

/// Turns a time-of-day string into the next local instant strictly after `now`.
pub fn resolve_alarm_time(input: &str, now: &DateTime<Local>) -> AlarmResult<DateTime<Local>> {
    resolve_alarm_time_in_tz(input, now, &Local)
}

pub(crate) fn resolve_alarm_time_in_tz<Tz>(
    input: &str,
    now: &DateTime<Tz>,
    timezone: &Tz,
) -> AlarmResult<DateTime<Tz>>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    let time_of_day = parse_time_of_day(input)?;
    let today = now.date_naive();

    // Day 0 is today; day 1 covers a time already passed. Further days only
    // matter when the wall-clock time falls into a DST gap.
    for day_offset in 0_u64..3 {
        let Some(date) = today.checked_add_days(Days::new(day_offset)) else {
            break;
        };
        let Some(candidate) = resolve_local_datetime(timezone, date.and_time(time_of_day)) else {
            continue;
        };
        if candidate > *now {
            return Ok(candidate);
        }
    }

    Err(AlarmError::InvalidTimeFormat)
}

fn resolve_local_datetime<Tz>(timezone: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(first, _second) => Some(first),
        LocalResult::None => None,
    }
}
