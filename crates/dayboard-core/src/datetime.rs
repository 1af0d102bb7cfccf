use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Duration,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  SecondsFormat,
  Utc
};
use chrono_tz::Tz;

/// Wall-clock format used for due
/// dates on the wire.
pub const WIRE_DATETIME_FORMAT: &str =
  "%Y-%m-%dT%H:%M:%S";

const WIRE_INPUT_FORMATS: [&str; 4] = [
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%d %H:%M"
];

pub fn parse_timezone(
  raw: &str
) -> anyhow::Result<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(anyhow!(
      "timezone cannot be empty"
    ));
  }
  trimmed.parse::<Tz>().map_err(|err| {
    anyhow!(
      "unknown timezone {trimmed}: \
       {err}"
    )
  })
}

#[must_use]
pub fn local_now(
  tz: &Tz,
  now: DateTime<Utc>
) -> NaiveDateTime {
  now.with_timezone(tz).naive_local()
}

pub fn parse_time_of_day(
  raw: &str
) -> anyhow::Result<NaiveTime> {
  let trimmed = raw.trim();
  NaiveTime::parse_from_str(
    trimmed, "%H:%M"
  )
  .or_else(|_| {
    NaiveTime::parse_from_str(
      trimmed, "%H:%M:%S"
    )
  })
  .with_context(|| {
    format!(
      "invalid time of day: {trimmed}"
    )
  })
}

/// Whole-day placement: keeps the
/// existing time-of-day, otherwise
/// falls back to `default_time`.
#[must_use]
pub fn place_on_date(
  existing: Option<NaiveDateTime>,
  date: NaiveDate,
  default_time: NaiveTime
) -> NaiveDateTime {
  let time = existing
    .map(|value| value.time())
    .unwrap_or(default_time);
  date.and_time(time)
}

/// An hour of the day, `0..=23`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
)]
pub struct HourOfDay(u32);

impl HourOfDay {
  #[must_use]
  pub fn new(hour: u32) -> Option<Self> {
    (hour < 24).then_some(Self(hour))
  }

  #[must_use]
  pub fn get(self) -> u32 {
    self.0
  }
}

/// Hour placement with minutes and
/// seconds zeroed.
#[must_use]
pub fn place_at_hour(
  date: NaiveDate,
  hour: HourOfDay
) -> NaiveDateTime {
  date.and_time(NaiveTime::default())
    + Duration::hours(i64::from(
      hour.get()
    ))
}

pub fn parse_wire_datetime(
  raw: &str
) -> anyhow::Result<NaiveDateTime> {
  let trimmed = raw.trim();

  for format in WIRE_INPUT_FORMATS {
    if let Ok(parsed) =
      NaiveDateTime::parse_from_str(
        trimmed, format
      )
    {
      return Ok(parsed);
    }
  }

  if let Ok(parsed) =
    DateTime::parse_from_rfc3339(trimmed)
  {
    return Ok(parsed.naive_local());
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      trimmed, "%Y-%m-%d"
    )
    && let Some(midnight) =
      date.and_hms_opt(0, 0, 0)
  {
    return Ok(midnight);
  }

  Err(anyhow!(
    "unrecognized date-time: {trimmed}"
  ))
}

#[must_use]
pub fn format_wire_datetime(
  value: NaiveDateTime
) -> String {
  value
    .format(WIRE_DATETIME_FORMAT)
    .to_string()
}

pub fn parse_timestamp(
  raw: &str
) -> anyhow::Result<DateTime<Utc>> {
  let trimmed = raw.trim();
  if let Ok(parsed) =
    DateTime::parse_from_rfc3339(trimmed)
  {
    return Ok(
      parsed.with_timezone(&Utc)
    );
  }

  // Naive stamps are taken as UTC.
  parse_wire_datetime(trimmed)
    .map(|naive| naive.and_utc())
    .with_context(|| {
      format!(
        "invalid timestamp: {trimmed}"
      )
    })
}

#[must_use]
pub fn format_timestamp(
  value: DateTime<Utc>
) -> String {
  value.to_rfc3339_opts(
    SecondsFormat::Millis,
    true
  )
}
