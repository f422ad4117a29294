//! Business calendar helpers and the fixed textual date/time formats used in
//! confirmations and audit exports.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};

/// Fixed textual form of calendar dates (`2026-10-19`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fixed textual form of timestamps (`2026-10-19T08:30:00.000000Z`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Compact timestamp used in confirmation numbers (`20261019083000`).
pub const COMPACT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// `date + days`, saturating at the calendar maximum.
pub fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The given date if it is a business day, otherwise the following Monday.
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => add_days(date, 2),
        Weekday::Sun => add_days(date, 1),
        _ => date,
    }
}

/// Serde adapter that writes `DateTime<Utc>` in [`TIMESTAMP_FORMAT`].
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }

    /// Same format for optional timestamps.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => super::serialize(ts, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            #[derive(Deserialize)]
            struct Wrapped(#[serde(with = "super")] DateTime<Utc>);

            Ok(Option::<Wrapped>::deserialize(d)?.map(|Wrapped(ts)| ts))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekend_rolls_forward_to_monday() {
        // 2026-10-24 is a Saturday.
        assert_eq!(next_business_day(d(2026, 10, 24)), d(2026, 10, 26));
        assert_eq!(next_business_day(d(2026, 10, 25)), d(2026, 10, 26));
        assert_eq!(next_business_day(d(2026, 10, 23)), d(2026, 10, 23));
    }

    #[test]
    fn formats_are_fixed_width() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        assert_eq!(format_timestamp(ts), "2026-10-19T08:30:00.000000Z");
        assert_eq!(format_date(d(2026, 1, 5)), "2026-01-05");
    }

    #[test]
    fn timestamp_serde_round_trips() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Holder {
            #[serde(with = "timestamp")]
            at: DateTime<Utc>,
        }

        let h = Holder {
            at: Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap(),
        };
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, r#"{"at":"2026-10-19T08:30:00.000000Z"}"#);
        assert_eq!(serde_json::from_str::<Holder>(&json).unwrap(), h);
    }
}
