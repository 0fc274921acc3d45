//! Calendar columns.
//!
//! | type              | storage | unit                         | out of range  |
//! |-------------------|---------|------------------------------|---------------|
//! | `Date`            | UInt16  | days since 1970-01-01        | zero          |
//! | `Date32`          | Int32   | days since 1970-01-01        | `DateOverflow`|
//! | `DateTime[(tz)]`  | UInt32  | seconds since the epoch      | zero          |
//! | `DateTime64(p[, tz])` | Int64 | 10^-p seconds since the epoch | `DateOverflow`|
//!
//! Times decode into the column timezone when the type names one, otherwise
//! into the server timezone of the `ServerContext`.

use std::any::Any;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use super::Column;
use crate::config::{parse_timezone, ServerContext};
use crate::error::CodecError;
use crate::kernels::bitcast;
use crate::proto::{Buffer, Reader};
use crate::types::{TypeDesc, Value};

const DATE32_MIN_DAYS: i64 = -25_567; // 1900-01-01
const DATE32_MAX_DAYS: i64 = 120_529; // 2299-12-31
const DATETIME64_MIN_SECONDS: i64 = -2_208_988_800; // 1900-01-01 00:00:00
const DATETIME64_MAX_SECONDS: i64 = 10_413_791_999; // 2299-12-31 23:59:59
const MAX_DATETIME64_PRECISION: i64 = 9;

//==================================================================================
// 1. Shared helpers
//==================================================================================

fn epoch_date() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

fn days_since_epoch(date: NaiveDate) -> i64 {
    (date - epoch_date()).num_days()
}

fn date_from_days(days: i64) -> NaiveDate {
    epoch_date()
        .checked_add_signed(TimeDelta::days(days))
        .unwrap_or_else(epoch_date)
}

/// The instant `secs` + `nanos` after the epoch, viewed in `tz`.
fn instant(tz: Tz, secs: i64, nanos: u32) -> DateTime<Tz> {
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .with_timezone(&tz)
}

fn midnight(date: NaiveDate, tz: Tz) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).earliest()
}

/// Parses RFC 3339, `YYYY-MM-DD hh:mm:ss[.fff]` (local to `tz`) or a bare date.
fn parse_datetime(text: &str, tz: Tz) -> Option<DateTime<Tz>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&tz));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return tz.from_local_datetime(&naive).earliest();
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| midnight(d, tz))
}

fn parse_date(type_name: &str, text: &str) -> Result<NaiveDate, CodecError> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|e| {
        CodecError::converter_hint("Append", type_name, "String", e.to_string())
    })
}

/// Column timezone from the quoted type parameter at `index`, else the server's.
fn column_timezone(desc: &TypeDesc, index: usize, ctx: &ServerContext) -> Result<Tz, CodecError> {
    match desc.quoted_param(index) {
        Some(name) => parse_timezone(name),
        None => Ok(ctx.timezone),
    }
}

macro_rules! column_boilerplate {
    () => {
        fn name(&self) -> &str {
            &self.name
        }

        fn rows(&self) -> usize {
            self.data.len()
        }

        fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
            bitcast::decode_into(reader, rows, &mut self.data)
        }

        fn encode(&self, buffer: &mut Buffer) {
            bitcast::encode(&self.data, buffer);
        }

        fn reset(&mut self) {
            self.data.clear();
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    };
}

//==================================================================================
// 2. Date / Date32
//==================================================================================

#[derive(Debug, Clone)]
pub struct DateColumn {
    name: String,
    data: Vec<u16>,
}

impl DateColumn {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: Vec::new(),
        }
    }

    pub fn days(&self) -> &[u16] {
        &self.data
    }
}

impl Column for DateColumn {
    column_boilerplate!();

    fn column_type(&self) -> &str {
        "Date"
    }

    fn row(&self, index: usize) -> Value {
        Value::Date(date_from_days(i64::from(self.data[index])))
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        let date = match value {
            Value::Nil => epoch_date(),
            Value::Date(d) => *d,
            Value::DateTime(dt) => dt.date_naive(),
            Value::String(s) => parse_date("Date", s)?,
            other => return Err(CodecError::converter("Append", "Date", other)),
        };
        let days = u16::try_from(days_since_epoch(date)).unwrap_or(0);
        self.data.push(days);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Date32Column {
    name: String,
    data: Vec<i32>,
}

impl Date32Column {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: Vec::new(),
        }
    }
}

impl Column for Date32Column {
    column_boilerplate!();

    fn column_type(&self) -> &str {
        "Date32"
    }

    fn row(&self, index: usize) -> Value {
        Value::Date(date_from_days(i64::from(self.data[index])))
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        let date = match value {
            Value::Nil => epoch_date(),
            Value::Date(d) => *d,
            Value::DateTime(dt) => dt.date_naive(),
            Value::String(s) => parse_date("Date32", s)?,
            other => return Err(CodecError::converter("Append", "Date32", other)),
        };
        let days = days_since_epoch(date);
        if !(DATE32_MIN_DAYS..=DATE32_MAX_DAYS).contains(&days) {
            return Err(CodecError::DateOverflow {
                type_name: "Date32".into(),
                value: date.to_string(),
                min: date_from_days(DATE32_MIN_DAYS).to_string(),
                max: date_from_days(DATE32_MAX_DAYS).to_string(),
            });
        }
        self.data.push(days as i32);
        Ok(())
    }
}

//==================================================================================
// 3. DateTime
//==================================================================================

#[derive(Debug, Clone)]
pub struct DateTimeColumn {
    name: String,
    type_name: String,
    timezone: Tz,
    data: Vec<u32>,
}

impl DateTimeColumn {
    pub fn new(name: &str, desc: &TypeDesc, ctx: &ServerContext) -> Result<Self, CodecError> {
        Ok(Self {
            name: name.to_string(),
            type_name: desc.to_string(),
            timezone: column_timezone(desc, 0, ctx)?,
            data: Vec::new(),
        })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn seconds(&self) -> &[u32] {
        &self.data
    }
}

impl Column for DateTimeColumn {
    column_boilerplate!();

    fn column_type(&self) -> &str {
        &self.type_name
    }

    fn row(&self, index: usize) -> Value {
        Value::DateTime(instant(self.timezone, i64::from(self.data[index]), 0))
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        let secs = match value {
            Value::Nil => 0,
            Value::DateTime(dt) => dt.timestamp(),
            Value::Date(d) => midnight(*d, self.timezone).map(|dt| dt.timestamp()).unwrap_or(0),
            Value::String(s) => parse_datetime(s, self.timezone)
                .ok_or_else(|| {
                    CodecError::converter_hint(
                        "Append",
                        &self.type_name,
                        "String",
                        format!("cannot parse \"{}\" as a date and time", s),
                    )
                })?
                .timestamp(),
            other => other
                .as_i128()
                .and_then(|v| i64::try_from(v).ok())
                .ok_or_else(|| CodecError::converter("Append", &self.type_name, other))?,
        };
        self.data.push(u32::try_from(secs).unwrap_or(0));
        Ok(())
    }
}

//==================================================================================
// 4. DateTime64
//==================================================================================

#[derive(Debug, Clone)]
pub struct DateTime64Column {
    name: String,
    type_name: String,
    timezone: Tz,
    precision: u32,
    ticks_per_second: i64,
    data: Vec<i64>,
}

impl DateTime64Column {
    pub fn new(name: &str, desc: &TypeDesc, ctx: &ServerContext) -> Result<Self, CodecError> {
        let precision = desc.number_param(0).unwrap_or(3);
        if !(0..=MAX_DATETIME64_PRECISION).contains(&precision) {
            return Err(CodecError::unsupported(name, desc));
        }
        Ok(Self {
            name: name.to_string(),
            type_name: desc.to_string(),
            timezone: column_timezone(desc, 1, ctx)?,
            precision: precision as u32,
            ticks_per_second: 10i64.pow(precision as u32),
            data: Vec::new(),
        })
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn ticks(&self) -> &[i64] {
        &self.data
    }

    fn overflow(&self, value: &DateTime<Tz>) -> CodecError {
        CodecError::DateOverflow {
            type_name: self.type_name.clone(),
            value: value.to_rfc3339(),
            min: instant(Tz::UTC, DATETIME64_MIN_SECONDS, 0).to_rfc3339(),
            max: instant(Tz::UTC, DATETIME64_MAX_SECONDS, 999_999_999).to_rfc3339(),
        }
    }

    fn to_ticks(&self, dt: &DateTime<Tz>) -> Result<i64, CodecError> {
        let secs = dt.timestamp();
        if !(DATETIME64_MIN_SECONDS..=DATETIME64_MAX_SECONDS).contains(&secs) {
            return Err(self.overflow(dt));
        }
        let sub = i64::from(dt.timestamp_subsec_nanos()) / 10i64.pow(9 - self.precision);
        secs.checked_mul(self.ticks_per_second)
            .and_then(|t| t.checked_add(sub))
            .ok_or_else(|| self.overflow(dt))
    }
}

impl Column for DateTime64Column {
    column_boilerplate!();

    fn column_type(&self) -> &str {
        &self.type_name
    }

    fn row(&self, index: usize) -> Value {
        let ticks = self.data[index];
        let secs = ticks.div_euclid(self.ticks_per_second);
        let nanos = ticks.rem_euclid(self.ticks_per_second) * 10i64.pow(9 - self.precision);
        Value::DateTime(instant(self.timezone, secs, nanos as u32))
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        let ticks = match value {
            Value::Nil => 0,
            Value::DateTime(dt) => self.to_ticks(dt)?,
            Value::Date(d) => match midnight(*d, self.timezone) {
                Some(dt) => self.to_ticks(&dt)?,
                None => 0,
            },
            Value::String(s) => {
                let dt = parse_datetime(s, self.timezone).ok_or_else(|| {
                    CodecError::converter_hint(
                        "Append",
                        &self.type_name,
                        "String",
                        format!("cannot parse \"{}\" as a date and time", s),
                    )
                })?;
                self.to_ticks(&dt)?
            }
            Value::Int64(v) => *v,
            other => return Err(CodecError::converter("Append", &self.type_name, other)),
        };
        self.data.push(ticks);
        Ok(())
    }
}

//==================================================================================
// 5. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn ctx() -> ServerContext {
        ServerContext::default()
    }

    #[test]
    fn test_date_roundtrip_and_overflow_to_zero() {
        let mut col = DateColumn::new("d");
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        col.append_row(&Value::Date(d)).unwrap();
        col.append_row(&Value::Date(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()))
            .unwrap();
        col.append_row(&Value::Date(NaiveDate::from_ymd_opt(2200, 1, 1).unwrap()))
            .unwrap();
        assert_eq!(col.row(0), Value::Date(d));
        assert_eq!(col.days()[1], 0);
        assert_eq!(col.days()[2], 0);
    }

    #[test]
    fn test_date32_range() {
        let mut col = Date32Column::new("d");
        let old = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
        col.append_row(&Value::Date(old)).unwrap();
        assert_eq!(col.row(0), Value::Date(old));
        let err = col
            .append_row(&Value::Date(NaiveDate::from_ymd_opt(1899, 12, 31).unwrap()))
            .unwrap_err();
        assert!(matches!(err, CodecError::DateOverflow { .. }));
        assert_eq!(col.rows(), 1);
    }

    #[test]
    fn test_datetime_timezones() {
        let desc = TypeDesc::parse("DateTime('Europe/Amsterdam')").unwrap();
        let mut col = DateTimeColumn::new("t", &desc, &ctx()).unwrap();
        col.append_row(&Value::from("2024-01-01 12:00:00")).unwrap();
        assert_eq!(col.seconds()[0], 1_704_106_800);
        match col.row(0) {
            Value::DateTime(dt) => {
                assert_eq!(dt.timezone(), chrono_tz::Europe::Amsterdam);
                assert_eq!(dt.hour(), 12);
            }
            other => panic!("unexpected {:?}", other),
        }

        let plain = TypeDesc::parse("DateTime").unwrap();
        let server = ctx().with_timezone(chrono_tz::Asia::Tokyo);
        let col = DateTimeColumn::new("t", &plain, &server).unwrap();
        assert_eq!(col.timezone(), chrono_tz::Asia::Tokyo);
    }

    #[test]
    fn test_datetime_truncates_and_zeroes_out_of_range() {
        let desc = TypeDesc::parse("DateTime").unwrap();
        let mut col = DateTimeColumn::new("t", &desc, &ctx()).unwrap();
        let dt = Utc.with_ymd_and_hms(2020, 5, 1, 1, 2, 3).unwrap() + TimeDelta::milliseconds(456);
        col.append_row(&Value::from(dt)).unwrap();
        col.append_row(&Value::from(Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap()))
            .unwrap();
        assert_eq!(col.row(0), Value::from(Utc.with_ymd_and_hms(2020, 5, 1, 1, 2, 3).unwrap()));
        assert_eq!(col.seconds()[1], 0);
    }

    #[test]
    fn test_datetime64_precision() {
        let desc = TypeDesc::parse("DateTime64(3, 'UTC')").unwrap();
        let mut col = DateTime64Column::new("t", &desc, &ctx()).unwrap();
        let dt = Utc.with_ymd_and_hms(2020, 5, 1, 1, 2, 3).unwrap() + TimeDelta::microseconds(456_789);
        col.append_row(&Value::from(dt)).unwrap();
        assert_eq!(col.ticks()[0], 1_588_294_923_456);
        assert_eq!(
            col.row(0),
            Value::from(Utc.with_ymd_and_hms(2020, 5, 1, 1, 2, 3).unwrap() + TimeDelta::milliseconds(456))
        );

        let before = Utc.with_ymd_and_hms(1899, 12, 31, 23, 59, 59).unwrap();
        assert!(matches!(
            col.append_row(&Value::from(before)),
            Err(CodecError::DateOverflow { .. })
        ));

        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        assert_eq!(buffer.as_bytes(), &1_588_294_923_456i64.to_le_bytes());
    }

    #[test]
    fn test_datetime64_nanosecond_limit() {
        let desc = TypeDesc::parse("DateTime64(9)").unwrap();
        let mut col = DateTime64Column::new("t", &desc, &ctx()).unwrap();
        let late = Utc.with_ymd_and_hms(2290, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            col.append_row(&Value::from(late)),
            Err(CodecError::DateOverflow { .. })
        ));
        let negative = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 59).unwrap() + TimeDelta::nanoseconds(5);
        col.append_row(&Value::from(negative)).unwrap();
        assert_eq!(col.row(0), Value::from(negative));
    }
}
