//! Event record representation.
//!
//! A [`Record`] captures one event destined for an ingestion endpoint or a
//! local log file. Records are immutable once built: the builder-style
//! `with_*` methods consume the value, and deliverers take ownership when a
//! record is handed to [`Deliverer::add`](crate::Deliverer::add).
//!
//! The serialized form is a single JSON object whose reserved keys carry a
//! `#` prefix, with user properties nested under `properties`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};

/// Timestamp layout used for `#time` and timestamp properties.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Kind of event carried by a [`Record`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "track")]
    Track,
    #[serde(rename = "track_update")]
    TrackUpdate,
    #[serde(rename = "track_overwrite")]
    TrackOverwrite,
    #[serde(rename = "user_set")]
    UserSet,
    #[serde(rename = "user_setOnce")]
    UserSetOnce,
    #[serde(rename = "user_add")]
    UserAdd,
    #[serde(rename = "user_unset")]
    UserUnset,
    #[serde(rename = "user_append")]
    UserAppend,
    #[serde(rename = "user_del")]
    UserDel,
}

impl EventType {
    /// Wire name of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::TrackUpdate => "track_update",
            Self::TrackOverwrite => "track_overwrite",
            Self::UserSet => "user_set",
            Self::UserSetOnce => "user_setOnce",
            Self::UserAdd => "user_add",
            Self::UserUnset => "user_unset",
            Self::UserAppend => "user_append",
            Self::UserDel => "user_del",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed value of a record property.
///
/// Timestamps serialize with [`TIME_FORMAT`]. JSON has no timestamp type, so
/// parsing always yields [`PropertyValue::String`] for string values; use
/// [`as_timestamp`](Self::as_timestamp) to read either form as a time.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(serde_json::Number),
    Timestamp(#[serde(with = "time_format")] NaiveDateTime),
    String(String),
}

impl PropertyValue {
    /// The value as a timestamp, parsing strings laid out as [`TIME_FORMAT`].
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(time) => Some(*time),
            Self::String(raw) => NaiveDateTime::parse_from_str(raw, TIME_FORMAT).ok(),
            Self::Bool(_) | Self::Number(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(raw) => Some(raw),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for PropertyValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Bool(bool),
            Number(serde_json::Number),
            String(String),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Bool(value) => Self::Bool(value),
            Wire::Number(value) => Self::Number(value),
            Wire::String(value) => Self::String(value),
        })
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for PropertyValue {
    /// Non-finite floats have no JSON representation and become `0`.
    fn from(value: f64) -> Self {
        Self::Number(serde_json::Number::from_f64(value).unwrap_or_else(|| 0.into()))
    }
}

impl From<NaiveDateTime> for PropertyValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// One event to deliver or persist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "#type")]
    event_type: EventType,
    #[serde(rename = "#event_name", default, skip_serializing_if = "Option::is_none")]
    event_name: Option<String>,
    #[serde(rename = "#account_id", default, skip_serializing_if = "Option::is_none")]
    account_id: Option<String>,
    #[serde(rename = "#distinct_id", default, skip_serializing_if = "Option::is_none")]
    distinct_id: Option<String>,
    #[serde(rename = "#time", with = "time_format")]
    time: NaiveDateTime,
    #[serde(rename = "#ip", default, skip_serializing_if = "Option::is_none")]
    ip: Option<String>,
    #[serde(rename = "#uuid", default, skip_serializing_if = "Option::is_none")]
    uuid: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, PropertyValue>,
}

impl Record {
    /// Create a record of `event_type` stamped with `time`.
    pub fn new(event_type: EventType, time: NaiveDateTime) -> Self {
        Self {
            event_type,
            event_name: None,
            account_id: None,
            distinct_id: None,
            time,
            ip: None,
            uuid: None,
            properties: BTreeMap::new(),
        }
    }

    /// Create a `track` record named `event_name`, stamped with the local
    /// wall-clock time truncated to milliseconds.
    pub fn track(event_name: impl Into<String>) -> Self {
        Self::new(EventType::Track, now_millis()).with_event_name(event_name)
    }

    pub fn with_event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = Some(name.into());
        self
    }

    pub fn with_account_id(mut self, id: impl Into<String>) -> Self {
        self.account_id = Some(id.into());
        self
    }

    pub fn with_distinct_id(mut self, id: impl Into<String>) -> Self {
        self.distinct_id = Some(id.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    /// Attach a single property, replacing any previous value under `key`.
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: BTreeMap<String, PropertyValue>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn event_name(&self) -> Option<&str> {
        self.event_name.as_deref()
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn distinct_id(&self) -> Option<&str> {
        self.distinct_id.as_deref()
    }

    pub fn time(&self) -> NaiveDateTime {
        self.time
    }

    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    /// Serialize the record as a single JSON line without a trailing newline.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a record previously produced by [`Record::to_json_line`].
    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim_end_matches(['\r', '\n']))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.event_type,
            self.event_name.as_deref().unwrap_or("-")
        )
    }
}

/// Current local time at millisecond precision, matching the wire layout.
fn now_millis() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(now)
}

mod time_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::TIME_FORMAT;

    pub fn serialize<S: Serializer>(
        time: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(TIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIME_FORMAT).map_err(D::Error::custom)
    }
}
