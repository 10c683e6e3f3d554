//! Quiet hours: a local time-of-day window, possibly wrapping midnight.

use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// A wall-clock time with minute resolution, written `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn minute_of_day(&self) -> u16 {
        u16::from(self.hour) * 60 + u16::from(self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got '{s}'"))?;
        if m.len() != 2 || h.is_empty() || h.len() > 2 {
            return Err(format!("expected HH:MM, got '{s}'"));
        }
        let hour: u8 = h.parse().map_err(|_| format!("bad hour in '{s}'"))?;
        let minute: u8 = m.parse().map_err(|_| format!("bad minute in '{s}'"))?;
        TimeOfDay::new(hour, minute).ok_or_else(|| format!("'{s}' is not a time of day"))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// The window `[start, end)`. When `start > end` the window crosses midnight
/// and covers `[start, 24:00) ∪ [00:00, end)`. `start == end` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl QuietHours {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    pub fn contains_minute(&self, minute_of_day: u16) -> bool {
        let minute = minute_of_day % MINUTES_PER_DAY;
        let start = self.start.minute_of_day();
        let end = self.end.minute_of_day();
        if start > end {
            minute >= start || minute < end
        } else {
            minute >= start && minute < end
        }
    }

    /// Whether `now` (local wall time) falls inside the window.
    pub fn is_active(&self, now: &DateTime<FixedOffset>) -> bool {
        let minute = (now.hour() * 60 + now.minute()) as u16;
        self.contains_minute(minute)
    }
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            start: TimeOfDay { hour: 23, minute: 30 },
            end: TimeOfDay { hour: 7, minute: 0 },
        }
    }
}

impl fmt::Display for QuietHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}–{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window(start: &str, end: &str) -> QuietHours {
        QuietHours::new(start.parse().unwrap(), end.parse().unwrap())
    }

    fn local(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 1, 15, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_wrapping_window() {
        let q = window("23:30", "07:00");
        assert!(q.is_active(&local(23, 45)));
        assert!(q.is_active(&local(6, 0)));
        assert!(q.is_active(&local(0, 0)));
        assert!(!q.is_active(&local(12, 0)));
        assert!(!q.is_active(&local(23, 29)));
        // End is exclusive
        assert!(!q.is_active(&local(7, 0)));
        assert!(q.is_active(&local(23, 30)));
    }

    #[test]
    fn test_same_day_window() {
        let q = window("13:00", "14:30");
        assert!(q.is_active(&local(13, 0)));
        assert!(q.is_active(&local(14, 29)));
        assert!(!q.is_active(&local(14, 30)));
        assert!(!q.is_active(&local(12, 59)));
    }

    #[test]
    fn test_empty_window() {
        let q = window("22:00", "22:00");
        assert!(!q.is_active(&local(22, 0)));
        assert!(!q.is_active(&local(3, 0)));
    }

    #[test]
    fn test_uses_local_offset() {
        let q = window("23:30", "07:00");
        // 22:45 UTC is 23:45 at UTC+1
        let plus_one = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2026, 1, 15, 23, 45, 0)
            .unwrap();
        assert!(q.is_active(&plus_one));
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!("07:05".parse::<TimeOfDay>().unwrap().minute_of_day(), 425);
        assert_eq!("7:05".parse::<TimeOfDay>().unwrap().to_string(), "07:05");
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("1200".parse::<TimeOfDay>().is_err());
        assert!("ab:cd".parse::<TimeOfDay>().is_err());
        assert!("12:5".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let q = QuietHours::default();
        let json = serde_json::to_string(&q).unwrap();
        assert_eq!(json, r#"{"start":"23:30","end":"07:00"}"#);
        let back: QuietHours = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q);
        assert!(serde_json::from_str::<QuietHours>(r#"{"start":"25:00","end":"07:00"}"#).is_err());
    }
}
