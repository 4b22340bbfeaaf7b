use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DAYS_PER_YEAR: i64 = 365;
pub const DAYS_PER_MONTH: i64 = 30;

/// A coarse years/months/days span.
///
/// Conversion to and from a day count uses fixed 365-day years and 30-day
/// months, so `from_total_days(x.total_days())` can differ field-wise from `x`
/// (13 months becomes 1 year and 25 days).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub years: u32,
    pub months: u32,
    pub days: u32,
}

impl Span {
    pub const fn new(years: u32, months: u32, days: u32) -> Self {
        Self {
            years,
            months,
            days,
        }
    }

    pub const fn days(days: u32) -> Self {
        Self::new(0, 0, days)
    }

    pub fn total_days(&self) -> i64 {
        i64::from(self.years) * DAYS_PER_YEAR
            + i64::from(self.months) * DAYS_PER_MONTH
            + i64::from(self.days)
    }

    /// Greedily splits a day count into years, then months, then days.
    ///
    /// Negative counts are rejected rather than clamped.
    pub fn from_total_days(total: i64) -> Result<Self> {
        if total < 0 {
            bail!("span cannot be built from a negative day count: {total}");
        }
        let years = total / DAYS_PER_YEAR;
        let rest = total % DAYS_PER_YEAR;
        let months = rest / DAYS_PER_MONTH;
        let days = rest % DAYS_PER_MONTH;

        Ok(Self {
            years: u32::try_from(years).map_err(|_| anyhow!("span too large: {total} days"))?,
            months: months as u32,
            days: days as u32,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.total_days() == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.years > 0 {
            parts.push(format!("{}y", self.years));
        }
        if self.months > 0 {
            parts.push(format!("{}m", self.months));
        }
        if self.days > 0 || parts.is_empty() {
            parts.push(format!("{}d", self.days));
        }
        write!(f, "{}", parts.join(" "))
    }
}

impl FromStr for Span {
    type Err = String;

    /// Accepts forms like `7d`, `1y2m`, `1y 2m 3d`. A bare number means days.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err("Empty span".to_string());
        }
        if let Ok(days) = compact.parse::<u32>() {
            return Ok(Self::days(days));
        }

        let mut span = Span::default();
        let mut digits = String::new();
        for c in compact.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let value: u32 = digits
                .parse()
                .map_err(|_| format!("Invalid span: {}", s))?;
            digits.clear();
            let field = match c.to_ascii_lowercase() {
                'y' => &mut span.years,
                'm' => &mut span.months,
                'd' => &mut span.days,
                _ => return Err(format!("Invalid span unit '{}' in: {}", c, s)),
            };
            *field = field
                .checked_add(value)
                .ok_or_else(|| format!("Span too large: {}", s))?;
        }
        if !digits.is_empty() {
            return Err(format!("Missing unit after '{}' in: {}", digits, s));
        }
        Ok(span)
    }
}
