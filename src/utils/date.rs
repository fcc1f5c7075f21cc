// Date expressions for due dates and expected closing dates

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone};

fn local_timestamp(datetime: NaiveDateTime) -> Result<i64> {
    Local
        .from_local_datetime(&datetime)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| anyhow!("Invalid local time: {}", datetime))
}

fn midnight(date: NaiveDate) -> Result<i64> {
    let datetime = date.and_hms_opt(0, 0, 0).ok_or_else(|| anyhow!("Invalid date"))?;
    local_timestamp(datetime)
}

/// Parse a date expression into a Unix timestamp.
///
/// Accepted: `2026-03-10`, `2026-03-10T14:30`, `today`/`aujourdhui`,
/// `tomorrow`/`demain`, and offsets such as `+3d` or `+2w`.
pub fn parse_date_expr(expr: &str) -> Result<i64> {
    let expr = expr.trim();
    if let Ok(date) = NaiveDate::parse_from_str(expr, "%Y-%m-%d") {
        return midnight(date);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(expr, "%Y-%m-%dT%H:%M") {
        return local_timestamp(datetime);
    }

    let today = Local::now().date_naive();
    match expr.to_lowercase().as_str() {
        "today" | "aujourdhui" => midnight(today),
        "tomorrow" | "demain" => midnight(today + Duration::days(1)),
        other => {
            let Some(offset) = other.strip_prefix('+') else {
                bail!("Unsupported date expression: {}", expr);
            };
            let (count, unit) = offset.split_at(offset.len().saturating_sub(1));
            let count: i64 = count
                .parse()
                .map_err(|_| anyhow!("Unsupported date expression: {}", expr))?;
            let days = match unit {
                "d" | "j" => count,
                "w" | "s" => count * 7,
                _ => bail!("Unsupported date expression: {}", expr),
            };
            midnight(today + Duration::days(days))
        }
    }
}

/// `YYYY-MM-DD` in local time
pub fn format_date(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// `YYYY-MM-DD HH:MM` in local time
pub fn format_datetime(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}
