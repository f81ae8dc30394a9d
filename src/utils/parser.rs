//! Text helpers shared by commands and greetings.

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Format a duration with more detail (hours + minutes).
pub fn format_duration(secs: u64) -> String {
    fn unit(n: u64, name: &str) -> String {
        if n == 1 {
            format!("{} {}", n, name)
        } else {
            format!("{} {}s", n, name)
        }
    }

    if secs < 60 {
        unit(secs, "second")
    } else if secs < 3600 {
        unit(secs / 60, "minute")
    } else if secs < 86400 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins > 0 {
            format!("{} {}", unit(hours, "hour"), unit(mins, "minute"))
        } else {
            unit(hours, "hour")
        }
    } else {
        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        if hours > 0 {
            format!("{} {}", unit(days, "day"), unit(hours, "hour"))
        } else {
            unit(days, "day")
        }
    }
}

/// Parse duration string (e.g., "1h", "30m", "1d").
///
/// Supported units:
/// - m: minutes
/// - h: hours
/// - d: days
/// - w: weeks
pub fn parse_duration(input: &str) -> Option<std::time::Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let (split, unit) = input.char_indices().last()?;
    let amount: u64 = input[..split].parse().ok()?;

    let multiplier = match unit {
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        'w' => 604800,
        _ => return None,
    };

    Some(std::time::Duration::from_secs(amount.checked_mul(multiplier)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30m"), Some(std::time::Duration::from_secs(1800)));
        assert_eq!(parse_duration("1h"), Some(std::time::Duration::from_secs(3600)));
        assert_eq!(parse_duration("1d"), Some(std::time::Duration::from_secs(86400)));
        assert_eq!(parse_duration("1w"), Some(std::time::Duration::from_secs(604800)));
        assert_eq!(parse_duration("invalid"), None);
        assert_eq!(parse_duration("h"), None);
    }

    #[test]
    fn test_parse_duration_rejects_odd_input() {
        assert_eq!(parse_duration("5é"), None);
        assert_eq!(parse_duration("é"), None);
        assert_eq!(parse_duration("99999999999999999w"), None);
        assert_eq!(parse_duration("-5m"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(1), "1 second");
        assert_eq!(format_duration(300), "5 minutes");
        assert_eq!(format_duration(5400), "1 hour 30 minutes");
        assert_eq!(format_duration(3 * 86400), "3 days");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<a & b>"), "&lt;a &amp; b&gt;");
    }
}
