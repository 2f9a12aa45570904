//! Utility functions for atlas-zones

use chrono::{DateTime, Utc};

/// Width of section banners
pub const BANNER_WIDTH: usize = 60;

/// Current time
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now()
}

/// Documents each country gets out of a zone's total (integer division)
pub fn per_country_quota(total: usize, countries: usize) -> usize {
    if countries == 0 {
        0
    } else {
        total / countries
    }
}

/// Round to two decimal places
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Three-line section banner with a centered title
pub fn banner(title: &str) -> String {
    let rule = "=".repeat(BANNER_WIDTH);
    format!("{rule}\n{:^width$}\n{rule}", title, width = BANNER_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_country_quota() {
        assert_eq!(per_country_quota(1000, 2), 500);
        assert_eq!(per_country_quota(1000, 3), 333);
        assert_eq!(per_country_quota(1000, 0), 0);
        assert_eq!(per_country_quota(1, 4), 0);
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(10.0), 10.0);
        assert_eq!(round_cents(12.346), 12.35);
        assert_eq!(round_cents(99.991), 99.99);
    }

    #[test]
    fn test_banner_centers_title() {
        let b = banner("Zone Status");
        let lines: Vec<&str> = b.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), BANNER_WIDTH);
        assert_eq!(lines[1].len(), BANNER_WIDTH);
        assert_eq!(lines[1].trim(), "Zone Status");
    }
}
