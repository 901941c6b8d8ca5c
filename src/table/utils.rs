use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])(\d{4})[-_]?(\d{2})[-_]?(\d{2})(?:[^0-9]|$)")
        .expect("iso date pattern should compile")
});

static US_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])(\d{1,2})-(\d{1,2})-(\d{4}|\d{2})(?:[^0-9]|$)")
        .expect("us date pattern should compile")
});

/// Extracts a reporting date from a disclosure file name, trying:
///  - `YYYY-MM-DD`, `YYYY_MM_DD` or a contiguous `YYYYMMDD`
///  - `M-D-YY` or `M-D-YYYY` as the Fed names its workbooks (`smccf-6-28-20.xlsx`)
///
/// Returns `None` when nothing in the name is a valid calendar date.
pub fn extract_date_from_filename(filename: &str) -> Option<NaiveDate> {
    for caps in ISO_DATE_RE.captures_iter(filename) {
        let (y, m, d) = (
            caps[1].parse::<i32>().ok()?,
            caps[2].parse::<u32>().ok()?,
            caps[3].parse::<u32>().ok()?,
        );
        if (2000..=2099).contains(&y) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                return Some(date);
            }
        }
    }

    for caps in US_DATE_RE.captures_iter(filename) {
        let (m, d) = (caps[1].parse::<u32>().ok()?, caps[2].parse::<u32>().ok()?);
        let y = match caps[3].len() {
            2 => 2000 + caps[3].parse::<i32>().ok()?,
            _ => caps[3].parse::<i32>().ok()?,
        };
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
            return Some(date);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fed_style_names() {
        let want = NaiveDate::from_ymd_opt(2020, 6, 28);
        assert_eq!(extract_date_from_filename("smccf-6-28-20.xlsx"), want);
        assert_eq!(
            extract_date_from_filename("MLF-6-15-2020.zip"),
            NaiveDate::from_ymd_opt(2020, 6, 15)
        );
    }

    #[test]
    fn iso_names() {
        let want = NaiveDate::from_ymd_opt(2020, 6, 10);
        assert_eq!(extract_date_from_filename("ppplf_2020-06-10.zip"), want);
        assert_eq!(extract_date_from_filename("ppplf_20200610"), want);
    }

    #[test]
    fn no_date() {
        assert_eq!(extract_date_from_filename("smccf.zip"), None);
        assert_eq!(extract_date_from_filename("report-13-45-20.zip"), None);
    }

    #[test]
    fn clean_str_unquotes() {
        assert_eq!(clean_str("  \" Acme \" "), "Acme");
        assert_eq!(clean_str("\""), "\"");
    }
}
