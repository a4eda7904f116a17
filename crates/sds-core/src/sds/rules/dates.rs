//! Issue date normalization to `DD/MM/YYYY`.

use chrono::{Datelike, NaiveDate};
use tracing::info;

use super::patterns::{DATE_DMY, DATE_YMD};

/// Which label introduced a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLabel {
    Issue,
    Revision,
    Prepared,
    LastRevised,
    VersionDate,
    Unlabelled,
}

impl DateLabel {
    /// Classify a label capture such as `"Date of issue"` or `"Revision"`.
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return Self::Unlabelled;
        };
        let label = label.trim().to_lowercase();
        if label.starts_with("last revised") {
            Self::LastRevised
        } else if label.starts_with("revision") {
            Self::Revision
        } else if label.starts_with("version") {
            Self::VersionDate
        } else if label.starts_with("prepared") {
            Self::Prepared
        } else if label.contains("issue") {
            Self::Issue
        } else {
            Self::Unlabelled
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Revision => "revision",
            Self::Prepared => "prepared",
            Self::LastRevised => "last revised",
            Self::VersionDate => "version date",
            Self::Unlabelled => "unlabelled",
        }
    }
}

/// Normalize a date against the current year.
pub fn normalize_date(raw: &str, label: DateLabel) -> String {
    normalize_date_with_reference(raw, label, chrono::Local::now().year())
}

/// Normalize a date, resolving two-digit years against `reference_year`.
///
/// Day-first is preferred; month-first is used only when day-first is not a
/// calendar date. Anything else is returned trimmed and unchanged.
pub fn normalize_date_with_reference(raw: &str, label: DateLabel, reference_year: i32) -> String {
    let trimmed = raw.trim();

    if let Some(caps) = DATE_YMD.captures(trimmed) {
        let parsed = (caps[1].parse(), caps[2].parse(), caps[3].parse());
        if let (Ok(year), Ok(month), Ok(day)) = parsed {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return format_date(date);
            }
        }
        return trimmed.to_string();
    }

    let Some(caps) = DATE_DMY.captures(trimmed) else {
        return trimmed.to_string();
    };

    let (Ok(first), Ok(second)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
        return trimmed.to_string();
    };
    let Some(year) = resolve_year(&caps[3], reference_year) else {
        return trimmed.to_string();
    };

    let day_first = NaiveDate::from_ymd_opt(year, second, first);
    let month_first = NaiveDate::from_ymd_opt(year, first, second);

    match (day_first, month_first) {
        (Some(date), Some(_)) if first != second => {
            info!(
                "Ambiguous {} date '{}'; reading day first as {}",
                label.as_str(),
                trimmed,
                format_date(date)
            );
            format_date(date)
        }
        (Some(date), _) => format_date(date),
        (None, Some(date)) => {
            info!(
                "{} date '{}' is not valid day first; reading month first as {}",
                label.as_str(),
                trimmed,
                format_date(date)
            );
            format_date(date)
        }
        (None, None) => trimmed.to_string(),
    }
}

/// Four-digit years as written; two-digit years in whichever of 19xx or 20xx
/// is closest to `reference_year`, ties going to the earlier.
fn resolve_year(text: &str, reference_year: i32) -> Option<i32> {
    let year: i32 = text.parse().ok()?;
    if text.len() == 4 {
        return Some(year);
    }
    if text.len() != 2 {
        return None;
    }

    let earlier = 1900 + year;
    let later = 2000 + year;
    if (later - reference_year).abs() < (earlier - reference_year).abs() {
        Some(later)
    } else {
        Some(earlier)
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
