use chrono::{Duration, NaiveDate, NaiveDateTime};

pub const DATE_TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FMT: &str = "%Y-%m-%d";

/// Parses the wire datetime format, tolerating a bare date (midnight).
pub fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, DATE_TIME_FMT) {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, DATE_FMT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn from_start(start: NaiveDateTime, duration_minutes: i64) -> Self {
        Self {
            start,
            end: start + Duration::minutes(duration_minutes),
        }
    }

    /// Two sessions conflict when their windows share any interior time.
    /// Back-to-back sessions (one ends exactly when the other starts) do not
    /// conflict.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// One assignment row for a (course, student) pair, the student's submission
/// score left-joined in.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentOutcome {
    pub max_score: f64,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSummary {
    pub total_assignments: usize,
    pub completed_assignments: usize,
    pub progress_percentage: f64,
    pub average_score: f64,
}

pub fn course_progress<I>(outcomes: I) -> ProgressSummary
where
    I: IntoIterator<Item = AssignmentOutcome>,
{
    let mut total: usize = 0;
    let mut completed: usize = 0;
    let mut percent_sum: f64 = 0.0;

    for o in outcomes {
        total += 1;
        if let Some(score) = o.score {
            completed += 1;
            if o.max_score > 0.0 {
                percent_sum += 100.0 * score / o.max_score;
            }
        }
    }

    let progress_percentage = if total > 0 {
        100.0 * (completed as f64) / (total as f64)
    } else {
        0.0
    };
    let average_score = if completed > 0 {
        percent_sum / (completed as f64)
    } else {
        0.0
    };

    ProgressSummary {
        total_assignments: total,
        completed_assignments: completed,
        progress_percentage,
        average_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(raw: &str) -> NaiveDateTime {
        parse_date_time(raw).expect("datetime")
    }

    #[test]
    fn parse_accepts_datetime_and_bare_date() {
        assert_eq!(
            dt("2025-03-01 10:30:00"),
            dt("2025-03-01T10:30:00"),
        );
        assert_eq!(dt("2025-03-01"), dt("2025-03-01 00:00:00"));
        assert!(parse_date_time("yesterday").is_none());
    }

    #[test]
    fn windows_conflict_only_on_interior_overlap() {
        let a = TimeWindow::from_start(dt("2025-03-01 10:00:00"), 60);
        let mid = TimeWindow::from_start(dt("2025-03-01 10:30:00"), 60);
        let touch = TimeWindow::from_start(dt("2025-03-01 11:00:00"), 60);
        let contained = TimeWindow::from_start(dt("2025-03-01 10:15:00"), 15);

        assert!(a.overlaps(&mid));
        assert!(mid.overlaps(&a));
        assert!(a.overlaps(&contained));
        // Back-to-back sessions share only the 11:00 boundary.
        assert!(!a.overlaps(&touch));
        assert!(!touch.overlaps(&a));
    }

    #[test]
    fn progress_empty_course_is_all_zero() {
        let s = course_progress(std::iter::empty());
        assert_eq!(s.total_assignments, 0);
        assert_eq!(s.completed_assignments, 0);
        assert_eq!(s.progress_percentage, 0.0);
        assert_eq!(s.average_score, 0.0);
    }

    #[test]
    fn progress_counts_only_graded_submissions() {
        let s = course_progress(vec![
            AssignmentOutcome {
                max_score: 100.0,
                score: Some(80.0),
            },
            AssignmentOutcome {
                max_score: 50.0,
                score: None,
            },
        ]);
        assert_eq!(s.total_assignments, 2);
        assert_eq!(s.completed_assignments, 1);
        assert!((s.progress_percentage - 50.0).abs() < 1e-9);
        assert!((s.average_score - 80.0).abs() < 1e-9);
    }

    #[test]
    fn progress_averages_percentages_not_raw_scores() {
        let s = course_progress(vec![
            AssignmentOutcome {
                max_score: 100.0,
                score: Some(90.0),
            },
            AssignmentOutcome {
                max_score: 50.0,
                score: Some(25.0),
            },
        ]);
        assert!((s.average_score - 70.0).abs() < 1e-9);
        assert!((s.progress_percentage - 100.0).abs() < 1e-9);
    }
}
