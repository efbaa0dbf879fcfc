//! Report command: render the stored statistics.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use slouch_core::{Activity, Bucket, HISTORY_CAPACITY, StatisticsRecord, TimeWindow};
use slouch_store::{KeyValueStore, load_statistics};

// ========== Formatting Helpers ==========

/// Formats seconds as `Xh YYm`, dropping leftover seconds.
pub fn format_duration_hm(secs: u64) -> String {
    let total_minutes = secs / 60;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    format!("{hours}h {minutes:02}m")
}

/// Formats a percentage rounded to a whole number, e.g. `33%`.
#[allow(clippy::cast_possible_truncation)]
pub fn format_percentage(percentage: f64) -> String {
    format!("{}%", percentage.round() as i64)
}

fn format_optional_percentage(percentage: Option<f64>) -> String {
    percentage.map_or_else(|| "--%".to_string(), format_percentage)
}

/// `--` for an empty bucket, otherwise the bad share and both durations.
fn format_bucket(bad: u64, total: u64, percentage: f64) -> String {
    if total == 0 {
        return format!("{:>4}", "--");
    }
    format!(
        "{:>4}  ({} of {})",
        format_percentage(percentage),
        format_duration_hm(bad),
        format_duration_hm(total)
    )
}

fn bucket_line(bucket: &Bucket) -> String {
    format_bucket(bucket.bad, bucket.total, bucket.bad_percentage())
}

fn section(output: &mut String, title: &str) -> std::fmt::Result {
    writeln!(output)?;
    writeln!(output, "{title}")?;
    writeln!(output, "{}", "─".repeat(title.chars().count()))
}

// ========== Report Generation ==========

/// Formats the human-readable report.
pub fn format_report(record: &StatisticsRecord) -> Result<String> {
    let mut output = String::new();

    if record.last_used_date_str.is_empty() {
        writeln!(output, "POSTURE REPORT")?;
        writeln!(output)?;
        writeln!(output, "No posture sessions recorded yet.")?;
        return Ok(output);
    }

    writeln!(output, "POSTURE REPORT: {}", record.last_used_date_str)?;

    section(&mut output, "TODAY")?;
    let today = Bucket {
        bad: record.daily_bad_posture_duration,
        total: record.daily_duration,
    };
    writeln!(output, "{:<15}{}", "Bad posture", bucket_line(&today))?;

    section(&mut output, "OVERALL")?;
    writeln!(
        output,
        "{:<23}{}",
        "Longest good posture",
        format_duration_hm(record.longest_good_posture_duration)
    )?;
    writeln!(
        output,
        "{:<23}{}",
        "Lowest daily",
        format_optional_percentage(record.lowest_bad_posture_percentage)
    )?;
    writeln!(
        output,
        "{:<23}{}",
        "Highest daily",
        format_optional_percentage(record.highest_bad_posture_percentage)
    )?;

    section(&mut output, "BY TIME OF DAY")?;
    for window in TimeWindow::ALL {
        let bucket = record.time_window_bucket(window);
        writeln!(output, "{:<15}{}", window.name(), bucket_line(bucket))?;
    }

    section(&mut output, "BY ACTIVITY")?;
    for activity in Activity::ALL {
        let bucket = record.activity_bucket(activity);
        writeln!(output, "{:<15}{}", activity.as_str(), bucket_line(bucket))?;
    }

    section(&mut output, &format!("LAST {HISTORY_CAPACITY} DAYS"))?;
    if record.history.is_empty() {
        writeln!(output, "(no completed days)")?;
    }
    for entry in &record.history {
        writeln!(
            output,
            "{:<15}{}",
            entry.date,
            format_bucket(
                entry.bad_posture_duration,
                entry.total_duration,
                entry.bad_posture_percentage
            )
        )?;
    }

    Ok(output)
}

/// Formats the statistics record as JSON, in its stored shape.
pub fn format_report_json(record: &StatisticsRecord) -> Result<String> {
    Ok(serde_json::to_string_pretty(record)?)
}

// ========== Public Interface ==========

/// Runs the report command.
pub fn run<W: Write, S: KeyValueStore + ?Sized>(writer: &mut W, store: &S, json: bool) -> Result<()> {
    let record = load_statistics(store)?;

    if json {
        writeln!(writer, "{}", format_report_json(&record)?)?;
    } else {
        write!(writer, "{}", format_report(&record)?)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slouch_core::DailyEntry;
    use slouch_store::{MemoryStore, save_statistics};

    use insta::assert_snapshot;

    fn sample_record() -> StatisticsRecord {
        let mut record = StatisticsRecord {
            daily_bad_posture_duration: 300,
            daily_duration: 1200,
            last_used_date_str: "2025-01-15".to_string(),
            lowest_bad_posture_percentage: Some(10.0),
            highest_bad_posture_percentage: Some(30.0),
            longest_good_posture_duration: 3900,
            ..StatisticsRecord::default()
        };
        record.history.push_back(DailyEntry {
            date: "2025-01-13".to_string(),
            bad_posture_duration: 60,
            total_duration: 600,
            bad_posture_percentage: 10.0,
        });
        record.history.push_back(DailyEntry {
            date: "2025-01-14".to_string(),
            bad_posture_duration: 180,
            total_duration: 600,
            bad_posture_percentage: 30.0,
        });
        record
            .time_window_bucket_mut(TimeWindow::from_index(3).unwrap())
            .add(300, 1200);
        record
            .time_window_bucket_mut(TimeWindow::from_index(4).unwrap())
            .add(90, 270);
        record.cumulative_work_duration.add(300, 1200);
        record.cumulative_entertainment_duration.add(45, 60);
        record
    }

    #[test]
    fn test_format_duration_hm() {
        assert_eq!(format_duration_hm(0), "0h 00m");
        assert_eq!(format_duration_hm(59), "0h 00m");
        assert_eq!(format_duration_hm(3900), "1h 05m");
        assert_eq!(format_duration_hm(36_000 + 59 * 60), "10h 59m");
    }

    #[test]
    fn test_format_percentage_rounds() {
        assert_eq!(format_percentage(33.333), "33%");
        assert_eq!(format_percentage(66.6), "67%");
        assert_eq!(format_percentage(0.0), "0%");
        assert_eq!(format_optional_percentage(None), "--%");
    }

    #[test]
    fn test_report_without_sessions() {
        let output = format_report(&StatisticsRecord::default()).unwrap();
        assert_eq!(output, "POSTURE REPORT\n\nNo posture sessions recorded yet.\n");
    }

    #[test]
    fn test_report_full_record() {
        let output = format_report(&sample_record()).unwrap();
        assert_snapshot!(output, @r"
POSTURE REPORT: 2025-01-15

TODAY
─────
Bad posture     25%  (0h 05m of 0h 20m)

OVERALL
───────
Longest good posture   1h 05m
Lowest daily           10%
Highest daily          30%

BY TIME OF DAY
──────────────
12am - 3am       --
3am - 6am        --
6am - 9am        --
9am - 12pm      25%  (0h 05m of 0h 20m)
12pm - 3pm      33%  (0h 01m of 0h 04m)
3pm - 6pm        --
6pm - 9pm        --
9pm - 12am       --

BY ACTIVITY
───────────
work            25%  (0h 05m of 0h 20m)
study            --
entertainment   75%  (0h 00m of 0h 01m)

LAST 120 DAYS
─────────────
2025-01-13      10%  (0h 01m of 0h 10m)
2025-01-14      30%  (0h 03m of 0h 10m)
");
    }

    #[test]
    fn test_report_first_day_has_no_history() {
        let record = StatisticsRecord {
            last_used_date_str: "2025-01-15".to_string(),
            ..StatisticsRecord::default()
        };
        let output = format_report(&record).unwrap();
        assert!(output.contains("Lowest daily           --%"));
        assert!(output.contains("(no completed days)"));
    }

    #[test]
    fn test_report_json_matches_stored_shape() {
        let json = format_report_json(&sample_record()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["dailyBadPostureDuration"], 300);
        assert_eq!(value["cumulativeWorkDuration"]["bad"], 300);
        assert_eq!(value["cumulativeTimeWindowDuration"][3]["name"], "9am - 12pm");
        assert_eq!(value["badPosturePercentageLast120Days"][1]["date"], "2025-01-14");
    }

    #[test]
    fn test_run_reads_from_store() {
        let mut store = MemoryStore::new();
        save_statistics(&mut store, &sample_record()).unwrap();

        let mut output = Vec::new();
        run(&mut output, &store, false).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("POSTURE REPORT: 2025-01-15\n"));
    }
}
