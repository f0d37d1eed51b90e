//! Text rendering of saved measurements.

use chrono::{Datelike, Local, NaiveDate};

use crate::error::Result;
use crate::measurement::MeasurementRecord;
use crate::workflow::SavedMeasurement;

/// Shown when there is nothing to list.
pub const EMPTY_HISTORY: &str = "No measurement history found";

/// Shown after a record has been stored locally.
pub const SAVED_MESSAGE: &str = "The measurement has been successfully saved to your history.";

/// How a list of records is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryFormat {
    /// One block per record.
    #[default]
    Plain,
    /// Aligned columns.
    Table,
    /// The stored JSON shape.
    Json,
}

/// `October 17th, 2026`.
#[must_use]
pub fn long_date(date: NaiveDate) -> String {
    let day = date.day();
    format!(
        "{} {}{}, {}",
        date.format("%B"),
        day,
        ordinal_suffix(day),
        date.year()
    )
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Weight with one decimal, e.g. `9.8 kg`.
#[must_use]
pub fn format_weight(kg: f64) -> String {
    format!("{kg:.1} kg")
}

/// Height with one decimal, e.g. `76.0 cm`.
#[must_use]
pub fn format_height(cm: f64) -> String {
    format!("{cm:.1} cm")
}

fn measured_on(record: &MeasurementRecord) -> NaiveDate {
    record.measurement_date.with_timezone(&Local).date_naive()
}

/// Renders a list of records in insertion order.
#[derive(Debug, Clone, Copy)]
pub struct HistoryView<'a> {
    records: &'a [MeasurementRecord],
    start_hint: &'a str,
}

impl<'a> HistoryView<'a> {
    /// Create a view over `records`.
    #[must_use]
    pub fn new(records: &'a [MeasurementRecord]) -> Self {
        Self {
            records,
            start_hint: "growrec measure",
        }
    }

    /// The command suggested when the history is empty.
    #[must_use]
    pub fn with_start_hint(mut self, hint: &'a str) -> Self {
        self.start_hint = hint;
        self
    }

    /// Whether there is anything to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render in the given format.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render(&self, format: HistoryFormat) -> Result<String> {
        match format {
            HistoryFormat::Json => Ok(serde_json::to_string_pretty(self.records)?),
            _ if self.is_empty() => Ok(self.render_empty()),
            HistoryFormat::Plain => Ok(self.render_plain()),
            HistoryFormat::Table => Ok(self.render_table()),
        }
    }

    fn render_empty(&self) -> String {
        format!(
            "{EMPTY_HISTORY}\n\nStart a new measurement with `{}`.\n",
            self.start_hint
        )
    }

    fn render_plain(&self) -> String {
        let mut out = String::new();
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            push_line(&mut out, &record.name);
            push_line(&mut out, format!("  Date:    {}", long_date(measured_on(record))));
            push_line(&mut out, format!("  Weight:  {}", format_weight(record.weight_kg)));
            push_line(&mut out, format!("  Height:  {}", format_height(record.height_cm)));
        }
        out
    }

    fn render_table(&self) -> String {
        let rows: Vec<[String; 5]> = self
            .records
            .iter()
            .map(|r| {
                [
                    r.name.clone(),
                    long_date(measured_on(r)),
                    format_weight(r.weight_kg),
                    format_height(r.height_cm),
                    r.id.chars().take(8).collect(),
                ]
            })
            .collect();

        let header = ["NAME", "DATE", "WEIGHT", "HEIGHT", "ID"];
        let mut widths = header.map(|h| h.chars().count());
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        push_row(&mut out, &header, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_row(&mut out, &rule, &widths);
        for row in &rows {
            push_row(&mut out, row, &widths);
        }
        out
    }
}

fn push_row<S: AsRef<str>>(out: &mut String, cells: &[S], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{:<width$}", cell.as_ref()))
        .collect();
    push_line(out, line.join("  ").trim_end());
}

fn push_line(out: &mut String, line: impl AsRef<str>) {
    out.push_str(line.as_ref());
    out.push('\n');
}

/// Full details of one record.
#[must_use]
pub fn render_record(record: &MeasurementRecord) -> String {
    let mut out = String::new();
    push_line(&mut out, format!("  Name:      {}", record.name));
    push_line(&mut out, format!("  Parent:    {}", record.parent_name));
    push_line(&mut out, format!("  Born:      {}", long_date(record.dob)));
    push_line(&mut out, format!("  Age:       {}", record.age));
    push_line(&mut out, format!("  Weight:    {}", format_weight(record.weight_kg)));
    push_line(&mut out, format!("  Height:    {}", format_height(record.height_cm)));
    push_line(&mut out, format!("  Measured:  {}", long_date(measured_on(record))));
    push_line(&mut out, format!("  ID:        {}", record.id));
    out
}

/// The confirmation shown once a measurement is saved.
#[derive(Debug, Clone, Copy)]
pub struct SuccessView<'a> {
    saved: &'a SavedMeasurement,
}

impl<'a> SuccessView<'a> {
    /// Create a view of a saved measurement.
    #[must_use]
    pub fn new(saved: &'a SavedMeasurement) -> Self {
        Self { saved }
    }

    /// Render the confirmation, the record and its QR code.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        push_line(&mut out, "Measurement Saved");
        push_line(&mut out, SAVED_MESSAGE);
        out.push('\n');
        out.push_str(&render_record(&self.saved.record));
        out.push('\n');
        match &self.saved.qr {
            Some(qr) => {
                push_line(&mut out, &qr.text);
            }
            None => {
                push_line(&mut out, "QR code unavailable for this measurement.");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityRecord;
    use crate::measurement::ReadingSample;
    use crate::qr::QrEncoder;
    use chrono::{TimeZone, Utc};

    fn record(name: &str, weight: f64, height: f64) -> MeasurementRecord {
        let identity = IdentityRecord {
            name: name.to_string(),
            parent_name: "Bob".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            age: 1,
        };
        MeasurementRecord::new(
            &identity,
            ReadingSample::new(weight, height),
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_long_date() {
        let d = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(long_date(d(2026, 10, 17)), "October 17th, 2026");
        assert_eq!(long_date(d(2024, 6, 1)), "June 1st, 2024");
        assert_eq!(long_date(d(2024, 6, 2)), "June 2nd, 2024");
        assert_eq!(long_date(d(2024, 6, 3)), "June 3rd, 2024");
        assert_eq!(long_date(d(2024, 6, 11)), "June 11th, 2024");
        assert_eq!(long_date(d(2024, 6, 12)), "June 12th, 2024");
        assert_eq!(long_date(d(2024, 6, 13)), "June 13th, 2024");
        assert_eq!(long_date(d(2024, 6, 21)), "June 21st, 2024");
        assert_eq!(long_date(d(2024, 6, 22)), "June 22nd, 2024");
        assert_eq!(long_date(d(2024, 5, 31)), "May 31st, 2024");
    }

    #[test]
    fn test_units() {
        assert_eq!(format_weight(0.0), "0.0 kg");
        assert_eq!(format_weight(9.84), "9.8 kg");
        assert_eq!(format_height(76.0), "76.0 cm");
        assert_eq!(format_height(0.0), "0.0 cm");
    }

    #[test]
    fn test_empty_state() {
        let out = HistoryView::new(&[]).render(HistoryFormat::Plain).unwrap();
        assert!(out.starts_with(EMPTY_HISTORY));
        assert!(out.contains("growrec measure"));

        let out = HistoryView::new(&[])
            .with_start_hint("growrec measure --name Alice")
            .render(HistoryFormat::Table)
            .unwrap();
        assert!(out.contains("--name Alice"));

        let out = HistoryView::new(&[]).render(HistoryFormat::Json).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_plain_keeps_insertion_order() {
        let records = vec![record("Zed", 16.0, 101.5), record("Amy", 0.0, 0.0)];
        let out = HistoryView::new(&records)
            .render(HistoryFormat::Plain)
            .unwrap();

        let zed = out.find("Zed").unwrap();
        let amy = out.find("Amy").unwrap();
        assert!(zed < amy);
        assert!(out.contains("16.0 kg"));
        assert!(out.contains("101.5 cm"));
        assert!(out.contains("0.0 kg"));
        assert!(out.contains("0.0 cm"));
        assert!(out.contains("June 1st, 2024"));
    }

    #[test]
    fn test_table_columns_align() {
        let records = vec![record("Alice", 9.8, 76.0), record("Maximilian", 12.25, 88.0)];
        let out = HistoryView::new(&records)
            .render(HistoryFormat::Table)
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[1].starts_with("----------"));
        let date_col = lines[0].find("DATE").unwrap();
        assert_eq!(lines[2].find("June").unwrap(), date_col);
        assert_eq!(lines[3].find("June").unwrap(), date_col);
        assert!(lines[3].contains("12.2 kg") || lines[3].contains("12.3 kg"));
        assert!(lines[2].ends_with(&records[0].id[..8]));
    }

    #[test]
    fn test_json_matches_stored_shape() {
        let records = vec![record("Alice", 9.8, 76.0)];
        let out = HistoryView::new(&records).render(HistoryFormat::Json).unwrap();
        let back: Vec<MeasurementRecord> = serde_json::from_str(&out).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_render_record() {
        let r = record("Alice", 9.8, 76.0);
        let out = render_record(&r);
        assert!(out.contains("Parent:    Bob"));
        assert!(out.contains("Born:      January 1st, 2023"));
        assert!(out.contains(&r.id));

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "  Name:      Alice");
        assert_eq!(lines[4], "  Weight:    9.8 kg");
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_success_view_layout() {
        let saved = SavedMeasurement {
            record: record("Alice", 9.8, 76.0),
            qr: None,
        };
        let out = SuccessView::new(&saved).render();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "Measurement Saved");
        assert_eq!(lines[1], SAVED_MESSAGE);
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "  Name:      Alice");
        assert_eq!(lines[11], "");
        assert_eq!(lines[12], "QR code unavailable for this measurement.");
        assert_eq!(lines.len(), 13);
    }

    #[test]
    fn test_success_view_with_qr() {
        let r = record("Alice", 9.8, 76.0);
        let qr = QrEncoder::default().encode(&r.qr_payload()).ok();
        let saved = SavedMeasurement { record: r, qr };

        let out = SuccessView::new(&saved).render();
        assert!(out.contains(SAVED_MESSAGE));
        assert!(out.contains(&saved.qr.as_ref().unwrap().text));
    }

    #[test]
    fn test_success_view_without_qr() {
        let saved = SavedMeasurement {
            record: record("Alice", 9.8, 76.0),
            qr: None,
        };
        let out = SuccessView::new(&saved).render();
        assert!(out.contains(SAVED_MESSAGE));
        assert!(out.contains("QR code unavailable"));
    }
}
