//! Identity form for the measured subject.
//!
//! The form collects the subject's name, a parent's name and a date of birth.
//! Age is never entered: it is derived from the date of birth on demand with
//! [`derive_age`]. Validation runs on submit and reports every failing field.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::IdentityConfig;

/// Format accepted for typed dates of birth.
pub const DOB_FORMAT: &str = "%Y-%m-%d";

/// Compute a person's age in whole years on `today`.
///
/// Calendar-year difference, minus one if the birthday has not yet come
/// around this year. Negative when `dob` lies after `today`.
#[must_use]
pub fn derive_age(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

/// A field of the identity form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormField {
    /// The subject's name.
    Name,
    /// The parent's name.
    ParentName,
    /// The date of birth.
    DateOfBirth,
    /// The derived age.
    Age,
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::ParentName => write!(f, "parent name"),
            Self::DateOfBirth => write!(f, "date of birth"),
            Self::Age => write!(f, "age"),
        }
    }
}

/// A validation failure attached to a single form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// The offending field.
    pub field: FormField,
    /// Message shown next to the field.
    pub message: String,
}

impl FieldError {
    /// Create a new field error.
    #[must_use]
    pub fn new(field: FormField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// All validation failures from one submit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// The individual field errors, in form order.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// The message for a given field, if it failed.
    #[must_use]
    pub fn for_field(&self, field: FormField) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Whether no field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of failing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        write!(f, "invalid identity: {}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// A validated subject, ready to be measured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// The subject's name, trimmed.
    pub name: String,
    /// The parent's name, trimmed.
    pub parent_name: String,
    /// Date of birth.
    pub date_of_birth: NaiveDate,
    /// Age in whole years at the time of submission.
    pub age: u32,
}

impl IdentityRecord {
    /// Whether the subject has had a first birthday.
    #[must_use]
    pub fn is_at_least_one_year(&self) -> bool {
        self.age >= 1
    }
}

/// Editable identity form state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityForm {
    /// Free-text name.
    pub name: String,
    /// Free-text parent name.
    pub parent_name: String,
    dob_text: String,
    dob: Option<NaiveDate>,
}

impl IdentityForm {
    /// Create an empty form.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name field.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the parent name field.
    #[must_use]
    pub fn with_parent_name(mut self, parent_name: impl Into<String>) -> Self {
        self.parent_name = parent_name.into();
        self
    }

    /// Update the typed date of birth.
    ///
    /// The text is always kept. The parsed date only changes when the text
    /// is a valid `YYYY-MM-DD` date that is not after `today`; otherwise the
    /// previously parsed date stays in place. Returns whether the date was
    /// accepted.
    pub fn set_dob_text(&mut self, text: &str, today: NaiveDate) -> bool {
        self.dob_text = text.to_string();
        match NaiveDate::parse_from_str(text.trim(), DOB_FORMAT) {
            Ok(date) if date <= today => {
                self.dob = Some(date);
                true
            }
            _ => false,
        }
    }

    /// Set the date of birth from a picker.
    pub fn pick_dob(&mut self, date: NaiveDate) {
        self.dob_text = date.format(DOB_FORMAT).to_string();
        self.dob = Some(date);
    }

    /// The raw text of the date field.
    #[must_use]
    pub fn dob_text(&self) -> &str {
        &self.dob_text
    }

    /// The parsed date of birth, if any.
    #[must_use]
    pub fn dob(&self) -> Option<NaiveDate> {
        self.dob
    }

    /// The read-only age shown next to the date field.
    #[must_use]
    pub fn age(&self, today: NaiveDate) -> Option<i32> {
        self.dob.map(|dob| derive_age(dob, today))
    }

    /// Validate the form and produce an identity record.
    ///
    /// # Errors
    ///
    /// Returns one [`FieldError`] per invalid field.
    pub fn validate(
        &self,
        today: NaiveDate,
        rules: &IdentityConfig,
    ) -> Result<IdentityRecord, ValidationErrors> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(FieldError::new(FormField::Name, "Name is required"));
        }

        let parent_name = self.parent_name.trim();
        if parent_name.is_empty() {
            errors.push(FieldError::new(
                FormField::ParentName,
                "Parent name is required",
            ));
        }

        let mut age = None;
        match self.dob {
            None => errors.push(FieldError::new(
                FormField::DateOfBirth,
                "Date of birth is required",
            )),
            Some(dob) if dob > today => errors.push(FieldError::new(
                FormField::DateOfBirth,
                "Date of birth cannot be in the future",
            )),
            Some(dob) => {
                let derived = derive_age(dob, today);
                let minimum = i32::from(!rules.allow_infants);
                if derived < minimum {
                    errors.push(FieldError::new(
                        FormField::Age,
                        if rules.allow_infants {
                            "Age cannot be negative"
                        } else {
                            "Age must be greater than 0"
                        },
                    ));
                } else {
                    age = u32::try_from(derived).ok();
                }
            }
        }

        match (errors.is_empty(), self.dob, age) {
            (true, Some(date_of_birth), Some(age)) => Ok(IdentityRecord {
                name: name.to_string(),
                parent_name: parent_name.to_string(),
                date_of_birth,
                age,
            }),
            _ => Err(ValidationErrors::from(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DOB_FORMAT).unwrap()
    }

    fn filled_form(dob: &str) -> IdentityForm {
        let mut form = IdentityForm::new()
            .with_name("Alice")
            .with_parent_name("Bob");
        form.pick_dob(date(dob));
        form
    }

    #[test]
    fn test_derive_age_birthday_passed() {
        assert_eq!(derive_age(date("2023-01-01"), date("2024-06-01")), 1);
    }

    #[test]
    fn test_derive_age_birthday_not_yet() {
        assert_eq!(derive_age(date("2020-06-02"), date("2024-06-01")), 3);
        assert_eq!(derive_age(date("2020-07-01"), date("2024-06-01")), 3);
    }

    #[test]
    fn test_derive_age_on_birthday() {
        assert_eq!(derive_age(date("2020-06-01"), date("2024-06-01")), 4);
    }

    #[test]
    fn test_derive_age_leap_day() {
        assert_eq!(derive_age(date("2020-02-29"), date("2021-02-28")), 0);
        assert_eq!(derive_age(date("2020-02-29"), date("2021-03-01")), 1);
    }

    #[test]
    fn test_derive_age_future_is_negative() {
        assert_eq!(derive_age(date("2025-06-02"), date("2024-06-01")), -1);
    }

    #[test]
    fn test_validate_scenario_alice() {
        let form = filled_form("2023-01-01");
        let record = form
            .validate(date("2024-06-01"), &IdentityConfig::default())
            .unwrap();

        assert_eq!(record.name, "Alice");
        assert_eq!(record.parent_name, "Bob");
        assert_eq!(record.age, 1);
        assert!(record.is_at_least_one_year());
    }

    #[test]
    fn test_validate_trims_names() {
        let mut form = filled_form("2019-03-04");
        form.name = "  Alice  ".to_string();
        let record = form
            .validate(date("2024-06-01"), &IdentityConfig::default())
            .unwrap();
        assert_eq!(record.name, "Alice");
    }

    #[test]
    fn test_validate_reports_every_field() {
        let form = IdentityForm::new().with_name("   ");
        let errors = form
            .validate(date("2024-06-01"), &IdentityConfig::default())
            .unwrap_err();

        assert_eq!(errors.len(), 3);
        assert_eq!(errors.for_field(FormField::Name), Some("Name is required"));
        assert_eq!(
            errors.for_field(FormField::ParentName),
            Some("Parent name is required")
        );
        assert_eq!(
            errors.for_field(FormField::DateOfBirth),
            Some("Date of birth is required")
        );
    }

    #[test]
    fn test_validate_rejects_age_zero_by_default() {
        let form = filled_form("2024-01-15");
        let errors = form
            .validate(date("2024-06-01"), &IdentityConfig::default())
            .unwrap_err();

        assert_eq!(
            errors.for_field(FormField::Age),
            Some("Age must be greater than 0")
        );
    }

    #[test]
    fn test_validate_accepts_infant_when_allowed() {
        let form = filled_form("2024-01-15");
        let rules = IdentityConfig {
            allow_infants: true,
        };
        let record = form.validate(date("2024-06-01"), &rules).unwrap();

        assert_eq!(record.age, 0);
        assert!(!record.is_at_least_one_year());
    }

    #[test]
    fn test_validate_rejects_future_picked_date() {
        let form = filled_form("2030-01-01");
        let errors = form
            .validate(date("2024-06-01"), &IdentityConfig::default())
            .unwrap_err();

        assert_eq!(
            errors.for_field(FormField::DateOfBirth),
            Some("Date of birth cannot be in the future")
        );
        assert!(errors.for_field(FormField::Age).is_none());
    }

    #[test]
    fn test_set_dob_text_valid() {
        let mut form = IdentityForm::new();
        assert!(form.set_dob_text("2023-01-01", date("2024-06-01")));
        assert_eq!(form.dob(), Some(date("2023-01-01")));
        assert_eq!(form.age(date("2024-06-01")), Some(1));
    }

    #[test]
    fn test_set_dob_text_invalid_keeps_previous_date() {
        let mut form = IdentityForm::new();
        form.set_dob_text("2020-05-05", date("2024-06-01"));

        assert!(!form.set_dob_text("2020-13-40", date("2024-06-01")));
        assert_eq!(form.dob_text(), "2020-13-40");
        assert_eq!(form.dob(), Some(date("2020-05-05")));

        assert!(!form.set_dob_text("2099-01-01", date("2024-06-01")));
        assert_eq!(form.dob(), Some(date("2020-05-05")));
    }

    #[test]
    fn test_pick_dob_rewrites_text() {
        let mut form = IdentityForm::new();
        form.set_dob_text("garbage", date("2024-06-01"));
        form.pick_dob(date("2021-11-30"));

        assert_eq!(form.dob_text(), "2021-11-30");
        assert_eq!(form.dob(), Some(date("2021-11-30")));
    }

    #[test]
    fn test_age_recomputed_on_demand() {
        let form = filled_form("2020-06-02");
        assert_eq!(form.age(date("2024-06-01")), Some(3));
        assert_eq!(form.age(date("2024-06-02")), Some(4));
    }

    #[test]
    fn test_validation_errors_display() {
        let errors = ValidationErrors::from(vec![FieldError::new(
            FormField::Name,
            "Name is required",
        )]);
        assert_eq!(errors.to_string(), "invalid identity: Name is required");
    }

    #[test]
    fn test_form_field_display() {
        assert_eq!(FormField::ParentName.to_string(), "parent name");
        assert_eq!(FormField::DateOfBirth.to_string(), "date of birth");
    }
}
