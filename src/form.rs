//! Input schemas.
//!
//! A [`FormSchema`] is the single description of an operation's input. The
//! describe phase projects it to the wire ([`FormSchema::to_response`]) and
//! the execute phase validates submitted values against the very same value
//! ([`FormSchema::validate`]), so field order and validators cannot drift.

use hostdb_protocol::{FieldType, InputField, Response};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum length of an fqdn field.
pub const FQDN_MAX_LENGTH: usize = 200;

/// Maximum length of a single DNS label.
const DNS_LABEL_MAX_LENGTH: usize = 63;

const REQUIRED_MESSAGE: &str = "This field is required.";

/// Extra checks applied to a field value after type checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    /// Value must be a fully qualified domain name.
    Fqdn,
}

impl Validator {
    fn check(self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (Validator::Fqdn, Value::String(s)) => validate_fqdn(s),
            (Validator::Fqdn, _) => Err("Enter a valid FQDN.".to_string()),
        }
    }
}

/// One input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub max_length: Option<usize>,
    pub help_text: Option<&'static str>,
    pub validators: Vec<Validator>,
}

impl FieldSpec {
    /// The fqdn field shared by the delete forms.
    pub fn fqdn() -> Self {
        Self {
            key: "fqdn",
            label: "FQDN",
            field_type: FieldType::String,
            required: true,
            max_length: Some(FQDN_MAX_LENGTH),
            help_text: Some("Fully qualified domain name of the machine"),
            validators: vec![Validator::Fqdn],
        }
    }

    fn to_input_field(&self) -> InputField {
        InputField {
            key: self.key.to_string(),
            label: self.label.to_string(),
            field_type: self.field_type,
            required: self.required,
            max_length: self.max_length,
            initial: None,
            help_text: self.help_text.map(str::to_string),
        }
    }

    /// Validate a raw value. `None` means the field is absent or blank.
    fn clean(&self, raw: Option<&Value>) -> Result<Option<Value>, String> {
        let value = match raw {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(Value::String(s.trim().to_string())),
            Some(other) => Some(other.clone()),
        };

        let Some(value) = value else {
            return if self.required {
                Err(REQUIRED_MESSAGE.to_string())
            } else {
                Ok(None)
            };
        };

        let type_ok = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
        };
        if !type_ok {
            return Err("Enter a valid value.".to_string());
        }

        if let (Some(max), Value::String(s)) = (self.max_length, &value) {
            let len = s.chars().count();
            if len > max {
                return Err(format!(
                    "Ensure this value has at most {} characters (it has {}).",
                    max, len
                ));
            }
        }

        for validator in &self.validators {
            validator.check(&value)?;
        }

        Ok(Some(value))
    }
}

/// Ordered input fields plus the path the form is submitted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSchema {
    pub fields: Vec<FieldSpec>,
    pub submit_path: String,
}

impl FormSchema {
    pub fn new(submit_path: impl Into<String>) -> Self {
        Self {
            fields: Vec::new(),
            submit_path: submit_path.into(),
        }
    }

    /// Append a field.
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Field keys in declared order.
    pub fn order(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.key).collect()
    }

    /// Project to the describe-phase response.
    pub fn to_response(&self) -> Response {
        Response::Input {
            url: self.submit_path.clone(),
            order: self.order().into_iter().map(str::to_string).collect(),
            fields: self.fields.iter().map(FieldSpec::to_input_field).collect(),
        }
    }

    /// Validate submitted values. Unknown keys are ignored.
    pub fn validate(&self, data: &Map<String, Value>) -> Result<CleanedForm, FormErrors> {
        let mut values = BTreeMap::new();
        let mut errors = Vec::new();

        for field in &self.fields {
            match field.clean(data.get(field.key)) {
                Ok(Some(value)) => {
                    values.insert(field.key, value);
                }
                Ok(None) => {}
                Err(message) => errors.push((field.key, message)),
            }
        }

        if errors.is_empty() {
            Ok(CleanedForm { values })
        } else {
            Err(FormErrors { errors })
        }
    }
}

/// Validated form values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CleanedForm {
    values: BTreeMap<&'static str, Value>,
}

impl CleanedForm {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value of a field.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }
}

/// Field-level validation failures, one per invalid field, in field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormErrors {
    errors: Vec<(&'static str, String)>,
}

impl FormErrors {
    /// `(field key, message)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, m)| (*k, m.as_str()))
    }

    /// Whether `key` failed validation.
    pub fn contains(&self, key: &str) -> bool {
        self.errors.iter().any(|(k, _)| *k == key)
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .errors
            .iter()
            .map(|(key, message)| format!("{}: {}", key, message))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

/// Validate a fully qualified domain name.
///
/// Rules:
/// - At least two labels separated by dots, no empty labels
/// - Labels are 1..=63 ASCII alphanumerics or hyphens
/// - Labels cannot start or end with a hyphen
pub fn validate_fqdn(fqdn: &str) -> Result<(), String> {
    let labels: Vec<&str> = fqdn.split('.').collect();
    if labels.len() < 2 {
        return Err(format!("'{}' is not fully qualified.", fqdn));
    }

    for label in labels {
        if label.is_empty() {
            return Err(format!("'{}' contains an empty label.", fqdn));
        }
        if label.len() > DNS_LABEL_MAX_LENGTH {
            return Err(format!(
                "Label '{}' is too long (max {} characters).",
                label, DNS_LABEL_MAX_LENGTH
            ));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!(
                "Label '{}' cannot start or end with a hyphen.",
                label
            ));
        }
        if let Some(c) = label.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '-') {
            return Err(format!("'{}' contains invalid character: '{}'", fqdn, c));
        }
    }

    Ok(())
}
