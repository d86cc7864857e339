//! Settings schema declared by a plugin and validation of setting values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use agentbase_core::error::AppError;
use agentbase_core::result::AppResult;

/// Value type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    /// Free-form string.
    String,
    /// JSON number.
    Number,
    /// Boolean flag.
    Boolean,
    /// One of a fixed list of strings.
    Select,
}

impl SettingType {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Select => "select",
        }
    }
}

/// A single declared setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingField {
    /// Value type.
    #[serde(rename = "type")]
    pub kind: SettingType,
    /// Label shown to operators.
    pub label: String,
    /// Value applied at install time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Allowed values for `select` settings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl SettingField {
    fn new(kind: SettingType, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            default: None,
            options: Vec::new(),
        }
    }

    /// A string setting.
    pub fn string(label: impl Into<String>) -> Self {
        Self::new(SettingType::String, label)
    }

    /// A number setting.
    pub fn number(label: impl Into<String>) -> Self {
        Self::new(SettingType::Number, label)
    }

    /// A boolean setting.
    pub fn boolean(label: impl Into<String>) -> Self {
        Self::new(SettingType::Boolean, label)
    }

    /// A select setting limited to `options`.
    pub fn select<I, S>(label: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut field = Self::new(SettingType::Select, label);
        field.options = options.into_iter().map(Into::into).collect();
        field
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Checks `value` against the field type.
    fn check(&self, value: &Value) -> Result<(), String> {
        let ok = match self.kind {
            SettingType::String => value.is_string(),
            SettingType::Number => value.is_number(),
            SettingType::Boolean => value.is_boolean(),
            SettingType::Select => {
                return match value.as_str() {
                    Some(s) if self.options.iter().any(|o| o == s) => Ok(()),
                    Some(s) => Err(format!(
                        "'{s}' is not one of [{}]",
                        self.options.join(", ")
                    )),
                    None => Err("expected a string option".to_string()),
                };
            }
        };

        if ok {
            Ok(())
        } else {
            Err(format!("expected a {} value", self.kind.as_str()))
        }
    }
}

/// Settings declared by a plugin, keyed by setting name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsSchema {
    fields: BTreeMap<String, SettingField>,
}

impl SettingsSchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a field.
    pub fn insert(&mut self, key: impl Into<String>, field: SettingField) {
        self.fields.insert(key.into(), field);
    }

    /// Returns the field declared under `key`.
    pub fn get(&self, key: &str) -> Option<&SettingField> {
        self.fields.get(key)
    }

    /// Iterates over declared fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingField)> {
        self.fields.iter()
    }

    /// Returns true if no settings are declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Checks the schema itself: labels present, select options declared,
    /// and defaults matching their field type.
    pub fn validate(&self) -> AppResult<()> {
        for (key, field) in &self.fields {
            if key.trim().is_empty() {
                return Err(AppError::validation("Setting keys must not be empty"));
            }
            if field.label.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "Setting '{key}' must have a label"
                )));
            }
            match field.kind {
                SettingType::Select if field.options.is_empty() => {
                    return Err(AppError::validation(format!(
                        "Select setting '{key}' must declare at least one option"
                    )));
                }
                SettingType::Select => {}
                _ if !field.options.is_empty() => {
                    return Err(AppError::validation(format!(
                        "Setting '{key}' declares options but is not a select"
                    )));
                }
                _ => {}
            }
            if let Some(default) = &field.default {
                field.check(default).map_err(|reason| {
                    AppError::validation(format!("Default for setting '{key}' is invalid: {reason}"))
                })?;
            }
        }
        Ok(())
    }

    /// Checks a single value against the declared field.
    pub fn validate_value(&self, key: &str, value: &Value) -> AppResult<()> {
        let field = self
            .fields
            .get(key)
            .ok_or_else(|| AppError::validation(format!("Unknown setting '{key}'")))?;

        field.check(value).map_err(|reason| {
            AppError::validation(format!("Invalid value for setting '{key}': {reason}"))
        })
    }

    /// Checks every entry of `values`; the first failure is returned.
    pub fn validate_values(&self, values: &Map<String, Value>) -> AppResult<()> {
        values
            .iter()
            .try_for_each(|(key, value)| self.validate_value(key, value))
    }

    /// Returns the declared defaults, skipping fields without one.
    pub fn defaults(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|(key, field)| field.default.clone().map(|v| (key.clone(), v)))
            .collect()
    }
}
