//! Data context: report constants plus the caller's data tree
//!
//! Placeholders see one root object. `D` holds the dynamic data and `S` the
//! static constants; the top-level keys of both are also copied to the root
//! (dynamic keys win), so `{{.D.Items}}` and `{{.Items}}` both resolve.

use chrono::{DateTime, Local, TimeZone};
use serde_json::{Map, Value};

/// Key of the company name constant
pub const COMPANY_NAME: &str = "CompanyName";
/// Key of the license string constant
pub const LICENSE: &str = "License";
/// Key of the generation timestamp constant
pub const CURRENT_TIME: &str = "CurrentTime";

/// Root key holding the dynamic data
pub const DYNAMIC_ROOT: &str = "D";
/// Root key holding the static constants
pub const STATIC_ROOT: &str = "S";

/// `CurrentTime` rendering, e.g. `27.09.2013 14:05:00`
pub const CURRENT_TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Report-level constants shared by every render of a template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticContext {
    values: Map<String, Value>,
}

impl StaticContext {
    /// An empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// A context with `CurrentTime` set to the current local time
    pub fn with_current_time() -> Self {
        Self::new().current_time(&Local::now())
    }

    pub fn company_name<S: Into<String>>(mut self, name: S) -> Self {
        self.insert(COMPANY_NAME, Value::String(name.into()));
        self
    }

    pub fn license<S: Into<String>>(mut self, license: S) -> Self {
        self.insert(LICENSE, Value::String(license.into()));
        self
    }

    pub fn current_time<Tz>(mut self, time: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let text = time.format(CURRENT_TIME_FORMAT).to_string();
        self.insert(CURRENT_TIME, Value::String(text));
        self
    }

    /// Set a constant, replacing any previous value
    pub fn insert<K: Into<String>>(&mut self, key: K, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Copy every key of a JSON object into the context
    ///
    /// Returns `false` (and changes nothing) when `value` is not an object.
    pub fn extend_from(&mut self, value: Value) -> bool {
        match value {
            Value::Object(map) => {
                self.values.extend(map);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The constants as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    /// Evaluation root for a data tree
    pub fn root(&self, data: &Value) -> Value {
        let mut root = self.values.clone();
        if let Value::Object(dynamic) = data {
            for (key, value) in dynamic {
                root.insert(key.clone(), value.clone());
            }
        }
        root.insert(DYNAMIC_ROOT.to_string(), data.clone());
        root.insert(STATIC_ROOT.to_string(), self.to_value());
        Value::Object(root)
    }
}
