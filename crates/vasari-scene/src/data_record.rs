//! `Data` list sub-parser: `key:value` pairs separated by commas.

use crate::error::DataRecordError;
use serde_json::{Map, Number, Value};

/// Parsed key/value record, in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataRecord {
    values: Map<String, Value>,
}

impl DataRecord {
    pub fn parse(list: &str) -> Result<Self, DataRecordError> {
        let mut values = Map::new();
        for pair in list.trim().split(',') {
            let (key, value) = pair.split_once(':').unwrap_or((pair, ""));
            let key = key.trim().replace('"', "");
            if key.is_empty() {
                continue;
            }
            values.insert(key, coerce(value.trim()));
        }
        if values.is_empty() {
            return Err(DataRecordError::UnknownFormat);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compact JSON object text.
    pub fn to_json(&self) -> String {
        Value::Object(self.values.clone()).to_string()
    }

    /// One `"key":value` line per entry.
    pub fn display_lines(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|(key, value)| format!("{}:{}", Value::String(key.clone()), value))
            .collect()
    }
}

fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Some(number) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    Value::String(raw.replace('"', ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_numbers_booleans_and_strings() {
        let record = DataRecord::parse(r#""name":"Ada", age: 36, ratio:0.5, admin:true, guest:false"#).unwrap();
        assert_eq!(record.get("name"), Some(&Value::from("Ada")));
        assert_eq!(record.get("age"), Some(&Value::from(36)));
        assert_eq!(record.get("ratio"), Some(&Value::from(0.5)));
        assert_eq!(record.get("admin"), Some(&Value::Bool(true)));
        assert_eq!(record.get("guest"), Some(&Value::Bool(false)));
        assert_eq!(record.to_json(), r#"{"name":"Ada","age":36,"ratio":0.5,"admin":true,"guest":false}"#);
    }

    #[test]
    fn display_is_one_entry_per_line_in_source_order() {
        let record = DataRecord::parse("b:2,a:1").unwrap();
        assert_eq!(record.display_lines(), vec![r#""b":2"#, r#""a":1"#]);
    }

    #[test]
    fn empty_keys_are_skipped() {
        let record = DataRecord::parse(":1, ,k:v").unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("k"), Some(&Value::from("v")));
    }

    #[test]
    fn zero_keys_is_an_unknown_format() {
        assert_eq!(DataRecord::parse(""), Err(DataRecordError::UnknownFormat));
        assert_eq!(DataRecord::parse(" , :x"), Err(DataRecordError::UnknownFormat));
    }

    #[test]
    fn values_keep_colons_after_the_first() {
        let record = DataRecord::parse(r#"url:"http://peer/x""#).unwrap();
        assert_eq!(record.get("url"), Some(&Value::from("http://peer/x")));
    }
}
