//! The synthetic record published for a point on every cycle.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Number of numeric fields in every record.
pub const FIELD_COUNT: usize = 200;

/// Field names are `{FIELD_PREFIX}{n}` for n in `1..=FIELD_COUNT`.
pub const FIELD_PREFIX: &str = "test";

/// Lower bound (inclusive) of generated values.
pub const VALUE_MIN: f64 = -100.0;

/// Upper bound (inclusive) of generated values.
pub const VALUE_MAX: f64 = 100.0;

/// One synthetic record for a point.
///
/// Serializes as `{ "<point>": [ { "test1": v1, ..., "test200": v200 } ] }`,
/// with the fields in numeric order.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRecord {
    point: String,
    values: Vec<f64>,
}

impl PublishRecord {
    /// Create a record from a point and its field values.
    ///
    /// `values[0]` becomes `test1`, `values[1]` becomes `test2`, and so on.
    pub fn new(point: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            point: point.into(),
            values,
        }
    }

    /// The point this record was generated for.
    pub fn point(&self) -> &str {
        &self.point
    }

    /// Field values in field order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Look up a field by name (e.g. `"test17"`).
    pub fn get_field(&self, name: &str) -> Option<f64> {
        let n: usize = name.strip_prefix(FIELD_PREFIX)?.parse().ok()?;
        if n == 0 {
            return None;
        }
        self.values.get(n - 1).copied()
    }

    /// Encode the record in its JSON wire format.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Borrowed view of the inner field object.
struct Fields<'a>(&'a [f64]);

impl Serialize for Fields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (i, value) in self.0.iter().enumerate() {
            map.serialize_entry(&format!("{FIELD_PREFIX}{}", i + 1), value)?;
        }
        map.end()
    }
}

impl Serialize for PublishRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.point, &[Fields(&self.values)])?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let record = PublishRecord::new("P1", vec![1.5, -2.25, 0.0]);
        let json = String::from_utf8(record.to_json_bytes().unwrap()).unwrap();

        assert_eq!(
            json,
            r#"{"P1":[{"test1":1.5,"test2":-2.25,"test3":0.0}]}"#
        );
    }

    #[test]
    fn test_wire_format_parses_back() {
        let values: Vec<f64> = (0..FIELD_COUNT).map(|i| i as f64 / 4.0).collect();
        let record = PublishRecord::new("pump-7", values);

        let parsed: serde_json::Value =
            serde_json::from_slice(&record.to_json_bytes().unwrap()).unwrap();
        let objects = parsed["pump-7"].as_array().unwrap();
        assert_eq!(objects.len(), 1);

        let fields = objects[0].as_object().unwrap();
        assert_eq!(fields.len(), FIELD_COUNT);
        assert_eq!(fields["test1"], 0.0);
        assert_eq!(fields["test200"], 49.75);
    }

    #[test]
    fn test_get_field() {
        let record = PublishRecord::new("P1", vec![10.0, 20.0]);

        assert_eq!(record.get_field("test1"), Some(10.0));
        assert_eq!(record.get_field("test2"), Some(20.0));
        assert_eq!(record.get_field("test3"), None);
        assert_eq!(record.get_field("test0"), None);
        assert_eq!(record.get_field("other1"), None);
    }
}
