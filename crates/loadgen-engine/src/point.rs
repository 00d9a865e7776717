use std::fmt;

/// Identifier of a logical data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point(String);

impl Point {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Point {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Point {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for Point {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
