//! Point list parsing.

use super::ConfigError;
use loadgen_engine::Point;
use std::path::Path;

/// Parse a comma-separated point list. Line breaks also separate entries;
/// empty and whitespace-only entries are dropped.
pub fn parse_points(text: &str) -> Vec<Point> {
    text.split([',', '\n', '\r'])
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(Point::new)
        .collect()
}

/// Read the point list from `path`. An empty list is an error.
pub fn load_points(path: &Path) -> Result<Vec<Point>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let points = parse_points(&text);
    if points.is_empty() {
        return Err(ConfigError::NoPoints(format!("{}", path.display())));
    }
    Ok(points)
}
