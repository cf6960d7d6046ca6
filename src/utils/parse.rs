//! Parsing helpers for command-line and experiment-file strings.
//!
//! This module turns compact strings such as `"2048bps"` or `"6x6"`
//! into the typed values the builders work with.

use std::sync::LazyLock;

use regex::Regex;

use crate::topology::LayerDescriptor;

/// Compiled patterns for the compact string formats
struct Patterns {
    /// Match: "2048bps", "11Mbps", "1.5 kbps"
    data_rate: Regex,
    /// Match: "6x6", "3 x 2"
    layer: Regex,
}

static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    data_rate: Regex::new(r"^(\d+(?:\.\d+)?)\s*([kKmMgG]?)(bps|b/s)$").expect("Invalid data_rate regex"),
    layer: Regex::new(r"^(\d+)\s*[xX]\s*(\d+)$").expect("Invalid layer regex"),
});

/// Parse a data rate string to bits per second
///
/// Supports plain bits per second ("2048bps") and the decimal prefixes
/// k, M and G ("11Mbps", "1.5kbps"). Prefixes are case-insensitive.
///
/// # Examples
/// ```
/// use manetsim::utils::parse::parse_data_rate_bps;
///
/// assert_eq!(parse_data_rate_bps("2048bps"), Ok(2048));
/// assert_eq!(parse_data_rate_bps("11Mbps"), Ok(11_000_000));
/// assert!(parse_data_rate_bps("fast").is_err());
/// ```
pub fn parse_data_rate_bps(rate: &str) -> Result<u64, String> {
    let rate = rate.trim();
    let caps = PATTERNS
        .data_rate
        .captures(rate)
        .ok_or_else(|| format!("Invalid data rate format: {}", rate))?;

    let value: f64 = caps[1]
        .parse()
        .map_err(|_| format!("Invalid data rate value: {}", rate))?;
    let multiplier = match caps[2].to_ascii_lowercase().as_str() {
        "" => 1.0,
        "k" => 1e3,
        "m" => 1e6,
        "g" => 1e9,
        _ => return Err(format!("Invalid data rate prefix: {}", rate)),
    };

    let bps = (value * multiplier).round();
    if bps <= 0.0 {
        return Err(format!("Data rate must be positive: {}", rate));
    }
    Ok(bps as u64)
}

/// Parse one layer descriptor ("6x6")
pub fn parse_layer(entry: &str) -> Result<LayerDescriptor, String> {
    let entry = entry.trim();
    let caps = PATTERNS
        .layer
        .captures(entry)
        .ok_or_else(|| format!("Invalid layer descriptor '{}', expected <clusters>x<nodes>", entry))?;
    let clusters = caps[1]
        .parse::<usize>()
        .map_err(|e| format!("Invalid cluster count in '{}': {}", entry, e))?;
    let nodes_per_cluster = caps[2]
        .parse::<usize>()
        .map_err(|e| format!("Invalid cluster size in '{}': {}", entry, e))?;
    Ok(LayerDescriptor::new(clusters, nodes_per_cluster))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_rate() {
        assert_eq!(parse_data_rate_bps("2048bps"), Ok(2048));
        assert_eq!(parse_data_rate_bps("2048 bps"), Ok(2048));
        assert_eq!(parse_data_rate_bps("64kbps"), Ok(64_000));
        assert_eq!(parse_data_rate_bps("1.5Kbps"), Ok(1_500));
        assert_eq!(parse_data_rate_bps("11Mbps"), Ok(11_000_000));
        assert_eq!(parse_data_rate_bps("1Gb/s"), Ok(1_000_000_000));

        assert!(parse_data_rate_bps("").is_err());
        assert!(parse_data_rate_bps("0bps").is_err());
        assert!(parse_data_rate_bps("2048").is_err());
        assert!(parse_data_rate_bps("2048Tbps").is_err());
    }

    #[test]
    fn test_parse_layer() {
        assert_eq!(parse_layer("6x6"), Ok(LayerDescriptor::new(6, 6)));
        assert_eq!(parse_layer("3X3"), Ok(LayerDescriptor::new(3, 3)));
        assert_eq!(parse_layer(" 3 x 2 "), Ok(LayerDescriptor::new(3, 2)));

        assert!(parse_layer("").is_err());
        assert!(parse_layer("6").is_err());
        assert!(parse_layer("6x").is_err());
        assert!(parse_layer("axb").is_err());
        assert!(parse_layer("3x2,1x3").is_err());
    }
}
