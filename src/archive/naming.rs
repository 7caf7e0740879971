//! Patch directory naming conventions
//!
//! Current archives name patch directories `x%03dy%03d`; archives written by
//! older pipeline versions used two digits. Lookups try the conventions in
//! [`CoordinateWidth::LOOKUP_ORDER`].

use lazy_static::lazy_static;
use regex::Regex;

/// Zero-padding width of patch directory coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateWidth {
    /// `x003y012`
    Three,
    /// `x03y12`
    Two,
}

impl CoordinateWidth {
    /// Order in which lookups try the naming conventions
    pub const LOOKUP_ORDER: [CoordinateWidth; 2] = [CoordinateWidth::Three, CoordinateWidth::Two];

    /// Directory name of a patch under this convention
    pub fn dir_name(&self, x: u32, y: u32) -> String {
        match self {
            CoordinateWidth::Three => format!("x{:03}y{:03}", x, y),
            CoordinateWidth::Two => format!("x{:02}y{:02}", x, y),
        }
    }
}

lazy_static! {
    static ref PATCH_DIR: Regex = Regex::new(r"^x(\d+)y(\d+)$").unwrap();
}

/// Parse patch coordinates from a directory name of either convention
pub fn parse_patch_dir_name(name: &str) -> Option<(u32, u32)> {
    let caps = PATCH_DIR.captures(name)?;
    let x = caps.get(1)?.as_str().parse().ok()?;
    let y = caps.get(2)?.as_str().parse().ok()?;
    Some((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_both_widths() {
        assert_eq!(CoordinateWidth::Three.dir_name(3, 12), "x003y012");
        assert_eq!(CoordinateWidth::Two.dir_name(3, 12), "x03y12");
        assert_eq!(CoordinateWidth::Two.dir_name(123, 4), "x123y04");
    }

    #[test]
    fn parses_directory_names() {
        assert_eq!(parse_patch_dir_name("x003y012"), Some((3, 12)));
        assert_eq!(parse_patch_dir_name("x03y12"), Some((3, 12)));
        assert_eq!(parse_patch_dir_name("x003y012.png"), None);
        assert_eq!(parse_patch_dir_name("features.txt"), None);
    }
}
