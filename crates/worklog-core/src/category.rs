//! Category validation and lookup.

use crate::error::ValidationError;
use crate::model::{Category, CategoryUpdate, NewCategory};

/// Palette offered for new categories: blue, red, green, amber, purple,
/// pink, cyan, orange.
pub const PRESET_COLORS: [&str; 8] = [
    "#3b82f6", "#ef4444", "#10b981", "#f59e0b", "#8b5cf6", "#ec4899", "#06b6d4", "#f97316",
];

/// Trimmed, non-empty name.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "name".into(),
            message: "category name must not be empty".into(),
        });
    }
    Ok(trimmed.to_string())
}

/// `#rgb` or `#rrggbb`, normalised to lowercase.
pub fn validate_color(color: &str) -> Result<String, ValidationError> {
    let color = color.trim();
    let hex = color.strip_prefix('#').unwrap_or("");
    let valid = matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(ValidationError::InvalidValue {
            field: "color".into(),
            message: format!("'{color}' is not a hex color like #3b82f6"),
        });
    }
    Ok(color.to_ascii_lowercase())
}

impl NewCategory {
    /// Validated insert shape.
    pub fn new(name: &str, color: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            name: validate_name(name)?,
            color: validate_color(color)?,
        })
    }
}

impl CategoryUpdate {
    /// Validated partial update; `None` fields are left untouched.
    pub fn new(name: Option<&str>, color: Option<&str>) -> Result<Self, ValidationError> {
        Ok(Self {
            name: name.map(validate_name).transpose()?,
            color: color.map(validate_color).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none()
    }
}

/// Find a category by exact id, then by case-insensitive name.
pub fn resolve<'a>(categories: &'a [Category], key: &str) -> Option<&'a Category> {
    let key = key.trim();
    categories
        .iter()
        .find(|c| c.id == key)
        .or_else(|| categories.iter().find(|c| c.name.eq_ignore_ascii_case(key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn names_are_trimmed_and_required() {
        assert_eq!(validate_name("  Dev ").unwrap(), "Dev");
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn colors_accept_short_and_long_hex() {
        assert_eq!(validate_color("#FFF").unwrap(), "#fff");
        assert_eq!(validate_color("#3B82F6").unwrap(), "#3b82f6");
        assert!(validate_color("3b82f6").is_err());
        assert!(validate_color("#12345").is_err());
        assert!(validate_color("#zzzzzz").is_err());
    }

    #[test]
    fn presets_are_valid() {
        for color in PRESET_COLORS {
            assert!(validate_color(color).is_ok(), "{color}");
        }
    }

    #[test]
    fn resolve_prefers_id_then_name() {
        let now = Utc::now();
        let categories = vec![
            Category {
                id: "a1".into(),
                name: "Dev".into(),
                color: "#fff".into(),
                created_at: now,
            },
            Category {
                id: "b2".into(),
                name: "a1".into(),
                color: "#000".into(),
                created_at: now,
            },
        ];
        assert_eq!(resolve(&categories, "a1").map(|c| c.name.as_str()), Some("Dev"));
        assert_eq!(resolve(&categories, "dev").map(|c| c.id.as_str()), Some("a1"));
        assert!(resolve(&categories, "ops").is_none());
    }
}
