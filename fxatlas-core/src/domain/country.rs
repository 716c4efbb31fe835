//! A selectable map location.

use serde::{Deserialize, Serialize};

/// A country picked on the map or from a dropdown.
///
/// Identity is the `name`; `geometry_ref` is an opaque handle owned by the
/// map renderer and is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_ref: Option<String>,
}

impl Country {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            geometry_ref: None,
        }
    }

    pub fn with_geometry(name: impl Into<String>, geometry_ref: Option<String>) -> Self {
        Self {
            name: name.into(),
            geometry_ref,
        }
    }

    /// Same country, ignoring geometry.
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

/// How map clicks are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapMode {
    /// Two-click flow: first click picks home, second picks destination.
    #[default]
    Interactive,
    /// Next click adds a destination.
    Adding,
    /// Clicks are ignored until the destination list is emptied or cleared.
    Locked,
}

impl MapMode {
    pub fn label(self) -> &'static str {
        match self {
            MapMode::Interactive => "interactive",
            MapMode::Adding => "adding",
            MapMode::Locked => "locked",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ignores_geometry() {
        let a = Country::with_geometry("France", Some("FRA".into()));
        assert!(a.is("France"));
        assert!(!a.is("Germany"));
    }

    #[test]
    fn map_mode_serializes_snake_case() {
        let json = serde_json::to_string(&MapMode::Locked).unwrap();
        assert_eq!(json, "\"locked\"");
        assert_eq!(MapMode::default(), MapMode::Interactive);
    }
}
