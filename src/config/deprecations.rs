//! Deprecated configuration keys.

/// A configuration key that still loads but should be migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deprecation {
    pub key: &'static str,
    pub replacement: Option<&'static str>,
}

impl Deprecation {
    pub fn message(&self) -> String {
        match self.replacement {
            Some(replacement) => format!(
                "Option \"{}\" was replaced by \"{}\".\n\n  Please update your configuration.",
                self.key, replacement
            ),
            None => format!(
                "Option \"{}\" is no longer supported and will be ignored.\n\n  Please remove it from your configuration.",
                self.key
            ),
        }
    }
}

pub const DEPRECATED_KEYS: &[Deprecation] = &[
    Deprecation {
        key: "test_path_dirs",
        replacement: Some("roots"),
    },
    Deprecation {
        key: "script_preprocessor",
        replacement: Some("test_command"),
    },
    Deprecation {
        key: "setup_test_framework_script_file",
        replacement: Some("test_command"),
    },
    Deprecation {
        key: "preprocessor_ignore_patterns",
        replacement: Some("path_ignore_patterns"),
    },
];

/// Deprecated keys present in `keys`, in table order.
pub fn find_deprecations<'a, I>(keys: I) -> Vec<Deprecation>
where
    I: IntoIterator<Item = &'a str>,
{
    let keys: Vec<&str> = keys.into_iter().collect();
    DEPRECATED_KEYS
        .iter()
        .filter(|d| keys.contains(&d.key))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_only_deprecated_keys() {
        let found = find_deprecations(["roots", "test_path_dirs", "cache"]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, "test_path_dirs");
        assert!(found[0].message().contains("\"roots\""));
    }

    #[test]
    fn test_clean_config_has_no_deprecations() {
        assert!(find_deprecations(["roots", "cache", "name"]).is_empty());
    }
}
