//! Text parsing helpers shared by the adapters.
//!
//! Build services expose package metadata as plain `key: value` spec
//! and obsinfo files, mirrors encode versions and source revisions in
//! artifact file names, and stage bindings select artifacts with glob
//! patterns. Everything here is pure string processing.

use regex::Regex;

/// Translates a shell-style glob pattern (`*`, `?`) into an anchored
/// regex.
///
/// # Errors
///
/// Returns a `regex::Error` if the translated pattern fails to
/// compile, which only happens for globs containing stray regex
/// syntax that escaping cannot neutralize.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            c => translated.push_str(&regex::escape(&c.to_string())),
        }
    }
    translated.push('$');
    Regex::new(&translated)
}

/// Extracts the `version` value from obsinfo-style `key: value` text.
#[must_use]
pub fn parse_obsinfo_version(content: &str) -> Option<String> {
    for line in content.lines() {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim() == "version" {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

/// Extracts `(version, release)` from spec-file text.
///
/// Both fields default to empty strings when the file does not carry
/// them; the caller decides whether an empty version is usable.
#[must_use]
pub fn parse_spec(content: &str) -> (String, String) {
    let mut version = String::new();
    let mut release = String::new();
    for line in content.lines() {
        let lower = line.to_lowercase();
        if lower.starts_with("version:") {
            if let Some((_, value)) = line.split_once(':') {
                version = value.trim().to_string();
            }
        } else if lower.starts_with("release:") {
            if let Some((_, value)) = line.split_once(':') {
                release = value.trim().to_string();
            }
        }
    }
    (version, release)
}

/// Extracts a trailing git revision hash (7+ hex digits) from a
/// version string such as `11+254.ge8d2f1b`.
#[must_use]
pub fn trailing_revision(version: &str) -> Option<String> {
    // Compiled per call; version strings are short and calls are rare.
    let re = Regex::new(r"([0-9a-fA-F]{7,})$").ok()?;
    re.captures(version)
        .map(|caps| caps[1].to_string())
}

/// Returns the version part of a version string before any build
/// suffix (`+` or `~` separator).
#[must_use]
pub fn version_prefix(version: &str) -> &str {
    version
        .find(['+', '~'])
        .map_or(version, |idx| &version[..idx])
}

/// Extracts a dotted version number from an artifact file name, e.g.
/// `agama-live.x86_64-12.250404.iso` yields `12.250404`.
#[must_use]
pub fn version_from_filename(filename: &str) -> Option<String> {
    let re = Regex::new(r"(\d+(?:\.\d+)+)").ok()?;
    re.captures(filename).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_matches_artifact_names() {
        let re = glob_to_regex("agama-live.*.iso").unwrap();
        assert!(re.is_match("agama-live.x86_64-12.250404.iso"));
        assert!(!re.is_match("agama-live.x86_64.iso.sha256"));
        assert!(!re.is_match("other-live.x86_64.iso"));
    }

    #[test]
    fn test_glob_question_mark() {
        let re = glob_to_regex("pkg-?.rpm").unwrap();
        assert!(re.is_match("pkg-1.rpm"));
        assert!(!re.is_match("pkg-10.rpm"));
    }

    #[test]
    fn test_glob_escapes_regex_syntax() {
        let re = glob_to_regex("a+b(c).iso").unwrap();
        assert!(re.is_match("a+b(c).iso"));
        assert!(!re.is_match("aab(c)xiso"));
    }

    #[test]
    fn test_parse_obsinfo_version() {
        let content = "name: agama\nversion: 11+254.ge8d2f1b\nmtime: 1712000000\n";
        assert_eq!(
            parse_obsinfo_version(content).as_deref(),
            Some("11+254.ge8d2f1b")
        );
        assert_eq!(parse_obsinfo_version("name: agama\n"), None);
    }

    #[test]
    fn test_parse_spec() {
        let content = "Name: agama\nVersion:  11.1\nRelease: 0\n%description\n";
        assert_eq!(parse_spec(content), ("11.1".to_string(), "0".to_string()));
    }

    #[test]
    fn test_parse_spec_case_insensitive_keys() {
        let content = "version: 2\nRELEASE: 3\n";
        assert_eq!(parse_spec(content), ("2".to_string(), "3".to_string()));
    }

    #[test]
    fn test_trailing_revision() {
        assert_eq!(
            trailing_revision("11+254.ge8d2f1b").as_deref(),
            Some("e8d2f1b")
        );
        assert_eq!(trailing_revision("11.1").as_deref(), None);
    }

    #[test]
    fn test_version_prefix() {
        assert_eq!(version_prefix("11+254.ge8d2f1b"), "11");
        assert_eq!(version_prefix("3.2~alpha1"), "3.2");
        assert_eq!(version_prefix("3.2"), "3.2");
    }

    #[test]
    fn test_version_from_filename() {
        assert_eq!(
            version_from_filename("agama-live.x86_64-12.250404.iso").as_deref(),
            Some("12.250404")
        );
        assert_eq!(version_from_filename("no-version.iso"), None);
    }
}
