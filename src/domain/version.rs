use crate::error::{ReleaseError, Result};
use std::fmt;
use std::str::FromStr;

/// A user-supplied release version, normalized to SemVer and a canonical tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpec {
    raw: String,
    version: semver::Version,
    tag: String,
}

impl VersionSpec {
    /// Parse a version string (e.g., "1.2.3", "v1.2.3-rc.1", "1.2.3+build.5")
    ///
    /// A single leading `v` is accepted; the remainder must be strict SemVer.
    pub fn parse(input: &str) -> Result<Self> {
        let without_v = input.strip_prefix('v').unwrap_or(input);

        // "vv1.2.3" is almost always a typo
        if input.starts_with('v') && without_v.starts_with('v') {
            return Err(invalid(input, "remove the extra leading 'v' (example: v1.2.3)"));
        }

        let version = semver::Version::parse(without_v).map_err(|e| {
            invalid(
                input,
                format!("{e}; expected SemVer like '1.2.3', 'v1.2.3' or '1.2.3-rc.1'"),
            )
        })?;

        let tag = format!("v{version}");

        Ok(VersionSpec {
            raw: input.to_string(),
            version,
            tag,
        })
    }

    /// The string the user typed
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Normalized version without the `v` prefix (e.g., "1.2.3-rc.1")
    pub fn version_string(&self) -> String {
        self.version.to_string()
    }

    /// Canonical tag name (e.g., "v1.2.3-rc.1")
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

fn invalid(input: &str, reason: impl Into<String>) -> ReleaseError {
    ReleaseError::InvalidVersion {
        input: input.to_string(),
        reason: reason.into(),
    }
}

impl FromStr for VersionSpec {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        VersionSpec::parse(s)
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_and_without_prefix_normalize_to_same_tag() {
        let plain = VersionSpec::parse("1.2.3").unwrap();
        let prefixed = VersionSpec::parse("v1.2.3").unwrap();
        assert_eq!(plain.tag(), "v1.2.3");
        assert_eq!(prefixed.tag(), "v1.2.3");
        assert_eq!(plain.version_string(), "1.2.3");
    }

    #[test]
    fn test_prerelease() {
        let v = VersionSpec::parse("1.2.3-rc.1").unwrap();
        assert_eq!(v.tag(), "v1.2.3-rc.1");
        assert_eq!(v.version_string(), "1.2.3-rc.1");
    }

    #[test]
    fn test_build_metadata_is_kept() {
        let v = VersionSpec::parse("v1.2.3+build.5").unwrap();
        assert_eq!(v.tag(), "v1.2.3+build.5");
        assert_eq!(v.raw(), "v1.2.3+build.5");
    }

    #[test]
    fn test_invalid_inputs() {
        for input in [
            "not-a-version",
            "",
            "1.2",
            "1.2.3.4",
            "vv1.2.3",
            "V1.2.3",
            "01.2.3",
            " 1.2.3",
        ] {
            let err = VersionSpec::parse(input).unwrap_err();
            assert!(
                matches!(err, ReleaseError::InvalidVersion { .. }),
                "expected InvalidVersion for {input:?}, got {err}"
            );
        }
    }

    #[test]
    fn test_double_v_hint() {
        let err = VersionSpec::parse("vv1.2.3").unwrap_err();
        assert!(err.to_string().contains("extra leading 'v'"));
    }

    #[test]
    fn test_deterministic() {
        let a: VersionSpec = "2.0.0-beta.2".parse().unwrap();
        let b: VersionSpec = "2.0.0-beta.2".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "v2.0.0-beta.2");
    }
}
