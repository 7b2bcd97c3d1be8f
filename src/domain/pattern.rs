use crate::domain::VersionSpec;
use crate::error::{ReleaseError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Release asset name template (e.g., "truthdb-v{version}-x86_64-linux-gnu.tar.gz")
///
/// `{version}` expands to the SemVer without `v`, `{tag}` to the canonical tag.
/// `*` matches any run of characters, `?` a single character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetPattern {
    pub template: String,
}

impl AssetPattern {
    pub fn new(template: impl Into<String>) -> Self {
        AssetPattern {
            template: template.into(),
        }
    }

    /// Expand placeholders for a concrete version
    pub fn render(&self, version: &VersionSpec) -> String {
        self.template
            .replace("{version}", &version.version_string())
            .replace("{tag}", version.tag())
    }

    /// Expand placeholders and compile into an anchored matcher
    pub fn resolve(&self, version: &VersionSpec) -> Result<AssetMatcher> {
        if self.template.trim().is_empty() {
            return Err(ReleaseError::config("Asset pattern must not be empty"));
        }

        let rendered = self.render(version);
        let escaped = regex::escape(&rendered);
        let regex_pattern = escaped.replace(r"\*", ".*").replace(r"\?", ".");

        let regex = Regex::new(&format!("^{}$", regex_pattern)).map_err(|e| {
            ReleaseError::config(format!("Invalid asset pattern '{}': {}", self.template, e))
        })?;

        Ok(AssetMatcher { rendered, regex })
    }
}

impl fmt::Display for AssetPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// An asset pattern resolved for one version
#[derive(Debug, Clone)]
pub struct AssetMatcher {
    rendered: String,
    regex: Regex,
}

impl AssetMatcher {
    /// The pattern after placeholder expansion, used in operator output
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    pub fn is_match(&self, asset_name: &str) -> bool {
        self.regex.is_match(asset_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(input: &str) -> VersionSpec {
        VersionSpec::parse(input).unwrap()
    }

    #[test]
    fn test_render_version_and_tag() {
        let pattern = AssetPattern::new("truthdb-installer-v{version}.iso");
        assert_eq!(pattern.render(&v("1.2.3")), "truthdb-installer-v1.2.3.iso");

        let pattern = AssetPattern::new("bundle-{tag}.zip");
        assert_eq!(pattern.render(&v("1.2.3-rc.1")), "bundle-v1.2.3-rc.1.zip");
    }

    #[test]
    fn test_literal_match_is_anchored() {
        let matcher = AssetPattern::new("BOOTX64.EFI").resolve(&v("1.0.0")).unwrap();
        assert!(matcher.is_match("BOOTX64.EFI"));
        assert!(!matcher.is_match("BOOTX64.EFI.sha256"));
        assert!(!matcher.is_match("xBOOTX64.EFI"));
        // '.' is literal, not a regex wildcard
        assert!(!matcher.is_match("BOOTX64xEFI"));
    }

    #[test]
    fn test_wildcards() {
        let matcher = AssetPattern::new("truthdb-v{version}-*.tar.gz")
            .resolve(&v("2.0.0"))
            .unwrap();
        assert!(matcher.is_match("truthdb-v2.0.0-x86_64-linux-gnu.tar.gz"));
        assert!(!matcher.is_match("truthdb-v2.0.1-x86_64-linux-gnu.tar.gz"));

        let matcher = AssetPattern::new("part?.bin").resolve(&v("2.0.0")).unwrap();
        assert!(matcher.is_match("part1.bin"));
        assert!(!matcher.is_match("part10.bin"));
    }

    #[test]
    fn test_build_metadata_plus_is_literal() {
        let matcher = AssetPattern::new("app-{version}.tgz")
            .resolve(&v("1.0.0+build.7"))
            .unwrap();
        assert!(matcher.is_match("app-1.0.0+build.7.tgz"));
        assert!(!matcher.is_match("app-1.0.00build.7.tgz"));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(AssetPattern::new("  ").resolve(&v("1.0.0")).is_err());
    }
}
