//! Document locators.

use std::fmt;
use std::path::PathBuf;

use crate::error::{StorageError, StorageResult};

/// Scheme used for locators that don't name one.
pub const LOCAL_SCHEME: &str = "file";

/// Where a policy document lives, e.g. `/etc/warden/policy.ini`,
/// `file:///etc/warden/policy.ini` or `hdfs://nn:8020/policies/db1.ini`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    raw: String,
    scheme: String,
    explicit_scheme: bool,
}

impl Locator {
    pub fn parse(raw: &str) -> StorageResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(StorageError::invalid_locator(raw, "empty locator"));
        }

        match raw.split_once("://") {
            Some((scheme, rest)) => {
                let valid_scheme = !scheme.is_empty()
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
                if !valid_scheme {
                    return Err(StorageError::invalid_locator(raw, "malformed scheme"));
                }
                if rest.is_empty() {
                    return Err(StorageError::invalid_locator(raw, "missing path"));
                }
                Ok(Self {
                    raw: raw.to_string(),
                    scheme: scheme.to_ascii_lowercase(),
                    explicit_scheme: true,
                })
            }
            None => Ok(Self {
                raw: raw.to_string(),
                scheme: LOCAL_SCHEME.to_string(),
                explicit_scheme: false,
            }),
        }
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// A bare relative path such as `db1.ini` or `policies/db1.ini`.
    #[must_use]
    pub fn is_relative(&self) -> bool {
        !self.explicit_scheme && !self.raw.starts_with('/')
    }

    /// The filesystem path of a local locator.
    #[must_use]
    pub fn local_path(&self) -> Option<PathBuf> {
        if self.scheme != LOCAL_SCHEME {
            return None;
        }
        let path = if self.explicit_scheme {
            let rest = &self.raw[self.scheme.len() + 3..];
            // file://localhost/x and file:///x both name /x
            rest.strip_prefix("localhost").unwrap_or(rest)
        } else {
            self.raw.as_str()
        };
        Some(PathBuf::from(path))
    }

    /// Resolve a relative locator against the directory holding `base`.
    ///
    /// Absolute locators are returned unchanged.
    #[must_use]
    pub fn resolve_against(&self, base: &Locator) -> Locator {
        if !self.is_relative() {
            return self.clone();
        }
        let directory = match base.raw.rfind('/') {
            Some(idx) => &base.raw[..=idx],
            None => "",
        };
        let joined = format!("{directory}{}", self.raw.trim_start_matches("./"));
        Locator {
            scheme: base.scheme.clone(),
            explicit_scheme: base.explicit_scheme,
            raw: joined,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
