use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use crate::ParserError;

/// Engine version as written into the serialized file metadata, e.g. `2019.4.40f1`.
/// Comparisons only consider `major.minor.build`.
#[derive(Debug, Clone, Default)]
pub struct UnityVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub release_type: String,
    pub revision: u32,
}

impl UnityVersion {
    pub const fn new(major: u32, minor: u32, build: u32) -> Self {
        UnityVersion {
            major,
            minor,
            build,
            release_type: String::new(),
            revision: 0,
        }
    }

    pub fn parse(version: &str) -> Result<UnityVersion, ParserError> {
        let invalid = || ParserError::InvalidVersionString(version.to_string());
        let mut parts = version.splitn(3, '.');
        let major = parts.next().ok_or_else(invalid)?.parse::<u32>().map_err(|_| invalid())?;
        let minor = parts.next().ok_or_else(invalid)?.parse::<u32>().map_err(|_| invalid())?;

        let (build, release_type, revision) = match parts.next() {
            None => (0, String::new(), 0),
            Some(rest) => {
                let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
                let build = rest[..digits_end].parse::<u32>().map_err(|_| invalid())?;
                let suffix = &rest[digits_end..];
                let type_end = suffix.find(|c: char| c.is_ascii_digit()).unwrap_or(suffix.len());
                let revision = suffix[type_end..].parse::<u32>().unwrap_or(0);
                (build, suffix[..type_end].to_string(), revision)
            }
        };

        Ok(UnityVersion {
            major,
            minor,
            build,
            release_type,
            revision,
        })
    }

    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        *self >= UnityVersion::new(major, minor, 0)
    }
}

impl PartialEq for UnityVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for UnityVersion {}

impl PartialOrd for UnityVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UnityVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.build).cmp(&(other.major, other.minor, other.build))
    }
}

impl Display for UnityVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}{}", self.major, self.minor, self.build, self.release_type)?;
        if self.revision > 0 {
            write!(f, "{}", self.revision)?;
        }
        Ok(())
    }
}
