use std::fmt;
use std::sync::OnceLock;
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

/// Suffix that marks a UUID as an audiolink id rather than some other tag value.
pub const IDENTIFIER_SUFFIX: &str = "-al";

fn identifier_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9a-f]{32}-al$").expect("identifier pattern is valid"))
}

/// A validated audiolink identifier: 32 lowercase hex digits followed by `-al`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(value: &str) -> Option<Self> {
        if identifier_regex().is_match(value) {
            Some(Self(value.to_string()))
        } else {
            None
        }
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(format!("{}{}", uuid.simple(), IDENTIFIER_SUFFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of this identifier's mirror entry, e.g. `<id>.flac`.
    pub fn link_name(&self, extension: &str) -> String {
        format!("{}.{}", self.0, extension)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub trait IdentifierGenerator {
    fn next(&mut self) -> Identifier;
}

/// Time-ordered random identifiers (UUIDv7). Never derived from content or path.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdentifierGenerator for UuidGenerator {
    fn next(&mut self) -> Identifier {
        Identifier::from_uuid(Uuid::now_v7())
    }
}
