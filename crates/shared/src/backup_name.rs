use core::{fmt, ops::Deref};

use serde::{Deserialize, Serialize, de};
use thiserror::Error;

/// The maximum number of characters in a backup name.
pub const MAXIMUM_NAME_LENGTH: usize = 100;

/// Device names that cannot be used as file names on every platform.
const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// The name of a backup. Only accepts `[a-zA-Z0-9_\-]`, at most 100 characters, excluding
/// reserved device names.
///
/// The name is also the file name of the backup's archive and metadata, a valid `BackupName` is
/// always safe to join onto the backup directory.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackupName(String);

impl BackupName {
    /// Validates a candidate backup name.
    pub fn validate(name: &str) -> Result<(), NameError> {
        if name.trim().is_empty() {
            return Err(NameError::Empty);
        }

        // Check length
        let length = name.chars().count();
        if length > MAXIMUM_NAME_LENGTH {
            return Err(NameError::TooLong(length, MAXIMUM_NAME_LENGTH));
        }

        // All characters must be valid
        if let Some((index, character)) = name
            .chars()
            .enumerate()
            .find(|(_, character)| !is_valid_character(*character))
        {
            return Err(NameError::InvalidChars(index, character));
        }

        if RESERVED_NAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
        {
            return Err(NameError::Reserved(name.to_string()));
        }

        Ok(())
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_character(character: char) -> bool {
    character.is_ascii_alphanumeric() || character == '_' || character == '-'
}

impl TryFrom<&str> for BackupName {
    type Error = NameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::validate(value)?;
        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for BackupName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::validate(&value)?;
        Ok(Self(value))
    }
}

impl Deref for BackupName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for BackupName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BackupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BackupName").field(&self.0).finish()
    }
}

impl fmt::Display for BackupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BackupName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let string: String = Deserialize::deserialize(deserializer)?;
        Self::try_from(string).map_err(de::Error::custom)
    }
}

impl Serialize for BackupName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Backup name must not be empty")]
    Empty,

    /// `length, limit`
    #[error("Backup name was too long {0} > {1}")]
    TooLong(usize, usize),

    /// `index, char`
    #[error("Invalid character at index {0}: '{1}', may only contain [a-zA-Z0-9_\\-]")]
    InvalidChars(usize, char),

    #[error("Backup name '{0}' is reserved")]
    Reserved(String),
}

impl NameError {
    /// The machine readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => "EMPTY_NAME",
            Self::TooLong(..) => "NAME_TOO_LONG",
            Self::InvalidChars(..) => "INVALID_CHARS",
            Self::Reserved(_) => "RESERVED_NAME",
        }
    }
}
