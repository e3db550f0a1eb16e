use std::{fmt, str::FromStr};

use rand::Rng;
use serde::Serialize;
use thiserror::Error;

/// Number of characters in a room code.
pub const ROOM_CODE_LEN: usize = 6;
/// Characters a room code is drawn from (canonical, upper-case form).
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Short, human-shareable room identifier, always stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoomCode(String);

/// Reasons a user-supplied room code is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomCodeError {
    /// Wrong number of characters.
    #[error("room code must be {expected} characters, got {found}")]
    InvalidLength {
        /// Required length.
        expected: usize,
        /// Length received.
        found: usize,
    },
    /// Character outside the code alphabet.
    #[error("invalid character '{ch}' at position {index} in room code")]
    InvalidCharacter {
        /// Offending character.
        ch: char,
        /// Zero-based position.
        index: usize,
    },
}

impl RoomCode {
    /// Parse user input, ignoring surrounding whitespace and letter case.
    pub fn parse(value: &str) -> Result<Self, RoomCodeError> {
        let canonical = value.trim().to_ascii_uppercase();
        let found = canonical.chars().count();
        if found != ROOM_CODE_LEN {
            return Err(RoomCodeError::InvalidLength {
                expected: ROOM_CODE_LEN,
                found,
            });
        }
        for (index, ch) in canonical.chars().enumerate() {
            if !ch.is_ascii() || !ROOM_CODE_ALPHABET.contains(&(ch as u8)) {
                return Err(RoomCodeError::InvalidCharacter { ch, index });
            }
        }
        Ok(Self(canonical))
    }

    /// Draw a random code. Uniqueness is the registry's concern.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..ROOM_CODE_LEN)
            .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Borrow the canonical code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RoomCode {
    type Err = RoomCodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}
