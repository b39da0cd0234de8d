//! The closed set of fields a run can request.
//!
//! Every [`Field`] maps to exactly one target column and, in the engine, to
//! exactly one source expression. Names outside this set are rejected when
//! the pipeline configuration is validated.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Requestable output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    FilmId,
    Title,
    Description,
    CreationDate,
    FilePath,
    Rating,
    FilmType,
    FilmCreatedAt,
    FilmUpdatedAt,
    Actors,
    Writers,
    Directors,
    Genre,
}

/// Discriminator on the person/film bridge table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonRole {
    Actor,
    Writer,
    Director,
}

impl PersonRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Actor => "actor",
            Self::Writer => "writer",
            Self::Director => "director",
        }
    }
}

/// Unknown field name in the pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field '{0}'")]
pub struct UnknownFieldError(pub String);

impl Field {
    pub const ALL: [Self; 13] = [
        Self::FilmId,
        Self::Title,
        Self::Description,
        Self::CreationDate,
        Self::FilePath,
        Self::Rating,
        Self::FilmType,
        Self::FilmCreatedAt,
        Self::FilmUpdatedAt,
        Self::Actors,
        Self::Writers,
        Self::Directors,
        Self::Genre,
    ];

    /// Name used in pipeline configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FilmId => "film_id",
            Self::Title => "title",
            Self::Description => "description",
            Self::CreationDate => "creation_date",
            Self::FilePath => "file_path",
            Self::Rating => "rating",
            Self::FilmType => "film_type",
            Self::FilmCreatedAt => "film_created_at",
            Self::FilmUpdatedAt => "film_updated_at",
            Self::Actors => "actors",
            Self::Writers => "writers",
            Self::Directors => "directors",
            Self::Genre => "genre",
        }
    }

    /// Target column (and aggregate record key) this field lands in.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::FilmId => "id",
            Self::FilmType => "type",
            Self::FilmCreatedAt => "created_at",
            Self::FilmUpdatedAt => "updated_at",
            other => other.as_str(),
        }
    }

    /// Role filter for person aggregates, `None` for everything else.
    #[must_use]
    pub fn person_role(self) -> Option<PersonRole> {
        match self {
            Self::Actors => Some(PersonRole::Actor),
            Self::Writers => Some(PersonRole::Writer),
            Self::Directors => Some(PersonRole::Director),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = UnknownFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| UnknownFieldError(s.to_string()))
    }
}
