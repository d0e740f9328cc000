use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde_derive::Serialize;

use crate::DbError;

/// A scripture reference as it is written in the `scripture_study` table:
/// a book, and optionally a chapter and verse (or verse range).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reference {
    pub book: String,
    pub chapter: String,
    pub verse: String,
}

impl Reference {
    pub fn new<B, C, V>(book: B, chapter: C, verse: V) -> Self
    where
        B: Into<String>,
        C: Into<String>,
        V: Into<String>,
    {
        Reference {
            book: book.into(),
            chapter: chapter.into(),
            verse: verse.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.chapter.is_empty(), self.verse.is_empty()) {
            (true, _) => write!(f, "{}", self.book),
            (false, true) => write!(f, "{} {}", self.book, self.chapter),
            (false, false) => write!(f, "{} {}:{}", self.book, self.chapter, self.verse),
        }
    }
}

impl FromStr for Reference {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Reference, Self::Err> {
        lazy_static! {
            static ref REF_RE: Regex =
                Regex::new(r"^(\S.*?)(?:\.| )(\d{1,3})(?:[:\.](\d{1,3}(?:-\d{1,3})?))?$").unwrap();
        }

        let caps = REF_RE
            .captures(s.trim())
            .ok_or_else(|| invalid_reference(s))?;

        match (caps.get(1), caps.get(2), caps.get(3)) {
            // Chapter only
            (Some(book), Some(chapter), None) => Ok(Reference::new(
                book.as_str().trim(),
                chapter.as_str(),
                "",
            )),
            // Chapter and a verse or verse range
            (Some(book), Some(chapter), Some(verse)) => Ok(Reference::new(
                book.as_str().trim(),
                chapter.as_str(),
                verse.as_str(),
            )),
            _ => Err(invalid_reference(s)),
        }
    }
}

/// Create an invalid reference error from the input.
fn invalid_reference(s: &str) -> DbError {
    DbError::InvalidReference {
        reference: s.to_string(),
    }
}
