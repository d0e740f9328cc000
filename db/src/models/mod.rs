use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde_derive::Serialize;

use crate::schema::{doctrine, scripture_study, year_info};
use crate::table::{RowRef, Table};
use crate::DbError;

/// Model representing a row of `scripture_study`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Scripture {
    pub id: i32,
    pub volume: String,
    pub book: String,
    pub chapter: String,
    pub verse: String,
}

impl Scripture {
    /// Reads a scripture from a table row holding at least the `scripture_study` columns.
    pub fn from_row(row: &RowRef<'_>) -> Result<Scripture, DbError> {
        let id = row.integer("id")?;
        Ok(Scripture {
            id: i32::try_from(id).map_err(|_| DbError::InvalidValue {
                column: "id".to_string(),
                value: id.to_string(),
                expected: "a 32-bit id".to_string(),
            })?,
            volume: row.text("volume")?,
            book: row.text("book")?,
            chapter: row.text("chapter")?,
            verse: row.text("verse")?,
        })
    }

    pub fn from_table(table: &Table) -> Result<Vec<Scripture>, DbError> {
        table.iter().map(|row| Scripture::from_row(&row)).collect()
    }

    pub fn reference(&self) -> Reference {
        Reference::new(&*self.book, &*self.chapter, &*self.verse)
    }
}

/// New `scripture_study` row.
#[derive(Clone, Debug, PartialEq, Insertable)]
#[diesel(table_name = scripture_study)]
pub struct NewScripture<'a> {
    pub volume: &'a str,
    pub book: &'a str,
    pub chapter: &'a str,
    pub verse: &'a str,
}

/// New `year_info` row attached to a scripture.
#[derive(Clone, Debug, PartialEq, Insertable)]
#[diesel(table_name = year_info)]
pub struct NewYearInfo<'a> {
    pub scripture_study_id: i32,
    pub year_of_event: i32,
    pub age: &'a str,
}

/// New `doctrine` row attached to a scripture.
#[derive(Clone, Debug, PartialEq, Insertable)]
#[diesel(table_name = doctrine)]
pub struct NewDoctrine<'a> {
    pub scripture_study_id: i32,
    pub doctrine_name: &'a str,
}

/// Era of a year of event. This is mapped to the `age` column of `year_info`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Age {
    #[serde(rename = "BC")]
    Bc,
    #[serde(rename = "AD")]
    Ad,
}

impl Age {
    pub fn as_str(self) -> &'static str {
        match self {
            Age::Bc => "BC",
            Age::Ad => "AD",
        }
    }

    /// Position of `year` on the timeline axis: BC years are negative.
    pub fn signed(self, year: i64) -> i64 {
        match self {
            Age::Bc => -year,
            Age::Ad => year,
        }
    }
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Age {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Age, Self::Err> {
        lazy_static! {
            static ref AGE_RE: Regex =
                Regex::new(r"^(?i)(?:(?P<bc>b\.?\s*c)|(?P<ad>a\.?\s*d))\.?$").unwrap();
        }

        let caps = AGE_RE.captures(s.trim()).ok_or_else(|| DbError::InvalidAge {
            age: s.to_string(),
        })?;

        if caps.name("bc").is_some() {
            Ok(Age::Bc)
        } else {
            Ok(Age::Ad)
        }
    }
}

/// Model representing a row of the `timeline` view.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub timeline_year: i64,
    pub year_of_event: i64,
    pub age: Age,
    pub volume: String,
    pub book: String,
    pub chapter: String,
    pub verse: String,
    pub doctrine_name: Option<String>,
}

impl TimelineEntry {
    pub fn from_row(row: &RowRef<'_>) -> Result<TimelineEntry, DbError> {
        Ok(TimelineEntry {
            timeline_year: row.integer("timeline_year")?,
            year_of_event: row.integer("year_of_event")?,
            age: row.text("age")?.parse()?,
            volume: row.text("volume")?,
            book: row.text("book")?,
            chapter: row.text("chapter")?,
            verse: row.text("verse")?,
            doctrine_name: row.optional_text("doctrine_name")?,
        })
    }

    pub fn from_table(table: &Table) -> Result<Vec<TimelineEntry>, DbError> {
        table.iter().map(|row| TimelineEntry::from_row(&row)).collect()
    }

    pub fn reference(&self) -> Reference {
        Reference::new(&*self.book, &*self.chapter, &*self.verse)
    }

    /// The year as it is read aloud, e.g. `4000 BC`.
    pub fn display_year(&self) -> String {
        format!("{} {}", self.year_of_event.abs(), self.age)
    }

    /// Chart label for the event, e.g. `Genesis 1:1 (4000 BC)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.reference(), self.display_year())
    }
}

/// Model representing a row of the chart data loader.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartPoint {
    pub timeline_year: i64,
    pub year_of_event: i64,
    pub age: Age,
    pub book: String,
}

impl ChartPoint {
    pub fn from_table(table: &Table) -> Result<Vec<ChartPoint>, DbError> {
        table
            .iter()
            .map(|row| {
                Ok(ChartPoint {
                    timeline_year: row.integer("timeline_year")?,
                    year_of_event: row.integer("year_of_event")?,
                    age: row.text("age")?.parse()?,
                    book: row.text("book")?,
                })
            })
            .collect()
    }
}

mod entry;
mod reference;
pub use self::entry::EntryForm;
pub use self::reference::Reference;
