use crate::models::{Age, NewDoctrine, NewScripture, NewYearInfo, Reference};
use crate::DbError;

/// Input for a new scripture entry, as typed into the add-entry form.
///
/// Optional fields that are blank after trimming count as absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntryForm {
    pub volume: String,
    pub book: String,
    pub chapter: String,
    pub verse: String,
    pub age: Option<String>,
    pub year_of_event: Option<String>,
    pub doctrine_name: Option<String>,
}

impl EntryForm {
    pub fn new<V, B, C, R>(volume: V, book: B, chapter: C, verse: R) -> Self
    where
        V: Into<String>,
        B: Into<String>,
        C: Into<String>,
        R: Into<String>,
    {
        EntryForm {
            volume: volume.into(),
            book: book.into(),
            chapter: chapter.into(),
            verse: verse.into(),
            ..EntryForm::default()
        }
    }

    pub fn from_reference<V: Into<String>>(volume: V, reference: &Reference) -> Self {
        EntryForm::new(
            volume,
            &*reference.book,
            &*reference.chapter,
            &*reference.verse,
        )
    }

    pub fn with_year<Y: Into<String>, A: Into<String>>(mut self, year_of_event: Y, age: A) -> Self {
        self.year_of_event = Some(year_of_event.into());
        self.age = Some(age.into());
        self
    }

    pub fn with_doctrine<D: Into<String>>(mut self, doctrine_name: D) -> Self {
        self.doctrine_name = Some(doctrine_name.into());
        self
    }

    /// Volume and book are required; chapter and verse may be blank.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.volume.trim().is_empty() || self.book.trim().is_empty() {
            return Err(DbError::InvalidEntry {
                reason: "volume and book are required".to_string(),
            });
        }
        Ok(())
    }

    pub fn scripture(&self) -> NewScripture<'_> {
        NewScripture {
            volume: self.volume.trim(),
            book: self.book.trim(),
            chapter: self.chapter.trim(),
            verse: self.verse.trim(),
        }
    }

    /// The `year_info` row for this entry.
    ///
    /// `None` when the year or the age was left blank. `Some(Err(_))` when they are
    /// present but the year is not an integer or the age is not BC/AD.
    pub fn year_info(&self, scripture_id: i32) -> Option<Result<NewYearInfo<'static>, DbError>> {
        let year = present(&self.year_of_event)?;
        let age = present(&self.age)?;

        Some(year.parse::<i32>().map_err(|_| DbError::InvalidYear {
            year: year.to_string(),
        })
        .and_then(|year_of_event| {
            let age: Age = age.parse()?;
            Ok(NewYearInfo {
                scripture_study_id: scripture_id,
                year_of_event,
                age: age.as_str(),
            })
        }))
    }

    /// The `doctrine` row for this entry, if a doctrine was named.
    pub fn doctrine(&self, scripture_id: i32) -> Option<NewDoctrine<'_>> {
        present(&self.doctrine_name).map(|doctrine_name| NewDoctrine {
            scripture_study_id: scripture_id,
            doctrine_name,
        })
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
