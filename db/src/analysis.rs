//! Aggregates over the timeline, for charts and summary figures.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_derive::Serialize;

use crate::models::{Age, TimelineEntry};

/// Entries whose age is one of `ages`.
pub fn filter_by_age<'a>(entries: &'a [TimelineEntry], ages: &[Age]) -> Vec<&'a TimelineEntry> {
    entries.iter().filter(|e| ages.contains(&e.age)).collect()
}

/// Number of events at each timeline year, in timeline order.
pub fn events_per_year<'a, I>(entries: I) -> Vec<(i64, usize)>
where
    I: IntoIterator<Item = &'a TimelineEntry>,
{
    count_by(entries, |e| e.timeline_year)
}

/// Number of events per century, in timeline order.
///
/// Centuries are labelled by their first year on the timeline axis, so `-450`
/// falls into `-500` and `33` into `0`.
pub fn century_counts<'a, I>(entries: I) -> Vec<(i64, usize)>
where
    I: IntoIterator<Item = &'a TimelineEntry>,
{
    count_by(entries, |e| century(e.timeline_year))
}

pub fn century(timeline_year: i64) -> i64 {
    timeline_year.div_euclid(100) * 100
}

fn count_by<'a, I, F>(entries: I, key: F) -> Vec<(i64, usize)>
where
    I: IntoIterator<Item = &'a TimelineEntry>,
    F: Fn(&TimelineEntry) -> i64,
{
    let mut counts = BTreeMap::new();
    for entry in entries {
        *counts.entry(key(entry)).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

/// How often each doctrine appears, most frequent first. Entries without a
/// doctrine are not counted.
pub fn doctrine_distribution<'a, I>(entries: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a TimelineEntry>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in entries.into_iter().filter_map(|e| e.doctrine_name.as_deref()) {
        *counts.entry(name).or_insert(0) += 1;
    }

    let mut distribution: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    distribution.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    distribution
}

/// Headline figures of the timeline page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub books: usize,
    pub doctrines: usize,
}

impl Summary {
    pub fn of<'a, I>(entries: I) -> Summary
    where
        I: IntoIterator<Item = &'a TimelineEntry>,
    {
        let mut total = 0;
        let mut books = HashSet::new();
        let mut doctrines = HashSet::new();

        for entry in entries {
            total += 1;
            books.insert(entry.book.as_str());
            if let Some(doctrine) = &entry.doctrine_name {
                doctrines.insert(doctrine.as_str());
            }
        }

        Summary {
            total,
            books: books.len(),
            doctrines: doctrines.len(),
        }
    }
}
