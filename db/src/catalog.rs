//! The fixed catalog of analytical queries offered by the query explorer.
//!
//! The SQL here is developer-authored and never built from user input. Row limits
//! are bound as parameters by the executor, so none of these end in `LIMIT`.

/// A named query of the catalog.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CatalogQuery {
    pub name: &'static str,
    pub sql: &'static str,
}

pub static CATALOG: [CatalogQuery; 7] = [
    CatalogQuery {
        name: "Scriptures by Year",
        sql: "SELECT yi.year_of_event, age, book, chapter, verse,
    CASE
        WHEN yi.age = 'BC' THEN -yi.year_of_event
        ELSE yi.year_of_event
    END AS year_timeline
FROM year_info AS yi
INNER JOIN scripture_study AS ss
    ON yi.scripture_study_id = ss.id
ORDER BY year_timeline",
    },
    CatalogQuery {
        name: "Doctrine Counts",
        sql: "SELECT doctrine_name, COUNT(*) AS count
FROM timeline
GROUP BY doctrine_name",
    },
    CatalogQuery {
        name: "Conditional Logic Example",
        sql: "SELECT volume, book, chapter, verse,
    CASE
        WHEN volume = 'Old Testament' THEN 'OT'
        WHEN volume = 'New Testament' THEN 'NT'
        WHEN volume = 'Book of Mormon' THEN 'BOM'
        WHEN volume = 'Doctrine and Covenants' THEN 'D&C'
        WHEN volume = 'Pearl of Great Price' THEN 'PGP'
        ELSE 'Other'
    END AS volume_abbr
FROM scripture_study
ORDER BY volume_abbr",
    },
    CatalogQuery {
        name: "Outer Join Example",
        sql: "SELECT ss.volume, ss.book, ss.chapter, ss.verse, yi.year_of_event, d.doctrine_name
FROM scripture_study AS ss
LEFT OUTER JOIN year_info AS yi ON ss.id = yi.scripture_study_id
LEFT OUTER JOIN doctrine AS d ON ss.id = d.scripture_study_id
ORDER BY ss.volume, ss.book",
    },
    CatalogQuery {
        name: "Group By Example",
        sql: "SELECT ss.volume, COUNT(*) AS scripture_count
FROM scripture_study AS ss
GROUP BY ss.volume
ORDER BY scripture_count DESC",
    },
    CatalogQuery {
        name: "Subqueries Example",
        sql: "SELECT volume, book, chapter, verse
FROM scripture_study
WHERE id IN (
    SELECT scripture_study_id
    FROM year_info
    WHERE age = 'BC'
)
ORDER BY volume, book",
    },
    // Percentage of all scripture_study entries that each volume takes up.
    CatalogQuery {
        name: "Window Functions Example",
        sql: "SELECT
    volume,
    volume_count,
    100.0 * volume_count / SUM(volume_count) OVER () AS pct_of_total
FROM (
    SELECT volume, COUNT(*) AS volume_count
    FROM scripture_study
    GROUP BY volume
) AS volume_counts
ORDER BY pct_of_total DESC;",
    },
];

/// Looks up a catalog query by its exact name.
pub fn find(name: &str) -> Option<&'static CatalogQuery> {
    CATALOG.iter().find(|q| q.name == name)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|q| q.name)
}
