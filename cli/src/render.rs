use db::Table;

/// Renders a table as left-aligned text columns under a header row.
pub fn table(table: &Table) -> String {
    let header: Vec<String> = table.columns().to_vec();
    let rows: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|c| c.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    line(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    line(&mut out, &rule, &widths);
    for row in &rows {
        line(&mut out, row, &widths);
    }
    out
}

fn line(out: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect();
    out.push_str(padded.join("  ").trim_end());
    out.push('\n');
}

/// A horizontal bar of `count` marks, for counts printed in a terminal.
pub fn bar(count: usize) -> String {
    "#".repeat(count.min(60))
}

#[cfg(test)]
mod tests {
    use db::Cell;

    use super::*;

    #[test]
    fn columns_are_aligned() {
        let rendered = table(&Table::new(
            vec!["id", "book"],
            vec![
                vec![Cell::Integer(1), "Genesis".into()],
                vec![Cell::Integer(22), Cell::Null],
            ],
        ));

        assert_eq!(
            rendered,
            "id  book\n--  -------\n1   Genesis\n22\n"
        );
    }

    #[test]
    fn empty_table_still_has_a_header() {
        let rendered = table(&Table::new(vec!["id"], Vec::new()));
        assert_eq!(rendered, "id\n--\n");
    }
}
