//! Terminal rendering for `--json` reports and the `list`/`types` tables.

use serde::Serialize;

const GAP: &str = "  ";

/// Pretty JSON on stdout, the shape every `--json` flag promises.
pub fn print_json<T: Serialize>(report: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Left-aligned columns under a dashed rule. Cells past the header count
/// are printed unpadded.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let widths = column_widths(headers, &rows);
    println!("{}", format_row(headers, &widths));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    println!("{}", rule.join(GAP));
    for row in &rows {
        println!("{}", format_row(row, &widths));
    }
}

/// Widest cell per header column, counted in chars so registry paths with
/// non-ASCII names line up.
fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    (0..headers.len())
        .map(|col| {
            rows.iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(headers[col].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect()
}

fn format_row<S: AsRef<str>>(cells: &[S], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .enumerate()
        .map(|(col, cell)| {
            let width = widths.get(col).copied().unwrap_or(0);
            format!("{:width$}", cell.as_ref())
        })
        .collect();
    padded.join(GAP).trim_end().to_string()
}

/// `-` for a missing skill, id pattern or timestamp.
pub fn or_dash(value: Option<impl ToString>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_cover_headers_and_unicode_cells() {
        let rows = vec![
            vec!["docs/plans/café.md".to_string(), "plan".to_string()],
            vec!["README.md".to_string(), "readme".to_string()],
        ];
        assert_eq!(column_widths(&["PATH", "TYPE"], &rows), vec![18, 6]);
    }

    #[test]
    fn rows_drop_trailing_padding() {
        let row = format_row(&["plan", "-"], &[6, 4]);
        assert_eq!(row, "plan    -");
    }

    #[test]
    fn missing_values_render_as_dash() {
        assert_eq!(or_dash(None::<&str>), "-");
        assert_eq!(or_dash(Some("writing-plans")), "writing-plans");
    }
}
