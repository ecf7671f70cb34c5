use std::fmt::Write as _;

/// Renders `rows` under `headers` as left-aligned columns separated by two
/// spaces, with a dashed rule under the header.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| cell_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell_width(cell));
        }
    }

    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let mut output = String::new();
    for line in std::iter::once(headers)
        .chain(std::iter::once(rule.as_slice()))
        .chain(rows.iter().map(Vec::as_slice))
    {
        let _ = writeln!(output, "{}", format_line(line, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let cell = flatten(cell);
            let padding = width.saturating_sub(cell_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line
}

/// Tag values may carry line breaks or tabs; keep each row on one line.
fn flatten(value: &str) -> String {
    value
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect()
}

fn cell_width(value: &str) -> usize {
    value.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_columns_and_trims_trailing_space() {
        let headers = vec!["suffix".to_string(), "count".to_string()];
        let rows = vec![
            vec!["St".to_string(), "12".to_string()],
            vec!["Blvd".to_string(), "3".to_string()],
        ];
        let rendered = render_table(&headers, &rows);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec!["suffix  count", "------  -----", "St      12", "Blvd    3"]
        );
    }

    #[test]
    fn control_characters_do_not_break_rows() {
        let headers = vec!["value".to_string()];
        let rows = vec![vec!["Calle\nReal\tWest".to_string()]];
        let rendered = render_table(&headers, &rows);
        assert_eq!(rendered.lines().nth(2), Some("Calle Real West"));
    }

    #[test]
    fn width_counts_characters_not_bytes() {
        let headers = vec!["value".to_string(), "n".to_string()];
        let rows = vec![vec!["Cañada".to_string(), "1".to_string()]];
        let rendered = render_table(&headers, &rows);
        assert_eq!(rendered.lines().nth(2), Some("Cañada  1"));
    }
}
