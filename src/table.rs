//! Console tables for command output.
//!
//! Survey answers can be whole sentences, so cells are capped at
//! [`MAX_CELL_WIDTH`] characters and cut with an ellipsis. Widths count
//! characters, not bytes, so accented Portuguese text lines up.

use std::fmt::Write as _;

pub const MAX_CELL_WIDTH: usize = 48;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let headers = headers.iter().map(|h| clean_cell(h)).collect::<Vec<_>>();
    let rows = rows
        .iter()
        .map(|row| {
            (0..headers.len())
                .map(|idx| row.get(idx).map(|c| clean_cell(c)).unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut widths = headers.iter().map(|h| width(h)).collect::<Vec<_>>();
    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(width(cell));
        }
    }
    let numeric = (0..headers.len())
        .map(|idx| !rows.is_empty() && rows.iter().all(|r| looks_numeric(&r[idx])))
        .collect::<Vec<_>>();

    let mut output = String::new();
    let _ = writeln!(output, "{}", join_line(&headers, &widths, &numeric));
    let rule = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", join_line(&rule, &widths, &numeric));
    for row in &rows {
        let _ = writeln!(output, "{}", join_line(row, &widths, &numeric));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn join_line(cells: &[String], widths: &[usize], numeric: &[bool]) -> String {
    let line = cells
        .iter()
        .zip(widths)
        .zip(numeric)
        .map(|((cell, &w), &right)| {
            if right {
                format!("{cell:>w$}")
            } else {
                format!("{cell:<w$}")
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn width(value: &str) -> usize {
    value.chars().count()
}

fn looks_numeric(value: &str) -> bool {
    value.is_empty() || value.parse::<f64>().is_ok()
}

fn clean_cell(value: &str) -> String {
    let flat = value
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect::<String>();
    if width(&flat) <= MAX_CELL_WIDTH {
        return flat;
    }
    let mut cut = flat.chars().take(MAX_CELL_WIDTH - 1).collect::<String>();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn aligns_accented_text_and_right_aligns_numbers() {
        let rendered = render_table(
            &strings(&["comunidade", "n"]),
            &[strings(&["Café torrado", "12"]), strings(&["Pau Darco", "3"])],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "comunidade     n");
        assert_eq!(lines[2], "Café torrado  12");
        assert_eq!(lines[3], "Pau Darco      3");
    }

    #[test]
    fn long_answers_are_cut_and_flattened() {
        let long = "a\n".repeat(40);
        let rendered = render_table(&strings(&["resposta"]), &[vec![long]]);
        let row = rendered.lines().nth(2).unwrap();
        assert_eq!(row.chars().count(), MAX_CELL_WIDTH);
        assert!(row.ends_with('…'));
    }

    #[test]
    fn short_rows_are_padded() {
        let rendered = render_table(&strings(&["a", "b"]), &[strings(&["x"])]);
        assert_eq!(rendered.lines().count(), 3);
    }
}
