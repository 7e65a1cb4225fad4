//! Format 217: tables move from the paragraph-level grid description to a
//! tabular inset with one text inset per cell.

use crate::document::Document;
use crate::markup::find_paragraph_end;
use crate::step::{step, ConverterModule};
use lyx2lyx_common::ConvertResult;
use lyx2lyx_parser::find_re;
use once_cell::sync::Lazy;
use regex::Regex;

static LYXTABLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\LyXTable$").unwrap());
static COLUMN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(\d+) (\d+) (\d+)(?: "([^"]*)")?(?: "([^"]*)")?"#).unwrap());

/// Field `n` of a whitespace separated grid line, `0` when absent.
fn field<'a>(fields: &[&'a str], n: usize) -> &'a str {
    fields.get(n).copied().unwrap_or("0")
}

struct Column {
    alignment: String,
    leftline: String,
    rightline: String,
    width: String,
    special: String,
}

impl Column {
    fn parse(line: &str) -> Option<Self> {
        let captures = COLUMN_RE.captures(line.trim())?;
        let text = |n: usize| captures.get(n).map_or("", |m| m.as_str()).to_string();
        Some(Self {
            alignment: text(1),
            leftline: text(2),
            rightline: text(3),
            width: text(4),
            special: text(5),
        })
    }
}

/// Rewrite every paragraph flagged with `\LyXTable`.
///
/// The grid after the flag reads: `multicol4`, a dimension line (`rows
/// columns rotate islongtable endhead endfirsthead endfoot endlastfoot`), one
/// line per row (`topline bottomline cont_row newpage`), one per column
/// (`alignment leftline rightline "width" "special"`) and one per cell
/// (`multicolumn alignment topline bottomline linebreaks rotate usebox`),
/// closed by a blank line. The paragraph text then holds the cell contents
/// separated by `\newline`; cells continuing a multicolumn have none.
fn update_tabular(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_re(&document.body, &LYXTABLE_RE, i..) {
        i = k + 1;
        let flag = document.body[k].trim_end_matches("\\LyXTable").trim_end().to_string();
        if document.body.get(k + 1).map(String::as_str) != Some("multicol4") {
            document.malformed("table without a multicol4 description")?;
            document.body[k] = flag;
            continue;
        }
        let Some(table) = read_grid(&document.body, k + 2) else {
            document.malformed("unreadable table description")?;
            document.body[k] = flag;
            continue;
        };
        let paragraph = table.text_start.saturating_sub(1);
        let Some(end) = find_paragraph_end(&document.body, paragraph) else {
            document.malformed("unterminated inset inside a table")?;
            document.body[k] = flag;
            continue;
        };
        let contents = split_cells(&document.body[table.text_start..end]);
        let inset = table.to_inset(contents);
        if flag.is_empty() {
            document.body.splice(k..end, inset);
        } else {
            document.body[k] = flag;
            document.body.splice(k + 1..end, inset);
        }
    }
    Ok(())
}

struct Grid {
    dims: Vec<String>,
    rows: Vec<Vec<String>>,
    columns: Vec<Column>,
    cells: Vec<Vec<String>>,
    text_start: usize,
}

fn read_grid(body: &[String], start: usize) -> Option<Grid> {
    let dims: Vec<String> = body.get(start)?.split_whitespace().map(str::to_string).collect();
    let rows: usize = dims.first()?.parse().ok()?;
    let columns: usize = dims.get(1)?.parse().ok()?;
    let mut i = start + 1;

    let rows_end = i.checked_add(rows)?;
    let row_lines = body.get(i..rows_end)?;
    let rows_info = row_lines
        .iter()
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect();
    i = rows_end;

    let columns_end = i.checked_add(columns)?;
    let column_lines = body.get(i..columns_end)?;
    let columns_info = column_lines
        .iter()
        .map(|line| Column::parse(line))
        .collect::<Option<Vec<_>>>()?;
    i = columns_end;

    let cells_end = rows.checked_mul(columns).and_then(|n| i.checked_add(n))?;
    let cell_lines = body.get(i..cells_end)?;
    let cells = cell_lines
        .iter()
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect();
    i = cells_end;

    // The blank line closing the description.
    while body.get(i).is_some_and(|line| line.trim().is_empty()) {
        i += 1;
    }
    Some(Grid {
        dims,
        rows: rows_info,
        columns: columns_info,
        cells,
        text_start: i,
    })
}

/// Cell contents of the table paragraph, split at `\newline` lines.
fn split_cells(text: &[String]) -> Vec<Vec<String>> {
    let mut cells = vec![Vec::new()];
    for line in text {
        if line.trim_end() == "\\newline" {
            cells.push(Vec::new());
        } else if !line.trim().is_empty() {
            if let Some(cell) = cells.last_mut() {
                cell.push(line.clone());
            }
        }
    }
    cells
}

impl Grid {
    fn to_inset(&self, contents: Vec<Vec<String>>) -> Vec<String> {
        let dim = |n: usize| self.dims.get(n).map_or("0", String::as_str);
        let mut lines = vec![
            String::new(),
            "\\begin_inset  Tabular".to_string(),
            format!(
                "<LyXTabular version=\"1\" rows=\"{}\" columns=\"{}\">",
                self.rows.len(),
                self.columns.len()
            ),
            format!(
                "<Features rotate=\"{}\" islongtable=\"{}\" endhead=\"{}\" endfirsthead=\"{}\" endfoot=\"{}\" endlastfoot=\"{}\">",
                dim(2),
                dim(3),
                dim(4),
                dim(5),
                dim(6),
                dim(7)
            ),
        ];
        for column in &self.columns {
            lines.push(format!(
                "<Column alignment=\"{}\" valignment=\"0\" leftline=\"{}\" rightline=\"{}\" width=\"{}\" special=\"{}\">",
                column.alignment, column.leftline, column.rightline, column.width, column.special
            ));
        }

        let mut contents = contents.into_iter();
        for (r, row) in self.rows.iter().enumerate() {
            let row: Vec<&str> = row.iter().map(String::as_str).collect();
            lines.push(format!(
                "<Row topline=\"{}\" bottomline=\"{}\" newpage=\"{}\">",
                field(&row, 0),
                field(&row, 1),
                field(&row, 3)
            ));
            for (c, column) in self.columns.iter().enumerate() {
                let cell: Vec<&str> = self
                    .cells
                    .get(r * self.columns.len() + c)
                    .map(|cell| cell.iter().map(String::as_str).collect())
                    .unwrap_or_default();
                let multicolumn = field(&cell, 0);
                lines.push(format!(
                    "<Cell multicolumn=\"{}\" alignment=\"{}\" valignment=\"0\" topline=\"{}\" bottomline=\"{}\" leftline=\"{}\" rightline=\"{}\" rotate=\"{}\" usebox=\"{}\" width=\"{}\" special=\"{}\">",
                    multicolumn,
                    field(&cell, 1),
                    field(&cell, 2),
                    field(&cell, 3),
                    column.leftline,
                    column.rightline,
                    field(&cell, 5),
                    field(&cell, 6),
                    column.width,
                    column.special
                ));
                lines.push("\\begin_inset Text".to_string());
                lines.push(String::new());
                lines.push("\\layout Standard".to_string());
                lines.push(String::new());
                if multicolumn != "2" {
                    lines.extend(contents.next().unwrap_or_default());
                }
                lines.push("\\end_inset".to_string());
                lines.push("</Cell>".to_string());
            }
            lines.push("</Row>".to_string());
        }
        lines.push("</LyXTabular>".to_string());
        lines.push(String::new());
        lines.push("\\end_inset".to_string());
        lines
    }
}

pub static MODULE: ConverterModule = ConverterModule {
    name: "1_1_6_0",
    convert: &[step!(217 => [update_tabular])],
    revert: &[],
};
