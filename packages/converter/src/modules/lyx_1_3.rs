//! Format 221 (LyX 1.3).

use crate::document::Document;
use crate::step::{step, ConverterModule};
use lyx2lyx_common::ConvertResult;
use lyx2lyx_parser::{
    del_token, find_end_of_inset, find_token, find_token_exact, get_option, get_value, set_option,
};

/// Graphics insets drop parameters that only repeat the defaults and the
/// size selector that now follows from the parameters present.
fn change_insetgraphics(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_inset Graphics", i..) {
        i = k + 1;
        let Some(mut j) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after a graphics inset")?;
            continue;
        };
        let lines = &mut document.body;
        lines[k] = "\\begin_inset Graphics".to_string();

        if get_value(lines, "display", k..j) == "default" {
            j = del_token(lines, "display", k, j);
        }
        if get_value(lines, "rotateOrigin", k..j) == "leftBaseline" {
            j = del_token(lines, "rotateOrigin", k, j);
        }
        match find_token_exact(lines, "rotate", k + 1..j) {
            Some(r) => {
                lines.remove(r);
                j -= 1;
            }
            None => j = del_token(lines, "rotateAngle", k, j),
        }

        let size_line = find_token_exact(lines, "size_type", k..j)
            .or_else(|| find_token_exact(lines, "size_kind", k..j));
        if let Some(s) = size_line {
            let size_type = lines[s].split_whitespace().nth(1).unwrap_or("").to_string();
            lines.remove(s);
            j -= 1;
            match size_type.as_str() {
                "0" | "original" => {
                    j = del_token(lines, "width", k, j);
                    j = del_token(lines, "height", k, j);
                    j = del_token(lines, "scale", k, j);
                }
                "2" | "scale" => {
                    j = del_token(lines, "width", k, j);
                    j = del_token(lines, "height", k, j);
                    if get_value(lines, "scale", k..j) == "100" {
                        j = del_token(lines, "scale", k, j);
                    }
                }
                _ => j = del_token(lines, "scale", k, j),
            }
        }

        let lyxsize_line = find_token_exact(lines, "lyxsize_type", k..j)
            .or_else(|| find_token_exact(lines, "lyxsize_kind", k..j));
        if let Some(s) = lyxsize_line {
            let lyxsize_type = lines[s].split_whitespace().nth(1).unwrap_or("").to_string();
            lines.remove(s);
            j -= 1;
            j = del_token(lines, "lyxwidth", k, j);
            j = del_token(lines, "lyxheight", k, j);
            if !matches!(lyxsize_type.as_str(), "2" | "scale")
                || get_value(lines, "lyxscale", k..j) == "100"
            {
                del_token(lines, "lyxscale", k, j);
            }
        }
    }
    Ok(())
}

/// Columns without a fixed width have block alignment.
fn change_tabular(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        if !line.starts_with("<column") {
            continue;
        }
        if get_option(line, "width") != Some("0pt") && get_option(line, "alignment").is_some() {
            *line = set_option(line, "alignment", "block");
        }
    }
    Ok(())
}

pub static MODULE: ConverterModule = ConverterModule {
    name: "1_3",
    convert: &[step!(221 => [change_insetgraphics, change_tabular])],
    revert: &[],
};
