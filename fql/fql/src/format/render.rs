//! Render a parsed format string for one file.

use std::io::Write;

use chrono::{Local, TimeZone};

use crate::fileinfo::{FileAttr, FileInfo};

use super::parser::{AttrNode, FormatNode, ParsedFormat};

/// `ctime`-style rendering for date attributes without a sub-format.
const DEFAULT_DATE_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

pub fn write_formatted(
    format: &ParsedFormat,
    info: &FileInfo,
    out: &mut dyn Write,
) -> std::io::Result<()> {
    for node in &format.nodes {
        match node {
            FormatNode::Text(text) => out.write_all(text.as_bytes())?,
            FormatNode::Attr(attr) => write_attr(attr, info, out)?,
        }
    }

    Ok(())
}

fn write_attr(node: &AttrNode, info: &FileInfo, out: &mut dyn Write) -> std::io::Result<()> {
    let Some(attr) = info.attr(node.attr) else {
        log::error!("unexpected file attribute: '{}'", node.attr);
        return Ok(());
    };

    let rendered = match attr {
        FileAttr::Text(text) => pad_string(&text, node),
        FileAttr::Number(n) => format_number(n, node.attr == 'm', node),
        FileAttr::Time(secs) => {
            pad_string(&format_time(secs, node.date_format.as_deref()), node)
        }
        FileAttr::Float(value) => format_float(value, node),
    };

    out.write_all(rendered.as_bytes())
}

/// Width pads, precision truncates; `-` left-justifies.
fn pad_string(text: &str, node: &AttrNode) -> String {
    let mut out: String = match node.precision {
        Some(precision) => text.chars().take(precision).collect(),
        None => text.to_string(),
    };

    if let Some(width) = node.width {
        let len = out.chars().count();

        if len < width {
            let padding = " ".repeat(width - len);

            if node.flags.minus {
                out.push_str(&padding);
            } else {
                out.insert_str(0, &padding);
            }
        }
    }

    out
}

fn format_number(n: i64, octal: bool, node: &AttrNode) -> String {
    let magnitude = n.unsigned_abs();

    let mut digits = if octal {
        format!("{magnitude:o}")
    } else {
        magnitude.to_string()
    };

    // Integer precision means a minimum digit count.
    if let Some(precision) = node.precision {
        while digits.len() < precision {
            digits.insert(0, '0');
        }
    }

    if node.flags.hash && octal && !digits.starts_with('0') {
        digits.insert(0, '0');
    }

    let sign = if n < 0 {
        "-"
    } else if node.flags.plus {
        "+"
    } else if node.flags.space {
        " "
    } else {
        ""
    };

    match node.width {
        Some(width) if sign.len() + digits.len() < width => {
            let padding = width - sign.len() - digits.len();

            if node.flags.minus {
                format!("{sign}{digits}{}", " ".repeat(padding))
            } else if node.flags.zero {
                format!("{sign}{}{digits}", "0".repeat(padding))
            } else {
                format!("{}{sign}{digits}", " ".repeat(padding))
            }
        }
        _ => format!("{sign}{digits}"),
    }
}

fn format_float(value: f64, node: &AttrNode) -> String {
    let precision = node.precision.unwrap_or(6);
    let mut out = format!("{value:.precision$}");

    if node.flags.plus && value >= 0.0 {
        out.insert(0, '+');
    }

    if let Some(width) = node.width {
        if out.len() < width {
            let padding = " ".repeat(width - out.len());

            if node.flags.minus {
                out.push_str(&padding);
            } else {
                out.insert_str(0, &padding);
            }
        }
    }

    out
}

fn format_time(secs: i64, date_format: Option<&str>) -> String {
    let Some(datetime) = Local.timestamp_opt(secs, 0).earliest() else {
        return String::new();
    };

    match date_format {
        Some(run) => {
            let format: String = run.chars().map(|c| format!("%{c}")).collect();
            datetime.format(&format).to_string()
        }
        None => datetime.format(DEFAULT_DATE_FORMAT).to_string(),
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    use similar_asserts::assert_eq;

    use super::super::parser::parse_format;
    use super::*;

    fn render(format: &str, info: &FileInfo) -> String {
        let parsed = parse_format(format).unwrap();
        let mut out = Vec::new();

        write_formatted(&parsed, info, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn sample_file() -> (tempfile::TempDir, FileInfo) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.log");

        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"0123456789").unwrap();
        drop(file);

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let info = FileInfo::get(
            &dir.path().to_string_lossy(),
            &path.to_string_lossy(),
        )
        .unwrap();

        (dir, info)
    }

    #[test]
    fn renders_attributes() {
        let (_dir, info) = sample_file();

        assert_eq!(render("%s bytes\n", &info), "10 bytes\n");
        assert_eq!(render("%f", &info), "sample.log");
        assert_eq!(render("%P", &info), "sample.log");
    }

    #[test]
    fn width_and_alignment() {
        let (_dir, info) = sample_file();

        assert_eq!(render("%6s|", &info), "    10|");
        assert_eq!(render("%-6s|", &info), "10    |");
        assert_eq!(render("%06s|", &info), "000010|");
        assert_eq!(render("%+s", &info), "+10");
        assert_eq!(render("%.3f", &info), "sam");
    }

    #[test]
    fn octal_permissions() {
        let (_dir, info) = sample_file();

        assert_eq!(render("%m", &info), "644");
        assert_eq!(render("%#m", &info), "0644");
    }

    #[test]
    fn date_subformat() {
        let (_dir, info) = sample_file();

        // The file was just created; its mtime year matches the current one.
        let year = render("%TY", &info);
        assert_eq!(year.len(), 4);
        assert!(year.starts_with("20"), "{year}");
    }

    #[test]
    fn literal_and_escape_passthrough() {
        let (_dir, info) = sample_file();

        assert_eq!(render("a\\tb 100%%\n", &info), "a\tb 100%\n");
    }
}
