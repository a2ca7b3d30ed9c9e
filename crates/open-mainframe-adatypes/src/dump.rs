//! Hex dump of record and format buffers for trace output.

use std::fmt::Write;

use crate::charset::Charset;

/// Dumps stop after this many bytes.
const MAX_FORMAT_LENGTH: usize = 4096;

/// Render `bytes` as hex, ASCII and EBCDIC columns.
///
/// `group` bytes are printed together, `per_line` bytes per line. Runs of
/// identical lines collapse into one `skipped equal lines` marker.
pub fn format_bytes(header: &str, bytes: &[u8], group: usize, per_line: usize) -> String {
    let group = group.max(1);
    let per_line = per_line.max(1);
    let data = &bytes[..bytes.len().min(MAX_FORMAT_LENGTH)];

    let mut out = String::new();
    let _ = writeln!(out, "{header} length={}", bytes.len());

    let mut previous: Option<&[u8]> = None;
    let mut noticed = false;
    let lines = data.chunks(per_line).collect::<Vec<_>>();
    for (nr, line) in lines.iter().enumerate() {
        let offset = nr * per_line;
        let is_last = nr + 1 == lines.len();
        if !is_last && previous == Some(*line) {
            if !noticed {
                let _ = writeln!(out, "{offset:04X} skipped equal lines");
                noticed = true;
            }
            continue;
        }
        noticed = false;
        previous = Some(line);

        let _ = write!(out, "{offset:04x} ");
        for i in 0..per_line {
            match line.get(i) {
                Some(b) => {
                    let _ = write!(out, "{b:02X}");
                }
                None => out.push_str("  "),
            }
            if (i + 1) % group == 0 {
                out.push(' ');
            }
        }
        out.push_str(" [");
        for i in 0..per_line {
            out.push(line.get(i).map_or(' ', |b| printable(*b)));
        }
        out.push_str("] [");
        for i in 0..per_line {
            out.push(
                line.get(i)
                    .map_or(' ', |b| printable(Charset::ebcdic_to_latin1(*b))),
            );
        }
        out.push_str("]\n");
    }
    out
}

fn printable(b: u8) -> char {
    if (0x20..0x7f).contains(&b) {
        char::from(b)
    } else {
        '.'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_lines() {
        let dump = format_bytes("ABC :", b"ABCDEFGHIJKLMNOPQRSTUVWXYT", 4, 8);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[0], "ABC : length=26");
        assert_eq!(lines[1], "0000 41424344 45464748  [ABCDEFGH] [........]");
        assert_eq!(lines[2], "0008 494A4B4C 4D4E4F50  [IJKLMNOP] [...<(+|&]");
        assert_eq!(lines[4], "0018 5954               [YT      ] [..      ]");
    }

    #[test]
    fn test_skip_equal_lines() {
        let dump = format_bytes("ABC :", b"ABCDEFGHABCDEFGHABCDEFGHABCDEFGH", 4, 8);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[2], "0008 skipped equal lines");
        assert_eq!(lines[3], "0018 41424344 45464748  [ABCDEFGH] [........]");
        assert_eq!(lines.len(), 4);
    }
}
