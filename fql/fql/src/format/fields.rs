//! Substitute `%{name}` and `%name` field references for their single-letter
//! form before the format string is lexed.

const FIELD_CHARS: [char; 22] = [
    'A', 'b', 'C', 'D', 'f', 'F', 'g', 'G', 'h', 'H', 'i', 'k', 'l', 'm', 'M', 'n', 'p', 's',
    'S', 'T', 'u', 'U',
];

// `permissions-octal` must come before `permissions`; prefixes resolve in
// table order.
const FIELD_NAMES: [&str; 22] = [
    "atime",
    "blocks",
    "ctime",
    "device",
    "filename",
    "filesystem",
    "group",
    "gid",
    "parent",
    "starting-point",
    "inode",
    "kb",
    "link",
    "permissions-octal",
    "permissions",
    "hardlinks",
    "path",
    "bytes",
    "sparseness",
    "mtime",
    "username",
    "uid",
];

pub fn map_field_name(name: &str) -> Option<char> {
    FIELD_NAMES
        .iter()
        .position(|candidate| *candidate == name)
        .map(|i| FIELD_CHARS[i])
}

/// Rewrite `%{bytes}`-style and `%bytes`-style references to `%s` form.
/// Only text following a `%` (and its optional flags and width) is touched.
pub fn substitute_field_names(format: &str) -> String {
    let mut out = String::with_capacity(format.len());
    let mut rest = format;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..=pos]);
        rest = &rest[pos + 1..];

        if let Some(tail) = rest.strip_prefix('%') {
            out.push('%');
            rest = tail;
            continue;
        }

        // Flags, width and precision stay in front of the substituted letter.
        let spec_len = rest
            .find(|c: char| !c.is_ascii_digit() && !"-0# +.".contains(c))
            .unwrap_or(rest.len());
        out.push_str(&rest[..spec_len]);
        rest = &rest[spec_len..];

        if let Some(tail) = rest.strip_prefix('{') {
            if let Some(end) = tail.find('}') {
                if let Some(c) = map_field_name(&tail[..end]) {
                    out.push(c);
                    rest = &tail[end + 1..];
                    continue;
                }
            }
        } else if let Some((c, name)) = FIELD_NAMES
            .iter()
            .find(|name| rest.starts_with(**name))
            .and_then(|name| map_field_name(name).map(|c| (c, *name)))
        {
            out.push(c);
            rest = &rest[name.len()..];
        }
    }

    out.push_str(rest);
    out
}
