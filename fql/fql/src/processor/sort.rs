//! Sort stage: buffer every path, read the requested attributes at ingest,
//! emit in order at close.

use std::cmp::Ordering;

use fql_parser::error::Error;

use crate::fileinfo::{FileAttr, FileInfo};

use super::{Processor, ProcessorFlags};

/// Attribute letters a sort string may reference.
pub const SORTABLE_FIELDS: &str = "bfgGhHiklmMnpsSuUyYpPFDaAcCtT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: char,
    pub ascending: bool,
}

/// Parse a sort string: whitespace-separated groups of `-?X` keys, where `X`
/// is drawn from [`SORTABLE_FIELDS`]. Any other character rejects the whole
/// string.
pub fn parse_sort_string(spec: &str) -> Result<Vec<SortKey>, Error> {
    let mut keys = Vec::new();

    for token in spec.split_whitespace() {
        let mut chars = token.chars().peekable();

        while let Some(c) = chars.next() {
            let (field, ascending) = if c == '-' {
                match chars.next() {
                    Some(field) => (field, false),
                    None => {
                        return Err(Error::new_simple(
                            "couldn't parse sort string: missing field after `-'",
                        ));
                    }
                }
            } else {
                (c, true)
            };

            if !SORTABLE_FIELDS.contains(field) {
                return Err(Error::new_simple(format!(
                    "found unexpected character in sort string: '{field}'"
                )));
            }

            keys.push(SortKey { field, ascending });
        }
    }

    if keys.is_empty() {
        return Err(Error::new_simple("sort string is empty"));
    }

    Ok(keys)
}

struct SortEntry {
    /// The starting-point the path was found under; it travels with the
    /// path so multi-directory searches keep the right context downstream.
    dir: String,
    path: String,
    attrs: Vec<FileAttr>,
}

pub struct SortProcessor {
    flags: ProcessorFlags,
    keys: Vec<SortKey>,
    entries: Vec<SortEntry>,
    cursor: usize,
}

impl SortProcessor {
    pub fn new(orderby: &str) -> Result<Self, Error> {
        Ok(SortProcessor {
            flags: ProcessorFlags::default(),
            keys: parse_sort_string(orderby)?,
            entries: Vec::new(),
            cursor: 0,
        })
    }

}

impl Processor for SortProcessor {
    fn is_readable(&self) -> bool {
        self.flags.readable
    }

    fn is_closed(&self) -> bool {
        self.flags.closed
    }

    fn read(&mut self) -> Option<(String, String)> {
        let entry = self.entries.get(self.cursor)?;
        let produced = (entry.dir.clone(), entry.path.clone());

        self.cursor += 1;

        // Stay readable until every buffered path is out.
        if self.cursor >= self.entries.len() {
            self.flags.readable = false;
            self.flags.closed = true;
        }

        Some(produced)
    }

    fn write(&mut self, dir: &str, path: &str) {
        let info = match FileInfo::get(dir, path) {
            Ok(info) => info,
            Err(e) => {
                eprintln!("{e}");
                return;
            }
        };

        let mut attrs = Vec::with_capacity(self.keys.len());

        for key in &self.keys {
            match info.attr(key.field) {
                Some(attr) => attrs.push(attr),
                None => {
                    eprintln!("couldn't read file attribute from {path}");
                    return;
                }
            }
        }

        self.entries.push(SortEntry {
            dir: dir.to_string(),
            path: path.to_string(),
            attrs,
        });
    }

    fn close(&mut self) {
        if self.flags.closed {
            return;
        }

        // sort_by is stable; equal keys keep their input order.
        let keys = std::mem::take(&mut self.keys);
        self.entries.sort_by(|a, b| {
            for (i, key) in keys.iter().enumerate() {
                let ordering = a.attrs[i].compare(&b.attrs[i]);

                if ordering != Ordering::Equal {
                    return if key.ascending {
                        ordering
                    } else {
                        ordering.reverse()
                    };
                }
            }

            Ordering::Equal
        });
        self.keys = keys;

        if self.entries.is_empty() {
            self.flags.closed = true;
        } else {
            self.flags.readable = true;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_sort_strings() {
        assert_eq!(
            parse_sort_string("s").unwrap(),
            vec![SortKey {
                field: 's',
                ascending: true
            }]
        );
        assert_eq!(
            parse_sort_string("-s f").unwrap(),
            vec![
                SortKey {
                    field: 's',
                    ascending: false
                },
                SortKey {
                    field: 'f',
                    ascending: true
                },
            ]
        );
        // Adjacent keys without whitespace.
        assert_eq!(parse_sort_string("s-t").unwrap().len(), 2);
    }

    #[test]
    fn rejects_invalid_sort_strings() {
        assert!(parse_sort_string("q").is_err());
        assert!(parse_sort_string("s -").is_err());
        assert!(parse_sort_string("").is_err());
        assert!(parse_sort_string("s!f").is_err());
    }

    fn populated_dir() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();

        for (name, size) in [("e1", 5), ("e2", 1), ("e3", 9), ("e4", 3), ("e5", 7)] {
            std::fs::write(dir.path().join(name), vec![b'x'; size]).unwrap();
        }

        let path = dir.path().to_string_lossy().into_owned();
        (dir, path)
    }

    fn drain(sort: &mut SortProcessor) -> Vec<(String, String)> {
        let mut out = Vec::new();

        sort.close();
        while sort.is_readable() && !sort.is_closed() {
            if let Some(produced) = sort.read() {
                out.push(produced);
            }
        }

        out
    }

    #[test]
    fn sorts_by_size() {
        let (_dir, dir) = populated_dir();
        let mut sort = SortProcessor::new("s").unwrap();

        for name in ["e1", "e2", "e3", "e4", "e5"] {
            sort.write(&dir, &format!("{dir}/{name}"));
        }

        let order: Vec<String> = drain(&mut sort)
            .into_iter()
            .map(|(_, p)| p.rsplit('/').next().unwrap_or_default().to_string())
            .collect();

        assert_eq!(order, vec!["e2", "e4", "e1", "e5", "e3"]);
        assert!(sort.is_closed());
    }

    #[test]
    fn descending_reverses() {
        let (_dir, dir) = populated_dir();
        let mut sort = SortProcessor::new("-s").unwrap();

        for name in ["e1", "e2", "e3", "e4", "e5"] {
            sort.write(&dir, &format!("{dir}/{name}"));
        }

        let order: Vec<String> = drain(&mut sort)
            .into_iter()
            .map(|(_, p)| p.rsplit('/').next().unwrap_or_default().to_string())
            .collect();

        assert_eq!(order, vec!["e3", "e5", "e1", "e4", "e2"]);
    }

    #[test]
    fn equal_keys_preserve_input_order() {
        let dir = tempfile::tempdir().unwrap();

        for name in ["b", "c", "a"] {
            std::fs::write(dir.path().join(name), b"xx").unwrap();
        }

        let root = dir.path().to_string_lossy().into_owned();
        let mut sort = SortProcessor::new("s").unwrap();

        for name in ["b", "c", "a"] {
            sort.write(&root, &format!("{root}/{name}"));
        }

        let order: Vec<String> = drain(&mut sort)
            .into_iter()
            .map(|(_, p)| p.rsplit('/').next().unwrap_or_default().to_string())
            .collect();

        // All sizes are equal; input order survives the stable sort.
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn entries_keep_their_starting_point() {
        let one = tempfile::tempdir().unwrap();
        let two = tempfile::tempdir().unwrap();

        std::fs::write(one.path().join("big"), vec![b'x'; 9]).unwrap();
        std::fs::write(two.path().join("small"), vec![b'x'; 1]).unwrap();

        let one_str = one.path().to_string_lossy().into_owned();
        let two_str = two.path().to_string_lossy().into_owned();

        let mut sort = SortProcessor::new("s").unwrap();
        sort.write(&one_str, &format!("{one_str}/big"));
        sort.write(&two_str, &format!("{two_str}/small"));

        let drained = drain(&mut sort);

        // Sorted by size, and each path still carries its own directory.
        assert_eq!(drained[0], (two_str.clone(), format!("{two_str}/small")));
        assert_eq!(drained[1], (one_str.clone(), format!("{one_str}/big")));
    }

    #[test]
    fn empty_sort_closes_on_close() {
        let mut sort = SortProcessor::new("s").unwrap();

        sort.close();
        assert!(sort.is_closed());
        assert!(!sort.is_readable());
    }
}
