//! Read file attributes by their single-letter names, as used by the printf
//! format engine and the sort stage.

use std::cmp::Ordering;
use std::os::unix::fs::{FileTypeExt, MetadataExt};

use fql_parser::error::Error;

use nix::unistd::{Gid, Group, Uid, User};

/// A typed file attribute. Attributes of the same letter always carry the
/// same variant, which is what makes them comparable in the sort stage.
#[derive(Debug, Clone, PartialEq)]
pub enum FileAttr {
    Text(String),
    Number(i64),
    Time(i64),
    Float(f64),
}

impl FileAttr {
    pub fn compare(&self, other: &FileAttr) -> Ordering {
        match (self, other) {
            (FileAttr::Text(a), FileAttr::Text(b)) => a.cmp(b),
            (FileAttr::Number(a), FileAttr::Number(b)) => a.cmp(b),
            (FileAttr::Time(a), FileAttr::Time(b)) => a.cmp(b),
            (FileAttr::Float(a), FileAttr::Float(b)) => a.total_cmp(b),
            _ => {
                debug_assert!(false, "attributes of different types are not comparable");
                Ordering::Equal
            }
        }
    }
}

/// Attributes of one found file, read once via `lstat`.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// The starting-point under which the file was found.
    pub starting_point: String,
    pub path: String,
    meta: std::fs::Metadata,
}

impl FileInfo {
    pub fn get(starting_point: &str, path: &str) -> Result<FileInfo, Error> {
        let meta = std::fs::symlink_metadata(path)
            .map_err(|_| Error::new_simple(format!("couldn't stat file: {path}")))?;

        Ok(FileInfo {
            starting_point: starting_point.to_string(),
            path: path.to_string(),
            meta,
        })
    }

    /// Look up an attribute by its letter; `None` for unknown letters.
    pub fn attr(&self, field: char) -> Option<FileAttr> {
        let meta = &self.meta;

        Some(match field {
            // File's name with any leading directories removed.
            'f' => FileAttr::Text(basename(&self.path).to_string()),
            // File's name without the starting-point under which it was found.
            'P' => FileAttr::Text(self.path_below_starting_point().to_string()),
            'p' => FileAttr::Text(self.path.clone()),
            // Leading directories of the file's name.
            'h' => FileAttr::Text(dirname(&self.path)),
            'H' => FileAttr::Text(self.starting_point.clone()),
            'g' => FileAttr::Text(group_name(meta.gid())),
            'u' => FileAttr::Text(user_name(meta.uid())),
            // Type of the filesystem the file is on; usable with `filesystem`.
            'F' => FileAttr::Text(
                crate::fs::filesystem_of(&self.path).unwrap_or_default(),
            ),
            // Object of a symbolic link, empty for everything else.
            'l' => FileAttr::Text(if meta.file_type().is_symlink() {
                std::fs::read_link(&self.path)
                    .map(|t| t.to_string_lossy().into_owned())
                    .unwrap_or_default()
            } else {
                String::new()
            }),
            // Disk space in 512-byte blocks.
            'b' => FileAttr::Number(meta.blocks() as i64),
            'D' => FileAttr::Number(meta.dev() as i64),
            'G' => FileAttr::Number(meta.gid() as i64),
            'i' => FileAttr::Number(meta.ino() as i64),
            'k' => FileAttr::Number((meta.size() / 1024) as i64),
            'n' => FileAttr::Number(meta.nlink() as i64),
            's' => FileAttr::Number(meta.size() as i64),
            'S' => FileAttr::Float(sparseness(
                meta.blksize(),
                meta.blocks(),
                meta.size(),
            )),
            'U' => FileAttr::Number(meta.uid() as i64),
            'A' => FileAttr::Time(meta.atime()),
            'C' => FileAttr::Time(meta.ctime()),
            'T' => FileAttr::Time(meta.mtime()),
            'a' => FileAttr::Number(meta.atime()),
            'c' => FileAttr::Number(meta.ctime()),
            't' => FileAttr::Number(meta.mtime()),
            // Permission bits; the format engine renders these in octal.
            'm' => FileAttr::Number((meta.mode() & 0o777) as i64),
            'M' => FileAttr::Text(permissions_string(meta.mode())),
            'X' => FileAttr::Text(extension(&self.path).unwrap_or_default().to_string()),
            'N' => FileAttr::Text(name_without_extension(&self.path)),
            'y' => FileAttr::Text(type_char(meta.file_type()).to_string()),
            // Type after following symlinks; `N` for a broken link.
            'Y' => FileAttr::Text(match std::fs::metadata(&self.path) {
                Ok(target) => type_char(target.file_type()).to_string(),
                Err(_) => "N".to_string(),
            }),
            _ => return None,
        })
    }

    fn path_below_starting_point(&self) -> &str {
        let mut len = self.starting_point.len();

        if !self.starting_point.ends_with('/') && self.path.len() > len {
            len += 1;
        }

        self.path.get(len..).unwrap_or("")
    }
}

fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

fn dirname(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(pos) => path[..pos].to_string(),
        None => ".".to_string(),
    }
}

fn extension(path: &str) -> Option<&str> {
    let name = basename(path);
    name.rfind('.').map(|pos| &name[pos..])
}

fn name_without_extension(path: &str) -> String {
    let name = basename(path);

    match name.rfind('.') {
        Some(pos) => name[..pos].to_string(),
        None => name.to_string(),
    }
}

fn user_name(uid: u32) -> String {
    User::from_uid(Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|user| user.name)
        .unwrap_or_else(|| uid.to_string())
}

fn group_name(gid: u32) -> String {
    Group::from_gid(Gid::from_raw(gid))
        .ok()
        .flatten()
        .map(|group| group.name)
        .unwrap_or_else(|| gid.to_string())
}

fn sparseness(blksize: u64, blocks: u64, size: u64) -> f64 {
    if size > 0 {
        let sparseness = (blksize as f64 / 8.0) * blocks as f64 / size as f64;

        if sparseness.is_nan() || sparseness.is_infinite() {
            0.0
        } else {
            sparseness
        }
    } else if blocks > 0 {
        1.0
    } else {
        0.0
    }
}

fn type_char(file_type: std::fs::FileType) -> char {
    if file_type.is_symlink() {
        'l'
    } else if file_type.is_dir() {
        'd'
    } else if file_type.is_fifo() {
        'p'
    } else if file_type.is_socket() {
        's'
    } else if file_type.is_block_device() {
        'b'
    } else if file_type.is_char_device() {
        'c'
    } else if file_type.is_file() {
        'f'
    } else {
        '-'
    }
}

/// Symbolic permissions in `ls` style, including the setuid/setgid/sticky
/// letters.
fn permissions_string(mode: u32) -> String {
    const RWX: [&[u8; 3]; 8] = [
        b"---", b"--x", b"-w-", b"-wx", b"r--", b"r-x", b"rw-", b"rwx",
    ];

    let mut bits = [b'-'; 10];

    bits[0] = match mode & 0o170000 {
        0o140000 => b's',
        0o120000 => b'l',
        0o060000 => b'b',
        0o040000 => b'd',
        0o020000 => b'c',
        0o010000 => b'p',
        _ => b'-',
    };

    bits[1..4].copy_from_slice(RWX[((mode >> 6) & 7) as usize]);
    bits[4..7].copy_from_slice(RWX[((mode >> 3) & 7) as usize]);
    bits[7..10].copy_from_slice(RWX[(mode & 7) as usize]);

    if mode & 0o4000 != 0 {
        bits[3] = if mode & 0o100 != 0 { b's' } else { b'S' };
    }

    if mode & 0o2000 != 0 {
        bits[6] = if mode & 0o010 != 0 { b's' } else { b'l' };
    }

    if mode & 0o1000 != 0 {
        bits[9] = if mode & 0o001 != 0 { b't' } else { b'T' };
    }

    String::from_utf8_lossy(&bits).into_owned()
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    #[test]
    fn basic_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"hello world").unwrap();
        drop(file);

        let starting_point = dir.path().to_string_lossy().into_owned();
        let path = path.to_string_lossy().into_owned();
        let info = FileInfo::get(&starting_point, &path).unwrap();

        assert_eq!(info.attr('s'), Some(FileAttr::Number(11)));
        assert_eq!(info.attr('f'), Some(FileAttr::Text("hello.txt".to_string())));
        assert_eq!(info.attr('P'), Some(FileAttr::Text("hello.txt".to_string())));
        assert_eq!(info.attr('X'), Some(FileAttr::Text(".txt".to_string())));
        assert_eq!(info.attr('N'), Some(FileAttr::Text("hello".to_string())));
        assert_eq!(info.attr('y'), Some(FileAttr::Text("f".to_string())));
        assert_eq!(info.attr('H'), Some(FileAttr::Text(starting_point.clone())));
        assert_eq!(info.attr('h'), Some(FileAttr::Text(starting_point)));
        assert_eq!(info.attr('k'), Some(FileAttr::Number(0)));
        assert_eq!(info.attr('Z'), None);
    }

    #[test]
    fn stat_failure() {
        assert!(FileInfo::get("/tmp", "/tmp/definitely/not/there").is_err());
    }

    #[test]
    fn permissions() {
        assert_eq!(permissions_string(0o100644), "-rw-r--r--");
        assert_eq!(permissions_string(0o100755), "-rwxr-xr-x");
        assert_eq!(permissions_string(0o040755), "drwxr-xr-x");
        assert_eq!(permissions_string(0o104755), "-rwsr-xr-x");
        assert_eq!(permissions_string(0o101755), "-rwxr-xr-t");
    }

    #[test]
    fn attribute_ordering() {
        assert_eq!(
            FileAttr::Number(1).compare(&FileAttr::Number(2)),
            Ordering::Less
        );
        assert_eq!(
            FileAttr::Text("a".into()).compare(&FileAttr::Text("a".into())),
            Ordering::Equal
        );
        assert_eq!(
            FileAttr::Float(2.5).compare(&FileAttr::Float(1.0)),
            Ordering::Greater
        );
    }

    #[test]
    fn helpers() {
        assert_eq!(basename("/a/b/c.txt"), "c.txt");
        assert_eq!(basename("plain"), "plain");
        assert_eq!(dirname("/a/b/c.txt"), "/a/b");
        assert_eq!(dirname("/c.txt"), "/");
        assert_eq!(dirname("plain"), ".");
        assert_eq!(extension("/a/b.tar.gz"), Some(".gz"));
        assert_eq!(extension("/a/none"), None);
    }
}
