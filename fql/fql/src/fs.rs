//! Map paths to the type of the filesystem they live on, read from the
//! mount table.

use once_cell::sync::Lazy;

/// The mount table, reduced to (mountpoint, filesystem type) pairs ordered
/// so that the most specific mountpoint wins.
#[derive(Debug, Clone)]
pub struct FsMap {
    mounts: Vec<(String, String)>,
}

impl FsMap {
    /// Parse `/proc/mounts`-formatted text.
    pub fn parse(text: &str) -> FsMap {
        let mut mounts: Vec<(String, String)> = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let _device = fields.next()?;
                let mountpoint = fields.next()?;
                let fstype = fields.next()?;

                Some((unescape_mount_path(mountpoint), fstype.to_string()))
            })
            .collect();

        mounts.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        FsMap { mounts }
    }

    pub fn load() -> Option<FsMap> {
        let text = std::fs::read_to_string("/proc/mounts").ok()?;
        Some(Self::parse(&text))
    }

    pub fn lookup(&self, path: &str) -> Option<&str> {
        self.mounts
            .iter()
            .find(|(mountpoint, _)| path_has_prefix(path, mountpoint))
            .map(|(_, fstype)| fstype.as_str())
    }
}

fn path_has_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }

    path == prefix
        || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
}

/// Mountpoints with blanks appear as octal escapes in the mount table.
fn unescape_mount_path(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let mut code = 0u32;
        let mut consumed = String::new();

        while consumed.len() < 3 {
            match chars.peek() {
                Some(d @ '0'..='7') => {
                    code = code * 8 + (*d as u32 - '0' as u32);
                    consumed.push(*d);
                    chars.next();
                }
                _ => break,
            }
        }

        if consumed.len() == 3 {
            out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
        } else {
            // Fewer than three digits isn't an escape; keep the text.
            out.push('\\');
            out.push_str(&consumed);
        }
    }

    out
}

static FS_MAP: Lazy<Option<FsMap>> = Lazy::new(FsMap::load);

/// Process-wide lookup facade; the mount table is read once on first use.
/// Relative paths are resolved before matching.
pub fn filesystem_of(path: &str) -> Option<String> {
    let resolved = std::fs::canonicalize(path)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.to_string());

    FS_MAP
        .as_ref()
        .and_then(|map| map.lookup(&resolved))
        .map(str::to_string)
}

#[cfg(test)]
mod test {
    use super::*;

    const MOUNTS: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
/dev/sda1 / ext4 rw,relatime 0 0
/dev/sdb1 /home ext4 rw,relatime 0 0
/dev/sdc1 /home/backups xfs rw,relatime 0 0
tmpfs /mnt/with\\040space tmpfs rw 0 0
";

    #[test]
    fn longest_prefix_wins() {
        let map = FsMap::parse(MOUNTS);

        assert_eq!(map.lookup("/etc/passwd"), Some("ext4"));
        assert_eq!(map.lookup("/sys/kernel"), Some("sysfs"));
        assert_eq!(map.lookup("/home/alice/x"), Some("ext4"));
        assert_eq!(map.lookup("/home/backups/x"), Some("xfs"));
        assert_eq!(map.lookup("/home/backupsy"), Some("ext4"));
    }

    #[test]
    fn escaped_mountpoints() {
        let map = FsMap::parse(MOUNTS);

        assert_eq!(map.lookup("/mnt/with space/file"), Some("tmpfs"));
    }

    #[test]
    fn unescape() {
        assert_eq!(unescape_mount_path("/a\\040b"), "/a b");
        assert_eq!(unescape_mount_path("/plain"), "/plain");
    }
}
