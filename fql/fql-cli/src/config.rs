//! Default option values from the INI configuration files. Flags given on
//! the command line always win.

use std::path::PathBuf;

const GLOBAL_CONFIG: &str = "/etc/fql/config";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub quote: Option<bool>,
    pub follow: Option<bool>,
    pub max_depth: Option<u32>,
    pub regex_type: Option<String>,
    pub order_by: Option<String>,
    pub printf: Option<String>,
    pub exec_ignore_errors: Option<bool>,
    pub verbosity: Option<u8>,
    pub color: Option<bool>,
}

impl Defaults {
    /// Read the global file first, then the local one on top of it.
    pub fn load() -> Defaults {
        let mut defaults = Defaults::default();

        let mut paths = vec![PathBuf::from(GLOBAL_CONFIG)];
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(PathBuf::from(home).join(".fql").join("config"));
        }

        for path in paths {
            if let Ok(text) = std::fs::read_to_string(&path) {
                log::debug!("reading configuration from {}", path.display());
                defaults.parse(&text);
            }
        }

        defaults
    }

    /// Parse INI text. Unknown sections and keys are silently ignored.
    pub fn parse(&mut self, text: &str) {
        let mut section = String::new();

        for line in text.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = name.trim().to_string();
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match (section.as_str(), key) {
                ("general", "quote") => self.quote = parse_bool(value),
                ("general", "follow-links") => self.follow = parse_bool(value),
                ("general", "max-depth") => self.max_depth = value.parse().ok(),
                ("general", "regex-type") => self.regex_type = Some(value.to_string()),
                ("general", "order-by") => self.order_by = Some(value.to_string()),
                ("general", "printf") => self.printf = Some(value.to_string()),
                ("general", "exec-ignore-errors") => {
                    self.exec_ignore_errors = parse_bool(value)
                }
                ("logging", "verbosity") => {
                    self.verbosity = value.parse().ok().filter(|v| *v <= 6)
                }
                ("logging", "color") => self.color = parse_bool(value),
                _ => {}
            }
        }
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_known_keys() {
        let mut defaults = Defaults::default();

        defaults.parse(
            "# comment\n\
             [general]\n\
             quote = yes\n\
             follow-links = no\n\
             max-depth = 4\n\
             order-by = -s\n\
             [logging]\n\
             verbosity = 3\n\
             color = no\n",
        );

        assert_eq!(defaults.quote, Some(true));
        assert_eq!(defaults.follow, Some(false));
        assert_eq!(defaults.max_depth, Some(4));
        assert_eq!(defaults.order_by.as_deref(), Some("-s"));
        assert_eq!(defaults.verbosity, Some(3));
        assert_eq!(defaults.color, Some(false));
    }

    #[test]
    fn ignores_unknown_keys_and_sections() {
        let mut defaults = Defaults::default();

        defaults.parse("[general]\nfrobnicate = yes\n[weird]\nquote = yes\n");

        assert_eq!(defaults, Defaults::default());
    }

    #[test]
    fn later_files_override() {
        let mut defaults = Defaults::default();

        defaults.parse("[general]\nquote = no\n");
        defaults.parse("[general]\nquote = yes\n");

        assert_eq!(defaults.quote, Some(true));
    }

    #[test]
    fn out_of_range_verbosity_is_dropped() {
        let mut defaults = Defaults::default();

        defaults.parse("[logging]\nverbosity = 9\n");

        assert_eq!(defaults.verbosity, None);
    }
}
