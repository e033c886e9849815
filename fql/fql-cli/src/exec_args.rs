//! Split `--exec prog args… ;` groups out of the raw argument list before
//! clap sees it; clap has no way to express the `;` terminator.

use fql::processor::ExecArgs;

pub fn steal(argv: &[String]) -> Result<(Vec<String>, Vec<ExecArgs>), String> {
    let mut remaining = Vec::with_capacity(argv.len());
    let mut templates = Vec::new();
    let mut group: Option<Vec<String>> = None;

    for arg in argv {
        match &mut group {
            Some(collected) => {
                if arg == ";" {
                    let Some(template) = ExecArgs::from_argv(collected) else {
                        return Err("invalid --exec option, argument list is empty".to_string());
                    };

                    templates.push(template);
                    group = None;
                } else {
                    collected.push(arg.clone());
                }
            }
            None if arg == "--exec" => group = Some(Vec::new()),
            None => remaining.push(arg.clone()),
        }
    }

    if group.is_some() {
        return Err("invalid --exec option, `;' argument is missing".to_string());
    }

    Ok((remaining, templates))
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn steals_exec_groups() {
        let (rest, templates) = steal(&args(&[
            "fql", "-e", "size>1k", "--exec", "cp", "{}", "/backup", ";", "--limit", "3",
        ]))
        .unwrap();

        assert_eq!(rest, args(&["fql", "-e", "size>1k", "--limit", "3"]));
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].program, "cp");
        assert_eq!(templates[0].args, args(&["{}", "/backup"]));
    }

    #[test]
    fn multiple_groups() {
        let (rest, templates) = steal(&args(&[
            "fql", "--exec", "true", ";", "--exec", "touch", "{}", ";",
        ]))
        .unwrap();

        assert_eq!(rest, args(&["fql"]));
        assert_eq!(templates.len(), 2);
    }

    #[test]
    fn unterminated_group_is_an_error() {
        assert!(steal(&args(&["fql", "--exec", "true"])).is_err());
    }

    #[test]
    fn empty_group_is_an_error() {
        assert!(steal(&args(&["fql", "--exec", ";"])).is_err());
    }
}
