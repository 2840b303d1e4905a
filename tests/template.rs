// tests/template.rs

use std::collections::HashMap;
use std::error::Error;
use std::path::Path;

use settled::exec::{CommandTemplate, Placeholders};

type TestResult = Result<(), Box<dyn Error>>;

fn env(vars: &[(&str, &str)]) -> impl FnMut(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn substitutes_file_dir_and_name() -> TestResult {
    let template = CommandTemplate::parse("echo %file %dir %name")?;
    let inv = template.render(&Placeholders {
        file: Path::new("/tmp/stage/sub/a.txt"),
        dir: "sub",
        name: "a.txt",
    });

    assert_eq!(inv.program, "echo");
    assert_eq!(inv.args, vec!["/tmp/stage/sub/a.txt", "sub", "a.txt"]);
    assert_eq!(inv.to_string(), "echo /tmp/stage/sub/a.txt sub a.txt");
    Ok(())
}

#[test]
fn placeholders_inside_larger_tokens() -> TestResult {
    let template = CommandTemplate::parse("rclone move %file remote:/in/%dir/%name.bak")?;
    let inv = template.render(&Placeholders {
        file: Path::new("/s/x/y.bin"),
        dir: "x",
        name: "y.bin",
    });
    assert_eq!(inv.args, vec!["move", "/s/x/y.bin", "remote:/in/x/y.bin.bak"]);
    Ok(())
}

#[test]
fn program_is_not_substituted() -> TestResult {
    let template = CommandTemplate::parse("%name %name")?;
    let inv = template.render(&Placeholders {
        file: Path::new("/s/a"),
        dir: "",
        name: "a",
    });
    assert_eq!(inv.program, "%name");
    assert_eq!(inv.args, vec!["a"]);
    Ok(())
}

#[test]
fn substituted_values_are_not_rescanned() -> TestResult {
    let template = CommandTemplate::parse("cmd %dir")?;
    let inv = template.render(&Placeholders {
        file: Path::new("/s/weird/f"),
        dir: "100%name",
        name: "f",
    });
    assert_eq!(inv.args, vec!["100%name"]);
    Ok(())
}

#[test]
fn unknown_percent_sequences_are_kept() -> TestResult {
    let template = CommandTemplate::parse("date +%Y-%m %files")?;
    let inv = template.render(&Placeholders {
        file: Path::new("/f"),
        dir: "",
        name: "f",
    });
    assert_eq!(inv.args, vec!["+%Y-%m", "/fs"]);
    Ok(())
}

#[test]
fn quoting_rules() -> TestResult {
    let template = CommandTemplate::parse_with_env(
        r#"upload "remote:/in box/%dir" 'literal $HOME' "a\"b" back\ slash ''"#,
        env(&[("HOME", "/home/u")]),
    )?;
    assert_eq!(template.program(), "upload");
    assert_eq!(
        template.args(),
        &[
            "remote:/in box/%dir".to_string(),
            "literal $HOME".to_string(),
            "a\"b".to_string(),
            "back slash".to_string(),
            String::new(),
        ]
    );
    Ok(())
}

#[test]
fn expands_environment_variables() -> TestResult {
    let template = CommandTemplate::parse_with_env(
        r#"rclone copy %file "$REMOTE:${BASE}/x" $UNSET_VAR end"#,
        env(&[("REMOTE", "s3"), ("BASE", "bucket")]),
    )?;
    assert_eq!(template.args(), &["copy", "%file", "s3:bucket/x", "", "end"]);
    Ok(())
}

#[test]
fn escaped_dollar_is_literal() -> TestResult {
    let template = CommandTemplate::parse_with_env(r#"echo \$HOME "\$HOME""#, env(&[("HOME", "/h")]))?;
    assert_eq!(template.args(), &["$HOME", "$HOME"]);
    Ok(())
}

#[test]
fn rejects_malformed_templates() {
    assert!(CommandTemplate::parse("").is_err());
    assert!(CommandTemplate::parse("   ").is_err());
    assert!(CommandTemplate::parse("echo 'open").is_err());
    assert!(CommandTemplate::parse("echo \"open").is_err());
    assert!(CommandTemplate::parse("echo trailing\\").is_err());
    assert!(CommandTemplate::parse("'' arg").is_err());
}
