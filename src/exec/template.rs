// src/exec/template.rs

//! Command templates.
//!
//! A template such as `rclone move %file "remote:/in box/%dir"` is tokenized
//! once at startup, with shell-style quoting and `$VAR` expansion, and then
//! rendered per dispatch by substituting the placeholders:
//!
//! - `%file`: absolute path of the staged file or archive
//! - `%dir`: directory of the original file relative to the watch root
//!   (slash-separated, empty at the root)
//! - `%name`: base file name
//!
//! The program (first token) is never substituted.

use std::fmt;
use std::path::Path;

use anyhow::{bail, Result};

/// A tokenized command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

/// A concrete program + arguments, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Values substituted into a template for one dispatch.
#[derive(Debug, Clone, Copy)]
pub struct Placeholders<'a> {
    pub file: &'a Path,
    pub dir: &'a str,
    pub name: &'a str,
}

impl CommandTemplate {
    /// Tokenize `template`, expanding environment variables from the process
    /// environment. Unset variables expand to the empty string.
    pub fn parse(template: &str) -> Result<Self> {
        Self::parse_with_env(template, |var| std::env::var(var).ok())
    }

    /// Like [`CommandTemplate::parse`], with an explicit variable lookup.
    pub fn parse_with_env<F>(template: &str, mut lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let words = split_words(template)?;

        let mut tokens = words.into_iter().map(|segments| {
            segments
                .into_iter()
                .map(|seg| {
                    if seg.expand {
                        shellexpand::env_with_context_no_errors(&seg.text, |var: &str| {
                            Some(lookup(var).unwrap_or_default())
                        })
                        .into_owned()
                    } else {
                        seg.text
                    }
                })
                .collect::<String>()
        });

        let Some(program) = tokens.next() else {
            bail!("command template is empty");
        };
        if program.is_empty() {
            bail!("command template has an empty program name");
        }

        Ok(Self {
            program,
            args: tokens.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Substitute placeholders into every argument.
    pub fn render(&self, values: &Placeholders<'_>) -> Invocation {
        let file = values.file.to_string_lossy();
        Invocation {
            program: self.program.clone(),
            args: self
                .args
                .iter()
                .map(|arg| substitute(arg, &file, values.dir, values.name))
                .collect(),
        }
    }
}

/// Single left-to-right pass, so substituted values are never rescanned.
fn substitute(token: &str, file: &str, dir: &str, name: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut rest = token;

    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];

        if let Some(after) = tail.strip_prefix("%file") {
            out.push_str(file);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("%dir") {
            out.push_str(dir);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("%name") {
            out.push_str(name);
            rest = after;
        } else {
            out.push('%');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}

/// Part of a word; `expand` is false for single-quoted or escaped text.
#[derive(Debug)]
struct Segment {
    text: String,
    expand: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

#[derive(Debug, Default)]
struct WordBuilder {
    words: Vec<Vec<Segment>>,
    current: Option<Vec<Segment>>,
}

impl WordBuilder {
    fn push(&mut self, c: char, expand: bool) {
        let word = self.current.get_or_insert_with(Vec::new);
        match word.last_mut() {
            Some(seg) if seg.expand == expand => seg.text.push(c),
            _ => word.push(Segment {
                text: c.to_string(),
                expand,
            }),
        }
    }

    /// Mark the current word as started (so `''` yields an empty argument)
    /// and close the current segment so expansion never spans a quote.
    fn boundary(&mut self) {
        let word = self.current.get_or_insert_with(Vec::new);
        word.push(Segment {
            text: String::new(),
            expand: false,
        });
    }

    fn finish_word(&mut self) {
        if let Some(mut word) = self.current.take() {
            word.retain(|seg| !seg.text.is_empty());
            self.words.push(word);
        }
    }
}

fn split_words(input: &str) -> Result<Vec<Vec<Segment>>> {
    let mut builder = WordBuilder::default();
    let mut quote = Quote::None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Quote::None, c) if c.is_whitespace() => builder.finish_word(),
            (Quote::None, '\'') => {
                builder.boundary();
                quote = Quote::Single;
            }
            (Quote::None, '"') => {
                builder.boundary();
                quote = Quote::Double;
            }
            (Quote::None, '\\') => match chars.next() {
                Some(next) => builder.push(next, false),
                None => bail!("command template ends with a dangling backslash"),
            },
            (Quote::Single, '\'') | (Quote::Double, '"') => {
                builder.boundary();
                quote = Quote::None;
            }
            (Quote::Single, c) => builder.push(c, false),
            (Quote::Double, '\\') => match chars.next() {
                Some(next @ ('"' | '\\' | '$' | '`')) => builder.push(next, false),
                Some(next) => {
                    builder.push('\\', true);
                    builder.push(next, true);
                }
                None => bail!("command template has an unterminated double quote"),
            },
            (_, c) => builder.push(c, true),
        }
    }

    match quote {
        Quote::None => {}
        Quote::Single => bail!("command template has an unterminated single quote"),
        Quote::Double => bail!("command template has an unterminated double quote"),
    }

    builder.finish_word();
    Ok(builder.words)
}
