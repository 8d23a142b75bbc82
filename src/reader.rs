//! Reader for the line-oriented knowledge file format.
//!
//! One fact or rule per line; blank lines and lines starting with `#` are
//! skipped:
//!
//! ```text
//! # blocks world
//! fact: (on a b)
//! rule: ((on ?x ?y)) -> (above ?x ?y)
//! rule: ((above ?x ?y) (above ?y ?z)) -> (above ?x ?z)
//! ```

use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use bstr::ByteSlice;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map},
    multi::{many0, many1},
    sequence::{delimited, pair, preceded, separated_pair},
    IResult,
};

use crate::engine::{Implication, Knowledge};
use crate::error::{Error, Result};
use crate::term::{Statement, Term};

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && c != '(' && c != ')'
}

fn symbol(input: &str) -> IResult<&str, &str> {
    take_while1(is_symbol_char)(input)
}

fn term(input: &str) -> IResult<&str, Term> {
    map(symbol, Term::from)(input)
}

/// `(predicate term ...)`
fn statement(input: &str) -> IResult<&str, Statement> {
    map(
        delimited(
            pair(char('('), multispace0),
            pair(symbol, many0(preceded(multispace0, term))),
            pair(multispace0, char(')')),
        ),
        |(predicate, terms)| Statement::new(predicate, terms),
    )(input)
}

/// `((premise) ...) -> (consequent)`
fn implication(input: &str) -> IResult<&str, Implication> {
    let premises = delimited(
        char('('),
        many1(preceded(multispace0, statement)),
        preceded(multispace0, char(')')),
    );
    map(
        separated_pair(premises, delimited(multispace0, tag("->"), multispace0), statement),
        |(lhs, rhs)| Implication { lhs, rhs },
    )(input)
}

fn knowledge(input: &str) -> IResult<&str, Knowledge> {
    alt((
        map(preceded(pair(tag("fact:"), multispace0), statement), Knowledge::Fact),
        map(preceded(pair(tag("rule:"), multispace0), implication), Knowledge::Rule),
    ))(input)
}

fn parse_line<'a, T>(
    parser: impl FnMut(&'a str) -> IResult<&'a str, T>,
    text: &'a str,
    line: usize,
) -> Result<T> {
    all_consuming(delimited(multispace0, parser, multispace0))(text)
        .map(|(_, value)| value)
        .map_err(|err| Error::Parse {
            line,
            message: match err {
                nom::Err::Error(e) | nom::Err::Failure(e) if e.input.is_empty() => {
                    "unexpected end of line".to_string()
                }
                nom::Err::Error(e) | nom::Err::Failure(e) => {
                    format!("unexpected input at `{}`", e.input)
                }
                nom::Err::Incomplete(_) => "incomplete input".to_string(),
            },
        })
}

/// Parse a bare statement such as `(above a ?z)`.
///
/// # Errors
///
/// Returns [`Error::Parse`] if `text` is not a single statement.
pub fn parse_statement(text: &str) -> Result<Statement> {
    parse_line(statement, text, 1)
}

/// Parse one `fact: ...` or `rule: ...` line.
///
/// # Errors
///
/// Returns [`Error::Parse`] if `text` is neither.
pub fn parse_knowledge(text: &str) -> Result<Knowledge> {
    parse_line(knowledge, text, 1)
}

/// Parse every fact and rule in `input`, in order.
///
/// # Errors
///
/// Returns [`Error::Parse`] for the first line that is not valid UTF-8 or
/// not a fact or rule.
pub fn read_bytes(input: &[u8]) -> Result<Vec<Knowledge>> {
    input
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with(b"#"))
        .map(|(number, line)| {
            let text = line.to_str().map_err(|err| Error::Parse {
                line: number,
                message: err.to_string(),
            })?;
            parse_line(knowledge, text, number)
        })
        .collect()
}

/// Read a knowledge file from disk.
///
/// # Errors
///
/// Fails if the file cannot be read or any line fails to parse; the error
/// names the file.
pub fn read_file(path: impl AsRef<Path>) -> anyhow::Result<Vec<Knowledge>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    read_bytes(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}

impl FromStr for Statement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_statement(s)
    }
}

impl FromStr for Knowledge {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_knowledge(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KnowledgeBase;

    const BLOCKS: &str = "\
# blocks world
fact: (on a b)
fact: (on b table)

rule: ((on ?x ?y)) -> (above ?x ?y)
rule: ((above ?x ?y) (above ?y ?z)) -> (above ?x ?z)
";

    #[test]
    fn test_parse_statement() {
        let statement: Statement = " ( above  a ?z ) ".parse().unwrap();
        assert_eq!(statement, Statement::new("above", ["a", "?z"]));
        assert_eq!(parse_statement("(empty)").unwrap().arity(), 0);
    }

    #[test]
    fn test_parse_rule() {
        let item = parse_knowledge("rule: ((on ?x ?y) (on ?y ?z)) -> (stacked ?x ?z)").unwrap();
        let Knowledge::Rule(rule) = item else {
            panic!("expected a rule");
        };
        assert_eq!(rule.lhs.len(), 2);
        assert_eq!(rule.lhs[1], Statement::new("on", ["?y", "?z"]));
        assert_eq!(rule.rhs, Statement::new("stacked", ["?x", "?z"]));
    }

    #[test]
    fn test_display_reads_back() {
        let item = parse_knowledge("rule: ((isa ?x ?y)  (isa ?y ?z))->(isa ?x ?z)").unwrap();
        assert_eq!(item.to_string(), "rule: ((isa ?x ?y) (isa ?y ?z)) -> (isa ?x ?z)");
        assert_eq!(item.to_string().parse::<Knowledge>().unwrap(), item);
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(parse_statement("(on a b"), Err(Error::Parse { line: 1, .. })));
        assert!(parse_knowledge("fact (on a b)").is_err());
        assert!(parse_knowledge("rule: (on ?x) -> (above ?x)").is_err());
        assert!(parse_knowledge("fact: (on a b) trailing").is_err());
        assert!(parse_knowledge("rule: () -> (above ?x)").is_err());
    }

    #[test]
    fn test_read_bytes_skips_comments_and_reports_line_numbers() {
        let items = read_bytes(BLOCKS.as_bytes()).unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0], Knowledge::Fact(Statement::new("on", ["a", "b"])));

        let err = read_bytes(b"fact: (on a b)\n\nfact: on b c\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 3, .. }), "{err}");

        let err = read_bytes(b"fact: (on \xff b)\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }

    #[test]
    fn test_read_file_into_knowledge_base() {
        let path = std::env::temp_dir().join(format!("microtms-reader-{}.txt", std::process::id()));
        std::fs::write(&path, BLOCKS).unwrap();
        let items = read_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let mut kb = KnowledgeBase::new();
        for item in items {
            kb.assert(item).unwrap();
        }

        let query = parse_statement("(above a ?z)").unwrap();
        let mut above: Vec<_> = kb
            .ask(query)
            .into_iter()
            .map(|answer| answer.bindings.to_string())
            .collect();
        above.sort();
        assert_eq!(above, vec!["?z : b", "?z : table"]);
    }

    #[test]
    fn test_read_file_names_the_missing_file() {
        let err = read_file("/nonexistent/microtms/kb.txt").unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read /nonexistent/microtms/kb.txt"));
    }
}
