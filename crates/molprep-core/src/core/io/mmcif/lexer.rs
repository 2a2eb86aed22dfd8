//! CIF tokenizer and data block assembly.
//!
//! Produces one [`CifBlock`] holding every category of the first data block. Looped
//! and single-item categories share the same [`Category`] shape so readers never care
//! which form a file used.

use super::{MmcifError, MmcifParseErrorKind};
use std::collections::HashMap;
use std::io::BufRead;
use std::iter::Peekable;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    DataBlock(String),
    Loop,
    Tag(String),
    /// `None` for the unquoted null markers `.` and `?`.
    Value(Option<String>),
}

#[derive(Debug, Clone)]
struct Lexeme {
    token: Token,
    line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<Option<String>>,
    /// Line on which the row's first value appears.
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Category {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Category {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Value of `column` in `row`; `None` when the column is absent or the value is null.
    pub fn value<'a>(&self, row: &'a Row, column: &str) -> Option<&'a str> {
        let index = self.column(column)?;
        row.values.get(index)?.as_deref()
    }

    /// Value of `column` in the first row, for single-item categories.
    pub fn single(&self, column: &str) -> Option<&str> {
        self.rows.first().and_then(|row| self.value(row, column))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CifBlock {
    pub name: String,
    categories: HashMap<String, Category>,
}

impl CifBlock {
    /// Looks up a category by name, with or without the leading underscore.
    pub fn category(&self, name: &str) -> Option<&Category> {
        let name = name.strip_prefix('_').unwrap_or(name);
        self.categories.get(&name.to_ascii_lowercase())
    }
}

pub fn parse(reader: &mut impl BufRead, fault_tolerant: bool) -> Result<CifBlock, MmcifError> {
    let lexemes = tokenize(reader)?;
    assemble(lexemes, fault_tolerant)
}

fn tokenize(reader: &mut impl BufRead) -> Result<Vec<Lexeme>, MmcifError> {
    let mut out = Vec::new();
    let mut lines = reader.lines().enumerate();

    while let Some((idx, line)) = lines.next() {
        let mut line = line?;
        if line.ends_with('\r') {
            line.pop();
        }
        let line_num = idx + 1;

        if let Some(first) = line.strip_prefix(';') {
            let mut text = first.to_string();
            let mut closed = false;
            for (_, next) in lines.by_ref() {
                let next = next?;
                let next = next.trim_end_matches('\r');
                if next.starts_with(';') {
                    closed = true;
                    break;
                }
                text.push('\n');
                text.push_str(next);
            }
            if !closed {
                return Err(MmcifError::Parse {
                    line: line_num,
                    kind: MmcifParseErrorKind::UnterminatedTextField,
                });
            }
            out.push(Lexeme {
                token: Token::Value(Some(text.trim().to_string())),
                line: line_num,
            });
            continue;
        }

        tokenize_line(&line, line_num, &mut out);
    }
    Ok(out)
}

fn tokenize_line(line: &str, line_num: usize, out: &mut Vec<Lexeme>) {
    let bytes = line.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if c == b'#' {
            break;
        }
        if c == b'\'' || c == b'"' {
            // A quote only closes the value when followed by whitespace or end of line.
            let start = i + 1;
            let mut j = start;
            while j < bytes.len()
                && !(bytes[j] == c && (j + 1 == bytes.len() || bytes[j + 1].is_ascii_whitespace()))
            {
                j += 1;
            }
            out.push(Lexeme {
                token: Token::Value(Some(line[start..j.min(bytes.len())].to_string())),
                line: line_num,
            });
            i = j + 1;
            continue;
        }

        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        out.push(Lexeme {
            token: classify(&line[start..i]),
            line: line_num,
        });
    }
}

fn classify(word: &str) -> Token {
    let lowered = word.to_ascii_lowercase();
    if word.starts_with('_') {
        Token::Tag(word.to_string())
    } else if lowered == "loop_" {
        Token::Loop
    } else if let Some(name) = lowered.strip_prefix("data_") {
        Token::DataBlock(name.to_string())
    } else if word == "." || word == "?" {
        Token::Value(None)
    } else {
        Token::Value(Some(word.to_string()))
    }
}

/// Splits `_category.column` into lower-case category name and column name.
fn split_tag(tag: &str) -> (String, String) {
    let tag = tag.strip_prefix('_').unwrap_or(tag);
    match tag.split_once('.') {
        Some((category, column)) => (category.to_ascii_lowercase(), column.to_string()),
        None => (tag.to_ascii_lowercase(), String::new()),
    }
}

fn assemble(lexemes: Vec<Lexeme>, fault_tolerant: bool) -> Result<CifBlock, MmcifError> {
    let mut block = CifBlock::default();
    let mut seen_block = false;
    let mut iter = lexemes.into_iter().peekable();

    while let Some(lexeme) = iter.next() {
        match lexeme.token {
            Token::DataBlock(name) => {
                if seen_block {
                    debug!("Ignoring data block '{}' after the first", name);
                    break;
                }
                block.name = name;
                seen_block = true;
            }
            Token::Loop => read_loop(&mut iter, lexeme.line, fault_tolerant, &mut block)?,
            Token::Tag(tag) => {
                let value = match iter.peek() {
                    Some(Lexeme {
                        token: Token::Value(_),
                        ..
                    }) => match iter.next().map(|l| l.token) {
                        Some(Token::Value(value)) => value,
                        _ => None,
                    },
                    _ => {
                        return Err(MmcifError::Parse {
                            line: lexeme.line,
                            kind: MmcifParseErrorKind::TagWithoutValue(tag),
                        });
                    }
                };
                let (category_name, column) = split_tag(&tag);
                let category = block.categories.entry(category_name).or_default();
                if category.rows.is_empty() {
                    category.rows.push(Row {
                        values: Vec::new(),
                        line: lexeme.line,
                    });
                }
                category.columns.push(column);
                category.rows[0].values.push(value);
            }
            Token::Value(_) => {
                if !fault_tolerant {
                    return Err(MmcifError::Parse {
                        line: lexeme.line,
                        kind: MmcifParseErrorKind::UnexpectedValue,
                    });
                }
                warn!("Ignoring stray value on line {}", lexeme.line);
            }
        }
    }

    Ok(block)
}

fn read_loop(
    iter: &mut Peekable<impl Iterator<Item = Lexeme>>,
    loop_line: usize,
    fault_tolerant: bool,
    block: &mut CifBlock,
) -> Result<(), MmcifError> {
    let mut tags = Vec::new();
    while let Some(Lexeme {
        token: Token::Tag(_),
        ..
    }) = iter.peek()
    {
        if let Some(Lexeme {
            token: Token::Tag(tag),
            ..
        }) = iter.next()
        {
            tags.push(tag);
        }
    }
    let Some(first) = tags.first() else {
        return Err(MmcifError::Parse {
            line: loop_line,
            kind: MmcifParseErrorKind::LoopWithoutTags,
        });
    };
    let (category_name, _) = split_tag(first);
    let columns: Vec<String> = tags.iter().map(|tag| split_tag(tag).1).collect();

    let mut values: Vec<(Option<String>, usize)> = Vec::new();
    while let Some(Lexeme {
        token: Token::Value(_),
        ..
    }) = iter.peek()
    {
        if let Some(Lexeme {
            token: Token::Value(value),
            line,
        }) = iter.next()
        {
            values.push((value, line));
        }
    }

    let width = columns.len();
    if values.len() % width != 0 {
        let kind = MmcifParseErrorKind::LoopSizeMismatch {
            category: category_name.clone(),
            columns: width,
            values: values.len(),
        };
        if !fault_tolerant {
            return Err(MmcifError::Parse {
                line: loop_line,
                kind,
            });
        }
        warn!("{} (line {}); dropping the incomplete trailing row", kind, loop_line);
    }

    let rows = values
        .chunks_exact(width)
        .map(|chunk| Row {
            line: chunk[0].1,
            values: chunk.iter().map(|(value, _)| value.clone()).collect(),
        })
        .collect();

    block
        .categories
        .insert(category_name, Category { columns, rows });
    Ok(())
}
