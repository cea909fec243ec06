//! Subcommand parsing and execution.
//!
//! Every subcommand reads its JSON inputs from files (or stdin for `-`) and
//! writes one JSON value to the output.

use crate::error::{CliError, Result};
use chrono::NaiveDate;
use pathwise_engine::{
    apply_updates, filter_entities, merge_updates, sort_entities, Criterion, Direction, OrderBy,
    Path, PrimitiveKind, Rule, UpdateCollector, Updates,
};
use serde_json::Value;
use std::fs;
use std::io::{Read, Write};

/// File name that stands for standard input.
pub const STDIN: &str = "-";

const NULL: &str = "null";

/// A parsed subcommand.
#[derive(Debug)]
pub enum Command {
    Get { doc: String, path: Path },
    Set { doc: String, path: Path, value: Value },
    Unset { doc: String, path: Path },
    Apply { doc: String, updates: String },
    Merge { a: String, b: String },
    Collect { batches: Vec<String> },
    Filter { entities: String, criteria: Vec<Criterion> },
    Sort { entities: String, order_by: Vec<OrderBy> },
    Help,
    Version,
}

/// A subcommand plus the global output options given before it.
#[derive(Debug)]
pub struct Invocation {
    pub command: Command,
    /// `--pretty` / `--compact`, overriding the configured default
    pub pretty: Option<bool>,
}

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    /// `get` found nothing at the path
    Missing,
}

pub fn usage() -> &'static str {
    "pathwise - edit, patch, filter and sort JSON documents

USAGE:
    pathwise [--pretty|--compact] <COMMAND> [ARGS...]

COMMANDS:
    get <doc> <path>                  Print the value at a path (exit 1 if missing)
    set <doc> <path> <json-value>     Print the document after writing a value
    unset <doc> <path>                Print the document after removing a value
    apply <doc> <updates>             Print the document after applying an update batch
    merge <updates-a> <updates-b>     Print both batches concatenated
    collect <updates>...              Print the minimal batch equivalent to all batches
    filter <entities> <criterion>...  Print the entities matching every criterion
    sort <entities> <order>...        Print the entities sorted by the order specs

    criterion: <kind>:<path>=<value>[,<value>...]   (null matches a missing value)
    order:     <kind>:<path>[:asc|:desc]
    kind:      string | number | boolean | date

    A file name of '-' reads standard input.

OPTIONS:
    --pretty       Pretty-print output (default, see PATHWISE_PRETTY)
    --compact      Print output on a single line
    -h, --help     Print this help
    -V, --version  Print the version
"
}

/// Parse the process arguments, without the program name.
pub fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut pretty = None;
    let mut rest = args;
    while let Some((first, tail)) = rest.split_first() {
        match first.as_str() {
            "--pretty" => pretty = Some(true),
            "--compact" => pretty = Some(false),
            "-h" | "--help" => {
                return Ok(Invocation {
                    command: Command::Help,
                    pretty,
                })
            }
            "-V" | "--version" => {
                return Ok(Invocation {
                    command: Command::Version,
                    pretty,
                })
            }
            flag if flag.starts_with("--") => {
                return Err(CliError::usage(format!("unknown option '{}'", flag)))
            }
            _ => break,
        }
        rest = tail;
    }

    let (name, operands) = rest
        .split_first()
        .ok_or_else(|| CliError::usage("missing command"))?;

    let command = match name.as_str() {
        "get" => {
            let [doc, path] = exactly::<2>(name, operands)?;
            Command::Get {
                doc: doc.clone(),
                path: Path::compile(path)?,
            }
        }
        "set" => {
            let [doc, path, value] = exactly::<3>(name, operands)?;
            let value = serde_json::from_str(value).map_err(|error| CliError::Parse {
                source_name: "value argument".to_string(),
                error,
            })?;
            Command::Set {
                doc: doc.clone(),
                path: Path::compile(path)?,
                value,
            }
        }
        "unset" => {
            let [doc, path] = exactly::<2>(name, operands)?;
            Command::Unset {
                doc: doc.clone(),
                path: Path::compile(path)?,
            }
        }
        "apply" => {
            let [doc, updates] = exactly::<2>(name, operands)?;
            Command::Apply {
                doc: doc.clone(),
                updates: updates.clone(),
            }
        }
        "merge" => {
            let [a, b] = exactly::<2>(name, operands)?;
            Command::Merge {
                a: a.clone(),
                b: b.clone(),
            }
        }
        "collect" => {
            if operands.is_empty() {
                return Err(CliError::usage("collect expects at least one updates file"));
            }
            Command::Collect {
                batches: operands.to_vec(),
            }
        }
        "filter" => {
            let (entities, specs) = operands
                .split_first()
                .ok_or_else(|| CliError::usage("filter expects an entities file"))?;
            Command::Filter {
                entities: entities.clone(),
                criteria: specs
                    .iter()
                    .map(|s| parse_criterion(s))
                    .collect::<Result<_>>()?,
            }
        }
        "sort" => {
            let (entities, specs) = operands
                .split_first()
                .ok_or_else(|| CliError::usage("sort expects an entities file"))?;
            Command::Sort {
                entities: entities.clone(),
                order_by: specs.iter().map(|s| parse_order(s)).collect::<Result<_>>()?,
            }
        }
        other => return Err(CliError::usage(format!("unknown command '{}'", other))),
    };

    Ok(Invocation { command, pretty })
}

fn exactly<'a, const N: usize>(command: &str, operands: &'a [String]) -> Result<&'a [String; N]> {
    operands.try_into().map_err(|_| {
        CliError::usage(format!(
            "{} expects {} arguments, got {}",
            command,
            N,
            operands.len()
        ))
    })
}

/// Parse `<kind>:<path>=<value>[,<value>...]` into a leaf criterion.
fn parse_criterion(text: &str) -> Result<Criterion> {
    let malformed = || {
        CliError::usage(format!(
            "criterion '{}' must look like <kind>:<path>=<values>",
            text
        ))
    };
    let (kind, rest) = text.split_once(':').ok_or_else(malformed)?;
    let (path, values) = rest.split_once('=').ok_or_else(malformed)?;

    let kind: PrimitiveKind = kind.parse()?;
    let path = Path::compile(path)?;
    let values: Vec<&str> = values.split(',').collect();

    let rule = match kind {
        PrimitiveKind::String => Rule::strings(values.iter().map(|v| (*v != NULL).then_some(*v))),
        PrimitiveKind::Number => Rule::numbers(parse_values(kind, &values, |v| v.parse().ok())?),
        PrimitiveKind::Boolean => Rule::booleans(parse_values(kind, &values, |v| v.parse().ok())?),
        PrimitiveKind::Date => Rule::dates(parse_values(kind, &values, |v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d").ok()
        })?),
    };
    Ok(Criterion::leaf(path, rule))
}

fn parse_values<T>(
    kind: PrimitiveKind,
    values: &[&str],
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    values
        .iter()
        .map(|v| {
            if *v == NULL {
                return Ok(None);
            }
            parse(v)
                .map(Some)
                .ok_or_else(|| CliError::usage(format!("'{}' is not a valid {} value", v, kind)))
        })
        .collect()
}

/// Parse `<kind>:<path>[:asc|:desc]` into a primitive order spec.
fn parse_order(text: &str) -> Result<OrderBy> {
    let (kind, rest) = text.split_once(':').ok_or_else(|| {
        CliError::usage(format!(
            "order '{}' must look like <kind>:<path>[:asc|:desc]",
            text
        ))
    })?;
    let kind: PrimitiveKind = kind.parse()?;
    let (path, direction) = match rest.rsplit_once(':') {
        Some((path, direction @ ("asc" | "desc"))) => (path, direction.parse::<Direction>()?),
        _ => (rest, Direction::Asc),
    };
    Ok(OrderBy::primitive(kind, Path::compile(path)?, direction))
}

/// Run a command against the given input and output streams.
pub fn execute(
    command: Command,
    pretty: bool,
    stdin: &mut dyn Read,
    out: &mut dyn Write,
) -> Result<Status> {
    match command {
        Command::Get { doc, path } => {
            let doc = read_value(&doc, stdin)?;
            match path.get(&doc) {
                Some(value) => emit(out, value, pretty)?,
                None => {
                    tracing::debug!(%path, "no value at path");
                    return Ok(Status::Missing);
                }
            }
        }
        Command::Set { doc, path, value } => {
            let mut doc = read_value(&doc, stdin)?;
            path.set(&mut doc, value)?;
            emit(out, &doc, pretty)?;
        }
        Command::Unset { doc, path } => {
            let mut doc = read_value(&doc, stdin)?;
            path.unset(&mut doc)?;
            emit(out, &doc, pretty)?;
        }
        Command::Apply { doc, updates } => {
            let mut doc = read_value(&doc, stdin)?;
            let updates = read_updates(&updates, stdin)?;
            apply_updates(&mut doc, &updates)?;
            emit(out, &doc, pretty)?;
        }
        Command::Merge { a, b } => {
            let a = read_updates(&a, stdin)?;
            let b = read_updates(&b, stdin)?;
            emit(out, &serde_json::to_value(merge_updates(&a, &b))?, pretty)?;
        }
        Command::Collect { batches } => {
            let mut collector = UpdateCollector::new();
            for name in &batches {
                collector.merge(&read_updates(name, stdin)?)?;
                tracing::debug!(batch = %name, pending = collector.len(), "collected batch");
            }
            emit(out, &serde_json::to_value(collector.create_updates())?, pretty)?;
        }
        Command::Filter { entities, criteria } => {
            let entities = read_entities(&entities, stdin)?;
            let kept: Vec<Value> = filter_entities(&entities, &criteria)
                .into_iter()
                .cloned()
                .collect();
            tracing::debug!(total = entities.len(), kept = kept.len(), "filtered entities");
            emit(out, &Value::Array(kept), pretty)?;
        }
        Command::Sort { entities, order_by } => {
            let mut entities = read_entities(&entities, stdin)?;
            sort_entities(&mut entities, &order_by);
            emit(out, &Value::Array(entities), pretty)?;
        }
        Command::Help => out.write_all(usage().as_bytes())?,
        Command::Version => writeln!(out, "pathwise {}", env!("CARGO_PKG_VERSION"))?,
    }
    Ok(Status::Done)
}

fn display_name(name: &str) -> String {
    if name == STDIN {
        "<stdin>".to_string()
    } else {
        name.to_string()
    }
}

fn read_source(name: &str, stdin: &mut dyn Read) -> Result<String> {
    let result = if name == STDIN {
        let mut text = String::new();
        stdin.read_to_string(&mut text).map(|_| text)
    } else {
        fs::read_to_string(name)
    };
    result.map_err(|error| CliError::Read {
        source_name: display_name(name),
        error,
    })
}

fn read_value(name: &str, stdin: &mut dyn Read) -> Result<Value> {
    let text = read_source(name, stdin)?;
    serde_json::from_str(&text).map_err(|error| CliError::Parse {
        source_name: display_name(name),
        error,
    })
}

fn read_updates(name: &str, stdin: &mut dyn Read) -> Result<Updates> {
    let text = read_source(name, stdin)?;
    serde_json::from_str(&text).map_err(|error| CliError::Parse {
        source_name: display_name(name),
        error,
    })
}

fn read_entities(name: &str, stdin: &mut dyn Read) -> Result<Vec<Value>> {
    match read_value(name, stdin)? {
        Value::Array(entities) => Ok(entities),
        _ => Err(CliError::usage(format!(
            "{} must contain a JSON array of entities",
            display_name(name)
        ))),
    }
}

fn emit(out: &mut dyn Write, value: &Value, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, value)?;
    } else {
        serde_json::to_writer(&mut *out, value)?;
    }
    writeln!(out)?;
    Ok(())
}
