//! A stand-in interpreter for `MockEngine`: reads the generated script,
//! evaluates the handful of statement forms the script builder emits, and
//! writes the exchange file the way the save statement would.

#![allow(dead_code)]

use octave_bridge_runtime::mock::MockExec;
use octave_bridge_runtime::{BridgeConfig, ExecOutput, MockEngine};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;
use std::sync::{Arc, Mutex};

/// Scripts seen by the emulator, in execution order.
pub type ScriptLog = Arc<Mutex<Vec<String>>>;

pub fn emulated_engine() -> (Arc<MockEngine>, ScriptLog) {
    let log: ScriptLog = Arc::default();
    let seen = Arc::clone(&log);
    let engine = MockEngine::new().with_responder(move |exec| {
        let Some(script_path) = exec.script_path() else {
            return ExecOutput::failure(2, "no script given");
        };
        let Ok(text) = std::fs::read_to_string(&script_path) else {
            return ExecOutput::failure(2, "script not readable");
        };
        seen.lock().unwrap().push(text.clone());
        run_script(exec, &text)
    });
    (Arc::new(engine), log)
}

pub fn config(dir: &std::path::Path) -> BridgeConfig {
    BridgeConfig::for_workspace(dir)
}

fn run_script(exec: &MockExec<'_>, text: &str) -> ExecOutput {
    let mut vars: HashMap<String, Value> = HashMap::new();
    let mut exchange = None;
    let mut saved = Vec::new();

    for line in text.lines() {
        if line.starts_with("bridge_exchange = struct();") {
            for part in line.split("bridge_exchange.").skip(1) {
                if let Some(name) = part.split(" = ").next() {
                    saved.push(name.to_owned());
                }
            }
            exchange = line
                .split("fopen(")
                .nth(1)
                .and_then(|rest| parse_literal(rest).as_str().map(str::to_owned));
        } else if line.starts_with('[') && line.contains("] = ") {
            let (outputs, call) = line.split_once("] = ").unwrap_or_default();
            let outputs: Vec<&str> = outputs.trim_start_matches('[').split(", ").collect();
            let (function, args) = call.split_once('(').unwrap_or_default();
            let args: Vec<Value> = args
                .trim_end_matches(");")
                .split(", ")
                .filter(|a| !a.is_empty())
                .map(|a| vars.get(a).cloned().unwrap_or(Value::Null))
                .collect();
            match call_function(function, &args, outputs.len()) {
                Ok(values) => {
                    for (name, value) in outputs.iter().zip(values) {
                        vars.insert((*name).to_owned(), value);
                    }
                }
                Err(message) => return ExecOutput::failure(1, message),
            }
        } else if let Some((name, rhs)) = line.split_once(" = ") {
            if is_identifier(name) {
                vars.insert(name.to_owned(), parse_literal(rhs.trim_end_matches(';')));
            }
        }
    }

    let Some(exchange) = exchange else {
        return ExecOutput::failure(1, "error: no save statement");
    };
    let mut document = Map::new();
    for name in saved {
        match vars.get(&name) {
            Some(value) => {
                document.insert(name, value.clone());
            }
            None => return ExecOutput::failure(1, format!("error: '{name}' undefined")),
        }
    }
    if std::fs::write(exec.host_path(&exchange), Value::Object(document).to_string()).is_err() {
        return ExecOutput::failure(1, "error: cannot open exchange file");
    }
    ExecOutput::success("")
}

fn call_function(function: &str, args: &[Value], nout: usize) -> Result<Vec<Value>, String> {
    match function {
        "identity" => Ok(vec![args.first().cloned().unwrap_or(Value::Null)]),
        "plus" => {
            let sum: f64 = args.iter().filter_map(Value::as_f64).sum();
            Ok(vec![json!(sum)])
        }
        "size_and_sum" => {
            let items = args.first().and_then(Value::as_array).cloned().unwrap_or_default();
            let sum: f64 = items.iter().filter_map(Value::as_f64).sum();
            Ok(vec![json!(items.len()), json!(sum)])
        }
        "noop" => Ok(vec![Value::Null; nout]),
        "fail_loudly" => Err("running fail_loudly\nerror: fail_loudly: deliberate failure".to_owned()),
        other => Err(format!("error: '{other}' undefined")),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse the literal forms the marshaler produces into their jsonencode
/// equivalents.
fn parse_literal(src: &str) -> Value {
    let mut chars = src.trim().chars().peekable();
    parse_expr(&mut chars)
}

fn parse_expr(chars: &mut Peekable<Chars<'_>>) -> Value {
    skip_ws(chars);
    match chars.peek() {
        Some('\'') => Value::String(parse_quoted(chars)),
        Some('[') => {
            chars.next();
            let items = parse_items(chars, ']');
            if items.iter().any(Value::is_string) {
                Value::String(items.iter().filter_map(Value::as_str).collect())
            } else {
                Value::Array(items)
            }
        }
        Some('{') => {
            chars.next();
            Value::Array(parse_items(chars, '}'))
        }
        Some('c') => {
            let word: String = std::iter::from_fn(|| chars.next_if(|c| *c != ')')).collect();
            chars.next();
            let code: u32 = word.trim_start_matches("char(").parse().unwrap_or(0);
            Value::String(char::from_u32(code).unwrap_or('?').to_string())
        }
        _ => {
            let word: String =
                std::iter::from_fn(|| chars.next_if(|c| !matches!(c, ',' | ']' | '}' | ')')))
                    .collect();
            match word.trim() {
                "NaN" | "Inf" | "-Inf" => Value::Null,
                n => n.parse::<f64>().map_or(Value::Null, |f| json!(f)),
            }
        }
    }
}

fn parse_items(chars: &mut Peekable<Chars<'_>>, close: char) -> Vec<Value> {
    let mut items = Vec::new();
    loop {
        skip_ws(chars);
        match chars.peek() {
            Some(c) if *c == close => {
                chars.next();
                return items;
            }
            Some(',') => {
                chars.next();
            }
            None => return items,
            _ => items.push(parse_expr(chars)),
        }
    }
}

fn parse_quoted(chars: &mut Peekable<Chars<'_>>) -> String {
    chars.next();
    let mut out = String::new();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
                out.push('\'');
            } else {
                break;
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn skip_ws(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}
