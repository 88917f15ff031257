use std::{
    cell::RefCell,
    fs::{self, OpenOptions},
    io::Write,
    path::Path,
    time::Duration,
};

use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    diagnostics::{Diagnostic, ForgeError, Result},
    environment::EnvironmentRef,
    value::{arg, Callable, LocalFuture, NativeFunction, Value},
};

/// `set` refuses to pad an array past this many elements.
pub const MAX_PADDED_LEN: usize = 1 << 24;

pub fn install(env: &EnvironmentRef) {
    let mut scope = env.borrow_mut();
    for function in builtins() {
        scope.define_function(function.name.clone(), Callable::Native(function));
    }
}

pub fn builtins() -> Vec<NativeFunction> {
    vec![
        NativeFunction::suspending("sleep", sleep),
        NativeFunction::suspending("input", input),
        NativeFunction::sync("array", array),
        NativeFunction::sync("push", push),
        NativeFunction::sync("pop", pop),
        NativeFunction::sync("length", length),
        NativeFunction::sync("slice", slice),
        NativeFunction::sync("get", get),
        NativeFunction::sync("set", set),
        NativeFunction::sync("upper", upper),
        NativeFunction::sync("lower", lower),
        NativeFunction::sync("split", split),
        NativeFunction::sync("join", join),
        NativeFunction::sync("replace", replace),
        NativeFunction::sync("contains", contains),
        NativeFunction::sync("read", read),
        NativeFunction::sync("write", write),
        NativeFunction::sync("append", append),
    ]
}

fn expect_array<'a>(value: &'a Value, message: &str) -> Result<&'a RefCell<Vec<Value>>> {
    value
        .as_array()
        .ok_or_else(|| ForgeError::from(Diagnostic::type_error(message)))
}

/// Canonical text of any value; string helpers accept non-strings.
fn text(value: &Value) -> String {
    value.to_string()
}

fn sleep(args: Vec<Value>) -> LocalFuture<'static, Result<Value>> {
    Box::pin(async move {
        let millis = arg(&args, 0);
        let Some(millis) = millis.as_number() else {
            return Err(ForgeError::from(Diagnostic::type_error(format!(
                "sleep: expected milliseconds, found {}",
                millis.type_name()
            ))));
        };
        let millis = if millis.is_finite() { millis.max(0.0) } else { 0.0 };
        let duration = Duration::try_from_secs_f64(millis / 1000.0).unwrap_or(Duration::MAX);
        tokio::time::sleep(duration).await;
        Ok(Value::null())
    })
}

fn input(args: Vec<Value>) -> LocalFuture<'static, Result<Value>> {
    let prompt = match arg(&args, 0) {
        value if value.is_null() => String::new(),
        value => text(&value),
    };
    Box::pin(async move {
        let line = tokio::task::spawn_blocking(move || read_line(&prompt))
            .await
            .map_err(|err| ForgeError::from(Diagnostic::io(format!("input: {err}"))))??;
        Ok(Value::string(line))
    })
}

fn read_line(prompt: &str) -> Result<String> {
    let mut editor = DefaultEditor::new().map_err(readline_error)?;
    match editor.readline(prompt) {
        Ok(line) => Ok(line),
        Err(ReadlineError::Eof | ReadlineError::Interrupted) => Ok(String::new()),
        Err(err) => Err(readline_error(err)),
    }
}

fn readline_error(err: ReadlineError) -> ForgeError {
    ForgeError::from(Diagnostic::io(format!("input: {err}")))
}

fn array(args: &[Value]) -> Result<Value> {
    Ok(Value::array(args.to_vec()))
}

fn push(args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    let values = expect_array(&target, "push: first argument is not an array")?;
    let mut values = values.borrow_mut();
    values.push(arg(args, 1));
    Ok(Value::int(values.len() as i64))
}

fn pop(args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    let values = expect_array(&target, "pop: argument is not an array")?;
    let popped = values.borrow_mut().pop();
    Ok(popped.unwrap_or_else(Value::null))
}

fn length(args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    if let Some(text) = target.as_str() {
        return Ok(Value::int(text.chars().count() as i64));
    }
    let values = expect_array(&target, "length: argument is not an array")?;
    let len = values.borrow().len();
    Ok(Value::int(len as i64))
}

fn slice(args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    let values = expect_array(&target, "slice: first argument is not an array")?;
    let values = values.borrow();
    let len = values.len();
    let start = relative_index(&arg(args, 1), len, 0, "slice")?;
    let end = relative_index(&arg(args, 2), len, len, "slice")?;
    let picked = if start < end {
        values[start..end].to_vec()
    } else {
        Vec::new()
    };
    Ok(Value::array(picked))
}

/// Resolves a possibly negative position against `len`, clamped to `0..=len`.
fn relative_index(value: &Value, len: usize, default: usize, name: &str) -> Result<usize> {
    if value.is_null() {
        return Ok(default);
    }
    let Some(position) = value.as_number() else {
        return Err(ForgeError::from(Diagnostic::type_error(format!(
            "{name}: index must be a number, found {}",
            value.type_name()
        ))));
    };
    let position = position.trunc();
    let len_f = len as f64;
    let resolved = if position < 0.0 {
        (len_f + position).max(0.0)
    } else {
        position.min(len_f)
    };
    Ok(resolved as usize)
}

fn get(args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    let values = expect_array(&target, "get: first argument must be array")?;
    let element = arg(args, 1)
        .as_index()
        .and_then(|idx| usize::try_from(idx).ok())
        .and_then(|idx| values.borrow().get(idx).cloned());
    Ok(element.unwrap_or_else(Value::null))
}

fn set(args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    let values = expect_array(&target, "set: first argument must be array")?;
    let index = arg(args, 1);
    let Some(idx) = index.as_index().and_then(|idx| usize::try_from(idx).ok()) else {
        return Err(ForgeError::from(Diagnostic::type_error(format!(
            "set: index must be a non-negative integer, found {index}"
        ))));
    };
    let mut values = values.borrow_mut();
    if idx >= values.len() {
        let missing = idx - values.len() + 1;
        if idx >= MAX_PADDED_LEN || values.try_reserve(missing).is_err() {
            return Err(ForgeError::from(Diagnostic::evaluation(format!(
                "set: index {idx} is too large"
            ))));
        }
        values.resize_with(idx + 1, Value::null);
    }
    values[idx] = arg(args, 2);
    Ok(Value::bool(true))
}

fn upper(args: &[Value]) -> Result<Value> {
    Ok(Value::string(text(&arg(args, 0)).to_uppercase()))
}

fn lower(args: &[Value]) -> Result<Value> {
    Ok(Value::string(text(&arg(args, 0)).to_lowercase()))
}

fn split(args: &[Value]) -> Result<Value> {
    let source = text(&arg(args, 0));
    let separator = arg(args, 1);
    let parts: Vec<Value> = if separator.is_null() {
        vec![Value::string(source)]
    } else {
        let separator = text(&separator);
        if separator.is_empty() {
            source.chars().map(|ch| Value::string(ch.to_string())).collect()
        } else {
            source.split(separator.as_str()).map(Value::string).collect()
        }
    };
    Ok(Value::array(parts))
}

fn join(args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    let values = expect_array(&target, "join: first argument must be array")?;
    let separator = match arg(args, 1) {
        value if value.is_null() => ",".to_string(),
        value => text(&value),
    };
    let pieces: Vec<String> = values
        .borrow()
        .iter()
        .map(|value| if value.is_null() { String::new() } else { text(value) })
        .collect();
    Ok(Value::string(pieces.join(&separator)))
}

fn replace(args: &[Value]) -> Result<Value> {
    let source = text(&arg(args, 0));
    let from = text(&arg(args, 1));
    let to = text(&arg(args, 2));
    Ok(Value::string(source.replace(&from, &to)))
}

fn contains(args: &[Value]) -> Result<Value> {
    let source = text(&arg(args, 0));
    let needle = text(&arg(args, 1));
    Ok(Value::bool(source.contains(&needle)))
}

fn read(args: &[Value]) -> Result<Value> {
    let path = text(&arg(args, 0));
    if !Path::new(&path).exists() {
        return Err(ForgeError::from(Diagnostic::io(format!(
            "read: File \"{path}\" not found"
        ))));
    }
    fs::read_to_string(&path)
        .map(Value::string)
        .map_err(|err| io_error("read", &path, err))
}

fn write(args: &[Value]) -> Result<Value> {
    let path = text(&arg(args, 0));
    let contents = text(&arg(args, 1));
    fs::write(&path, contents).map_err(|err| io_error("write", &path, err))?;
    Ok(Value::bool(true))
}

fn append(args: &[Value]) -> Result<Value> {
    let path = text(&arg(args, 0));
    let contents = text(&arg(args, 1));
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut file| file.write_all(contents.as_bytes()))
        .map_err(|err| io_error("append", &path, err))?;
    Ok(Value::bool(true))
}

fn io_error(name: &str, path: &str, err: std::io::Error) -> ForgeError {
    let mut diagnostic = Diagnostic::io(format!("{name}: failed for \"{path}\": {err}"));
    if let Some(code) = err.raw_os_error() {
        diagnostic = diagnostic.with_note(format!("os error code: {code}"));
    }
    ForgeError::from(diagnostic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;

    fn ints(values: &[i64]) -> Value {
        Value::array(values.iter().copied().map(Value::int).collect())
    }

    #[test]
    fn push_mutates_shared_array_and_reports_length() {
        let list = ints(&[1, 2]);
        let len = push(&[list.clone(), Value::int(3)]).unwrap();
        assert_eq!(len.to_string(), "3");
        assert_eq!(list.to_string(), "1,2,3");
    }

    #[test]
    fn push_rejects_non_arrays() {
        let err = push(&[Value::string("abc"), Value::int(1)]).unwrap_err();
        assert_eq!(err.kind(), DiagnosticKind::Type);
        assert!(err.to_string().contains("push: first argument is not an array"));
    }

    #[test]
    fn slice_accepts_negative_and_missing_bounds() {
        let list = ints(&[1, 2, 3, 4, 5]);
        assert_eq!(slice(&[list.clone(), Value::int(1), Value::int(3)]).unwrap().to_string(), "2,3");
        assert_eq!(slice(&[list.clone(), Value::int(-2)]).unwrap().to_string(), "4,5");
        assert_eq!(slice(&[list, Value::int(4), Value::int(1)]).unwrap().to_string(), "");
    }

    #[test]
    fn set_pads_with_null() {
        let list = ints(&[1]);
        assert!(set(&[list.clone(), Value::int(3), Value::string("x")]).unwrap().is_truthy());
        assert_eq!(list.to_string(), "1,,,x");
        let err = set(&[list, Value::int(-1), Value::null()]).unwrap_err();
        assert_eq!(err.kind(), DiagnosticKind::Type);
    }

    #[test]
    fn set_rejects_indices_too_large_to_pad() {
        let list = ints(&[1]);
        for index in [i64::MAX, 1 << 62, MAX_PADDED_LEN as i64] {
            let err = set(&[list.clone(), Value::int(index), Value::int(0)]).unwrap_err();
            assert_eq!(err.kind(), DiagnosticKind::Evaluation);
            assert!(err.to_string().contains("too large"), "{err}");
        }
        assert_eq!(list.to_string(), "1");
    }

    #[test]
    fn split_and_join_defaults() {
        let whole = split(&[Value::string("a,b")]).unwrap();
        assert_eq!(whole.as_array().unwrap().borrow().len(), 1);
        let chars = split(&[Value::string("abc"), Value::string("")]).unwrap();
        assert_eq!(join(&[chars]).unwrap().to_string(), "a,b,c");
        let words = split(&[Value::string("x y"), Value::string(" ")]).unwrap();
        assert_eq!(join(&[words, Value::string("-")]).unwrap().to_string(), "x-y");
    }

    #[test]
    fn string_helpers_stringify_inputs() {
        assert_eq!(upper(&[Value::bool(true)]).unwrap().to_string(), "TRUE");
        assert_eq!(
            replace(&[Value::string("a.b.c"), Value::string("."), Value::string("/")])
                .unwrap()
                .to_string(),
            "a/b/c"
        );
        assert!(contains(&[Value::int(1234), Value::int(23)]).unwrap().is_truthy());
    }

    #[test]
    fn read_reports_missing_file_name() {
        let err = read(&[Value::string("definitely-missing.txt")]).unwrap_err();
        assert_eq!(err.kind(), DiagnosticKind::Io);
        assert!(err.to_string().contains("read: File \"definitely-missing.txt\" not found"));
    }
}
