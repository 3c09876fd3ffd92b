//! Free-function builtins: `file()`, `dir()`, `glob()`, `exec()`, `rm()`,
//! `env()`.

use crate::error::{EvalError, EvalErrorKind};
use crate::interp::Interpreter;
use crate::value::{FileValue, Object, Value};
use crate::bail_eval;
use gatekeep_syntax::Span;

pub(crate) fn call(
    interp: &mut Interpreter,
    name: &str,
    args: &[Value],
    span: &Span,
) -> Result<Value, EvalError> {
    match name {
        "file" => {
            let path = single_str(name, args, span)?;
            Ok(FileValue::from_disk(path, interp.services.fs.clone()))
        }

        "dir" => {
            let path = single_str(name, args, span)?;
            let entries = interp.services.fs.read_dir(&path).map_err(|e| {
                EvalError::io(format!("cannot read directory {}: {}", path, e), span)
            })?;
            let files = entries
                .into_iter()
                .map(|p| FileValue::from_disk(p, interp.services.fs.clone()))
                .collect();
            Ok(Value::Array(files))
        }

        "glob" => {
            let pattern = single_str(name, args, span)?;
            let paths = interp
                .services
                .fs
                .glob(&pattern)
                .map_err(|e| EvalError::io(format!("glob '{}' failed: {}", pattern, e), span))?;
            let files = paths
                .into_iter()
                .map(|p| FileValue::from_disk(p, interp.services.fs.clone()))
                .collect();
            Ok(Value::Array(files))
        }

        // Unlike `run`, exec() hands the result back to the script and
        // never raises on a non-zero exit.
        "exec" => {
            let command = single_str(name, args, span)?;
            let output = interp
                .services
                .process
                .run(&command, interp.config.command_timeout)?;
            let mut obj = Object::new("Exec");
            obj.set(
                "code",
                match output.code {
                    Some(code) => Value::Number(code as f64),
                    None => Value::Null,
                },
            );
            obj.set("ok", Value::Bool(output.success()));
            obj.set("stdout", Value::String(output.stdout));
            obj.set("stderr", Value::String(output.stderr));
            Ok(Value::Object(obj))
        }

        "rm" => {
            let path = single_str(name, args, span)?;
            interp
                .services
                .fs
                .remove(&path)
                .map_err(|e| EvalError::io(format!("cannot remove {}: {}", path, e), span))?;
            Ok(Value::Bool(true))
        }

        "env" => {
            let var = single_str(name, args, span)?;
            Ok(std::env::var(&var)
                .map(Value::String)
                .unwrap_or(Value::Null))
        }

        _ => bail_eval!(
            EvalErrorKind::UndefinedVariable,
            span,
            "unknown function '{}'",
            name
        ),
    }
}

fn single_str(name: &str, args: &[Value], span: &Span) -> Result<String, EvalError> {
    match args {
        [value] => Ok(value.as_str(span)?.to_string()),
        _ => bail_eval!(
            EvalErrorKind::TypeMismatch,
            span,
            "{}() expects 1 string argument, got {}",
            name,
            args.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MacroRegistry;

    #[test]
    fn unknown_function_errors() {
        let mut interp = Interpreter::new(MacroRegistry::default());
        let span = Span::new(1, 1, 0, 1);
        let err = call(&mut interp, "summon", &[], &span).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::UndefinedVariable);
        assert!(err.message.contains("summon"));
    }

    #[test]
    fn dir_lists_entries_as_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();

        let mut interp = Interpreter::new(MacroRegistry::default());
        let span = Span::new(1, 1, 0, 1);
        let value = call(
            &mut interp,
            "dir",
            &[Value::String(dir.path().to_string_lossy().to_string())],
            &span,
        )
        .unwrap();

        let Value::Array(files) = value else { panic!() };
        assert_eq!(files.len(), 2);
        assert!(matches!(&files[0], Value::File(f) if f.path.ends_with("a.txt")));
    }

    #[test]
    fn dir_on_a_missing_path_is_an_io_error() {
        let mut interp = Interpreter::new(MacroRegistry::default());
        let span = Span::new(1, 1, 0, 1);
        let err = call(
            &mut interp,
            "dir",
            &[Value::String("definitely/not/here".into())],
            &span,
        )
        .unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::IoError);
    }

    #[test]
    fn env_returns_null_for_missing_var() {
        let mut interp = Interpreter::new(MacroRegistry::default());
        let span = Span::new(1, 1, 0, 1);
        let value = call(
            &mut interp,
            "env",
            &[Value::String("GATEKEEP_DEFINITELY_UNSET".into())],
            &span,
        )
        .unwrap();
        assert_eq!(value, Value::Null);
    }
}
