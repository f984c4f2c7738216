//! Script File Tests
//!
//! Runs scripts from temporary files through `Context::execute`.

use bridge::{Context, Error, NativeFunctionBase};
use std::io::Write;
use tempfile::NamedTempFile;

fn script(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(source.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_execute_returns_the_completion_value() {
    let cx = Context::create().unwrap();
    let file = script("var a = 4;\nvar b = 5;\na * b");
    assert_eq!(cx.execute(file.path()).unwrap().get_int().unwrap(), 20);
    assert_eq!(cx.global().get_property(&cx, "b").unwrap().get_int().unwrap(), 5);
}

#[test]
fn test_shebang_line_is_skipped() {
    let cx = Context::create().unwrap();
    let file = script("#!/usr/bin/env runner\n'ran'");
    assert_eq!(cx.execute(file.path()).unwrap().to_std_string(&cx).unwrap(), "ran");
}

#[test]
fn test_shebang_keeps_line_numbers() {
    let cx = Context::create().unwrap();
    let file = script("#!/usr/bin/env runner\nvar ok = 1;\nthrow new Error('third');\n");
    let Err(Error::Script(exception)) = cx.execute(file.path()) else {
        panic!("expected a script exception");
    };
    assert_eq!(exception.line(), Some(3));
    assert_eq!(exception.file(), Some(file.path().display().to_string().as_str()));
    assert_eq!(exception.message(), "Error: third");
}

#[test]
fn test_missing_file_is_engine_state() {
    let cx = Context::create().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let result = cx.execute(dir.path().join("absent.js"));
    assert!(matches!(result, Err(Error::EngineState(_))));
}

#[test]
fn test_script_file_drives_native_functions() {
    let cx = Context::create().unwrap();
    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = seen.clone();
    let record = NativeFunctionBase::new(1, "record", move |call| {
        let text = call.arg(0).to_std_string(call.context())?;
        sink.borrow_mut().push(text);
        Ok(())
    });
    cx.global()
        .set_property(&cx, "record", &cx.create_native_function(record).unwrap())
        .unwrap();
    let file = script("for (var i = 0; i < 3; i++) {\n  record('line ' + i);\n}\n");
    cx.execute(file.path()).unwrap();
    assert_eq!(*seen.borrow(), ["line 0", "line 1", "line 2"]);
}
