use patito::{run_source, vm::TestingDevice};
use std::{
    fs::{read_dir, read_to_string},
    path::PathBuf,
};

#[test]
fn test_demos() {
    let mut ran = 0;
    for entry in read_dir("demos/").unwrap() {
        let path = entry.unwrap().path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("pat") {
            continue;
        }
        eprintln!("Starting test for `{path:?}`");

        let file_name = path.file_name().unwrap().to_str().unwrap().to_string();
        let correct_output_path = PathBuf::from("demos/output")
            .join(file_name)
            .with_extension("txt");
        let correct_output = read_to_string(&correct_output_path)
            .unwrap_or_else(|_| panic!("missing expected output `{correct_output_path:?}`"))
            .replace("\r\n", "\n");

        let code = read_to_string(&path).unwrap();
        match run_source(&code, TestingDevice::new()) {
            Ok(device) => assert_eq!(
                device.output_str(),
                correct_output,
                "wrong output for `{path:?}`"
            ),
            Err(e) => panic!("`{path:?}` failed:\n{e}"),
        }
        ran += 1;
    }
    assert!(ran >= 4, "only {ran} demo programs were found");
}

#[test]
fn test_syntax_errors_are_reported() {
    let result = run_source("program p; main { x = ; } end", TestingDevice::new());
    match result {
        Err(patito::Error::Syntax(e)) => {
            assert!(!e.message.is_empty());
            assert!(e.offset > 0);
        }
        other => panic!("expected a syntax error, got {other:?}"),
    }
}

#[test]
fn test_comments_are_ignored() {
    let device = run_source(
        r#"program p; // the name
        /* a block
           comment */
        main {
            print(1); // one
        }
        end"#,
        TestingDevice::new(),
    )
    .unwrap();
    assert_eq!(device.output_lines(), ["1"]);
}
