use clap::*;
use codespan_reporting::{
    diagnostic::{Diagnostic, Label},
    files::SimpleFiles,
    term::{
        emit,
        termcolor::{ColorChoice, StandardStream},
        Config,
    },
};
use log::*;
use patito::{
    codegen::{compile, CompiledProgram},
    frontend::{self, strip_comments, SyntaxError},
    object::{ObjectCode, OBJECT_EXTENSION},
    vm::{StandardDevice, VirtualMachine},
};
use std::{
    fmt,
    fs::{read_to_string, write},
};

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SourceType {
    /// Patito source code.
    Patito,
    /// An object file written by `-t object`.
    Object,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TargetType {
    /// Execute the program.
    Run,
    /// Write the quadruple listing.
    Quads,
    /// Write the function directory.
    Directory,
    /// Write an object file.
    Object,
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "The Patito compiler and virtual machine")]
struct Args {
    /// The input file to compile.
    #[clap(value_parser)]
    input: String,

    /// The file to write the output of the compiler to.
    #[clap(short, long, value_parser, default_value = "out")]
    output: String,

    /// The kind of input file.
    #[clap(short, value_parser, default_value = "patito")]
    source_type: SourceType,

    /// What to do with the compiled program.
    #[clap(short, value_parser, default_value = "run")]
    target_type: TargetType,

    /// Log more (-v info, -vv debug, -vvv trace).
    #[clap(short, long, action = ArgAction::Count)]
    verbose: u8,
}

enum Error {
    IO(std::io::Error),
    Syntax(SyntaxError),
    Compile(patito::semantic::Error),
    Runtime(patito::vm::Error),
    Object(serde_json::Error),
    InvalidSource(String),
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IO(e) => write!(f, "IO error: {e}"),
            Error::Syntax(e) => write!(f, "{e}"),
            Error::Compile(e) => write!(f, "Compile error: {e}"),
            Error::Runtime(e) => write!(f, "{e}"),
            Error::Object(e) => write!(f, "Object file error: {e}"),
            Error::InvalidSource(e) => write!(f, "Invalid source: {e}"),
        }
    }
}

/// Show a syntax error against the text the parser actually saw.
fn report_syntax_error(filename: &str, code: &str, e: &SyntaxError) {
    let mut files = SimpleFiles::new();
    let file_id = files.add(filename, strip_comments(code));

    let diagnostic = Diagnostic::error()
        .with_message("could not parse program")
        .with_labels(vec![Label::primary(file_id, e.offset..e.offset)
            .with_message(e.message.lines().next().unwrap_or("syntax error"))])
        .with_notes(vec![e.message.clone()]);

    let writer = StandardStream::stderr(ColorChoice::Always);
    let config = Config::default();
    if let Err(err) = emit(&mut writer.lock(), &config, &files, &diagnostic) {
        error!("Could not render diagnostic: {err}");
    };
}

fn compile_source(filename: &str, code: &str) -> Result<CompiledProgram, Error> {
    let program = frontend::parse(code).map_err(|e| {
        report_syntax_error(filename, code, &e);
        Error::Syntax(e)
    })?;
    compile(&program).map_err(Error::Compile)
}

fn run(args: Args) -> Result<(), Error> {
    let src = read_file(&args.input)?;

    let object = match (args.source_type, args.target_type) {
        (SourceType::Object, TargetType::Run) => {
            ObjectCode::from_json(&src).map_err(Error::Object)?
        }
        (SourceType::Object, _) => {
            return Err(Error::InvalidSource(
                "an object file can only be run".to_string(),
            ))
        }
        (SourceType::Patito, target) => {
            let compiled = compile_source(&args.input, &src)?;
            match target {
                TargetType::Run => compiled.object_code(),
                TargetType::Quads => {
                    return write_file(format!("{}.quads", args.output), compiled.to_string())
                }
                TargetType::Directory => {
                    return write_file(
                        format!("{}.dir", args.output),
                        compiled.directory.to_string(),
                    )
                }
                TargetType::Object => {
                    let json = compiled.object_code().to_json().map_err(Error::Object)?;
                    return write_file(format!("{}.{OBJECT_EXTENSION}", args.output), json);
                }
            }
        }
    };

    VirtualMachine::new(StandardDevice)
        .execute(&object)
        .map_err(Error::Runtime)?;
    Ok(())
}

fn write_file(file: String, contents: String) -> Result<(), Error> {
    info!("Writing {file}");
    write(file, contents).map_err(Error::IO)
}

fn read_file(name: &str) -> Result<String, Error> {
    read_to_string(name).map_err(Error::IO)
}

fn main() -> Result<(), Error> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(level)
        .parse_default_env()
        .init();

    run(args)
}
