use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::error::ErrorKind;
use clap::Parser as ClapParser;

use prolang::interpreter::Interpreter;
use prolang::parser::Parser;
use prolang::reporting;
use prolang::resolver::Resolver;
use prolang::scanner::Scanner;
use prolang::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Script to execute; starts the REPL when omitted
    script: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,

        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            return Ok(());
        }

        Err(_) => {
            eprintln!("Usage: prolang [script]");
            process::exit(64);
        }
    };

    match cli.script {
        Some(path) => run_file(&path),
        None => run_prompt(),
    }
}

fn run_file(path: &Path) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)?;

    run(&source);

    if reporting::had_error() {
        process::exit(65);
    }
    if reporting::had_runtime_error() {
        process::exit(70);
    }

    Ok(())
}

fn run_prompt() -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        run(&line);

        // one bad line should not poison the session
        reporting::clear_error();
    }

    Ok(())
}

fn run(source: &str) {
    let tokens: Vec<Token> = Scanner::new(source.as_bytes())
        .filter_map(|result| match result {
            Ok(token) => Some(token),

            Err(err) => {
                reporting::syntax(&err);
                None
            }
        })
        .collect();

    let mut parser = Parser::new(tokens);
    let statements = parser.parse();

    // stop before resolving if there was a syntax error
    if reporting::had_error() {
        return;
    }

    let mut interpreter = Interpreter::new(io::stdout());
    let mut resolver = Resolver::new(&mut interpreter);
    resolver.resolve(&statements);

    // stop before executing if a static error was reported
    if reporting::had_error() {
        return;
    }

    // runtime failures are reported through the sink
    let _ = interpreter.interpret(&statements);
}
