use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use clap::Parser as ClapParser;
use log::info;

use silt::expr::NodeIds;
use silt::interpreter::Interpreter;
use silt::parser::Parser;
use silt::resolver::Resolver;
use silt::scanner::Scanner;
use silt::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Tree-walking interpreter for the Silt language", long_about = None)]
pub struct Cli {
    /// Script to run; omit to start a REPL
    #[arg(value_name = "script")]
    scripts: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = Cli::parse();

    match args.scripts.as_slice() {
        [] => run_prompt()?,

        [script] => run_file(script)?,

        _ => {
            println!("Usage: silt [script]");
            std::process::exit(64);
        }
    }

    Ok(())
}

/// One interpretation context: a persistent interpreter (globals and
/// resolution map survive across REPL lines), the id counter feeding the
/// parser, and the two driver flags that pick the exit code.
struct Session {
    interpreter: Interpreter,
    ids: NodeIds,
    had_error: bool,
    had_runtime_error: bool,
}

impl Session {
    fn new() -> Self {
        Session {
            interpreter: Interpreter::new(),
            ids: NodeIds::new(),
            had_error: false,
            had_runtime_error: false,
        }
    }

    /// Scan, parse, resolve, and (when clean) execute one source unit.
    /// Diagnostics go to stderr; any static error skips execution.
    fn run(&mut self, source: Vec<u8>) {
        let scanner = Scanner::new(source);

        let mut tokens: Vec<Token> = Vec::new();
        for result in scanner {
            match result {
                Ok(token) => tokens.push(token),

                Err(error) => {
                    eprintln!("{}", error);
                    self.had_error = true;
                }
            }
        }

        let mut parser = Parser::new(tokens, std::mem::take(&mut self.ids));
        let statements = parser.parse();

        let (ids, parse_errors) = parser.finish();
        self.ids = ids;

        for error in &parse_errors {
            eprintln!("{}", error);
        }
        if !parse_errors.is_empty() {
            self.had_error = true;
        }

        if self.had_error {
            return;
        }

        let mut resolver = Resolver::new(&mut self.interpreter);
        if let Err(resolve_errors) = resolver.resolve(&statements) {
            for error in resolve_errors {
                eprintln!("{}", error);
            }
            self.had_error = true;

            return;
        }

        if let Err(error) = self.interpreter.interpret(&statements) {
            eprintln!("{}", error);
            self.had_runtime_error = true;
        }
    }
}

fn run_file(path: &Path) -> anyhow::Result<()> {
    info!("Running script {}", path.display());

    let mut buf: Vec<u8> = Vec::new();
    let mut reader = BufReader::new(File::open(path)?);
    reader.read_to_end(&mut buf)?;

    let mut session = Session::new();
    session.run(buf);

    if session.had_error {
        std::process::exit(65);
    }

    if session.had_runtime_error {
        std::process::exit(70);
    }

    Ok(())
}

fn run_prompt() -> anyhow::Result<()> {
    info!("Starting REPL");

    let mut session = Session::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF ends the session.
            break;
        }

        session.run(line.into_bytes());

        // An interactive session survives bad lines; only the static
        // error flag resets between lines.
        session.had_error = false;
    }

    Ok(())
}
