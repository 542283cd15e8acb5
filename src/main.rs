use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use log::error;

use loxbyte::InterpretResult;

#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Source code file path. If not specified, REPL mode will start.
    #[arg(short, long)]
    path: Option<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = <Args as clap::Parser>::parse();

    if let Some(path) = args.path.as_deref() {
        run_file(path)
    } else {
        run_repl()
    }
}

fn run_source(source: &str) -> InterpretResult {
    let stdout = io::stdout();
    let stderr = io::stderr();
    loxbyte::interpret(source, &mut stdout.lock(), &mut stderr.lock())
}

fn run_file(path: &str) -> ExitCode {
    match std::fs::read_to_string(path) {
        Ok(source) => match run_source(&source) {
            InterpretResult::Ok => ExitCode::SUCCESS,
            InterpretResult::CompileError => ExitCode::from(65),
            InterpretResult::RuntimeError => ExitCode::from(70),
        },
        Err(err) => {
            error!("could not read {}: {}", path, err);
            ExitCode::from(74)
        }
    }
}

fn run_repl() -> ExitCode {
    print!("> ");
    io::stdout().flush().unwrap();
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.unwrap();
        run_source(&line);
        print!("> ");
        io::stdout().flush().unwrap();
    }
    println!();
    ExitCode::SUCCESS
}
