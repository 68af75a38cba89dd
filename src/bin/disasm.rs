use std::{env, fs, process};

use asmvm::parser::Parser;
use asmvm::program::Program;
use asmvm::{error, logging, validator};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <program.asm>", args[0]);
        process::exit(1);
    }

    let source = fs::read_to_string(&args[1]).unwrap_or_else(|e| {
        logging::error(&format!("failed to open file {}: {}", args[1], e));
        process::exit(2);
    });

    let listing = match build(&source) {
        Ok(listing) => listing,
        Err(err) => error::report(&source, &err),
    };
    print!("{}", listing);
}

fn build(source: &str) -> Result<String, asmvm::error::Error> {
    let top = Parser::new(source)?.parse()?;
    let program = Program::build(&top);
    validator::check(&program)?;
    Ok(program.disassemble())
}
