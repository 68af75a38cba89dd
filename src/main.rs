use std::{env, fs, process};

use asmvm::interpreter::interp;
use asmvm::{error, logging};

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

    match interp(&source) {
        Ok(message) => println!("Result: '{}'", message),
        Err(err) => error::report(&source, &err),
    }
}
