use std::path::Path;
use std::{env, fs, process};

use asmvm::parser::Parser;
use asmvm::program::Program;
use asmvm::{error, genc, logging, validator};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <program.asm>", args[0]);
        process::exit(1);
    }

    let input_path = &args[1];
    let source = fs::read_to_string(input_path).unwrap_or_else(|e| {
        logging::error(&format!("failed to open file {}: {}", input_path, e));
        process::exit(2);
    });

    let c_source = match translate(&source) {
        Ok(c_source) => c_source,
        Err(err) => error::report(&source, &err),
    };

    let output_path = Path::new(input_path).with_extension("c");
    fs::write(&output_path, c_source).unwrap_or_else(|e| {
        logging::error(&format!(
            "failed to write to {}: {}",
            output_path.display(),
            e
        ));
        process::exit(3);
    });
}

fn translate(source: &str) -> Result<String, asmvm::error::Error> {
    let top = Parser::new(source)?.parse()?;
    let program = Program::build(&top);
    validator::check(&program)?;
    Ok(genc::generate(&program))
}
