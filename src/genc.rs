//! Translates a validated program into a self-contained C source file
//!
//! The translation mirrors the interpreter: one C statement per
//! instruction, labels as C labels, the compare flag and both stacks as
//! locals in `main`. `call`/`ret` use the computed-goto extension (a
//! pushed `&&__ret_N` address per call site), so the output wants GCC or
//! Clang. Programs that touch the heap (`malloc`, `mfree`, memory
//! operands) are outside the back end's contract; those instructions emit
//! an explanatory comment instead of code.

use crate::program::{Instruction, NUM_REGISTERS, Opcode, Operand, OperandKind, Program, register_name};

const PREAMBLE: &str = "\
#include <stdio.h>
#include <stdint.h>

int main(void) {
  char msg[1000] = {0};
  int mp = 0;
  void* cs[1000] = {0};
  uint16_t csp = 0;
  int64_t cmp = 0;
  uint64_t stack[1000] = {0};
  uint16_t sp = 0;
";

const EPILOGUE: &str = "\
__end:
  printf(\"%s\\n\", msg);
  return 0;
}
";

pub fn generate(program: &Program) -> String {
    let mut state = GenState {
        program,
        out: String::new(),
        ret_labels: 0,
    };

    state.out.push_str(PREAMBLE);
    state.declare_used_registers();
    state.out.push_str("\n  /* instructions */\n");

    for (index, instruction) in program.instructions.iter().enumerate() {
        state.emit_labels_at(index);
        state.emit_instruction(instruction);
    }
    // Labels that resolved one past the last instruction fall through.
    state.emit_labels_at(program.instructions.len());

    state.out.push_str(EPILOGUE);
    state.out
}

struct GenState<'a> {
    program: &'a Program,
    out: String,
    ret_labels: usize,
}

impl GenState<'_> {
    /// One zero-initialized declaration covering exactly the registers the
    /// program mentions, e.g. `int64_t ra=0, rb=0;`.
    fn declare_used_registers(&mut self) {
        let mut used = 0u32;
        for instruction in &self.program.instructions {
            for operand in &instruction.operands {
                if let OperandKind::Register(index) = operand.kind {
                    if index >= 0 {
                        used |= 1 << index;
                    }
                }
            }
        }
        if used == 0 {
            return;
        }

        self.out.push_str("  int64_t ");
        let mut first = true;
        for index in 0..NUM_REGISTERS as i32 {
            if used & (1 << index) != 0 {
                if !first {
                    self.out.push_str(", ");
                }
                first = false;
                self.out.push_str(&format!("r{}=0", register_name(index)));
            }
        }
        self.out.push_str(";\n");
    }

    fn emit_labels_at(&mut self, index: usize) {
        let program = self.program;
        for label in program.labels.iter().filter(|l| l.index == index) {
            self.out.push_str(&label.name);
            self.out.push_str(":\n");
        }
    }

    fn emit_instruction(&mut self, instruction: &Instruction) {
        if !self.supported(instruction) {
            self.out.push_str(&format!(
                "  /* {}: not supported by the C back end */\n",
                instruction.opcode.name()
            ));
            return;
        }

        let ops = &instruction.operands;
        let statement = match instruction.opcode {
            Opcode::Mov => format!("  {} = {};", reg(&ops[0]), value(&ops[1])),
            Opcode::Inc => format!("  {}++;", reg(&ops[0])),
            Opcode::Dec => format!("  {}--;", reg(&ops[0])),
            Opcode::Add => format!("  {} += {};", reg(&ops[0]), value(&ops[1])),
            Opcode::Sub => format!("  {} -= {};", reg(&ops[0]), value(&ops[1])),
            Opcode::Mul => format!("  {} *= {};", reg(&ops[0]), value(&ops[1])),
            Opcode::Div => format!("  {} /= {};", reg(&ops[0]), value(&ops[1])),
            Opcode::Jmp => format!("  goto {};", self.label(&ops[0])),
            Opcode::Jne => format!("  if (cmp != 0) goto {};", self.label(&ops[0])),
            Opcode::Je => format!("  if (cmp == 0) goto {};", self.label(&ops[0])),
            Opcode::Jge => format!("  if (cmp >= 0) goto {};", self.label(&ops[0])),
            Opcode::Jg => format!("  if (cmp > 0) goto {};", self.label(&ops[0])),
            Opcode::Jle => format!("  if (cmp <= 0) goto {};", self.label(&ops[0])),
            Opcode::Jl => format!("  if (cmp < 0) goto {};", self.label(&ops[0])),
            Opcode::Call => {
                let n = self.ret_labels;
                self.ret_labels += 1;
                format!(
                    "  cs[csp++] = &&__ret_{}; goto {}; __ret_{}:;",
                    n,
                    self.label(&ops[0]),
                    n
                )
            }
            Opcode::Ret => "  goto *cs[--csp];".to_string(),
            Opcode::Cmp => format!("  cmp = {} - {};", value(&ops[0]), value(&ops[1])),
            Opcode::Push => format!("  stack[sp++] = {};", reg(&ops[0])),
            Opcode::Pop => format!("  {} = stack[--sp];", reg(&ops[0])),
            Opcode::Msg => {
                let (fmt, args) = format_and_args(ops, false);
                format!(
                    "  mp += snprintf(msg + mp, sizeof(msg) - mp, \"{}\"{});",
                    fmt, args
                )
            }
            Opcode::Print => {
                let (fmt, args) = format_and_args(ops, true);
                format!("  printf(\"{}\"{});", fmt, args)
            }
            Opcode::End => "  goto __end;".to_string(),
            Opcode::Malloc | Opcode::Mfree | Opcode::Invalid => {
                unreachable!("filtered as unsupported")
            }
        };

        self.out
            .push_str(&format!("  /* {:>5} */", instruction.opcode.name()));
        self.out.push_str(&statement);
        self.out.push('\n');
    }

    fn supported(&self, instruction: &Instruction) -> bool {
        match instruction.opcode {
            Opcode::Malloc | Opcode::Mfree | Opcode::Invalid => false,
            // Any operand kind formats, one way or another.
            Opcode::Msg | Opcode::Print => true,
            _ => !instruction
                .operands
                .iter()
                .any(|operand| matches!(operand.kind, OperandKind::Mem { .. })),
        }
    }

    fn label(&self, operand: &Operand) -> String {
        match operand.kind {
            OperandKind::Branch(index) => {
                self.program.label_at(index).unwrap_or("__end").to_string()
            }
            _ => "__end".to_string(),
        }
    }
}

fn reg(operand: &Operand) -> String {
    match operand.kind {
        OperandKind::Register(index) => format!("r{}", register_name(index)),
        _ => "r?".to_string(),
    }
}

fn value(operand: &Operand) -> String {
    match &operand.kind {
        OperandKind::Register(index) => format!("r{}", register_name(*index)),
        OperandKind::Int(value) => value.to_string(),
        _ => "0".to_string(),
    }
}

/// Builds the format string and argument list for `msg`/`print`. With
/// `translate_newline`, a string operand equal to the two characters `\n`
/// becomes a real newline escape, matching the interpreter's `print`.
fn format_and_args(operands: &[Operand], translate_newline: bool) -> (String, String) {
    let mut fmt = String::new();
    let mut args = String::new();
    for operand in operands {
        match &operand.kind {
            OperandKind::Str(text) => {
                fmt.push_str("%s");
                if translate_newline && text == "\\n" {
                    args.push_str(", \"\\n\"");
                } else {
                    args.push_str(&format!(", \"{}\"", escape_c(text)));
                }
            }
            OperandKind::Int(value) => {
                fmt.push_str("%lld");
                args.push_str(&format!(", (long long){}", value));
            }
            OperandKind::Register(index) => {
                fmt.push_str("%lld");
                args.push_str(&format!(", (long long)r{}", register_name(*index)));
            }
            _ => {
                fmt.push_str("%s");
                args.push_str(", \"<unhandled operand>\"");
            }
        }
    }
    (fmt, args)
}

fn escape_c(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out
}
