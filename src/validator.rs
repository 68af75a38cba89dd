//! Static checks on the lowered program
//!
//! Runs after label resolution and before execution: label uniqueness
//! first, then per-instruction checks in a fixed order (opcode known,
//! registers lowered, arity, operand types). The first problem found is
//! returned.

use crate::error::Error;
use crate::program::{Instruction, Opcode, Operand, OperandKind, Program, INVALID_REGISTER};

#[derive(Clone, Copy, PartialEq)]
enum Expected {
    Register,
    Integer,
    Label,
    Mem,
}

impl Expected {
    fn name(self) -> &'static str {
        match self {
            Expected::Register => "register",
            Expected::Integer => "integer",
            Expected::Label => "label",
            Expected::Mem => "memory address",
        }
    }

    fn matches(self, operand: &Operand) -> bool {
        matches!(
            (self, &operand.kind),
            (Expected::Register, OperandKind::Register(_))
                | (Expected::Integer, OperandKind::Int(_))
                | (Expected::Label, OperandKind::Branch(_))
                | (Expected::Mem, OperandKind::Mem { .. })
        )
    }
}

pub fn check(program: &Program) -> Result<(), Error> {
    check_duplicated_labels(program)?;
    for instruction in &program.instructions {
        if instruction.opcode == Opcode::Invalid {
            return Err(Error::InvalidOpcode {
                span: instruction.span,
            });
        }
        check_operands(instruction)?;
    }
    Ok(())
}

fn check_duplicated_labels(program: &Program) -> Result<(), Error> {
    for (i, label) in program.labels.iter().enumerate() {
        for other in &program.labels[i + 1..] {
            if label.name == other.name {
                // The second occurrence is the one reported.
                return Err(Error::DuplicatedLabel {
                    name: other.name.clone(),
                    span: other.span,
                });
            }
        }
    }
    Ok(())
}

fn check_operands(instruction: &Instruction) -> Result<(), Error> {
    // A register that failed to lower poisons every later check.
    for operand in &instruction.operands {
        match operand.kind {
            OperandKind::Register(INVALID_REGISTER) => {
                return Err(Error::InvalidRegister { span: operand.span });
            }
            OperandKind::Mem {
                register: INVALID_REGISTER,
                ..
            } => {
                return Err(Error::InvalidMemRegister { span: operand.span });
            }
            _ => {}
        }
    }

    match instruction.opcode {
        Opcode::Mov | Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
            require_count(instruction, 2)?;
            // The first operand is a write target.
            require_types(instruction, 0, &[Expected::Register, Expected::Mem])?;
            require_types(
                instruction,
                1,
                &[Expected::Register, Expected::Integer, Expected::Mem],
            )?;
        }
        Opcode::Inc | Opcode::Dec | Opcode::Push | Opcode::Pop | Opcode::Mfree => {
            require_count(instruction, 1)?;
            require_types(instruction, 0, &[Expected::Register])?;
        }
        Opcode::Jmp
        | Opcode::Jne
        | Opcode::Je
        | Opcode::Jge
        | Opcode::Jg
        | Opcode::Jle
        | Opcode::Jl
        | Opcode::Call => {
            require_count(instruction, 1)?;
            if matches!(
                instruction.operands[0].kind,
                OperandKind::UnresolvedBranch(_)
            ) {
                return Err(Error::UndefinedLabel {
                    span: instruction.operands[0].span,
                });
            }
            require_types(instruction, 0, &[Expected::Label])?;
        }
        Opcode::Ret | Opcode::End => require_count(instruction, 0)?,
        Opcode::Cmp => {
            require_count(instruction, 2)?;
            require_types(instruction, 0, &[Expected::Register, Expected::Integer])?;
            require_types(instruction, 1, &[Expected::Register, Expected::Integer])?;
        }
        Opcode::Malloc => {
            require_count(instruction, 2)?;
            require_types(instruction, 0, &[Expected::Register])?;
            require_types(instruction, 1, &[Expected::Register])?;
        }
        // No shape requirements; the runtime formats whatever it gets.
        Opcode::Msg | Opcode::Print => {}
        Opcode::Invalid => unreachable!("rejected before the operand checks"),
    }
    Ok(())
}

fn require_count(instruction: &Instruction, required: usize) -> Result<(), Error> {
    let got = instruction.operands.len();
    if got != required {
        return Err(Error::OperandCount {
            opcode: instruction.opcode.name(),
            required,
            got,
            span: instruction.span,
        });
    }
    Ok(())
}

fn require_types(
    instruction: &Instruction,
    index: usize,
    expected: &[Expected],
) -> Result<(), Error> {
    let operand = &instruction.operands[index];
    if expected.iter().any(|e| e.matches(operand)) {
        return Ok(());
    }

    let list = expected
        .iter()
        .map(|e| format!("'{}'", e.name()))
        .collect::<Vec<_>>()
        .join(" or a ");
    Err(Error::OperandType {
        opcode: instruction.opcode.name(),
        expected: list,
        slot: if index == 0 { "first" } else { "second" },
        got: operand.type_name(),
        span: operand.span,
    })
}
