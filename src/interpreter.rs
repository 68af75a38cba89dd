//! Executes a validated program
//!
//! The virtual machine owns 26 signed 64-bit registers, a compare flag set
//! by `cmp` and consumed by the conditional branches, a bounded call stack
//! and operand stack, a growable message buffer fed by `msg`, and a heap of
//! owned allocations addressed by the opaque handles `malloc` returns.
//! Registers never hold raw host pointers: memory operands resolve against
//! the heap table, and a bad address is a reported error instead of
//! undefined behavior.

use std::collections::BTreeMap;

use crate::error::{Error, Span};
use crate::parser::Parser;
use crate::program::{NUM_REGISTERS, Opcode, Operand, OperandKind, Program};
use crate::validator;

const MAX_CALL_STACK: usize = 1000;
const MAX_STACK: usize = 500;

/// Base address handed out for the first allocation. Non-zero so that a
/// zeroed register never aliases a live block.
const HEAP_BASE: i64 = 0x1000;

/// Owned allocations keyed by base address. Loads and stores move
/// little-endian 64-bit values and must fall entirely inside one block.
#[derive(Debug, Default)]
struct Heap {
    blocks: BTreeMap<i64, Vec<u8>>,
    next_base: i64,
}

impl Heap {
    fn new() -> Heap {
        Heap {
            blocks: BTreeMap::new(),
            next_base: HEAP_BASE,
        }
    }

    fn alloc(&mut self, size: i64) -> i64 {
        let size = size.max(0) as usize;
        let base = self.next_base;
        // Leave a gap so consecutive blocks never touch and an
        // out-of-bounds offset cannot land in a neighbor.
        self.next_base += ((size as i64 + 15) & !15) + 16;
        self.blocks.insert(base, vec![0; size]);
        base
    }

    fn free(&mut self, base: i64) -> bool {
        self.blocks.remove(&base).is_some()
    }

    fn load(&self, addr: i64) -> Option<i64> {
        let (base, block) = self.blocks.range(..=addr).next_back()?;
        let start = usize::try_from(addr - base).ok()?;
        let bytes: [u8; 8] = block.get(start..start + 8)?.try_into().ok()?;
        Some(i64::from_le_bytes(bytes))
    }

    fn store(&mut self, addr: i64, value: i64) -> Option<()> {
        let (base, block) = self.blocks.range_mut(..=addr).next_back()?;
        let start = usize::try_from(addr - *base).ok()?;
        let bytes = block.get_mut(start..start + 8)?;
        bytes.copy_from_slice(&value.to_le_bytes());
        Some(())
    }
}

/// Structure representing the state of the virtual machine.
///
/// The program must have passed [validator::check]; execution relies on the
/// invariants validation establishes (register indices in range, branch
/// operands resolved, write targets writable).
pub struct Vm<'a> {
    program: &'a Program,
    registers: [i64; NUM_REGISTERS],
    cmp: i64,
    pc: usize,
    call_stack: Vec<usize>,
    stack: Vec<i64>,
    msg: String,
    heap: Heap,
}

impl<'a> Vm<'a> {
    pub fn new(program: &'a Program) -> Vm<'a> {
        Vm {
            program,
            registers: [0; NUM_REGISTERS],
            cmp: 0,
            pc: 0,
            call_stack: Vec::new(),
            stack: Vec::new(),
            msg: String::new(),
            heap: Heap::new(),
        }
    }

    /// Runs until `end` or until the program counter passes the last
    /// instruction, returning the accumulated message.
    pub fn run(mut self) -> Result<String, Error> {
        let program = self.program;

        while self.pc < program.instructions.len() {
            let instruction = &program.instructions[self.pc];
            let ops = &instruction.operands;
            let span = instruction.span;

            match instruction.opcode {
                Opcode::Mov => {
                    let value = self.read(&ops[1], span)?;
                    self.write(&ops[0], value, span)?;
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul => {
                    let lhs = self.read(&ops[0], span)?;
                    let rhs = self.read(&ops[1], span)?;
                    let value = match instruction.opcode {
                        Opcode::Add => lhs.wrapping_add(rhs),
                        Opcode::Sub => lhs.wrapping_sub(rhs),
                        _ => lhs.wrapping_mul(rhs),
                    };
                    self.write(&ops[0], value, span)?;
                }
                Opcode::Div => {
                    let rhs = self.read(&ops[1], span)?;
                    if rhs == 0 {
                        return Err(Error::DivisionByZero { span });
                    }
                    let lhs = self.read(&ops[0], span)?;
                    self.write(&ops[0], lhs.wrapping_div(rhs), span)?;
                }
                Opcode::Inc => {
                    let value = self.read(&ops[0], span)?.wrapping_add(1);
                    self.write(&ops[0], value, span)?;
                }
                Opcode::Dec => {
                    let value = self.read(&ops[0], span)?.wrapping_sub(1);
                    self.write(&ops[0], value, span)?;
                }
                Opcode::Cmp => {
                    let lhs = self.read(&ops[0], span)?;
                    let rhs = self.read(&ops[1], span)?;
                    self.cmp = lhs.wrapping_sub(rhs);
                }
                Opcode::Jmp
                | Opcode::Jne
                | Opcode::Je
                | Opcode::Jge
                | Opcode::Jg
                | Opcode::Jle
                | Opcode::Jl => {
                    let taken = match instruction.opcode {
                        Opcode::Jmp => true,
                        Opcode::Jne => self.cmp != 0,
                        Opcode::Je => self.cmp == 0,
                        Opcode::Jge => self.cmp >= 0,
                        Opcode::Jg => self.cmp > 0,
                        Opcode::Jle => self.cmp <= 0,
                        _ => self.cmp < 0,
                    };
                    if taken {
                        self.pc = branch_target(&ops[0]);
                        continue;
                    }
                }
                Opcode::Call => {
                    if self.call_stack.len() >= MAX_CALL_STACK {
                        return Err(Error::CallStackOverflow { span });
                    }
                    self.call_stack.push(self.pc + 1);
                    self.pc = branch_target(&ops[0]);
                    continue;
                }
                Opcode::Ret => match self.call_stack.pop() {
                    Some(target) => {
                        self.pc = target;
                        continue;
                    }
                    None => return Err(Error::CallStackUnderflow { span }),
                },
                Opcode::Push => {
                    if self.stack.len() >= MAX_STACK {
                        return Err(Error::StackOverflow { span });
                    }
                    let value = self.read(&ops[0], span)?;
                    self.stack.push(value);
                }
                Opcode::Pop => match self.stack.pop() {
                    Some(value) => self.write(&ops[0], value, span)?,
                    None => return Err(Error::StackUnderflow { span }),
                },
                Opcode::Msg => {
                    for operand in ops {
                        let text = self.format_operand(operand);
                        self.msg.push_str(&text);
                    }
                }
                Opcode::Print => {
                    for operand in ops {
                        // The two characters `\n` print as a newline.
                        if matches!(&operand.kind, OperandKind::Str(text) if text == "\\n") {
                            println!();
                            continue;
                        }
                        print!("{}", self.format_operand(operand));
                    }
                }
                Opcode::Malloc => {
                    let size = self.read(&ops[0], span)?;
                    let base = self.heap.alloc(size);
                    self.write(&ops[1], base, span)?;
                }
                Opcode::Mfree => {
                    let addr = self.read(&ops[0], span)?;
                    if !self.heap.free(addr) {
                        return Err(Error::InvalidMemAccess { span });
                    }
                }
                Opcode::End => break,
                Opcode::Invalid => unreachable!("rejected during validation"),
            }

            self.pc += 1;
        }

        Ok(self.msg)
    }

    fn read(&self, operand: &Operand, span: Span) -> Result<i64, Error> {
        match &operand.kind {
            OperandKind::Register(index) => Ok(self.registers[*index as usize]),
            OperandKind::Int(value) => Ok(*value),
            OperandKind::Mem { register, offset } => {
                let addr = self.registers[*register as usize].wrapping_add(*offset);
                self.heap.load(addr).ok_or(Error::InvalidMemAccess { span })
            }
            _ => unreachable!("rejected during validation"),
        }
    }

    fn write(&mut self, operand: &Operand, value: i64, span: Span) -> Result<(), Error> {
        match &operand.kind {
            OperandKind::Register(index) => {
                self.registers[*index as usize] = value;
                Ok(())
            }
            OperandKind::Mem { register, offset } => {
                let addr = self.registers[*register as usize].wrapping_add(*offset);
                self.heap
                    .store(addr, value)
                    .ok_or(Error::InvalidMemAccess { span })
            }
            _ => unreachable!("rejected during validation"),
        }
    }

    /// `msg`/`print` formatting: strings verbatim, integers and registers
    /// in decimal. Other operand kinds can reach here because those two
    /// opcodes skip the shape checks; they format as a placeholder.
    fn format_operand(&self, operand: &Operand) -> String {
        match &operand.kind {
            OperandKind::Str(text) => text.clone(),
            OperandKind::Int(value) => value.to_string(),
            OperandKind::Register(index) => self.registers[*index as usize].to_string(),
            _ => "<unhandled operand>".to_string(),
        }
    }
}

fn branch_target(operand: &Operand) -> usize {
    match operand.kind {
        OperandKind::Branch(index) => index,
        _ => unreachable!("rejected during validation"),
    }
}

/// Front-to-back convenience entry: lex, parse, lower, validate, run.
pub fn interp(source: &str) -> Result<String, Error> {
    let top = Parser::new(source)?.parse()?;
    let program = Program::build(&top);
    validator::check(&program)?;
    Vm::new(&program).run()
}
