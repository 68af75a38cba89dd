//! End-to-end scenarios through the public pipeline: source text in,
//! message (or diagnostic) out.

use asmvm::error::Span;
use asmvm::interpreter::interp;
use asmvm::parser::Parser;
use asmvm::program::Program;
use asmvm::{genc, validator};

/// Parse, lower and validate, asserting every stage succeeds.
fn build_program(source: &str) -> Program {
    let top = Parser::new(source)
        .expect("lex error")
        .parse()
        .expect("parse error");
    let program = Program::build(&top);
    validator::check(&program).expect("validation error");
    program
}

#[test]
fn first_program() {
    let message = interp(concat!(
        "; My first program\n",
        "mov  a, 5\n",
        "inc  a\n",
        "call function\n",
        "msg  '(5+1)/2 = ', a    ; output message\n",
        "end\n",
        "\n",
        "function:\n",
        "    div  a, 2\n",
        "    ret\n",
    ))
    .unwrap();
    assert_eq!(message, "(5+1)/2 = 3");
}

#[test]
fn add_and_report_registers() {
    let message = interp("mov a, 5\nmov b, 5\nadd a, b\nmsg 'a is ', a, ' and b is ', b\n").unwrap();
    assert_eq!(message, "a is 10 and b is 5");
}

#[test]
fn gcd_of_81_and_153() {
    let message = interp(concat!(
        "mov   a, 81\n",
        "mov   b, 153\n",
        "call  init\n",
        "call  proc_gcd\n",
        "call  print\n",
        "end\n",
        "proc_gcd:\n",
        "    cmp   c, d\n",
        "    jne   loop\n",
        "    ret\n",
        "loop:\n",
        "    cmp   c, d\n",
        "    jg    a_bigger\n",
        "    jmp   b_bigger\n",
        "a_bigger:\n",
        "    sub   c, d\n",
        "    jmp   proc_gcd\n",
        "b_bigger:\n",
        "    sub   d, c\n",
        "    jmp   proc_gcd\n",
        "init:\n",
        "    cmp   a, 0\n",
        "    jl    a_abs\n",
        "    cmp   b, 0\n",
        "    jl    b_abs\n",
        "    mov   c, a\n",
        "    mov   d, b\n",
        "    ret\n",
        "a_abs:\n",
        "    mul   a, -1\n",
        "    jmp   init\n",
        "b_abs:\n",
        "    mul   b, -1\n",
        "    jmp   init\n",
        "print:\n",
        "    msg   'gcd(', a, ', ', b, ') = ', c\n",
        "    ret\n",
    ))
    .unwrap();
    assert_eq!(message, "gcd(81, 153) = 9");
}

#[test]
fn every_conditional_branch_reaches_ok() {
    let cases = [
        "cmp 2, 1\njg ok\nmsg 'fail'\nend\nok:\n  msg 'ok'\n",
        "cmp 1, 2\njl ok\nmsg 'fail'\nend\nok:\n  msg 'ok'\n",
        "cmp 1, 1\njge ok\nmsg 'fail'\nend\nok:\n  msg 'ok'\n",
        "cmp 1, 1\njle ok\nmsg 'fail'\nend\nok:\n  msg 'ok'\n",
        "jmp ok\nmsg 'fail'\nend\nok:\n  msg 'ok'\n",
    ];
    for source in cases {
        assert_eq!(interp(source).unwrap(), "ok", "{:?}", source);
    }
}

#[test]
fn mov_rejects_an_integer_destination() {
    let error = interp("mov 5, a").unwrap_err();
    assert_eq!(
        error.to_string(),
        "opcode 'mov' requires a 'register' or a 'memory address' as its first operand, but got a 'integer'"
    );
}

#[test]
fn unterminated_string_reports_its_span() {
    let error = interp("'bar  , 5").unwrap_err();
    assert_eq!(error.to_string(), "unclosed string literal");
    assert_eq!(error.span(), Span::new(1, 0, 8));
}

#[test]
fn jmp_to_a_missing_label() {
    let error = interp("jmp what").unwrap_err();
    assert_eq!(error.to_string(), "label not defined");
    assert_eq!(error.span(), Span::new(1, 4, 8));
}

#[test]
fn errors_stop_execution_before_it_starts() {
    // The duplicate label is reported even though execution would never
    // reach either label.
    let error = interp("end\ntwice:\n  end\ntwice:\n  end\n").unwrap_err();
    assert_eq!(error.to_string(), "duplicated label 'twice'.");
    assert_eq!(error.span().line, 4);
}

#[test]
fn interpretation_is_deterministic() {
    let source = "mov a, 3\nmul a, a\nmsg a\n";
    let first = interp(source).unwrap();
    let second = interp(source).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, "9");
}

#[test]
fn disassembly_round_trips_through_the_parser() {
    let source = concat!(
        "mov a, 81\n",
        "call work\n",
        "msg 'a = ', a\n",
        "end\n",
        "work:\n",
        "  sub a, 1\n",
        "  cmp a, 0\n",
        "  jg work\n",
        "  ret\n",
    );
    let program = build_program(source);
    let listing = program.disassemble();
    let reparsed = build_program(&listing);

    let opcodes: Vec<_> = program.instructions.iter().map(|i| i.opcode).collect();
    let reparsed_opcodes: Vec<_> = reparsed.instructions.iter().map(|i| i.opcode).collect();
    assert_eq!(opcodes, reparsed_opcodes);

    // The listing runs to the same result.
    assert_eq!(interp(source).unwrap(), interp(&listing).unwrap());
}

#[test]
fn generated_c_mirrors_the_program() {
    let program = build_program(concat!(
        "mov a, 5\n",
        "call twice\n",
        "msg 'a = ', a\n",
        "end\n",
        "twice:\n",
        "  mul a, 2\n",
        "  ret\n",
    ));
    let c_source = genc::generate(&program);

    assert!(c_source.contains("int64_t ra=0;"));
    assert!(c_source.contains("twice:\n"));
    assert!(c_source.contains("cs[csp++] = &&__ret_0; goto twice; __ret_0:;"));
    assert!(c_source.contains("ra *= 2;"));
    assert!(c_source.contains("goto *cs[--csp];"));
    assert!(c_source.contains(
        "mp += snprintf(msg + mp, sizeof(msg) - mp, \"%s%lld\", \"a = \", (long long)ra);"
    ));
    assert!(c_source.contains("goto __end;"));
}

#[test]
fn heap_programs_run_end_to_end() {
    let message = interp(concat!(
        "mov a, 24\n",
        "malloc a, b\n",
        "mov c, 0\n",
        "mov [b], 3\n",
        "mov 8[b], 4\n",
        "mov 16[b], 5\n",
        "add c, [b]\n",
        "add c, 8[b]\n",
        "add c, 16[b]\n",
        "mfree b\n",
        "msg 'sum = ', c\n",
    ))
    .unwrap();
    assert_eq!(message, "sum = 12");
}

#[test]
fn integer_boundaries_execute() {
    let message = interp(concat!(
        "mov a, -9223372036854775808\n",
        "mov b, 9223372036854775807\n",
        "msg a, ' ', b\n",
    ))
    .unwrap();
    assert_eq!(message, "-9223372036854775808 9223372036854775807");
}
