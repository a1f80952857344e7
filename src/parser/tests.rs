use std::path::Path;

use crate::{
    ast::AstKind,
    error::{AssembleError, SyntaxError},
    value::Value,
    assemble, Assembly, CancelToken, MemoryProvider, Options,
};

fn run(source: &str) -> Assembly {
    let provider = MemoryProvider::new().with_file("main.asm", source);
    assemble(
        Path::new("main.asm"),
        &provider,
        Options::default(),
        &CancelToken::never(),
    )
    .unwrap()
}

fn errors(asm: &Assembly) -> Vec<String> {
    asm.diagnostics_for(Path::new("main.asm"))
        .into_iter()
        .map(|diag| diag.message)
        .collect()
}

fn number(asm: &Assembly, name: &str) -> f64 {
    asm.symbols()
        .value(name)
        .and_then(|value| value.number().ok())
        .unwrap()
}

#[test]
fn assembles_basic_modes() {
    let asm = run("ORG &2000\nLDA #1\nSTA &70\nSTA &1234\nLDX &70,Y\nLDA &1234,X\nASL A\nRTS\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(
        &[0xA9, 0x01, 0x85, 0x70, 0x8D, 0x34, 0x12, 0xB6, 0x70, 0xBD, 0x34, 0x12, 0x0A, 0x60],
        asm.memory(0x2000..0x200E)
    );
}

#[test]
fn assembles_indirect_modes() {
    let asm = run("ORG &2000\nLDA (&70),Y\nLDA (&72,X)\nJMP (&2100)\nLDA (1+2)*3,X\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(
        &[0xB1, 0x70, 0xA1, 0x72, 0x6C, 0x00, 0x21, 0xB5, 0x09],
        asm.memory(0x2000..0x2009)
    );
}

#[test]
fn indirect_y_needs_zero_page() {
    let asm = run("ORG &2000\nLDA (&1234),Y\n");
    assert_eq!(vec![SyntaxError::NotZeroPage.to_string()], errors(&asm));
}

#[test]
fn jmp_indirect_page_bug() {
    let asm = run("ORG &2000\nJMP (&20FF)\n");
    assert_eq!(vec![AssembleError::Jmp6502Bug.to_string()], errors(&asm));

    let asm = run("CPU 1\nORG &2000\nJMP (&20FF)\n");
    assert!(errors(&asm).is_empty());
    assert_eq!(&[0x6C, 0xFF, 0x20], asm.memory(0x2000..0x2003));
}

#[test]
fn immediate_limits() {
    let asm = run("ORG &2000\nLDA #-1\n");
    assert!(errors(&asm).is_empty());
    assert_eq!(&[0xA9, 0xFF], asm.memory(0x2000..0x2002));

    let asm = run("ORG &2000\nLDA #256\n");
    assert_eq!(vec![SyntaxError::ImmTooLarge.to_string()], errors(&asm));

    let asm = run("ORG &2000\nLDA #-200\n");
    assert_eq!(vec![SyntaxError::ImmNegative.to_string()], errors(&asm));

    let asm = run("ORG &2000\nINX #1\n");
    assert_eq!(vec![SyntaxError::NoImmediate.to_string()], errors(&asm));
}

#[test]
fn cmos_instructions() {
    let asm = run("CPU 1\nORG &2000\nBRA here\n.here\nSTZ &70\nPHX\nINC A\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(&[0x80, 0x00, 0x64, 0x70, 0xDA, 0x1A], asm.memory(0x2000..0x2006));
    assert_eq!(1.0, number(&asm, "CPU"));

    let asm = run("ORG &2000\nSTZ &70\n");
    assert!(asm.has_errors());
}

#[test]
fn branches() {
    let asm = run("ORG &2000\n.top\nNOP\nBNE top\nBEQ fwd\nNOP\n.fwd\nRTS\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(
        &[0xEA, 0xD0, 0xFD, 0xF0, 0x01, 0xEA, 0x60],
        asm.memory(0x2000..0x2007)
    );

    let asm = run("ORG &2000\n.top\nSKIP 200\nBNE top\n");
    assert_eq!(vec![SyntaxError::BranchOutOfRange.to_string()], errors(&asm));
}

#[test]
fn expression_operators() {
    let asm = run(concat!(
        "a = -128 << -3\n",
        "b = 7283 << 2\n",
        "c = 29658 << -2\n",
        "d = -1583 << 3\n",
        "e = 7 DIV 2\n",
        "f = 7 / 2\n",
        "g = 1 + 2 * 3\n",
        "h = (1 + 2) * 3\n",
        "i = 10 MOD 3\n",
        "j = TRUE AND 5\n",
        "k = -2 ^ 2\n",
        "l = &FF EOR %1010\n",
        "m = 3 >= 3\n",
    ));
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(-16.0, number(&asm, "a"));
    assert_eq!(29132.0, number(&asm, "b"));
    assert_eq!(7414.0, number(&asm, "c"));
    assert_eq!(-12664.0, number(&asm, "d"));
    assert_eq!(3.5, number(&asm, "e"));
    assert_eq!(3.0, number(&asm, "f"));
    assert_eq!(7.0, number(&asm, "g"));
    assert_eq!(9.0, number(&asm, "h"));
    assert_eq!(1.0, number(&asm, "i"));
    assert_eq!(5.0, number(&asm, "j"));
    assert_eq!(4.0, number(&asm, "k"));
    assert_eq!(0xF5 as f64, number(&asm, "l"));
    assert_eq!(-1.0, number(&asm, "m"));
}

#[test]
fn expression_functions() {
    let asm = run(concat!(
        "a = HI(&1234) + LO(&1234)\n",
        "b = LEN(\"ABC\")\n",
        "c = INT(-3.7)\n",
        "d = NOT(0)\n",
        "e = EVAL(\"2*3\")\n",
        "f = VAL(\"12.5\")\n",
        "g = ASC(MID$(\"HELLO\", 2, 1))\n",
        "h$ = STR$~(255) + STR$(10)\n",
        "i$ = UPPER$(LEFT$(\"hello\", 2)) + STRING$(2, \"-\")\n",
    ));
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!((0x12 + 0x34) as f64, number(&asm, "a"));
    assert_eq!(3.0, number(&asm, "b"));
    assert_eq!(-3.0, number(&asm, "c"));
    assert_eq!(-1.0, number(&asm, "d"));
    assert_eq!(6.0, number(&asm, "e"));
    assert_eq!(12.5, number(&asm, "f"));
    assert_eq!(b'E' as f64, number(&asm, "g"));
    assert_eq!(Some(&Value::from("FF10")), asm.symbols().value("h$"));
    assert_eq!(Some(&Value::from("HE--")), asm.symbols().value("i$"));
}

#[test]
fn expression_errors() {
    let cases = [
        ("x = 1 / 0\n", SyntaxError::DivisionByZero),
        ("x = \"a\" + 1\n", SyntaxError::TypeMismatch),
        ("x = (1 + 2\n", SyntaxError::MismatchedParentheses),
        ("x = \n", SyntaxError::EmptyExpression),
        ("x = 1 +\n", SyntaxError::MissingValue),
        ("x = &\n", SyntaxError::BadHex),
        ("x = &123456789\n", SyntaxError::NumberTooBig),
        ("x = \"abc\n", SyntaxError::MissingQuote),
        ("x = MID$(\"a\", 1)\n", SyntaxError::ParameterCount),
        ("x = nowhere\n", SyntaxError::SymbolNotDefined),
        ("x = SQR(-1)\n", SyntaxError::IllegalOperation),
    ];
    for (source, kind) in cases {
        let asm = run(source);
        assert_eq!(vec![kind.to_string()], errors(&asm), "{source}");
    }
}

#[test]
fn string_repeats_are_bounded() {
    let asm = run("n = LEN(STRING$(65535, \"A\"))\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(65535.0, number(&asm, "n"));

    for source in [
        "x$ = STRING$(70000, \"A\")\n",
        "x$ = STRING$(32768, \"AB\")\n",
        "x$ = STRING$(2000000000, \"AB\")\n",
    ] {
        let asm = run(source);
        assert_eq!(vec![SyntaxError::OutOfRange.to_string()], errors(&asm), "{source}");
    }
}

#[test]
fn underscores_separate_hex_and_binary_digits() {
    let asm = run("x = %1010_0101\ny = &12_34\nz = $0000_0000_1234_5678\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(0xA5 as f64, number(&asm, "x"));
    assert_eq!(0x1234 as f64, number(&asm, "y"));
    assert_eq!(0x1234_5678 as f64, number(&asm, "z"));

    let asm = run("x = &_12\n");
    assert_eq!(vec![SyntaxError::BadHex.to_string()], errors(&asm));
    let asm = run("x = &12__34\n");
    assert!(asm.has_errors());
}

#[test]
fn eval_and_asm_nesting_is_limited() {
    let asm = run("e = EVAL(\"EVAL(\"\"1+1\"\")\")\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(2.0, number(&asm, "e"));

    let asm = run("a$ = \"EVAL(a$)\"\nx = EVAL(a$)\nafter = 1\n");
    assert_eq!(vec![SyntaxError::TooManyEvals.to_string()], errors(&asm));
    assert_eq!(1.0, number(&asm, "after"));

    let asm = run("s$ = \"ASM s$\"\nASM s$\n");
    assert_eq!(vec![SyntaxError::TooManyEvals.to_string()], errors(&asm));
}

#[test]
fn bracketed_address_evaluates_once() {
    let asm = run("ORG &2000\nLDA (RND(100))+&1000\nafter = RND(100)\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    let reference = run("r1 = RND(100)\nr2 = RND(100)\n");
    let addr = number(&reference, "r1") as u16 + 0x1000;
    assert_eq!(&[0xAD, addr as u8, (addr >> 8) as u8], asm.memory(0x2000..0x2003));
    assert_eq!(number(&reference, "r2"), number(&asm, "after"));
}

#[test]
fn strings_emit_one_byte_per_character() {
    let asm = run("ORG &2000\nEQUS CHR$(200)\nEQUB &EA\nEQUS \"\u{e9}\"\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(&[0xC8, 0xEA, 0xE9], asm.memory(0x2000..0x2003));

    let asm = run("ORG &2000\nEQUS \"\u{20ac}\"\n");
    assert_eq!(vec![SyntaxError::OutOfRange.to_string()], errors(&asm));
}

#[test]
fn data_directives() {
    let asm = run(concat!(
        "ORG &2000\n",
        "EQUB 1, -1, \"AB\"\n",
        "EQUW &1234\n",
        "EQUD &12345678\n",
        "MAPCHAR 'A', 1\n",
        "EQUS \"AB\"\n",
    ));
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(
        &[
            0x01, 0xFF, 0x41, 0x42, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0x01, 0x42
        ],
        asm.memory(0x2000..0x200C)
    );

    let asm = run("ORG &2000\nEQUB 256\n");
    assert_eq!(vec![SyntaxError::NumberTooBig.to_string()], errors(&asm));

    let asm = run("ORG &2000\nEQUW \"AB\"\n");
    assert_eq!(vec![SyntaxError::TypeMismatch.to_string()], errors(&asm));
}

#[test]
fn mapchar_ranges() {
    let asm = run("MAPCHAR 'A', 'C', 1\nORG &2000\nEQUS \"ABCD\"\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(&[0x01, 0x02, 0x03, b'D'], asm.memory(0x2000..0x2004));
}

#[test]
fn alignment_and_skips() {
    let asm = run("ORG &2001\nALIGN &100\nx = P%\nSKIP 3\ny = *\nSKIPTO &2200\nz = P%\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(0x2100 as f64, number(&asm, "x"));
    assert_eq!(0x2103 as f64, number(&asm, "y"));
    assert_eq!(0x2200 as f64, number(&asm, "z"));

    let asm = run("ORG &2000\nALIGN 3\n");
    assert_eq!(vec![SyntaxError::BadAlignment.to_string()], errors(&asm));

    let asm = run("ORG &2000\nSKIPTO &1000\n");
    assert_eq!(vec![SyntaxError::BackwardsSkip.to_string()], errors(&asm));
}

#[test]
fn guard_and_overlap() {
    let asm = run("ORG &2000\nGUARD &2002\nNOP\nNOP\nNOP\n");
    assert_eq!(vec![AssembleError::GuardHit.to_string()], errors(&asm));

    let asm = run("ORG &2000\nNOP\nORG &2000\nNOP\n");
    assert_eq!(vec![AssembleError::Overlap.to_string()], errors(&asm));

    let asm = run("ORG &2000\nNOP\nCLEAR &2000, &2001\nORG &2000\nRTS\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(&[0x60], asm.memory(0x2000..0x2001));
}

#[test]
fn copyblock_duplicates_code() {
    let asm = run("ORG &2000\nLDA #1\nCOPYBLOCK &2000, &2002, &3000\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(&[0xA9, 0x01], asm.memory(0x3000..0x3002));
}

#[test]
fn conditionals() {
    let asm = run(concat!(
        "ORG &2000\n",
        "x = 2\n",
        "IF x = 1\n",
        "  EQUB 1\n",
        "ELIF x = 2\n",
        "  EQUB 2\n",
        "ELSE\n",
        "  EQUB 3\n",
        "ENDIF\n",
        "IF x = 5 : EQUB 5 : ELSE : EQUB 6 : ENDIF\n",
    ));
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(&[0x02, 0x06], asm.memory(0x2000..0x2002));
}

#[test]
fn conditional_structure_errors() {
    let cases = [
        ("ELSE\n", SyntaxError::ElseWithoutIf),
        ("ENDIF\n", SyntaxError::EndifWithoutIf),
        ("ELIF 1\n", SyntaxError::ElifWithoutIf),
        ("IF 1\nELSE\nELSE\nENDIF\n", SyntaxError::ElseAfterElse),
        ("IF 1\nELSE\nELIF 1\nENDIF\n", SyntaxError::ElifAfterElse),
        ("IF 1\nNOP\n", SyntaxError::IfWithoutEndif),
        ("NEXT\n", SyntaxError::NextWithoutFor),
        ("FOR i, 0, 1\nNOP\n", SyntaxError::ForWithoutNext),
        ("FOR i, 0, 1, 0\nNEXT\n", SyntaxError::BadStep),
        ("{\nNOP\n", SyntaxError::MismatchedBraces),
        ("}\n", SyntaxError::MismatchedBraces),
        ("MACRO FOO\nNOP\n", SyntaxError::NoEndMacro),
        ("ENDMACRO\n", SyntaxError::EndMacroUnexpected),
    ];
    for (source, kind) in cases {
        let asm = run(source);
        assert!(errors(&asm).contains(&kind.to_string()), "{source}: {:?}", errors(&asm));
    }
}

#[test]
fn single_line_for_loop() {
    let asm = run("ORG &2000:FOR n, 0, 3:EQUB n:NEXT:RTS\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(&[0x00, 0x01, 0x02, 0x03, 0x60], asm.memory(0x2000..0x2005));
}

#[test]
fn multi_line_for_loop() {
    let asm = run("ORG &2000\nFOR i, 3, 1, -1\n  .entry\n  EQUB i * 2\nNEXT\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(&[0x06, 0x04, 0x02], asm.memory(0x2000..0x2003));
}

#[test]
fn labels_cannot_escape_a_for_loop() {
    let asm = run("FOR i, 0, 1\n.*outer\nNEXT\n");
    assert!(errors(&asm).contains(&SyntaxError::PromoteOutOfFor.to_string()));
}

#[test]
fn print_assert_and_error() {
    let asm = run("PRINT \"x=\", 3, ~255\n");
    assert_eq!(&["x= 3 &FF".to_string()], asm.printed());

    let asm = run("ASSERT 1 = 2\n");
    assert_eq!(vec![SyntaxError::AssertionFailed.to_string()], errors(&asm));

    let asm = run("ERROR \"boom\"\n");
    assert_eq!(vec!["boom".to_string()], errors(&asm));
}

#[test]
fn statement_errors() {
    let asm = run("FROB 1\n");
    assert_eq!(vec![SyntaxError::MacroNotFound.to_string()], errors(&asm));

    let asm = run("ORG &2000\nNOP 1\n");
    assert!(asm.has_errors());

    let asm = run("ORG &2000, 1\n");
    assert_eq!(vec![SyntaxError::UnexpectedComma.to_string()], errors(&asm));

    let asm = run("@\n");
    assert_eq!(vec![SyntaxError::UnrecognisedToken.to_string()], errors(&asm));
}

#[test]
fn records_line_trees() {
    let asm = run("ORG &2000\nLDA #1 : .here : x = 2 ; note\n");
    let line = asm.ast(Path::new("main.asm"), 1).unwrap();
    assert_eq!(AstKind::Line, line.kind);
    let kinds: Vec<_> = line.children.iter().map(|node| node.kind).collect();
    assert_eq!(
        vec![
            AstKind::Assembly,
            AstKind::VariableDeclaration,
            AstKind::VariableDeclaration
        ],
        kinds
    );
    assert_eq!(1, line.find(AstKind::Expression).filter(|node| node.value == "1").count());
    assert_eq!(Some(AstKind::Assembly), line.node_at(1).map(|node| node.kind));
}
