use std::path::{Path, PathBuf};

use super::*;
use crate::{
    context::LinkKind,
    error::{AssembleError, SyntaxError},
    value::Value,
};

const MAIN: &str = "main.asm";

fn run_with(provider: &MemoryProvider, options: Options) -> Assembly {
    assemble(Path::new(MAIN), provider, options, &CancelToken::never()).unwrap()
}

fn run(source: &str) -> Assembly {
    run_with(&MemoryProvider::new().with_file(MAIN, source), Options::default())
}

fn errors_in(asm: &Assembly, path: &str) -> Vec<String> {
    asm.diagnostics_for(Path::new(path))
        .into_iter()
        .map(|diag| diag.message)
        .collect()
}

fn errors(asm: &Assembly) -> Vec<String> {
    errors_in(asm, MAIN)
}

fn location(path: &str, line: usize, column: usize) -> SourceLocation {
    SourceLocation {
        path: PathBuf::from(path),
        line,
        column,
    }
}

#[test]
fn forward_references_settle_on_second_pass() {
    let asm = run("ORG &2000\nJMP later\nEQUW later\n.later\nRTS\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(
        &[0x4C, 0x05, 0x20, 0x05, 0x20, 0x60],
        asm.memory(0x2000..0x2006)
    );
}

#[test]
fn undefined_symbols_fail_on_second_pass_only() {
    let asm = run("ORG &2000\nLDA nowhere\n");
    assert_eq!(vec![SyntaxError::SymbolNotDefined.to_string()], errors(&asm));
}

#[test]
fn one_inconsistency_per_run() {
    let asm = run(concat!(
        "ORG &2000\n",
        "IF fwd = 1\n",
        "EQUB 1\n",
        "ELSE\n",
        "EQUB 2\n",
        "ENDIF\n",
        "IF fwd = 1\n",
        "EQUB 1\n",
        "ELSE\n",
        "EQUB 2\n",
        "ENDIF\n",
        "fwd = 1\n",
    ));
    assert_eq!(vec![AssembleError::InconsistentCode.to_string()], errors(&asm));
    // the second pass still writes its bytes
    assert_eq!(&[0x01, 0x01], asm.memory(0x2000..0x2002));
}

#[test]
fn label_moving_between_passes() {
    let asm = run("ORG &2000\nLDA fwd\n.here\nfwd = &70\n");
    assert!(errors(&asm).contains(&SyntaxError::SecondPassProblem.to_string()));
}

#[test]
fn errors_do_not_stop_later_lines() {
    let asm = run("ORG &2000\nLDA #\nNOP\n");
    let diags = asm.diagnostics_for(Path::new(MAIN));
    assert_eq!(1, diags.len());
    assert_eq!(1, diags[0].span.line);
    assert_eq!(SyntaxError::EmptyExpression.to_string(), diags[0].message);
    assert_eq!(&[0xEA], asm.memory(0x2000..0x2001));
}

#[test]
fn repeated_diagnostics_are_merged() {
    let asm = run("x = 1 / 0\n");
    let file = asm.context().find_file(Path::new(MAIN)).unwrap();
    assert_eq!(2, asm.context().diagnostics(file).len());
    assert_eq!(1, asm.diagnostics_for(Path::new(MAIN)).len());
    assert_eq!(1, asm.diagnostics()[Path::new(MAIN)].len());
}

#[test]
fn braces_scope_labels() {
    let asm = run("ORG &2000\n{\n.loop\nNOP\n}\n{\n.loop\nNOP\n.*top\n.^up\n}\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    let symbols = asm.symbols();
    assert_eq!(Some(&Value::from(0x2000)), symbols.value("loop@1_0"));
    assert_eq!(Some(&Value::from(0x2001)), symbols.value("loop@2_0"));
    assert!(!symbols.is_defined("loop"));
    assert!(symbols.is_defined("top"));
    assert!(symbols.is_defined("up"));
}

#[test]
fn lookups_walk_outwards() {
    let asm = run("x = 5\n{\ny = x + 1\n{\nz = y * 2\n}\n}\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(Some(&Value::from(6)), asm.symbols().value("y@1_0"));
    assert_eq!(Some(&Value::from(12)), asm.symbols().value("z@2_0@1_0"));
}

#[test]
fn redefinition_rules() {
    let asm = run(".a\n.a\n");
    assert_eq!(vec![SyntaxError::LabelAlreadyDefined.to_string()], errors(&asm));

    let asm = run("x = 1\nx = 2\n");
    assert_eq!(vec![SyntaxError::LabelAlreadyDefined.to_string()], errors(&asm));

    let asm = run("x = 1\nx =? 2\n");
    assert!(errors(&asm).is_empty());
    assert_eq!(Some(&Value::from(1)), asm.symbols().value("x"));
}

#[test]
fn sibling_loops_define_their_own_counters() {
    let asm = run("ORG &2000\nFOR n, 0, 10 : EQUW n : NEXT\nFOR n, 0, 10 : EQUW n * 2 : NEXT\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(&[0x00, 0x00, 0x01, 0x00], asm.memory(0x2000..0x2004));
    assert_eq!(&[0x0A, 0x00], asm.memory(0x2014..0x2016));
    assert_eq!(&[0x00, 0x00, 0x02, 0x00], asm.memory(0x2016..0x201A));
    assert_eq!(&[0x14, 0x00], asm.memory(0x202A..0x202C));

    let symbols = asm.symbols();
    assert_eq!(Some(&Value::from(10)), symbols.value("n@1_10"));
    assert_eq!(Some(&Value::from(10)), symbols.value("n@2_10"));
    assert!(!symbols.is_defined("n"));
    assert_eq!(vec![location(MAIN, 1, 20)], asm.rename_locations("n@1_0"));
    assert_eq!(vec![location(MAIN, 2, 20)], asm.rename_locations("n@2_0"));
}

#[test]
fn loop_symbols_are_gone_after_next() {
    let asm = run("FOR i, 0, 1\ninner = i\nNEXT\nx = inner\ny = i\n");
    assert_eq!(
        vec![SyntaxError::SymbolNotDefined.to_string(); 2],
        errors(&asm)
    );
}

#[test]
fn skipto_keeps_labels_stable() {
    let asm = run("ORG &2000\n.base\nJMP page\nSKIPTO base + &100\n.page\nRTS\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(Some(&Value::from(0x2100)), asm.symbols().value("page"));
    assert_eq!(&[0x4C, 0x00, 0x21], asm.memory(0x2000..0x2003));
    assert_eq!(&[0x60], asm.memory(0x2100..0x2101));
}

const ADDIT: &str = "MACRO ADDIT v\n  .lbl\n  LDA #v\nENDMACRO\nORG &2000\nADDIT 1\nADDIT 2\n";

#[test]
fn macro_calls_get_their_own_scope() {
    let asm = run(ADDIT);
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(&[0xA9, 0x01, 0xA9, 0x02], asm.memory(0x2000..0x2004));
    assert_eq!(Some(&Value::from(0x2000)), asm.symbols().value("lbl@1_0"));
    assert_eq!(Some(&Value::from(0x2002)), asm.symbols().value("lbl@2_0"));

    let mac = asm.macros().get("ADDIT").unwrap();
    assert_eq!(vec!["v".to_string()], mac.params);
    assert_eq!("  .lbl\n  LDA #v\n", mac.body);
    assert_eq!(2, asm.macros().references("ADDIT").len());
}

#[test]
fn macro_bytes_chain_back_to_call_site() {
    let asm = run(ADDIT);
    assert_eq!(
        vec![location(MAIN, 2, 2), location(MAIN, 5, 0)],
        asm.source_chain(0x2000)
    );
    assert_eq!(
        vec![location(MAIN, 2, 2), location(MAIN, 6, 0)],
        asm.source_chain(0x2003)
    );
    assert!(asm.source_chain(0x3000).is_empty());
}

#[test]
fn nested_macros_keep_parameters_apart() {
    let asm = run(concat!(
        "MACRO INNER val\n",
        "  EQUB val\n",
        "ENDMACRO\n",
        "MACRO OUTER, val\n",
        "  INNER val + 1\n",
        "  EQUB val\n",
        "ENDMACRO\n",
        "ORG &2000\n",
        "OUTER 10\n",
        "OUTER 20\n",
    ));
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(&[11, 10, 21, 20], asm.memory(0x2000..0x2004));
}

#[test]
fn macro_definition_errors() {
    let asm = run("MACRO FOO\nENDMACRO\nMACRO FOO\nENDMACRO\n");
    assert_eq!(vec![SyntaxError::DuplicateMacroName.to_string()], errors(&asm));

    let asm = run("MACRO FOO\nMACRO BAR\nENDMACRO\n");
    assert!(errors(&asm).contains(&SyntaxError::NoNestedMacros.to_string()));

    let asm = run("MACRO FOO a, b\nENDMACRO\nFOO 1\n");
    assert_eq!(vec![SyntaxError::ParameterCount.to_string()], errors(&asm));
}

#[test]
fn rename_finds_definition_and_references() {
    let asm = run("ORG &2000\n.start\nLDA #0\nJMP start\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(&[0xA9, 0x00, 0x4C, 0x00, 0x20], asm.memory(0x2000..0x2005));
    assert_eq!(
        vec![location(MAIN, 1, 1), location(MAIN, 3, 4)],
        asm.rename_locations("start")
    );
    assert!(asm.rename_locations("missing").is_empty());
}

#[test]
fn saves_are_recorded() {
    let asm = run("ORG &2000\n.start\nRTS\n.end\nSAVE \"CODE\", start, end\n");
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    let [save] = asm.saves() else {
        panic!("expected one save, got {:?}", asm.saves());
    };
    assert_eq!("CODE", save.name);
    assert_eq!((0x2000, 0x2001, 0x2000, 0x2000), (save.start, save.end, save.exec, save.reload));

    let source = "ORG &2000\nNOP\nSAVE &2000, &2001, &2000\n";
    let asm = run(source);
    assert_eq!(vec![SyntaxError::NoAnonSave.to_string()], errors(&asm));

    let provider = MemoryProvider::new().with_file(MAIN, source);
    let asm = run_with(
        &provider,
        Options {
            default_output: Some("OUT".to_string()),
            ..Options::default()
        },
    );
    assert!(errors(&asm).is_empty());
    assert_eq!("OUT", asm.saves()[0].name);
}

#[test]
fn includes_are_assembled_and_linked() {
    let provider = MemoryProvider::new()
        .with_file(MAIN, "ORG &2000\nJSR sub\nRTS\nINCLUDE \"lib.asm\"\nINCBIN \"data.bin\"\n")
        .with_file("lib.asm", "  .sub\n  LDA #1\n  RTS\n")
        .with_file("data.bin", vec![1u8, 2, 3]);
    let asm = run_with(&provider, Options::default());
    assert!(!asm.has_errors(), "{:?}", asm.diagnostics());
    assert_eq!(
        &[0x20, 0x04, 0x20, 0x60, 0xA9, 0x01, 0x60, 0x01, 0x02, 0x03],
        asm.memory(0x2000..0x200A)
    );
    assert_eq!(vec![location("lib.asm", 1, 2)], asm.source_chain(0x2004));

    let kinds: Vec<_> = asm.links().iter().map(|link| link.kind).collect();
    assert_eq!(vec![LinkKind::Include, LinkKind::IncBin], kinds);
    let link = &asm.links()[0];
    assert_eq!(PathBuf::from("lib.asm"), link.target);
    assert_eq!((3, 8), (link.pos.line, link.pos.column));
}

#[test]
fn included_errors_belong_to_their_file() {
    let provider = MemoryProvider::new()
        .with_file(MAIN, "ORG &2000\nINCLUDE \"lib.asm\"\n")
        .with_file("lib.asm", "NOP\nLDA #300\n");
    let asm = run_with(&provider, Options::default());
    assert!(asm.has_errors());
    assert!(errors(&asm).is_empty());
    assert_eq!(vec![SyntaxError::ImmTooLarge.to_string()], errors_in(&asm, "lib.asm"));

    let asm = run("INCLUDE \"missing.asm\"\n");
    assert_eq!(vec![SyntaxError::FileOpen.to_string()], errors(&asm));

    let provider = MemoryProvider::new()
        .with_file(MAIN, "FOR i, 0, 1\nINCLUDE \"lib.asm\"\nNEXT\n")
        .with_file("lib.asm", "NOP\n");
    let asm = run_with(&provider, Options::default());
    assert!(errors(&asm).contains(&SyntaxError::CantInclude.to_string()));
}

#[test]
fn options_seed_symbols_and_cpu() {
    let provider = MemoryProvider::new().with_file(MAIN, "IF DEBUG\nORG &2000\nPHX\nENDIF\n");
    let asm = run_with(
        &provider,
        Options {
            defines: vec![("DEBUG".to_string(), 1.0)],
            cpu: 1,
            ..Options::default()
        },
    );
    assert!(errors(&asm).is_empty(), "{:?}", errors(&asm));
    assert_eq!(&[0xDA], asm.memory(0x2000..0x2001));
}

#[test]
fn runs_are_deterministic() {
    let source = concat!(
        "ORG &2000\n",
        "FOR i, 0, 7\n",
        "  EQUB RND(256)\n",
        "NEXT\n",
        "RANDOMIZE 42\n",
        "r = RND(1000)\n",
        "ASM \"LDA #\" + STR$(r MOD 200)\n",
    );
    let first = run(source);
    let second = run(source);
    assert!(errors(&first).is_empty(), "{:?}", errors(&first));
    assert_eq!(first.memory(0..0x10000), second.memory(0..0x10000));
    let symbols = |asm: &Assembly| -> Vec<(String, Value)> {
        asm.symbols()
            .iter()
            .map(|(name, sym)| (name.to_string(), sym.value.clone()))
            .collect()
    };
    assert_eq!(symbols(&first), symbols(&second));
    assert_eq!(0xA9, first.memory(0x2008..0x2009)[0]);
}

#[test]
fn loop_trees_are_recorded_once() {
    let asm = run("ORG &2000\nFOR i, 0, 2 : EQUB i : NEXT\n");
    let line = asm.ast(Path::new(MAIN), 1).unwrap();
    assert_eq!(1, line.find(ast::AstKind::Command).filter(|node| node.value == "EQUB").count());
    assert!(asm.ast(Path::new(MAIN), 5).is_none());
}
