use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tabscript_plugin::PluginError;
use tabscript_render::{render, WhitespaceMode};
use tabscript_scanner::ParseError;

use super::*;

fn transpile_with(src: &str, opts: ParserOptions) -> (String, Vec<ParseError>) {
    let mut parser = Parser::new(src, opts);
    if let Err(e) = parser.parse_main() {
        parser.state.errors.push(e);
    }
    let errors = std::mem::take(&mut parser.state.errors);
    let (code, _) = render(&parser.state, WhitespaceMode::Pretty);
    (code, errors)
}

fn ts(src: &str) -> String {
    let (code, errors) = transpile_with(src, ParserOptions::default());
    assert!(errors.is_empty(), "unexpected errors: {errors:#?}");
    code
}

fn js(src: &str) -> String {
    let opts = ParserOptions { js: true, ..Default::default() };
    let (code, errors) = transpile_with(src, opts);
    assert!(errors.is_empty(), "unexpected errors: {errors:#?}");
    code
}

#[test]
fn test_const_declaration_with_type_stripping() {
    let src = "tabscript 1.0\nx : number = 3\n";
    assert_eq!(ts(src), "\nconst x: number = 3;\n");
    assert_eq!(js(src), "\"use strict\";\nconst x = 3;\n");
}

#[test]
fn test_let_declaration() {
    assert_eq!(ts("tabscript 1.0\nx ::= 2\n"), "\nlet x = 2;\n");
    assert_eq!(ts("tabscript 1.0\nx := 2\n"), "\nconst x = 2;\n");
}

#[test]
fn test_word_operators_and_strict_equality() {
    let src = "tabscript 1.0\nif a == 1 or b == 2 and c log(c)\n";
    assert_eq!(ts(src), "\nif (a === 1 || b === 2 && c) log(c);\n");
}

#[test]
fn test_for_of_with_inline_const() {
    let src = "tabscript 1.0\nfor x: of arr\n\tlog(x)\n";
    assert_eq!(ts(src), "\nfor (const x of arr) {\n  log(x);\n}\n");
}

#[test]
fn test_arrow_with_object_literal_body_is_parenthesized() {
    let src = "tabscript 1.0\nf := |x| {a: x}\n";
    assert_eq!(js(src), "\"use strict\";\nconst f = (x) => ({a: x});\n");
}

#[test]
fn test_constructor_parameter_properties() {
    let src = "tabscript 1.0\nclass P\n\tconstructor|public x, public y|\n";
    let code = js(src);
    assert!(code.contains("constructor(x, y)"), "{code}");
    assert!(code.contains("this.x=x;this.y=y;"), "{code}");
    // In TS mode the modifiers stay and nothing is injected twice.
    let tscode = ts(src);
    assert!(tscode.contains("constructor(public x, public y)"), "{tscode}");
    assert!(tscode.contains("this.x=x;this.y=y;"), "{tscode}");
}

#[test]
fn test_constructor_injection_after_super_call() {
    let src = "tabscript 1.0\nclass C extends B\n\tconstructor|public x|\n\t\tsuper(x)\n\t\tlog(x)\n";
    let code = js(src);
    let super_pos = code.find("super(x);").expect("super call emitted");
    let assign_pos = code.find("this.x=x;").expect("assignment injected");
    let log_pos = code.find("log(x);").expect("body statement kept");
    assert!(super_pos < assign_pos && assign_pos < log_pos, "{code}");
}

#[test]
fn test_recovery_keeps_going() {
    let src = "tabscript 1.0\nx := (\ny := 2\n";
    let opts = ParserOptions { recover: true, ..Default::default() };
    let (code, errors) = transpile_with(src, opts);
    assert_eq!(errors.len(), 1);
    assert!(code.contains("const y = 2;"), "{code}");
    assert_eq!(errors[0].recover_skip.as_deref(), Some("\n"));
    assert!(errors[0].message.contains("Expecting one of"));
}

#[test]
fn test_recovery_inside_block_stays_at_depth() {
    let src = "tabscript 1.0\nif a\n\tx := (\n\ty := 2\nz := 3\n";
    let opts = ParserOptions { recover: true, ..Default::default() };
    let (code, errors) = transpile_with(src, opts);
    assert_eq!(errors.len(), 1);
    assert!(code.contains("const y = 2;"), "{code}");
    assert!(code.contains("const z = 3;"), "{code}");
}

#[test]
fn test_first_error_aborts_without_recover() {
    let src = "tabscript 1.0\nx := (\ny := 2\n";
    let (code, errors) = transpile_with(src, ParserOptions::default());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("')'"), "{}", errors[0].message);
    assert!(!code.contains("const y"), "{code}");
}

#[test]
fn test_operator_substitution_table() {
    for (op, out) in [
        ("or", "||"),
        ("and", "&&"),
        ("==", "==="),
        ("!=", "!=="),
        ("=~", "=="),
        ("!~", "!="),
        ("%mod", "%"),
        ("%bit_or", "|"),
        ("%bit_and", "&"),
        ("%bit_xor", "^"),
        ("%shift_left", "<<"),
        ("%shift_right", ">>"),
        ("%unsigned_shift_right", ">>>"),
    ] {
        let code = ts(&format!("tabscript 1.0\nr := a {op} b\n"));
        assert!(code.contains(&format!("a {out} b")), "{op}: {code}");
    }
    let code = ts("tabscript 1.0\nr := %bit_not a\n");
    assert!(code.contains("~ a"), "{code}");
}

#[test]
fn test_unknown_percent_operator_is_rejected() {
    let (_, errors) = transpile_with("tabscript 1.0\nr := a %frob b\n", ParserOptions::default());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("%frob"), "{}", errors[0].message);
}

#[test]
fn test_if_else_chain() {
    let src = "tabscript 1.0\nif a\n\tx := 1\nelse if b\n\ty := 2\nelse\n\tz := 3\n";
    let code = ts(src);
    assert!(code.contains("if (a) {"), "{code}");
    assert!(code.contains("else if (b) {"), "{code}");
    assert!(code.contains("else {"), "{code}");
}

#[test]
fn test_c_style_for() {
    let src = "tabscript 1.0\nfor i ::= 0; i < 3; i++\n\tlog(i)\n";
    let code = ts(src);
    // `;` never takes a space after it, same as after `"use strict";`.
    assert!(code.contains("for (let i = 0;i < 3;i++) {"), "{code}");
}

#[test]
fn test_while_loop() {
    let code = ts("tabscript 1.0\nwhile a\n\tpoke()\n");
    assert!(code.contains("while (a) {"), "{code}");
}

#[test]
fn test_do_while() {
    let code = ts("tabscript 1.0\ndo\n\tpoke()\nwhile a\n");
    assert!(code.contains("do {"), "{code}");
    assert!(code.contains("while (a);"), "{code}");
}

#[test]
fn test_try_catch_finally() {
    let src = "tabscript 1.0\ntry\n\trisky()\ncatch e\n\tlog(e)\nfinally\n\tdone()\n";
    let code = ts(src);
    assert!(code.contains("try {"), "{code}");
    assert!(code.contains("catch(e) {"), "{code}");
    assert!(code.contains("finally {"), "{code}");
}

#[test]
fn test_try_without_handler_synthesizes_catch() {
    let code = ts("tabscript 1.0\ntry\n\trisky()\n");
    assert!(code.contains("catch{}"), "{code}");
}

#[test]
fn test_switch_cases_get_break() {
    let src = "tabscript 1.0\nswitch x\n\t1\n\t\tlog(a)\n\t*\n\t\tlog(b)\n";
    let code = ts(src);
    assert!(code.contains("switch (x) {"), "{code}");
    assert!(code.contains("case 1: {"), "{code}");
    assert!(code.contains("default: {"), "{code}");
    assert_eq!(code.matches("break;}").count(), 2, "{code}");
}

#[test]
fn test_enum_modes() {
    let src = "tabscript 1.0\nenum Color\n\tRed\n\tGreen = 5\n\tBlue\n";
    let tscode = ts(src);
    assert!(tscode.contains("enum Color {"), "{tscode}");
    assert!(tscode.contains("Green = 5"), "{tscode}");
    let jscode = js(src);
    assert!(jscode.contains("const Color = {"), "{jscode}");
    assert!(jscode.contains("Red: 0"), "{jscode}");
    assert!(jscode.contains("Green: 5"), "{jscode}");
    assert!(jscode.contains("Blue: 1"), "{jscode}");
}

#[test]
fn test_interface_stripped_in_js() {
    let src = "tabscript 1.0\ninterface Foo\n\tx: number\n\tm|a|: void\nx := 1\n";
    let jscode = js(src);
    assert!(!jscode.contains("interface"), "{jscode}");
    assert!(!jscode.contains("Foo"), "{jscode}");
    assert!(jscode.contains("const x = 1;"), "{jscode}");
    let tscode = ts(src);
    assert!(tscode.contains("interface Foo {"), "{tscode}");
    assert!(tscode.contains("x: number;"), "{tscode}");
    assert!(tscode.contains("m(a): void;"), "{tscode}");
}

#[test]
fn test_type_alias() {
    let src = "tabscript 1.0\ntype A = number or null\n";
    let tscode = ts(src);
    assert!(tscode.contains("type A = number | null;"), "{tscode}");
    let jscode = js(src);
    assert_eq!(jscode, "\"use strict\";\n");
}

#[test]
fn test_declare_is_fully_stripped() {
    let src = "tabscript 1.0\ndeclare x : number\ny := 1\n";
    let tscode = ts(src);
    assert!(!tscode.contains("const x"), "{tscode}");
    assert!(tscode.contains("const y = 1;"), "{tscode}");
}

#[test]
fn test_template_args_strip_and_comparison_fallback() {
    // Committed: `(` follows the closing `>`.
    let jscode = js("tabscript 1.0\nr := f<number>(1)\n");
    assert!(jscode.contains("f(1)"), "{jscode}");
    // Committed: newline follows.
    let jscode = js("tabscript 1.0\nm := new Map<string, number>\n");
    assert!(jscode.contains("new Map;"), "{jscode}");
    // Not committed: `+` follows, so these are comparisons.
    let tscode = ts("tabscript 1.0\nr := a<b>+c\n");
    assert!(tscode.contains("a < b > + c"), "{tscode}");
}

#[test]
fn test_ternary_and_nullish_question() {
    let code = ts("tabscript 1.0\nr := a ? 1 : 2\n");
    assert!(code.contains("a? 1: 2"), "{code}");
    let code = ts("tabscript 1.0\nr := a?\n");
    assert!(code.contains("a !=null"), "{code}");
}

#[test]
fn test_backtick_strings_stay_intact() {
    let code = js("tabscript 1.0\ns := `a b${x}c`\n");
    assert!(code.contains("`a b${x}c`"), "{code}");
    // Nested interpolation.
    let code = js("tabscript 1.0\ns := `x${`y${z}`}w`\n");
    assert!(code.contains("`x${`y${z}`}w`"), "{code}");
    // Word fusion inside an interpolation is guarded.
    let code = js("tabscript 1.0\ns := `n: ${typeof x}`\n");
    assert!(code.contains("${typeof x}"), "{code}");
}

#[test]
fn test_dotdot_call_same_line() {
    let code = ts("tabscript 1.0\nr := f..1 2\n");
    assert!(code.contains("f(1, 2)"), "{code}");
}

#[test]
fn test_dotdot_call_indented() {
    let code = ts("tabscript 1.0\nr := f..\n\t1\n\t2\n");
    assert!(code.contains("f("), "{code}");
    assert!(code.contains("1,"), "{code}");
    assert!(code.contains(");"), "{code}");
}

#[test]
fn test_call_requires_no_preceding_space() {
    let code = ts("tabscript 1.0\nr := f(1)\n");
    assert!(code.contains("f(1)"), "{code}");
}

#[test]
fn test_spread_in_call_and_array() {
    let code = ts("tabscript 1.0\nr := f(1, ...xs)\n");
    assert!(code.contains("...xs"), "{code}");
    let code = ts("tabscript 1.0\nr := [1, ...xs]\n");
    assert!(code.contains("[1,...xs]"), "{code}");
}

#[test]
fn test_optional_chaining_and_index() {
    let code = ts("tabscript 1.0\nr := a?.b?.[0].c[1]\n");
    assert!(code.contains("a?.b?.[0].c[1]"), "{code}");
}

#[test]
fn test_postfix_as_and_non_null_are_stripped_in_js() {
    let code = js("tabscript 1.0\nr := x as number\n");
    assert!(code.contains("const r = x;"), "{code}");
    let code = js("tabscript 1.0\nr := x!\n");
    assert!(code.contains("const r = x;"), "{code}");
    let tscode = ts("tabscript 1.0\nr := x as number\n");
    assert!(tscode.contains("x as number"), "{tscode}");
}

#[test]
fn test_classic_function_and_expression_body() {
    let code = js("tabscript 1.0\nfunction f|x| x + 1\n");
    assert!(code.contains("function f(x) {return x + 1}"), "{code}");
    let code = js("tabscript 1.0\nfunction *gen||\n\tyield 1\n");
    assert!(code.contains("function * gen()"), "{code}");
    assert!(code.contains("yield 1;"), "{code}");
}

#[test]
fn test_overload_signature_is_stripped() {
    let src = "tabscript 1.0\nfunction f|x: number|: void\nfunction f|x|\n\tlog(x)\n";
    let code = ts(src);
    assert_eq!(code.matches("function f").count(), 1, "{code}");
}

#[test]
fn test_async_function_and_await() {
    let code = js("tabscript 1.0\nasync function f||\n\tr := await g()\n");
    assert!(code.contains("async function f()"), "{code}");
    assert!(code.contains("await g()"), "{code}");
}

#[test]
fn test_class_members() {
    let src = "tabscript 1.0\nclass A\n\tcount := 0\n\tstatic origin := null\n\tget size||\n\t\treturn 1\n\tgrow|by|\n\t\tthis.count = this.count + by\n";
    let code = js(src);
    assert!(code.contains("class A {"), "{code}");
    assert!(code.contains("count = 0;"), "{code}");
    assert!(code.contains("static origin = null;"), "{code}");
    assert!(code.contains("get size()"), "{code}");
    assert!(code.contains("grow(by)"), "{code}");
}

#[test]
fn test_abstract_class_modifiers() {
    let src = "tabscript 1.0\nabstract class A\n\tabstract m|x|: void\n";
    let tscode = ts(src);
    assert!(tscode.contains("abstract class A {"), "{tscode}");
    assert!(tscode.contains("abstract m(x): void;"), "{tscode}");
    let jscode = js(src);
    assert!(jscode.contains("class A {"), "{jscode}");
    assert!(!jscode.contains("abstract"), "{jscode}");
    assert!(!jscode.contains("m(x)"), "{jscode}");
}

#[test]
fn test_static_initializer_block() {
    let src = "tabscript 1.0\nclass A\n\tstatic\n\t\tinit()\n";
    let code = js(src);
    assert!(code.contains("static {"), "{code}");
    assert!(code.contains("init();"), "{code}");
}

#[test]
fn test_export_forms() {
    let code = ts("tabscript 1.0\nexport function f||\n\treturn 1\n");
    assert!(code.contains("export function f()"), "{code}");
    let code = ts("tabscript 1.0\nexport default x := 1\n");
    assert!(code.contains("export default const x = 1;"), "{code}");
    // Type-level exports vanish in JS mode, including the keyword.
    let code = js("tabscript 1.0\nexport type A = number\n");
    assert_eq!(code, "\"use strict\";\n");
}

#[test]
fn test_import_forms_and_transform() {
    let code = ts("tabscript 1.0\nimport {a, b as c} from \"./m\"\n");
    assert!(code.contains("import {a, b as c} from \"./m\";"), "{code}");
    let code = ts("tabscript 1.0\nimport d from './m'\n");
    assert!(code.contains("import d from './m';"), "{code}");
    let code = ts("tabscript 1.0\nimport * as ns from \"./m\"\n");
    assert!(code.contains("import * as ns from \"./m\";"), "{code}");

    let opts = ParserOptions {
        transform_import: Some(Arc::new(|uri: &str| format!("{uri}.js"))),
        ..Default::default()
    };
    let (code, errors) = transpile_with("tabscript 1.0\nimport {a} from \"./m\"\n", opts);
    assert!(errors.is_empty(), "{errors:#?}");
    assert!(code.contains("from \"./m.js\";"), "{code}");
}

#[test]
fn test_plugin_import_loads_and_overrides() {
    let seen: Arc<Mutex<Option<(String, Value)>>> = Arc::new(Mutex::new(None));
    let seen_in_loader = seen.clone();
    let loader: PluginLoader = Arc::new(move |path: &str| {
        let seen = seen_in_loader.clone();
        let path_owned = path.to_string();
        Ok(PluginModule {
            default: Arc::new(move |parser: &mut Parser, opts: &Value| {
                *seen.lock().expect("lock") = Some((path_owned.clone(), opts.clone()));
                let prev = Parser::builtin("statement").expect("builtin");
                let hook: ParseHook = Arc::new(move |p: &mut Parser| {
                    if p.state.read_kw("shout") {
                        p.state.emit("console.log(");
                        p.must_parse(Parser::parse_expression, "expression")?;
                        p.state.emit(");");
                        return Ok(true);
                    }
                    prev(p)
                });
                parser
                    .override_rule("statement", hook)
                    .map_err(|e| PluginError::ExecutionFailed {
                        path: "./shout".into(),
                        detail: e.to_string(),
                    })?;
                Ok(())
            }),
        })
    });
    let opts = ParserOptions { load_plugin: Some(loader), ..Default::default() };
    let src = "tabscript 1.0\nimport plugin \"./shout\" {level: 3}\nshout \"hi\"\n";
    let (code, errors) = transpile_with(src, opts);
    assert!(errors.is_empty(), "{errors:#?}");
    // The plugin import itself produces no runtime output.
    assert!(!code.contains("import"), "{code}");
    assert!(code.contains("console.log(\"hi\");"), "{code}");
    let seen = seen.lock().expect("lock").clone();
    let (path, options) = seen.expect("plugin invoked");
    assert_eq!(path, "./shout");
    assert_eq!(options, json!({"level": 3}));
}

#[test]
fn test_plugin_import_without_loader_fails() {
    let src = "tabscript 1.0\nimport plugin \"./x\"\n";
    let (_, errors) = transpile_with(src, ParserOptions::default());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("No plugin loader"), "{}", errors[0].message);
}

#[test]
fn test_header_flags_reach_plugin_options() {
    let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let seen_in_loader = seen.clone();
    let loader: PluginLoader = Arc::new(move |_path: &str| {
        let seen = seen_in_loader.clone();
        Ok(PluginModule {
            default: Arc::new(move |_parser: &mut Parser, opts: &Value| {
                *seen.lock().expect("lock") = Some(opts.clone());
                Ok(())
            }),
        })
    });
    let opts = ParserOptions { load_plugin: Some(loader), ..Default::default() };
    let src = "tabscript 1.0 mode=\"fast\"\nimport plugin \"./p\" {level: 1}\n";
    let (_, errors) = transpile_with(src, opts);
    assert!(errors.is_empty(), "{errors:#?}");
    let options = seen.lock().expect("lock").clone().expect("invoked");
    assert_eq!(options, json!({"level": 1, "mode": "fast"}));
}

#[test]
fn test_statement_failure_leaves_state_unchanged() {
    let mut parser = Parser::new("???\n", ParserOptions::default());
    let pos = parser.state.in_pos;
    let out_len = parser.state.output().len();
    assert!(!parser.parse_statement().expect("no hard error"));
    assert_eq!(parser.state.in_pos, pos);
    assert_eq!(parser.state.output().len(), out_len);
    assert!(!parser.state.expected_is_empty());
}

#[test]
fn test_space_indentation_aborts() {
    let src = "tabscript 1.0\nif a\n  x := 1\n";
    let opts = ParserOptions { recover: true, ..Default::default() };
    let (_, errors) = transpile_with(src, opts);
    assert!(errors
        .iter()
        .any(|e| e.message.contains("tabs only") && !e.recoverable()));
}

#[test]
fn test_source_map_is_monotonic() {
    let src = "tabscript 1.0\nx := 1\ny := x + 2\n";
    let mut parser = Parser::new(src, ParserOptions::default());
    parser.parse_main().expect("parse");
    let (_, map) = render(&parser.state, WhitespaceMode::Pretty);
    assert!(!map.is_empty());
    for pair in map.input.windows(2) {
        assert!(pair[0] <= pair[1], "{:?}", map.input);
    }
    for pair in map.output.windows(2) {
        assert!(pair[0] <= pair[1], "{:?}", map.output);
    }
}

#[test]
fn test_semicolon_forces_inline_block() {
    // `;` before the body opens a subordinate block on the same line.
    let code = ts("tabscript 1.0\nif a; log(a)\n");
    assert!(code.contains("if (a) {"), "{code}");
    assert!(code.contains("log(a);"), "{code}");
}
