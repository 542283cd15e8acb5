mod common;

use common::run;
use loxbyte::InterpretResult;

#[test]
fn test_shadowing() {
    let res = run("{ var x = 10; { var x = 20; print x; } print x; }");
    assert_eq!(res.result, InterpretResult::Ok);
    assert_eq!("20\n10", res.out.trim());
    assert!(res.diag.is_empty());
}

#[test]
fn test_local_shadows_global() {
    let source = r#"
var x = "global";
{
  var x = "local";
  print x;
}
print x;
"#;
    let res = run(source);
    assert_eq!(res.result, InterpretResult::Ok);
    assert_eq!("local\nglobal", res.out.trim());
}

#[test]
fn test_locals_are_dropped_with_their_block() {
    let source = r#"
{
  var secret = 1;
}
print secret;
"#;
    let res = run(source);
    assert_eq!(res.result, InterpretResult::RuntimeError);
    assert!(res.out.is_empty());
    assert!(res.diag.contains("Undefined variable 'secret'."));
}

#[test]
fn test_outer_local_survives_inner_block() {
    let res = run("{ var a = 1; { var b = 2; print b; } print a; }");
    assert_eq!(res.result, InterpretResult::Ok);
    assert_eq!("2\n1", res.out.trim());
}

#[test]
fn test_local_assignment() {
    let res = run("{ var a = 1; a = a + 1; print a; }");
    assert_eq!(res.result, InterpretResult::Ok);
    assert_eq!("2", res.out.trim());
}

#[test]
fn test_locals_in_expressions() {
    let source = r#"
{
  var width = 2;
  var height = 3;
  print width * height;
}
"#;
    let res = run(source);
    assert_eq!(res.result, InterpretResult::Ok);
    assert_eq!("6", res.out.trim());
}

#[test]
fn test_sibling_blocks_reuse_slots() {
    let source = r#"
{
  { var a = "first"; print a; }
  { var b = "second"; print b; }
}
"#;
    let res = run(source);
    assert_eq!(res.result, InterpretResult::Ok);
    assert_eq!("first\nsecond", res.out.trim());
}

#[test]
fn test_initializer_reads_earlier_locals() {
    let source = r#"
{
  var tail = "!";
  var loud = "hey" + tail;
  print loud;
}
"#;
    let res = run(source);
    assert_eq!(res.result, InterpretResult::Ok);
    assert_eq!("hey!", res.out.trim());
}
