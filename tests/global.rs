mod common;

use common::run;
use loxbyte::InterpretResult;

#[test]
fn test_def() {
    let source = r#"
var boring_car;
var sports_car = "mcLaren F1";

print boring_car;
print sports_car;
"#;
    let res = run(source);
    assert_eq!(res.result, InterpretResult::Ok);
    assert_eq!(
        r#"nil
mcLaren F1"#,
        res.out.trim()
    );
}

#[test]
fn test_get_set() {
    let source = r#"
var my_car;
var sports_car = "mcLaren F1";
my_car = sports_car;

print my_car;
print sports_car;
"#;
    let res = run(source);
    assert_eq!(res.result, InterpretResult::Ok);
    assert_eq!(
        r#"mcLaren F1
mcLaren F1"#,
        res.out.trim()
    );
}

#[test]
fn test_read_modify_write() {
    let source = r#"
var a = 1;
var b = 2;
print a + b;
a = b + 5;
print a;
"#;
    let res = run(source);
    assert_eq!(res.result, InterpretResult::Ok);
    assert_eq!("3\n7", res.out.trim());
    assert!(res.diag.is_empty());
}

#[test]
fn test_redeclaration_overwrites() {
    let source = r#"
var answer = 42;
var answer = "still computing";
print answer;
"#;
    let res = run(source);
    assert_eq!(res.result, InterpretResult::Ok);
    assert_eq!("still computing", res.out.trim());
}

#[test]
fn test_redeclaration_reads_old_binding() {
    let source = r#"
var msg = "hello";
var msg = msg + " world";
print msg;
"#;
    let res = run(source);
    assert_eq!(res.result, InterpretResult::Ok);
    assert_eq!("hello world", res.out.trim());
}

#[test]
fn test_assignment_is_an_expression() {
    let source = r#"
var a;
print a = 5;
print a;
"#;
    let res = run(source);
    assert_eq!(res.result, InterpretResult::Ok);
    assert_eq!("5\n5", res.out.trim());
}

#[test]
fn test_strings_do_not_alias() {
    let source = r#"
var left = "base";
var right = left;
left = left + "!";
print left;
print right;
"#;
    let res = run(source);
    assert_eq!(res.result, InterpretResult::Ok);
    assert_eq!("base!\nbase", res.out.trim());
}
