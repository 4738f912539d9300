//! Tests for binary serialization of `Runner` with postcard.
//!
//! A dumped runner carries the optimized program, so loading it skips parsing,
//! loading and every optimizer pass.

use cmm::{CollectStringPrint, Object, Pipeline, Runner};
use pretty_assertions::assert_eq;

#[test]
fn dump_load_simple() {
    let runner = Runner::from_source("main() { return 1 + 2; }", &Pipeline::default()).unwrap();
    let bytes = runner.dump().unwrap();
    let loaded = Runner::load(&bytes).unwrap();

    let outcome = loaded.run_no_limits(&mut CollectStringPrint::new()).unwrap();
    assert_eq!(outcome.top(), Some(&Object::from(3_i64)));
}

#[test]
fn dump_load_preserves_optimized_code() {
    let source = "
unused() { return 5; }
main() { print 6 * 7; }
";
    let runner = Runner::from_source(source, &Pipeline::parse("cd").0).unwrap();
    let loaded = Runner::load(&runner.dump().unwrap()).unwrap();

    assert_eq!(loaded.code(), runner.code());
    assert_eq!(loaded.code().to_text(), "unused:\nmain:\n    push 42\n    print\n    return 0\n");

    let mut print = CollectStringPrint::new();
    loaded.run_no_limits(&mut print).unwrap();
    assert_eq!(print.output(), "42\n");
}

#[test]
fn load_rejects_garbage() {
    assert!(Runner::load(&[0xff, 0xff, 0xff]).is_err());
    assert!(Runner::load(&[]).is_err());
}
