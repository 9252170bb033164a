mod common;

use common::{engine, is_error, lines, run, status};
use notemode::{Mode, Position};

#[test]
fn dot_repeats_change_word() {
    let e = run("one two three", "cwONE<Esc>w.w.");
    assert_eq!(lines(&e), vec!["ONE ONE ONE"]);
}

#[test]
fn counted_operator_with_motion() {
    let e = run("a b c d e", "2d2w");
    assert_eq!(lines(&e), vec!["e"]);
    let e = run("1\n2\n3\n4\n5", "d2j");
    assert_eq!(lines(&e), vec!["4", "5"]);
}

#[test]
fn text_objects_inside_brackets_and_quotes() {
    let e = run("call(\"a\", b)", "f\"di\"");
    assert_eq!(lines(&e), vec!["call(\"\", b)"]);
    let e = run("call(\"a\", b)", "fbci(x<Esc>");
    assert_eq!(lines(&e), vec!["call(x)"]);
    let e = run("f {\n  body\n}", "jdi{");
    assert_eq!(lines(&e), vec!["f {", "}"]);
}

#[test]
fn macro_records_and_replays_with_count() {
    let mut e = engine("1\n2\n3\n4");
    e.handle_keys("qaA.<Esc>jq");
    assert_eq!(e.registers().get('a').text, "A.<Esc>j");
    e.handle_keys("2@a");
    assert_eq!(lines(&e), vec!["1.", "2.", "3.", "4"]);
    e.handle_keys("@@");
    assert_eq!(lines(&e), vec!["1.", "2.", "3.", "4."]);
}

#[test]
fn macro_stops_at_failing_motion() {
    let mut e = engine("a\nb\nc");
    e.handle_keys("qqI-<Esc>jq");
    e.handle_keys("10@q");
    assert_eq!(lines(&e), vec!["-a", "-b", "-c"]);
    assert_eq!(e.current_mode(), Mode::Normal);
}

#[test]
fn visual_block_insert_on_each_line() {
    let e = run("abc\ndef\nghi", "<C-v>jjI# <Esc>");
    assert_eq!(lines(&e), vec!["# abc", "# def", "# ghi"]);
}

#[test]
fn visual_line_yank_and_put() {
    let mut e = engine("a\nb\nc");
    e.handle_keys("Vjy");
    assert_eq!(e.current_mode(), Mode::Normal);
    assert_eq!(e.cursor(), Position::new(0, 0));
    e.handle_keys("Gp");
    assert_eq!(lines(&e), vec!["a", "b", "c", "a", "b"]);
}

#[test]
fn numbered_registers_shift_on_delete() {
    let mut e = engine("one\ntwo\nthree");
    e.handle_keys("dddd");
    assert_eq!(e.registers().get('1').text, "two\n");
    assert_eq!(e.registers().get('2').text, "one\n");
    e.handle_keys("\"2p");
    assert_eq!(lines(&e), vec!["three", "one"]);
}

#[test]
fn small_delete_register() {
    let e = run("hello world", "dw");
    assert_eq!(e.registers().get('-').text, "hello ");
    assert_eq!(e.registers().get('"').text, "hello ");
}

#[test]
fn black_hole_keeps_unnamed() {
    let e = run("keep\ndrop", "yyj\"_ddp");
    assert_eq!(lines(&e), vec!["keep", "keep"]);
}

#[test]
fn escape_cancels_pending_operator() {
    let mut e = engine("abc");
    e.handle_keys("d<Esc>x");
    assert_eq!(lines(&e), vec!["bc"]);
    assert!(!is_error(&e));
}

#[test]
fn insert_mode_mapping_with_timeout() {
    let mut e = engine("");
    e.execute_ex("inoremap jk <Esc>").unwrap();
    e.handle_keys("ihijk");
    assert_eq!(e.current_mode(), Mode::Normal);
    assert_eq!(lines(&e), vec!["hi"]);

    e.handle_keys("Aj");
    assert_eq!(e.current_mode(), Mode::Insert);
    e.timeout();
    assert_eq!(lines(&e), vec!["hij"]);
}

#[test]
fn marks_jump_and_survive_edits() {
    let mut e = engine("a\nb\nc\nd");
    e.handle_keys("jjmxggdd");
    e.handle_keys("'x");
    assert_eq!(e.cursor().line, 1);
    assert_eq!(lines(&e)[1], "c");
    e.handle_keys("'z");
    assert_eq!(status(&e), "Mark not set");
}

#[test]
fn star_searches_whole_word() {
    let mut e = engine("foo foobar\nfoo");
    e.handle_keys("*");
    assert_eq!(e.cursor(), Position::new(1, 0));
    e.handle_keys("#");
    assert_eq!(e.cursor(), Position::new(0, 0));
}

#[test]
fn replace_mode_backspace_restores() {
    let e = run("abcd", "Rxy<BS><BS>z<Esc>");
    assert_eq!(lines(&e), vec!["zbcd"]);
}
