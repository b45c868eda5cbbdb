use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::lang::interp::Interp;

lazy_static! {
    static ref PRINT: Regex = Regex::new("^(.*)を表示する$").unwrap();
    static ref ASSIGN: Regex = Regex::new("^(.*)←(.*)$").unwrap();
    static ref INCREMENT: Regex = Regex::new("^(.*)を(.*)増やす$").unwrap();
    static ref DECREMENT: Regex = Regex::new("^(.*)を(.*)減らす$").unwrap();
}

pub struct Runtime<'a> {
    interp: Interp<'a>,
}

impl<'a> Runtime<'a> {
    /// Create a new `Runtime` instance
    ///
    /// `sink` is where output should be written. eg. result of 表示する
    /// statements and the input prompt
    ///
    /// `source` is where 【外部からの入力】 reads lines from (stdin in the
    /// CLI, a buffer in tests)
    pub fn new(sink: &'a mut dyn Write, source: &'a mut dyn BufRead) -> Self {
        Self {
            interp: Interp::new(sink, source),
        }
    }

    /// Execute a single statement
    ///
    /// Blank lines and lines matching no statement pattern are ignored
    pub fn run_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim_end();
        if line.is_empty() {
            return Ok(());
        }

        let res = if let Some(caps) = PRINT.captures(line) {
            self.interp.print(&caps[1])
        } else if let Some(caps) = ASSIGN.captures(line) {
            self.interp.assign(&caps[1], &caps[2])
        } else if let Some(caps) = INCREMENT.captures(line) {
            self.interp.increment(&caps[1], &caps[2])
        } else if let Some(caps) = DECREMENT.captures(line) {
            self.interp.decrement(&caps[1], &caps[2])
        } else {
            warn!("Ignoring unrecognized statement: {}", line);
            return Ok(());
        };

        res.with_context(|| format!("Failed to run: {}", line))
    }

    /// Execute a whole script, stopping at the first failing statement
    pub fn run_script(&mut self, script: &str) -> Result<()> {
        for line in script.lines() {
            self.run_line(line)?;
        }
        Ok(())
    }

    /// Write every variable as a `name = value` line, name-sorted
    pub fn dump_store(&mut self) -> Result<()> {
        self.interp.dump_store().context("Failed to dump variables")
    }
}

#[test]
fn test_run_line_dispatch() {
    use std::io;

    let mut output = Vec::new();
    let mut input = io::empty();
    {
        let mut runtime = Runtime::new(&mut output, &mut input);
        runtime.run_line("x←2＋3").expect("assign");
        runtime.run_line("xを表示する").expect("print");
        runtime.run_line("xを4増やす").expect("increment");
        runtime.run_line("xを表示する").expect("print");
        runtime.run_line("xを1減らす").expect("decrement");
        runtime.run_line("xを表示する").expect("print");
        runtime.run_line("").expect("blank");
        runtime.run_line("これは文ではない").expect("ignored");
    }
    assert_eq!(String::from_utf8(output).expect("utf-8"), "5\n9\n8\n");
}

#[test]
fn test_run_script() {
    use std::io;

    let mut output = Vec::new();
    let mut input = io::empty();
    {
        let mut runtime = Runtime::new(&mut output, &mut input);
        let script = "合計←0\n合計を10増やす\n価格←200\n合計と価格を表示する\n";
        runtime.run_script(script).expect("script");
        runtime.dump_store().expect("dump");
    }
    assert_eq!(
        String::from_utf8(output).expect("utf-8"),
        "210\n価格 = 200\n合計 = 10\n"
    );
}

#[test]
fn test_run_script_with_input() {
    use std::io;

    let mut output = Vec::new();
    let mut input = io::Cursor::new("世界\n");
    {
        let mut runtime = Runtime::new(&mut output, &mut input);
        runtime
            .run_script("名前←【外部からの入力】\n「こんにちは」と名前を表示する\n")
            .expect("script");
    }
    assert_eq!(
        String::from_utf8(output).expect("utf-8"),
        "入力してください: こんにちは世界\n"
    );
}

#[test]
fn test_pattern_precedence() {
    use std::io;

    let mut output = Vec::new();
    let mut input = io::empty();
    {
        let mut runtime = Runtime::new(&mut output, &mut input);
        // the quoted suffix keeps this from matching the print pattern
        runtime.run_line("x←「aを表示する」").expect("assign");
        runtime.run_line("xを表示する").expect("print");
    }
    assert_eq!(String::from_utf8(output).expect("utf-8"), "aを表示する\n");
}

#[test]
fn test_run_line_error() {
    use std::io;

    let mut output = Vec::new();
    let mut input = io::empty();
    {
        let mut runtime = Runtime::new(&mut output, &mut input);

        let err = runtime.run_line("x←nope").expect_err("undefined variable");
        assert!(err.to_string().contains("Failed to run: x←nope"));

        let err = runtime
            .run_script("y←1\nz←ほげ\ny←2")
            .expect_err("script aborts");
        assert!(err.to_string().contains("Failed to run: z←ほげ"));

        // the failing line stopped the script before the second assignment
        runtime.run_line("yを表示する").expect("print");
    }
    assert_eq!(String::from_utf8(output).expect("utf-8"), "1\n");
}
