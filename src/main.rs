use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info};
use rustyline::error::ReadlineError;
use rustyline::history::{FileHistory, History};
use rustyline::{config::Config as EditorConfig, Editor, Helper};
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};

mod lang;

use lang::runtime::Runtime;

const HISTORY_FILE: &str = ".dncl_history";
const PROMPT: &str = "(dncl) ";

/// An interpreter for the DNCL teaching language
#[derive(Parser)]
#[command(version)]
struct Opt {
    /// Show debug output
    #[arg(short, long)]
    debug: bool,

    /// Script to run; starts an interactive session when omitted
    script: Option<PathBuf>,
}

fn init_logging(debug: bool) -> Result<()> {
    let filter = if debug {
        LevelFilter::Info
    } else {
        LevelFilter::Error
    };

    match SimpleLogger::init(filter, LogConfig::default()) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to init logger: {}", e),
    }
}

fn init_editor() -> Result<Editor<(), FileHistory>> {
    let config = EditorConfig::builder().auto_add_history(true).build();
    match Editor::with_config(config) {
        Ok(editor) => Ok(editor),
        Err(e) => bail!("Failed to init line editor: {}", e),
    }
}

fn init_history<H: Helper, I: History>(editor: &mut Editor<H, I>) {
    let _ = editor.load_history(HISTORY_FILE);
}

fn save_history<H: Helper, I: History>(editor: &mut Editor<H, I>) -> Result<()> {
    match editor.save_history(HISTORY_FILE) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to save history: {}", e),
    }
}

fn welcome() {
    println!("== DNCL Compiler == v{}", env!("CARGO_PKG_VERSION"));
    println!("Press Ctrl-D to quit");
    println!();
}

fn run_script(path: &Path) -> Result<()> {
    let script = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let stdout = io::stdout();
    let stdin = io::stdin();
    let mut sink = stdout.lock();
    let mut source = stdin.lock();

    let mut runtime = Runtime::new(&mut sink, &mut source);
    runtime.run_script(&script)?;
    runtime.dump_store()
}

fn repl() -> Result<()> {
    let mut editor = init_editor()?;
    init_history(&mut editor);
    welcome();

    let stdout = io::stdout();
    let stdin = io::stdin();
    let mut sink = stdout.lock();
    let mut source = stdin.lock();
    let mut runtime = Runtime::new(&mut sink, &mut source);

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                info!("read: {}", &line);

                if let Err(e) = runtime.run_line(&line) {
                    eprintln!("{:#}", e);
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("Press Ctrl-D to quit");
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(e) => {
                error!("Unexpected error: {}", e);
                break;
            }
        }
    }

    save_history(&mut editor)
}

fn main() -> Result<()> {
    let opts = Opt::parse();
    init_logging(opts.debug)?;

    match &opts.script {
        Some(path) => run_script(path),
        None => repl(),
    }
}
