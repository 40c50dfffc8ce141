//! ctxlight - highlight a file on the terminal
//!
//! Runs the engine line by line over a file, the way an editor would,
//! and prints the result with terminal colors.

mod terminal;

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

use log::info;

use ctxlight::syntax::{Diagnostics, GrammarDef, LineData};
use ctxlight::{Config, HighlightError, Result, SyntaxManager};

use terminal::Terminal;

/// Command line options
#[derive(Debug, Default)]
struct Options {
    /// Extra grammar definition to load
    grammar: Option<PathBuf>,
    /// Grammar name, overriding extension detection
    language: Option<String>,
    /// Prefix each line with its end state
    states: bool,
    /// Never emit colors
    plain: bool,
    list: bool,
    file: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(options) = parse_args(&args)? else {
        return Ok(());
    };

    let config = Config::load();
    let mut manager = SyntaxManager::from_config(&config);
    let mut language = options.language.clone();
    if let Some(path) = &options.grammar {
        let def = GrammarDef::load(path)?;
        manager.add_definition(&def)?;
        info!("loaded {} from {}", def.name, path.display());
        language.get_or_insert_with(|| def.name.clone());
    }

    if options.list {
        for name in manager.list_grammars() {
            println!("{}", name);
        }
        return Ok(());
    }

    highlight_file(&manager, &options, language)
}

fn highlight_file(manager: &SyntaxManager, options: &Options, language: Option<String>) -> Result<()> {
    let Some(path) = &options.file else {
        return Err(HighlightError::Message("no input file (see --help)".to_string()));
    };
    let text = fs::read_to_string(path)?;

    let name = match language {
        Some(name) => name,
        None => manager
            .detect_grammar(path)
            .map(str::to_string)
            .ok_or_else(|| {
                HighlightError::Message(format!("no grammar for {} (use -l)", path.display()))
            })?,
    };
    let grammar = manager
        .get_grammar(&name)
        .ok_or_else(|| HighlightError::Message(format!("unknown grammar: {}", name)))?;

    let mut term = Terminal::stdout();
    if options.plain || !manager.enabled {
        term.set_color(false);
    }

    let Some(mut document) = manager.document(&name) else {
        // Highlighting disabled: pass the text through
        for line in text.lines() {
            term.write_line(line, &[], &grammar)?;
        }
        return term.flush();
    };

    let lines: Vec<&str> = text.lines().collect();
    document.highlight_all(&lines);
    for (index, line) in lines.iter().enumerate() {
        if options.states {
            term.write_str(&state_column(document.line_data(index)))?;
        }
        term.write_line(line, document.spans(index).unwrap_or_default(), &grammar)?;
    }
    term.flush()?;

    let diagnostics = document.diagnostics();
    if diagnostics != Diagnostics::default() {
        info!("{:?}", diagnostics);
    }
    if document.is_broken() {
        eprintln!("warning: highlighting stopped early; the rest is plain text");
    }
    Ok(())
}

fn state_column(data: Option<&LineData>) -> String {
    match data {
        Some(data) => format!(
            "{:>4} {:>2} | ",
            data.observable().to_raw(),
            data.fold_depth()
        ),
        None => "   ?  ? | ".to_string(),
    }
}

/// Parse arguments; `None` means the request was already served
fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut options = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            "--version" | "-V" => {
                print_version();
                return Ok(None);
            }
            "--grammar" | "-g" => {
                let value = iter.next().ok_or_else(|| missing_value(arg))?;
                options.grammar = Some(PathBuf::from(value));
            }
            "--language" | "-l" => {
                let value = iter.next().ok_or_else(|| missing_value(arg))?;
                options.language = Some(value.clone());
            }
            "--states" | "-s" => options.states = true,
            "--plain" | "-p" => options.plain = true,
            "--list" => options.list = true,
            other if other.starts_with('-') => {
                return Err(HighlightError::Message(format!("unknown option: {}", other)));
            }
            file => options.file = Some(PathBuf::from(file)),
        }
    }
    Ok(Some(options))
}

fn missing_value(option: &str) -> HighlightError {
    HighlightError::Message(format!("{} needs a value", option))
}

fn print_usage() {
    println!("ctxlight {} - context-stack syntax highlighter", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: ctxlight [OPTIONS] FILE");
    println!();
    println!("Options:");
    println!("  -g, --grammar FILE   Load a grammar definition (TOML)");
    println!("  -l, --language NAME  Use the named grammar instead of detecting one");
    println!("  -s, --states         Show each line's end state and fold depth");
    println!("  -p, --plain          Never emit colors");
    println!("      --list           List available grammars");
    println!("  -h, --help           Show this help message");
    println!("  -V, --version        Show version information");
    println!();
    println!("Settings are read from ~/.ctxlight.toml; set RUST_LOG=debug for engine logs.");
}

fn print_version() {
    println!("ctxlight {}", env!("CARGO_PKG_VERSION"));
}
