//! End-to-end highlighting scenarios through the public API

use std::fs;
use std::sync::Arc;
use std::thread;

use ctxlight::syntax::{
    ContextDef, DefaultStyle, Grammar, GrammarDef, HighlightedLine, Highlighter, LineData,
    LineState, ObservableState, RuleDef, Span, SyntaxManager, PERSISTENT_START,
};
use ctxlight::{Config, HighlightError};

fn grammar() -> Arc<Grammar> {
    let def = GrammarDef::new("Scenario")
        .item("Text", DefaultStyle::Normal)
        .item("Number", DefaultStyle::DecVal)
        .keywords("types", &["int", "long"])
        .context(
            ContextDef::new("Normal", "Text")
                .rule(RuleDef::keyword("types").style("Keyword"))
                .rule(RuleDef::new("int").style("Number"))
                .rule(RuleDef::detect_2chars("/", "/").style("Comment").context("SimpleComment"))
                .rule(RuleDef::detect_char("#").style("Comment").context("Multi"))
                .rule(RuleDef::reg_expr("---(abc|xyz)(def)").style("Others").context("Dyn"))
                .rule(RuleDef::new("line_continue").style("Others"))
                .rule(RuleDef::detect_char("{").begin_region("Brace"))
                .rule(RuleDef::detect_char("}").end_region("Brace")),
        )
        .context(ContextDef::new("SimpleComment", "Comment").line_end("#pop"))
        .context(
            ContextDef::new("Multi", "Comment")
                .line_end("#stay")
                .rule(RuleDef::detect_char("#").style("Comment").context("#pop")),
        )
        .context(
            ContextDef::new("Dyn", "Text")
                .line_end("#pop")
                .rule(RuleDef::detect_char("%1").style("Alert")),
        );
    Arc::new(Grammar::from_def(&def).unwrap())
}

fn spans(line: &HighlightedLine) -> Vec<(usize, usize, &str)> {
    line.spans
        .iter()
        .map(|s| (s.start, s.end, s.style.as_ref()))
        .collect()
}

fn assert_partition(text: &str, spans: &[Span]) {
    let mut at = 0;
    for span in spans {
        assert_eq!(span.start, at, "gap or overlap at {} in {:?}", at, text);
        assert!(span.end > span.start);
        at = span.end;
    }
    assert_eq!(at, text.len());
}

#[test]
fn test_keyword_and_number_spans() {
    let mut hl = Highlighter::new(grammar());
    let line = hl.highlight_line("int i = 0", None).unwrap();
    assert_eq!(
        spans(&line),
        vec![(0, 3, "Keyword"), (3, 8, "Text"), (8, 9, "Number")]
    );
    assert_eq!(line.data.observable(), ObservableState::Default);
}

#[test]
fn test_single_line_comment_does_not_leak() {
    let mut hl = Highlighter::new(grammar());
    let first = hl.highlight_line("int i = 0//int i;", None).unwrap();
    assert_eq!(first.spans.last().unwrap(), &Span::new(9, 17, "Comment".into()));
    assert_eq!(first.data.observable(), ObservableState::Default);

    let second = hl.highlight_line("long j", Some(&first.data)).unwrap();
    assert_eq!(spans(&second)[0], (0, 4, "Keyword"));
}

#[test]
fn test_stay_context_reuses_persistent_id() {
    let mut hl = Highlighter::new(grammar());
    let first = hl.highlight_line("int # open", None).unwrap();
    let ObservableState::Persistent(k) = first.data.observable() else {
        panic!("expected a persistent state, got {:?}", first.data.observable());
    };
    assert!(k >= PERSISTENT_START);

    let second = hl.highlight_line("long # x # again # still open", None).unwrap();
    assert_eq!(second.data.observable(), ObservableState::Persistent(k));

    let third = hl.highlight_line("nothing closes here", Some(&second.data)).unwrap();
    assert_eq!(third.data.observable(), ObservableState::Persistent(k));
    assert_eq!(hl.persistent_states().len(), 1);
}

#[test]
fn test_continuation_restores_original_stack() {
    let mut hl = Highlighter::new(grammar());
    let open = hl.highlight_line("# comment", None).unwrap();
    let original = open.data.observable();
    assert!(matches!(original, ObservableState::Persistent(_)));

    let continues = hl.highlight_line("# int \\", Some(&open.data)).unwrap();
    assert_eq!(continues.data.observable(), ObservableState::WillContinue);

    let still = hl.highlight_line("int \\", Some(&continues.data)).unwrap();
    assert_eq!(still.data.observable(), ObservableState::WillContinue);

    let continued = hl.highlight_line("int x", Some(&still.data)).unwrap();
    assert_eq!(continued.data.observable(), ObservableState::Continued);
    assert_eq!(spans(&continued)[0], (0, 3, "Keyword"));

    // Back to the stack the run started from: inside the comment
    let after = hl.highlight_line("int", Some(&continued.data)).unwrap();
    assert_eq!(spans(&after), vec![(0, 3, "Comment")]);
    assert_eq!(after.data.observable(), original);
}

#[test]
fn test_continuation_from_default_returns_to_default() {
    let mut hl = Highlighter::new(grammar());
    let first = hl.highlight_line("int \\", None).unwrap();
    let second = hl.highlight_line("long", Some(&first.data)).unwrap();
    let third = hl.highlight_line("x", Some(&second.data)).unwrap();
    assert_eq!(second.data.observable(), ObservableState::Continued);
    assert_eq!(third.data.observable(), ObservableState::Default);
}

#[test]
fn test_dynamic_context_uses_captures() {
    let mut hl = Highlighter::new(grammar());
    let line = hl.highlight_line("---abcdefab", None).unwrap();
    assert_eq!(
        spans(&line),
        vec![(0, 9, "Others"), (9, 10, "Alert"), (10, 11, "Text")]
    );

    let other = hl.highlight_line("---xyzdefab", None).unwrap();
    assert_eq!(spans(&other), vec![(0, 9, "Others"), (9, 11, "Text")]);
}

#[test]
fn test_spans_partition_every_line() {
    let mut hl = Highlighter::new(grammar());
    let lines = [
        "",
        "int i = 0//int i;",
        "# open é",
        "ünïcödé # int 12",
        "---abcdefabc",
        "{ long \\",
        "}",
        "   ",
    ];
    let mut previous: Option<LineData> = None;
    for text in lines {
        let line = hl.highlight_line(text, previous.as_ref()).unwrap();
        assert_partition(text, &line.spans);
        previous = Some(line.data);
    }
}

#[test]
fn test_highlighting_is_idempotent() {
    let mut hl = Highlighter::new(grammar());
    let seed = hl.highlight_line("# open", None).unwrap();
    let once = hl.highlight_line("text # int 7 ---abcdef", Some(&seed.data)).unwrap();
    let twice = hl.highlight_line("text # int 7 ---abcdef", Some(&seed.data)).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_fold_depth_tracks_regions() {
    let mut hl = Highlighter::new(grammar());
    let open = hl.highlight_line("{", None).unwrap();
    assert_eq!(open.data.fold_depth(), 1);
    assert!(open.fold.start_included());

    let nested = hl.highlight_line("int { {", Some(&open.data)).unwrap();
    assert_eq!(nested.data.fold_depth(), 3);

    let close = hl.highlight_line("} } }", Some(&nested.data)).unwrap();
    assert_eq!(close.data.fold_depth(), 0);
    assert!(close.data.fold_regions.is_empty());
    assert_eq!(close.fold.indent_delta, -2);
}

#[test]
fn test_unmatched_region_end_is_ignored() {
    let mut hl = Highlighter::new(grammar());
    let line = hl.highlight_line("} int", None).unwrap();
    assert_eq!(line.data.fold_depth(), 0);
}

#[test]
fn test_state_bits_round_trip_through_host_storage() {
    let mut hl = Highlighter::new(grammar());
    let line = hl.highlight_line("{ # open", None).unwrap();
    let bits = line.data.state.to_bits();
    let restored = LineState::from_bits(bits);
    assert_eq!(restored, line.data.state);
    assert_eq!(restored.fold_depth, 1);
}

#[test]
fn test_grammar_is_shared_across_threads() {
    let grammar = grammar();
    let workers: Vec<_> = (0..4)
        .map(|n| {
            let grammar = Arc::clone(&grammar);
            thread::spawn(move || {
                let mut hl = Highlighter::new(grammar);
                let text = format!("int x = {}", n);
                let line = hl.highlight_line(&text, None).unwrap();
                line.spans.len()
            })
        })
        .collect();
    for worker in workers {
        assert_eq!(worker.join().unwrap(), 3);
    }
}

#[test]
fn test_broken_engine_degrades_to_plain_text() {
    // Twenty rules to try before the last one matches: more work per char than allowed
    let context = ('a'..='t').fold(ContextDef::new("Normal", "Normal"), |context, c| {
        context.rule(RuleDef::detect_char(&c.to_string()))
    });
    let def = GrammarDef::new("Busy").context(context);
    let config = Config::parse("[engine]\nstep_budget_per_char = 16\n").unwrap();
    let mut hl = Highlighter::with_config(Arc::new(def.resolve().unwrap()), config.engine);

    let long = "t".repeat(64);
    let err = hl.highlight_line(&long, None).unwrap_err();
    assert!(matches!(err, HighlightError::MatchEngineBroken(_)));
    assert!(hl.is_broken());

    for text in ["abc", "", "ccc"] {
        let line = hl.highlight_line(text, None).unwrap();
        assert_partition(text, &line.spans);
        assert!(line.spans.iter().all(|s| s.style.as_ref() == "Normal"));
    }
}

#[test]
fn test_malformed_references_fail_at_build_time() {
    let dangling = GrammarDef::new("Bad")
        .context(ContextDef::new("Normal", "Normal").rule(RuleDef::detect_char("x").context("Nowhere")));
    assert!(matches!(
        Grammar::from_def(&dangling),
        Err(HighlightError::UnknownContext(_))
    ));

    let no_list = GrammarDef::new("Bad")
        .context(ContextDef::new("Normal", "Normal").rule(RuleDef::keyword("missing")));
    assert!(matches!(
        Grammar::from_def(&no_list),
        Err(HighlightError::UnknownKeywordList(_))
    ));
}

#[test]
fn test_grammar_dir_and_config_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("mini.toml"),
        r##"
name = "Mini"
extensions = ["mini"]

[[contexts]]
name = "Normal"
style = "Normal"
rules = [
  { kind = "detect_2chars", char = "-", char1 = "-", style = "Comment", context = "Comment" },
]

[[contexts]]
name = "Comment"
style = "Comment"
line_end = "#pop"
"##,
    )
    .unwrap();
    fs::write(dir.path().join("broken.toml"), "name = ").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let config = Config::parse(&format!(
        "grammar_dirs = [{:?}]\n",
        dir.path().display().to_string()
    ))
    .unwrap();
    let manager = SyntaxManager::from_config(&config);
    assert_eq!(
        manager.detect_grammar(std::path::Path::new("a.mini")),
        Some("Mini")
    );

    let mut doc = manager.document("Mini").unwrap();
    doc.highlight_all(&["x -- y", "z"]);
    assert_eq!(doc.spans(0).unwrap()[1], Span::new(2, 6, "Comment".into()));
    assert_eq!(doc.line_data(1).unwrap().observable(), ObservableState::Default);
}
