//! Bash grammar

use crate::syntax::default_style::DefaultStyle;
use crate::syntax::definition::{ContextDef, GrammarDef, RuleDef};

const KEYWORDS: &[&str] = &[
    "then", "else", "elif", "for", "while", "until", "case", "esac", "in", "select", "function",
    "return", "break", "continue", "time",
];

const BUILTINS: &[&str] = &[
    "alias", "cd", "declare", "echo", "eval", "exec", "exit", "export", "local", "printf", "read",
    "readonly", "set", "shift", "source", "test", "trap", "unset",
];

const VARIABLE: &str = r"\$(\{[^}]*\}|[A-Za-z_][A-Za-z0-9_]*|[0-9#?$!@*-])";

/// Create the Bash grammar
pub fn shell_definition() -> GrammarDef {
    GrammarDef::new("Bash")
        .extension("sh")
        .extension("bash")
        .weak_delimiters("-")
        .item("Builtin", DefaultStyle::Function)
        .item("Variable", DefaultStyle::Others)
        .item("Redirection", DefaultStyle::Keyword)
        .item("HereDoc", DefaultStyle::String)
        .item("Escape", DefaultStyle::Char)
        .keywords("keywords", KEYWORDS)
        .keywords("builtins", BUILTINS)
        .context(
            ContextDef::new("Normal", "Normal")
                .rule(RuleDef::new("line_continue").style("Escape"))
                .rule(RuleDef::new("detect_spaces"))
                .rule(RuleDef::word_detect("if").style("Keyword").begin_region("if"))
                .rule(RuleDef::word_detect("fi").style("Keyword").end_region("if"))
                .rule(RuleDef::word_detect("do").style("Keyword").begin_region("do"))
                .rule(RuleDef::word_detect("done").style("Keyword").end_region("do"))
                .rule(RuleDef::keyword("keywords").style("Keyword"))
                .rule(RuleDef::keyword("builtins").style("Builtin"))
                .rule(RuleDef::reg_expr(VARIABLE).style("Variable"))
                .rule(
                    RuleDef::reg_expr(r#"<<-\s*["']?([A-Za-z_][A-Za-z0-9_]*)["']?"#)
                        .style("Redirection")
                        .context("HereDocIndented"),
                )
                .rule(
                    RuleDef::reg_expr(r#"<<\s*["']?([A-Za-z_][A-Za-z0-9_]*)["']?"#)
                        .style("Redirection")
                        .context("HereDoc"),
                )
                .rule(RuleDef::new("int").style("DecVal"))
                .rule(RuleDef::detect_char("\"").style("String").context("DoubleQuoted"))
                .rule(RuleDef::detect_char("'").style("String").context("SingleQuoted"))
                .rule(RuleDef::detect_char("#").style("Comment").context("Comment"))
                .rule(RuleDef::new("detect_identifier"))
                .rule(RuleDef::any_char("<>|&;").style("Redirection")),
        )
        .context(
            ContextDef::new("Comment", "Comment")
                .line_end("#pop")
                .rule(RuleDef::new("detect_spaces"))
                .rule(RuleDef::reg_expr(r"(TODO|FIXME|XXX)\b").style("Alert")),
        )
        .context(
            ContextDef::new("DoubleQuoted", "String")
                .rule(RuleDef::reg_expr(r#"\\[\\"$`]"#).style("Escape"))
                .rule(RuleDef::reg_expr(VARIABLE).style("Variable"))
                .rule(RuleDef::detect_char("\"").style("String").context("#pop")),
        )
        .context(
            ContextDef::new("SingleQuoted", "String")
                .rule(RuleDef::detect_char("'").style("String").context("#pop")),
        )
        .context(
            ContextDef::new("HereDoc", "HereDoc")
                .rule(
                    RuleDef::reg_expr("^%1$")
                        .column(0)
                        .style("Redirection")
                        .context("#pop"),
                )
                .rule(RuleDef::reg_expr(VARIABLE).style("Variable")),
        )
        .context(
            ContextDef::new("HereDocIndented", "HereDoc")
                .rule(
                    RuleDef::reg_expr("^\t*%1$")
                        .column(0)
                        .style("Redirection")
                        .context("#pop"),
                )
                .rule(RuleDef::reg_expr(VARIABLE).style("Variable")),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::highlighter::Highlighter;
    use crate::syntax::state::{LineData, ObservableState};
    use std::sync::Arc;

    fn highlighter() -> Highlighter {
        Highlighter::new(Arc::new(shell_definition().resolve().unwrap()))
    }

    fn run(hl: &mut Highlighter, lines: &[&str]) -> Vec<LineData> {
        let mut out: Vec<LineData> = Vec::new();
        for text in lines {
            let line = hl.highlight_line(text, out.last()).unwrap();
            out.push(line.data);
        }
        out
    }

    #[test]
    fn test_shell_grammar_is_dynamic() {
        let grammar = shell_definition().resolve().unwrap();
        assert!(grammar.context("HereDoc").unwrap().is_dynamic());
        assert!(!grammar.context("Normal").unwrap().is_dynamic());
    }

    #[test]
    fn test_heredoc_ends_on_its_own_word() {
        let mut hl = highlighter();
        let states = run(&mut hl, &["cat <<EOF", "x EOF", "EOF", "echo done"]);
        assert!(matches!(states[0].observable(), ObservableState::Persistent(_)));
        assert_eq!(states[1].observable(), states[0].observable());
        assert_eq!(states[2].observable(), ObservableState::Default);
        assert_eq!(states[3].observable(), ObservableState::Default);
    }

    #[test]
    fn test_heredoc_states_depend_on_the_word() {
        let mut hl = highlighter();
        let eof = run(&mut hl, &["cat <<EOF"]);
        let end = run(&mut hl, &["cat << 'END'"]);
        let eof_again = run(&mut hl, &["tee <<EOF"]);
        assert_ne!(eof[0].observable(), end[0].observable());
        assert_eq!(eof[0].observable(), eof_again[0].observable());
        assert_eq!(hl.persistent_states().len(), 2);
    }

    #[test]
    fn test_heredoc_needs_the_exact_word() {
        let mut hl = highlighter();
        let states = run(&mut hl, &["cat <<A_B", "AxB", "A_B"]);
        assert_ne!(states[1].observable(), ObservableState::Default);
        assert_eq!(states[2].observable(), ObservableState::Default);
        assert_eq!(hl.diagnostics().dynamic_regex_failures, 0);
    }

    #[test]
    fn test_line_continuation() {
        let mut hl = highlighter();
        let states = run(&mut hl, &["echo a \\", "b", "c"]);
        assert_eq!(states[0].observable(), ObservableState::WillContinue);
        assert_eq!(states[1].observable(), ObservableState::Continued);
        assert_eq!(states[2].observable(), ObservableState::Default);
    }

    #[test]
    fn test_if_block_folds() {
        let mut hl = highlighter();
        let states = run(&mut hl, &["if true; then", "  echo $HOME", "fi"]);
        assert_eq!(states[0].fold_depth(), 1);
        assert_eq!(states[1].fold_depth(), 1);
        assert_eq!(states[2].fold_depth(), 0);
    }

    #[test]
    fn test_variable_in_string() {
        let mut hl = highlighter();
        let text = r#"echo "hi ${name}""#;
        let line = hl.highlight_line(text, None).unwrap();
        let styled: Vec<_> = line
            .spans
            .iter()
            .map(|s| (&text[s.start..s.end], s.style.as_ref()))
            .collect();
        assert_eq!(
            styled,
            vec![
                ("echo", "Builtin"),
                (" ", "Normal"),
                ("\"hi ", "String"),
                ("${name}", "Variable"),
                ("\"", "String"),
            ]
        );
    }
}
