//! C/C++ grammar

use crate::syntax::default_style::DefaultStyle;
use crate::syntax::definition::{ContextDef, GrammarDef, RuleDef};

const KEYWORDS: &[&str] = &[
    "break", "case", "continue", "default", "do", "else", "enum", "extern", "for", "goto", "if",
    "inline", "return", "sizeof", "static", "struct", "switch", "typedef", "union", "volatile",
    "while", "class", "namespace", "template", "typename", "using", "virtual", "public",
    "private", "protected", "new", "delete", "this", "throw", "try", "catch", "nullptr", "true",
    "false",
];

const TYPES: &[&str] = &[
    "auto", "bool", "char", "const", "double", "float", "int", "long", "register", "restrict",
    "short", "signed", "unsigned", "void", "size_t", "ptrdiff_t", "int8_t", "int16_t", "int32_t",
    "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t", "FILE",
];

const ALERTS: &[&str] = &["TODO", "FIXME", "XXX", "HACK", "NOTE"];

/// Integer suffixes, tried right after a number rule matches
fn with_int_suffix(rule: RuleDef) -> RuleDef {
    rule.child(RuleDef::string_detect("ULL").insensitive())
        .child(RuleDef::string_detect("LUL").insensitive())
        .child(RuleDef::string_detect("LLU").insensitive())
        .child(RuleDef::string_detect("UL").insensitive())
        .child(RuleDef::string_detect("LU").insensitive())
        .child(RuleDef::string_detect("LL").insensitive())
        .child(RuleDef::string_detect("U").insensitive())
        .child(RuleDef::string_detect("L").insensitive())
}

/// Create the C grammar (also covers common C++)
pub fn c_definition() -> GrammarDef {
    GrammarDef::new("C")
        .extension("c")
        .extension("h")
        .extension("cpp")
        .extension("hpp")
        .extension("cc")
        .extension("cxx")
        .item("Preprocessor", DefaultStyle::Others)
        .item("Prep. Lib", DefaultStyle::String)
        .item("Symbol", DefaultStyle::Normal)
        .item("Region Marker", DefaultStyle::RegionMarker)
        .keywords("keywords", KEYWORDS)
        .keywords("types", TYPES)
        .keywords("alerts", ALERTS)
        .context(
            ContextDef::new("Normal", "Normal")
                .rule(RuleDef::new("detect_spaces"))
                .rule(
                    RuleDef::string_detect("//BEGIN")
                        .style("Region Marker")
                        .begin_region("Region1")
                        .context("Region Marker"),
                )
                .rule(
                    RuleDef::string_detect("//END")
                        .style("Region Marker")
                        .end_region("Region1")
                        .context("Region Marker"),
                )
                .rule(RuleDef::keyword("keywords").style("Keyword"))
                .rule(RuleDef::keyword("types").style("DataType"))
                .rule(RuleDef::detect_char("{").style("Symbol").begin_region("Brace1"))
                .rule(RuleDef::detect_char("}").style("Symbol").end_region("Brace1"))
                .rule(RuleDef::new("float").style("Float"))
                .rule(with_int_suffix(RuleDef::new("hlc_oct").style("BaseN")))
                .rule(with_int_suffix(RuleDef::new("hlc_hex").style("BaseN")))
                .rule(with_int_suffix(RuleDef::new("int").style("DecVal")))
                .rule(RuleDef::new("hlc_char").style("Char"))
                .rule(RuleDef::detect_char("\"").style("String").context("String"))
                .rule(RuleDef::detect_2chars("/", "/").style("Comment").context("Commentar 1"))
                .rule(
                    RuleDef::detect_2chars("/", "*")
                        .style("Comment")
                        .begin_region("Comment")
                        .context("Commentar 2"),
                )
                .rule(
                    RuleDef::detect_char("#")
                        .style("Preprocessor")
                        .first_non_space()
                        .context("Preprocessor"),
                )
                .rule(RuleDef::new("detect_identifier"))
                .rule(RuleDef::any_char(":!%&()+,-/.*<=>?[]|~^;").style("Symbol")),
        )
        .context(
            ContextDef::new("String", "String")
                .line_end("#pop")
                .rule(RuleDef::new("line_continue").style("String"))
                .rule(RuleDef::new("hlc_string_char").style("Char"))
                .rule(RuleDef::detect_char("\"").style("String").context("#pop")),
        )
        .context(
            ContextDef::new("Region Marker", "Region Marker").line_end("#pop"),
        )
        .context(
            ContextDef::new("Commentar 1", "Comment")
                .line_end("#pop")
                .rule(RuleDef::new("line_continue").style("Comment"))
                .rule(RuleDef::keyword("alerts").style("Alert")),
        )
        .context(
            ContextDef::new("Commentar 2", "Comment")
                .rule(
                    RuleDef::detect_2chars("*", "/")
                        .style("Comment")
                        .end_region("Comment")
                        .context("#pop"),
                )
                .rule(RuleDef::keyword("alerts").style("Alert")),
        )
        .context(
            ContextDef::new("Preprocessor", "Preprocessor")
                .line_end("#pop")
                .rule(RuleDef::new("line_continue").style("Preprocessor"))
                .rule(RuleDef::range_detect("\"", "\"").style("Prep. Lib"))
                .rule(RuleDef::range_detect("<", ">").style("Prep. Lib"))
                .rule(RuleDef::detect_2chars("/", "/").style("Comment").context("Commentar 1"))
                .rule(
                    RuleDef::detect_2chars("/", "*")
                        .style("Comment")
                        .context("Commentar/Preprocessor"),
                ),
        )
        .context(
            ContextDef::new("Commentar/Preprocessor", "Comment")
                .rule(RuleDef::detect_2chars("*", "/").style("Comment").context("#pop")),
        )
}
