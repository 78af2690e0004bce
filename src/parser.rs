//! Code Parsing Module
//!
//! Turns a complete model response into a structured artifact. Parsers only
//! segment text; they know nothing about files or model clients.

use crate::registry::GenerationRegistry;
use crate::types::*;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

// A block whose closing fence never arrived (reply cut off at the token
// limit) runs to the end of the text.
lazy_static! {
    static ref HTML_BLOCK: Regex = Regex::new(r"(?i)```html[ \t]*\r?\n([\s\S]*?)(?:```|\z)")
        .expect("valid html block regex");
    static ref CSS_BLOCK: Regex = Regex::new(r"(?i)```css[ \t]*\r?\n([\s\S]*?)(?:```|\z)")
        .expect("valid css block regex");
    static ref JS_BLOCK: Regex =
        Regex::new(r"(?i)```(?:js|javascript)[ \t]*\r?\n([\s\S]*?)(?:```|\z)")
            .expect("valid js block regex");
    static ref ANY_FENCE: Regex = Regex::new(r"```").expect("valid fence regex");
}

pub trait CodeParser: Send + Sync {
    fn parse(&self, raw: &str) -> GeneratedArtifact;
}

fn first_block(re: &Regex, raw: &str) -> Option<String> {
    re.captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Untagged responses are treated as bare markup.
fn markup_or_whole(raw: &str) -> String {
    match first_block(&HTML_BLOCK, raw) {
        Some(html) => html,
        None if !ANY_FENCE.is_match(raw) => raw.trim().to_string(),
        None => String::new(),
    }
}

#[derive(Debug, Default)]
pub struct HtmlCodeParser;

impl CodeParser for HtmlCodeParser {
    fn parse(&self, raw: &str) -> GeneratedArtifact {
        let html = match first_block(&HTML_BLOCK, raw) {
            Some(html) => html,
            None => raw.trim().to_string(),
        };
        GeneratedArtifact::SingleFile(HtmlArtifact { html })
    }
}

#[derive(Debug, Default)]
pub struct MultiFileCodeParser;

impl CodeParser for MultiFileCodeParser {
    fn parse(&self, raw: &str) -> GeneratedArtifact {
        GeneratedArtifact::MultiFile(MultiFileArtifact {
            html: markup_or_whole(raw),
            css: first_block(&CSS_BLOCK, raw).unwrap_or_default(),
            js: first_block(&JS_BLOCK, raw).unwrap_or_default(),
        })
    }
}

/// Routes a generation type to its parser and enforces artifact validity.
#[derive(Clone)]
pub struct ParserDispatch {
    registry: Arc<GenerationRegistry>,
}

impl ParserDispatch {
    pub fn new(registry: Arc<GenerationRegistry>) -> Self {
        Self { registry }
    }

    pub fn parse(&self, gen_type: GenerationType, raw: &str) -> Result<GeneratedArtifact> {
        let parser = self.registry.parser(gen_type)?;
        let artifact = parser.parse(raw);
        artifact.validate()?;
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_parser_extracts_fenced_block() {
        let raw = "Here is your page:\n```html\n<h1>Hi</h1>\n```\nEnjoy!";
        match HtmlCodeParser.parse(raw) {
            GeneratedArtifact::SingleFile(a) => assert_eq!(a.html, "<h1>Hi</h1>"),
            other => panic!("Expected SingleFile, got {:?}", other),
        }
    }

    #[test]
    fn test_html_parser_falls_back_to_whole_text() {
        match HtmlCodeParser.parse("  <p>plain</p>\n") {
            GeneratedArtifact::SingleFile(a) => assert_eq!(a.html, "<p>plain</p>"),
            other => panic!("Expected SingleFile, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_file_parser_all_sections() {
        let raw = "```html\n<div id=\"app\"></div>\n```\n```CSS\nbody { margin: 0; }\n```\n```javascript\nconsole.log(1);\n```";
        match MultiFileCodeParser.parse(raw) {
            GeneratedArtifact::MultiFile(a) => {
                assert_eq!(a.html, "<div id=\"app\"></div>");
                assert_eq!(a.css, "body { margin: 0; }");
                assert_eq!(a.js, "console.log(1);");
            }
            other => panic!("Expected MultiFile, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_file_parser_optional_sections_empty() {
        let raw = "```html\n<main></main>\n```";
        match MultiFileCodeParser.parse(raw) {
            GeneratedArtifact::MultiFile(a) => {
                assert_eq!(a.html, "<main></main>");
                assert!(a.css.is_empty());
                assert!(a.js.is_empty());
            }
            other => panic!("Expected MultiFile, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_file_parser_js_short_tag() {
        let raw = "```html\n<b></b>\n```\n```js\nlet x = 1;\n```";
        match MultiFileCodeParser.parse(raw) {
            GeneratedArtifact::MultiFile(a) => assert_eq!(a.js, "let x = 1;"),
            other => panic!("Expected MultiFile, got {:?}", other),
        }
    }

    #[test]
    fn test_html_parser_accepts_unclosed_fence() {
        match HtmlCodeParser.parse("```html\n<div>Hi</div>") {
            GeneratedArtifact::SingleFile(a) => assert_eq!(a.html, "<div>Hi</div>"),
            other => panic!("Expected SingleFile, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_file_parser_accepts_truncated_reply() {
        let raw = "```html\n<div>Hi</div>\n```\n```css\nh1 { color: red; }\n```\n```js\nconsole.log(";
        match MultiFileCodeParser.parse(raw) {
            GeneratedArtifact::MultiFile(a) => {
                assert_eq!(a.html, "<div>Hi</div>");
                assert_eq!(a.css, "h1 { color: red; }");
                assert_eq!(a.js, "console.log(");
            }
            other => panic!("Expected MultiFile, got {:?}", other),
        }

        match MultiFileCodeParser.parse("Sure:\n```html\n<main>cut off") {
            GeneratedArtifact::MultiFile(a) => assert_eq!(a.html, "<main>cut off"),
            other => panic!("Expected MultiFile, got {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_rejects_missing_markup() {
        let dispatch = ParserDispatch::new(Arc::new(GenerationRegistry::standard()));
        let raw = "```css\nbody {}\n```\n```js\nalert(1)\n```";
        let err = dispatch.parse(GenerationType::MultiFile, raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_dispatch_has_no_parser_for_tool_projects() {
        let dispatch = ParserDispatch::new(Arc::new(GenerationRegistry::standard()));
        let err = dispatch
            .parse(GenerationType::ToolDrivenProject, "anything")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
