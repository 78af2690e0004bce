use crate::tools::WRITE_FILE_TOOL;
use crate::types::GenerationType;

const SINGLE_FILE_PROMPT: &str = "You are a front-end engineer. Build the requested web page as one \
self-contained HTML file with inline CSS and JavaScript. Reply with a single ```html fenced code block.";

const MULTI_FILE_PROMPT: &str = "You are a front-end engineer. Build the requested web page as three \
files. Reply with exactly one ```html block, one ```css block and one ```javascript block. \
The HTML must reference style.css and script.js.";

pub fn system_prompt(gen_type: GenerationType) -> String {
    match gen_type {
        GenerationType::SingleFile => SINGLE_FILE_PROMPT.to_string(),
        GenerationType::MultiFile => MULTI_FILE_PROMPT.to_string(),
        GenerationType::ToolDrivenProject => format!(
            "You are a front-end engineer. Build the requested application as a Vue 3 + Vite \
project. Create every project file by calling the `{}` tool with a path relative to the \
project root and the full file content. When all files are written, summarize what you built.",
            WRITE_FILE_TOOL
        ),
    }
}
