//! Server-rendered HTML pages.

use crate::history::{GeneratedQuestionsRecord, QaRecord};
use crate::state::AnswerMode;

/// Body of the answer or questions panel.
#[derive(Debug, Clone, PartialEq)]
pub enum Panel {
    /// HTML fragment produced by a crew's Web Designer.
    Fragment(String),
    /// Plain text, escaped on render.
    Text(String),
    /// Apologetic message shown in place of a result.
    Error(String),
}

#[derive(Debug, Clone, Default)]
pub struct IndexView {
    pub query: Option<String>,
    pub mode: Option<AnswerMode>,
    pub answer: Option<Panel>,
    pub examples: Option<Panel>,
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render_panel(panel: &Panel) -> String {
    match panel {
        Panel::Fragment(html) => html.clone(),
        Panel::Text(text) => format!(
            "<p>{}</p>",
            escape_html(text).replace('\n', "<br>\n")
        ),
        Panel::Error(message) => format!(
            "<p class=\"error\">{}<br>Please try again.</p>",
            escape_html(message)
        ),
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 60rem; margin: 2rem auto; padding: 0 1rem; }}
textarea {{ width: 100%; }}
section {{ border-top: 1px solid #ddd; margin-top: 1.5rem; padding-top: 1rem; }}
.error {{ color: #b00020; }}
</style>
</head>
<body>
<nav><a href="/">Study Assistant</a> | <a href="/history">History</a></nav>
{body}
</body>
</html>
"#,
        title = escape_html(title),
        body = body
    )
}

pub fn render_index(view: &IndexView) -> String {
    let query = view.query.as_deref().map(escape_html).unwrap_or_default();
    let mode = view.mode.unwrap_or(AnswerMode::Crew);
    let checked = |candidate: AnswerMode| if mode == candidate { " checked" } else { "" };

    let mut body = format!(
        r#"<h1>Study Assistant</h1>
<form method="post" action="/">
<section>
<h2>Practice questions</h2>
<button type="submit" name="gen_question" value="1">Generate questions</button>
</section>
<section>
<h2>Ask a question</h2>
<textarea name="text_input" rows="4">{query}</textarea>
<p>
<label><input type="radio" name="options" value="crewai"{crew_checked}> Agents</label>
<label><input type="radio" name="options" value="llama"{router_checked}> Index router</label>
</p>
<button type="submit" name="answer_question" value="1">Answer</button>
</section>
</form>
"#,
        query = query,
        crew_checked = checked(AnswerMode::Crew),
        router_checked = checked(AnswerMode::Router),
    );

    if let Some(examples) = &view.examples {
        body.push_str(&format!(
            "<section id=\"examples\">\n<h2>Generated questions</h2>\n{}\n</section>\n",
            render_panel(examples)
        ));
    }
    if let Some(answer) = &view.answer {
        body.push_str(&format!(
            "<section id=\"answer\">\n<h2>Answer</h2>\n<p><strong>Q:</strong> {}</p>\n{}\n</section>\n",
            query,
            render_panel(answer)
        ));
    }

    layout("Study Assistant", &body)
}

pub fn render_history(answers: &[QaRecord], questions: &[GeneratedQuestionsRecord]) -> String {
    let mut body = String::from("<h1>History</h1>\n<section>\n<h2>Answered questions</h2>\n");
    if answers.is_empty() {
        body.push_str("<p>No questions answered yet.</p>\n");
    }
    // Newest first.
    for record in answers.iter().rev() {
        let answer = match record.mode {
            AnswerMode::Crew => Panel::Fragment(record.answer.clone()),
            AnswerMode::Router => Panel::Text(record.answer.clone()),
        };
        body.push_str(&format!(
            "<article>\n<p><small>{} ({})</small></p>\n<p><strong>Q:</strong> {}</p>\n{}\n</article>\n",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.mode,
            escape_html(&record.question),
            render_panel(&answer)
        ));
    }

    body.push_str("</section>\n<section>\n<h2>Generated questions</h2>\n");
    if questions.is_empty() {
        body.push_str("<p>No questions generated yet.</p>\n");
    }
    for record in questions.iter().rev() {
        body.push_str(&format!(
            "<article>\n<p><small>{}</small></p>\n{}\n</article>\n",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.content
        ));
    }
    body.push_str("</section>\n");

    layout("Study Assistant: History", &body)
}
