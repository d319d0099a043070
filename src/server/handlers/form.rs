use std::sync::Arc;

use axum::extract::{Form, State};
use axum::response::Html;
use serde::Deserialize;

use crate::server::page::{render_history, render_index, IndexView, Panel};
use crate::state::{AnswerMode, AppState};

const GENERIC_FAILURE: &str = "Error occurred during processing.";
const RATE_LIMIT_FAILURE: &str = "Error occurred during processing. Rate limit exceeded.";

/// Fields of the index form. The clicked submit button is the only one present.
#[derive(Debug, Default, Deserialize)]
pub struct IndexForm {
    pub gen_question: Option<String>,
    pub answer_question: Option<String>,
    pub text_input: Option<String>,
    pub options: Option<String>,
}

pub async fn index() -> Html<String> {
    Html(render_index(&IndexView::default()))
}

pub async fn submit(State(state): State<Arc<AppState>>, Form(form): Form<IndexForm>) -> Html<String> {
    let view = if form.gen_question.is_some() {
        generate_questions(&state).await
    } else if form.answer_question.is_some() {
        answer_question(&state, &form).await
    } else {
        IndexView::default()
    };
    Html(render_index(&view))
}

pub async fn history(State(state): State<Arc<AppState>>) -> Html<String> {
    let answers = state.history.answers().await.unwrap_or_else(|err| {
        tracing::error!("Failed to read answer history: {}", err);
        Vec::new()
    });
    let questions = state
        .history
        .generated_questions()
        .await
        .unwrap_or_else(|err| {
            tracing::error!("Failed to read question history: {}", err);
            Vec::new()
        });
    Html(render_history(&answers, &questions))
}

async fn generate_questions(state: &AppState) -> IndexView {
    tracing::info!("Generating practice questions");
    let examples = match state.generate_questions().await {
        Ok(html) => {
            if let Err(err) = state.history.record_questions(&html).await {
                tracing::warn!("Failed to save generated questions: {}", err);
            }
            Panel::Fragment(html)
        }
        Err(err) => {
            tracing::error!("Question generation failed: {}", err);
            Panel::Error(failure_message(err.is_rate_limited()))
        }
    };

    IndexView {
        examples: Some(examples),
        ..IndexView::default()
    }
}

async fn answer_question(state: &AppState, form: &IndexForm) -> IndexView {
    let question = form.text_input.as_deref().unwrap_or("").trim().to_string();
    let mode = form.options.as_deref().and_then(AnswerMode::parse);
    let mut view = IndexView {
        query: Some(question.clone()),
        mode,
        ..IndexView::default()
    };

    let Some(mode) = mode else {
        view.answer = Some(Panel::Error("Please choose an answering mode.".to_string()));
        return view;
    };
    if question.is_empty() {
        view.answer = Some(Panel::Error("Please enter a question.".to_string()));
        return view;
    }

    tracing::info!("Answering question in {} mode", mode);
    let answer = match state.answer(&question, mode).await {
        Ok(answer) => {
            if let Err(err) = state.history.record_answer(&question, mode, &answer).await {
                tracing::warn!("Failed to save answer history: {}", err);
            }
            match mode {
                AnswerMode::Crew => Panel::Fragment(answer),
                AnswerMode::Router => Panel::Text(answer),
            }
        }
        Err(err) => {
            tracing::error!("Answering failed ({} mode): {}", mode, err);
            Panel::Error(failure_message(err.is_rate_limited()))
        }
    };

    view.answer = Some(answer);
    view
}

fn failure_message(rate_limited: bool) -> String {
    if rate_limited {
        RATE_LIMIT_FAILURE.to_string()
    } else {
        GENERIC_FAILURE.to_string()
    }
}
