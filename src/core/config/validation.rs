use super::settings::Settings;
use crate::core::errors::ConfigError;

pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.llm.api_key.trim().is_empty() {
        return Err(invalid(
            "llm.api_key must be set (config, secrets.yaml or OPENAI_API_KEY)",
        ));
    }
    if settings.llm.model.trim().is_empty() {
        return Err(invalid("llm.model must not be empty"));
    }
    if !(0.0..=2.0).contains(&settings.llm.temperature) {
        return Err(invalid("llm.temperature must be between 0.0 and 2.0"));
    }
    if settings.llm.requests_per_minute == Some(0) {
        return Err(invalid("llm.requests_per_minute must be at least 1"));
    }

    let corpus = &settings.corpus;
    if corpus.chunk_size == 0 {
        return Err(invalid("corpus.chunk_size must be at least 1"));
    }
    if corpus.chunk_overlap >= corpus.chunk_size {
        return Err(invalid(
            "corpus.chunk_overlap must be smaller than corpus.chunk_size",
        ));
    }
    if corpus.extensions.iter().all(|ext| ext.trim().is_empty()) {
        return Err(invalid("corpus.extensions must list at least one extension"));
    }

    if settings.retrieval.similarity_top_k == 0 {
        return Err(invalid("retrieval.similarity_top_k must be at least 1"));
    }
    if settings.retrieval.summary_group_chars == 0 {
        return Err(invalid("retrieval.summary_group_chars must be at least 1"));
    }

    if settings.crew.past_question_file.is_none() {
        return Err(invalid(
            "crew.past_question_file must be set (config or PAST_QUESTION_FILE)",
        ));
    }
    if settings.crew.main_material_file.is_none() {
        return Err(invalid(
            "crew.main_material_file must be set (config or MAIN_MATERIAL_FILE)",
        ));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}
