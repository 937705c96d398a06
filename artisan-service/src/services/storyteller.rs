//! Artisan story generation on top of a [`TextProvider`].
//!
//! Every operation has a deterministic fallback so registration keeps working
//! without a GenAI key. In strict mode provider failures surface as 502.

use crate::models::StorySource;
use crate::services::providers::{GenerationParams, TextProvider};
use metrics::counter;
use serde_json::Value;
use service_core::error::AppError;
use std::sync::Arc;

/// Interview questions shown to artisans, in English.
pub const BASE_QUESTIONS: [&str; 5] = [
    "What is your craft or art form?",
    "Where are you from?",
    "How many years of experience do you have in your craft?",
    "Describe your style or techniques.",
    "Why did you choose this craft?",
];

const HINDI_QUESTIONS: [&str; 5] = [
    "आपका शिल्प / कला क्षेत्र क्या है?",
    "आप कहाँ से हैं?",
    "आपको इस शिल्प में कितने वर्षों का अनुभव है?",
    "अपनी शैली या तकनीकों का वर्णन करें।",
    "आपने यह शिल्प क्यों चुना?",
];

const TELUGU_QUESTIONS: [&str; 5] = [
    "మీరు ఏ కళ లేదా శ్రేణి చేస్తారు?",
    "మీరు ఎక్కడి నుంచి వచ్చారు?",
    "మీకు మీ కళలో ఎంత సంవత్సరాల అనుభవం ఉంది?",
    "మీ శైలి లేదా సాంకేతికతలను వివరించండి.",
    "మీరు ఈ కళను ఎందుకు ఎంచుకున్నారు?",
];

/// Translated and enriched versions of an artisan's bio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub translated: String,
    pub enriched: String,
    pub source: StorySource,
}

impl Enrichment {
    fn fallback(text: &str) -> Self {
        Self {
            translated: text.to_string(),
            enriched: text.to_string(),
            source: StorySource::Fallback,
        }
    }
}

#[derive(Clone)]
pub struct Storyteller {
    provider: Option<Arc<dyn TextProvider>>,
    strict: bool,
}

impl Storyteller {
    pub fn new(provider: Option<Arc<dyn TextProvider>>, strict: bool) -> Self {
        Self { provider, strict }
    }

    /// Storyteller that always uses the fallbacks.
    pub fn offline() -> Self {
        Self::new(None, false)
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider(&self) -> Option<&Arc<dyn TextProvider>> {
        self.provider.as_ref()
    }

    /// Translate a registration story and write a short marketplace bio.
    pub async fn enrich_bio(
        &self,
        text: &str,
        from_lang: &str,
        to_lang: &str,
    ) -> Result<Enrichment, AppError> {
        if text.trim().is_empty() {
            return Ok(Enrichment {
                translated: String::new(),
                enriched: String::new(),
                source: StorySource::Fallback,
            });
        }

        let prompt = format!(
            "Translate the following artisan story from {from_lang} to {to_lang}. \
             Then write a short enriched artisan bio (2-3 sentences) suitable for a \
             marketplace listing that preserves origin, craftsmanship and simple care notes.\n\
             Return ONLY valid JSON with keys: translated, enriched.\n\n\
             Input:\n{text}\n"
        );
        let params = GenerationParams {
            json_output: true,
            ..GenerationParams::default()
        };

        let Some(reply) = self.ask("enrich_bio", &prompt, &params).await? else {
            return Ok(Enrichment::fallback(text));
        };

        Ok(parse_enrichment(&reply, text).unwrap_or_else(|| {
            tracing::warn!("GenAI enrichment reply was not valid JSON, keeping original text");
            Enrichment::fallback(text)
        }))
    }

    /// The interview questions in `language`.
    pub async fn questions_for(&self, language: &str) -> Result<Vec<String>, AppError> {
        let language = language.trim();
        if language.is_empty() || language.eq_ignore_ascii_case("english") {
            return Ok(static_questions("English"));
        }

        let prompt = format!(
            "Translate the following English questions into {language}. \
             Return ONLY a JSON array of strings (one element per question).\n\nQuestions:\n{}",
            BASE_QUESTIONS
                .iter()
                .map(|q| format!("- {q}"))
                .collect::<Vec<_>>()
                .join("\n")
        );
        let params = GenerationParams {
            json_output: true,
            ..GenerationParams::default()
        };

        let translated = self
            .ask("translate_questions", &prompt, &params)
            .await?
            .and_then(|reply| parse_questions(&reply));

        Ok(translated.unwrap_or_else(|| static_questions(language)))
    }

    /// Turn interview answers into a short first-person story.
    pub async fn compose_story(
        &self,
        language: &str,
        answers: &[String],
    ) -> Result<String, AppError> {
        let fallback = answers
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let language = if language.trim().is_empty() {
            "English"
        } else {
            language.trim()
        };

        let mut prompt = format!(
            "Write a warm 3-4 sentence artisan story in {language} using the following Q&A:\n"
        );
        for (question, answer) in BASE_QUESTIONS.iter().zip(answers) {
            prompt.push_str(&format!("Q: {question}\nA: {answer}\n\n"));
        }
        prompt.push_str("Return only the story text.");

        let story = self
            .ask("compose_story", &prompt, &GenerationParams::default())
            .await?
            .map(|reply| reply.trim().to_string())
            .filter(|reply| !reply.is_empty());

        Ok(story.unwrap_or(fallback))
    }

    /// Run one provider call.
    ///
    /// `Ok(None)` means "use the fallback": no provider, an empty reply, or a
    /// failure in lenient mode.
    async fn ask(
        &self,
        operation: &'static str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Option<String>, AppError> {
        let Some(provider) = &self.provider else {
            counter!("genai_requests_total", "operation" => operation, "outcome" => "skipped")
                .increment(1);
            return Ok(None);
        };

        match provider.generate(prompt, params).await {
            Ok(response) => {
                counter!("genai_requests_total", "operation" => operation, "outcome" => "ok")
                    .increment(1);
                tracing::debug!(
                    provider = provider.name(),
                    operation,
                    input_tokens = response.input_tokens,
                    output_tokens = response.output_tokens,
                    "GenAI call completed"
                );
                Ok(response.text)
            }
            Err(e) => {
                counter!("genai_requests_total", "operation" => operation, "outcome" => e.kind())
                    .increment(1);
                if self.strict {
                    tracing::error!(provider = provider.name(), operation, "GenAI error: {}", e);
                    Err(AppError::BadGateway(format!("GenAI {}: {}", operation, e)))
                } else {
                    tracing::warn!(
                        provider = provider.name(),
                        operation,
                        "GenAI error, using fallback: {}",
                        e
                    );
                    Ok(None)
                }
            }
        }
    }
}

/// The slice from the first `open` to the last `close`, inclusive.
fn outer_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn parse_json_reply(reply: &str, open: char, close: char) -> Option<Value> {
    outer_span(reply, open, close)
        .and_then(|span| serde_json::from_str(span).ok())
        .or_else(|| serde_json::from_str(reply.trim()).ok())
}

fn parse_enrichment(reply: &str, original: &str) -> Option<Enrichment> {
    let value = parse_json_reply(reply, '{', '}')?;
    let object = value.as_object()?;

    let field = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| original.to_string())
    };

    Some(Enrichment {
        translated: field("translated"),
        enriched: field("enriched"),
        source: StorySource::Generated,
    })
}

fn parse_questions(reply: &str) -> Option<Vec<String>> {
    let value = parse_json_reply(reply, '[', ']')?;
    let questions: Vec<String> = value
        .as_array()?
        .iter()
        .map(|q| q.as_str().map(|s| s.trim().to_string()))
        .collect::<Option<_>>()?;

    (questions.len() == BASE_QUESTIONS.len()).then_some(questions)
}

fn static_questions(language: &str) -> Vec<String> {
    let table: &[&str; 5] = match language.to_lowercase().as_str() {
        "hindi" => &HINDI_QUESTIONS,
        "telugu" => &TELUGU_QUESTIONS,
        _ => &BASE_QUESTIONS,
    };
    table.iter().map(|q| q.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::MockTextProvider;

    fn with_mock(mock: MockTextProvider, strict: bool) -> (Storyteller, Arc<MockTextProvider>) {
        let mock = Arc::new(mock);
        let provider: Arc<dyn TextProvider> = mock.clone();
        (Storyteller::new(Some(provider), strict), mock)
    }

    #[tokio::test]
    async fn empty_bio_skips_the_provider() {
        let (teller, mock) = with_mock(MockTextProvider::new(), false);

        let enrichment = teller.enrich_bio("   ", "Hindi", "English").await.unwrap();

        assert_eq!(enrichment.translated, "");
        assert_eq!(enrichment.enriched, "");
        assert!(mock.prompts().is_empty());
    }

    #[tokio::test]
    async fn offline_enrichment_echoes_input() {
        let enrichment = Storyteller::offline()
            .enrich_bio("I weave silk sarees.", "English", "English")
            .await
            .unwrap();

        assert_eq!(enrichment, Enrichment::fallback("I weave silk sarees."));
    }

    #[tokio::test]
    async fn enrichment_extracts_json_from_chatty_reply() {
        let reply = "Sure! Here it is:\n```json\n{\"translated\": \"I make pots.\", \
                     \"enriched\": \"A potter from Khurja.\"}\n```";
        let (teller, mock) = with_mock(MockTextProvider::with_replies([reply]), false);

        let enrichment = teller
            .enrich_bio("मैं बर्तन बनाता हूँ।", "Hindi", "English")
            .await
            .unwrap();

        assert_eq!(enrichment.translated, "I make pots.");
        assert_eq!(enrichment.enriched, "A potter from Khurja.");
        assert_eq!(enrichment.source, StorySource::Generated);
        assert!(mock.prompts()[0].contains("from Hindi to English"));
    }

    #[tokio::test]
    async fn missing_keys_fall_back_to_input() {
        let (teller, _) = with_mock(
            MockTextProvider::with_replies([r#"{"enriched": "Enriched only"}"#]),
            false,
        );

        let enrichment = teller.enrich_bio("raw story", "English", "English").await.unwrap();

        assert_eq!(enrichment.translated, "raw story");
        assert_eq!(enrichment.enriched, "Enriched only");
    }

    #[tokio::test]
    async fn unparseable_reply_falls_back() {
        let (teller, _) = with_mock(MockTextProvider::with_replies(["no json here"]), false);

        let enrichment = teller.enrich_bio("raw story", "English", "English").await.unwrap();

        assert_eq!(enrichment, Enrichment::fallback("raw story"));
    }

    #[tokio::test]
    async fn provider_failure_is_lenient_by_default() {
        let (teller, _) = with_mock(MockTextProvider::failing(), false);

        let enrichment = teller.enrich_bio("raw story", "English", "English").await.unwrap();

        assert_eq!(enrichment.source, StorySource::Fallback);
    }

    #[tokio::test]
    async fn provider_failure_is_bad_gateway_in_strict_mode() {
        let (teller, _) = with_mock(MockTextProvider::failing(), true);

        let result = teller.enrich_bio("raw story", "English", "English").await;

        assert!(matches!(result, Err(AppError::BadGateway(_))));
    }

    #[tokio::test]
    async fn questions_use_static_table_offline() {
        let questions = Storyteller::offline().questions_for("Telugu").await.unwrap();
        assert_eq!(questions.len(), 5);
        assert_eq!(questions[1], TELUGU_QUESTIONS[1]);

        let unknown = Storyteller::offline().questions_for("Klingon").await.unwrap();
        assert_eq!(unknown[0], BASE_QUESTIONS[0]);
    }

    #[tokio::test]
    async fn english_questions_skip_the_provider() {
        let (teller, mock) = with_mock(MockTextProvider::new(), false);

        let questions = teller.questions_for("english").await.unwrap();

        assert_eq!(questions[0], BASE_QUESTIONS[0]);
        assert!(mock.prompts().is_empty());
    }

    #[tokio::test]
    async fn translated_questions_are_accepted_with_five_entries() {
        let reply = r#"["¿Cuál es tu oficio?", "¿De dónde eres?", "¿Cuántos años?", "Describe tu estilo.", "¿Por qué?"]"#;
        let (teller, _) = with_mock(MockTextProvider::with_replies([reply]), false);

        let questions = teller.questions_for("Spanish").await.unwrap();

        assert_eq!(questions[0], "¿Cuál es tu oficio?");
    }

    #[tokio::test]
    async fn wrong_length_questions_fall_back() {
        let (teller, _) = with_mock(
            MockTextProvider::with_replies([r#"["एक", "दो"]"#]),
            false,
        );

        let questions = teller.questions_for("Hindi").await.unwrap();

        assert_eq!(questions[0], HINDI_QUESTIONS[0]);
    }

    #[tokio::test]
    async fn story_fallback_joins_answers() {
        let answers = vec![
            "Block printing".to_string(),
            "".to_string(),
            " 12 years ".to_string(),
        ];

        let story = Storyteller::offline()
            .compose_story("English", &answers)
            .await
            .unwrap();

        assert_eq!(story, "Block printing 12 years");
    }

    #[tokio::test]
    async fn story_prompt_pairs_questions_with_answers() {
        let (teller, mock) = with_mock(
            MockTextProvider::with_replies(["  A story of indigo.  "]),
            false,
        );

        let story = teller
            .compose_story("Hindi", &["Indigo dyeing".to_string()])
            .await
            .unwrap();

        assert_eq!(story, "A story of indigo.");
        let prompt = &mock.prompts()[0];
        assert!(prompt.contains("in Hindi"));
        assert!(prompt.contains("Q: What is your craft or art form?\nA: Indigo dyeing"));
    }
}
