//! Document wrapper (§4.D): read the source field, append a translation
//! record, detect an already-translated triple, build the cluster update
//! payload. Grounded on `es_translator/es.py`'s `TranslatedHit`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cluster::{ClusterClient, Hit};
use crate::error::CoreError;
use crate::interpreter::Interpreter;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranslationRecord {
    pub translator: String,
    pub source_language: String,
    pub target_language: String,
    pub content: String,
}

pub struct TranslatedHit {
    hit: Hit,
    source_field: String,
    target_field: String,
    translations: Vec<TranslationRecord>,
}

impl TranslatedHit {
    pub fn new(hit: Hit, source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        let target_field = target_field.into();
        let translations = hit
            .source
            .get(&target_field)
            .and_then(|v| serde_json::from_value::<Vec<TranslationRecord>>(v.clone()).ok())
            .unwrap_or_default();
        Self {
            hit,
            source_field: source_field.into(),
            target_field,
            translations,
        }
    }

    pub fn id(&self) -> &str {
        &self.hit.id
    }

    pub fn index(&self) -> &str {
        &self.hit.index
    }

    pub fn routing(&self) -> Option<&str> {
        self.hit.routing.as_deref()
    }

    pub fn source_value(&self) -> &str {
        self.hit
            .source
            .get(&self.source_field)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn translations(&self) -> &[TranslationRecord] {
        &self.translations
    }

    fn is_translated(&self, source_name: &str, target_name: &str, translator: &str) -> bool {
        self.translations.iter().any(|t| {
            t.source_language == source_name
                && t.target_language == target_name
                && t.translator == translator
        })
    }

    /// Invokes the interpreter and appends the result, unless a matching
    /// triple already exists and `force` is false. Truncates to
    /// `max_content_length` bytes when non-negative.
    pub async fn add_translation(
        &mut self,
        interpreter: &Interpreter,
        max_content_length: i64,
        force: bool,
    ) -> Result<(), CoreError> {
        let source_name = interpreter.source_name().to_uppercase();
        let target_name = interpreter.target_name().to_uppercase();
        let translator = interpreter.name().to_string();

        if !force && self.is_translated(&source_name, &target_name, &translator) {
            return Ok(());
        }

        let translated = interpreter.translate(self.source_value()).await?;
        let content = truncate_bytes(&translated, max_content_length);

        self.translations.push(TranslationRecord {
            translator,
            source_language: source_name,
            target_language: target_name,
            content,
        });
        Ok(())
    }

    /// Issues the partial update carrying only `target_field`.
    pub async fn save(&self, client: &ClusterClient) -> anyhow::Result<()> {
        let doc = serde_json::json!({ &self.target_field: self.translations });
        client
            .update(self.index(), self.id(), self.routing(), doc)
            .await
    }
}

fn truncate_bytes(text: &str, max_content_length: i64) -> String {
    if max_content_length < 0 {
        return text.to_string();
    }
    let max = max_content_length as usize;
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit_with(source_json: Value) -> Hit {
        Hit {
            index: "docs".to_string(),
            id: "1".to_string(),
            routing: None,
            source: source_json,
        }
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "héllo";
        let truncated = truncate_bytes(text, 2);
        assert!(truncated.len() <= 2);
    }

    #[test]
    fn no_truncation_when_unlimited() {
        assert_eq!(truncate_bytes("anything goes here", -1), "anything goes here");
    }

    #[test]
    fn is_translated_triple_detection() {
        let hit = hit_with(serde_json::json!({
            "content": "hello",
            "content_translated": [
                {"translator": "APERTIUM", "source_language": "ENGLISH", "target_language": "SPANISH", "content": "hola"}
            ]
        }));
        let wrapped = TranslatedHit::new(hit, "content", "content_translated");
        assert!(wrapped.is_translated("ENGLISH", "SPANISH", "APERTIUM"));
        assert!(!wrapped.is_translated("ENGLISH", "FRENCH", "APERTIUM"));
    }
}
