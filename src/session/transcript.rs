use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Tutor,
}

/// One finalized transcript message.
///
/// Immutable once committed, except the translation field which may be
/// filled in exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub text: String,
    pub translation: Option<String>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            translation: None,
        }
    }

    pub fn tutor(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tutor,
            text: text.into(),
            translation: None,
        }
    }
}

/// Snapshot of a finished session's transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSessionLog {
    pub id: String,
    pub date: DateTime<Utc>,
    pub language: String,
    pub messages: Vec<Message>,
}

/// Accumulates streamed transcript fragments into finalized message pairs.
///
/// Input and output fragments collect in two separate buffers until the
/// turn-complete signal; at that point a user message (if the input buffer
/// is non-empty) followed by a tutor message (if the output buffer is
/// non-empty) is appended to the visible transcript and both buffers clear.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    messages: Vec<Message>,
    input_buf: String,
    output_buf: String,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the transcript with the session-opening tutor greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut agg = Self::new();
        agg.messages.push(Message::tutor(greeting));
        agg
    }

    pub fn push_input(&mut self, fragment: &str) {
        self.input_buf.push_str(fragment);
    }

    pub fn push_output(&mut self, fragment: &str) {
        self.output_buf.push_str(fragment);
    }

    /// Finalize the current turn. Returns how many messages were appended
    /// (zero when both buffers were empty).
    pub fn commit_turn(&mut self) -> usize {
        let mut appended = 0;

        if !self.input_buf.is_empty() {
            self.messages.push(Message::user(self.input_buf.clone()));
            appended += 1;
        }

        if !self.output_buf.is_empty() {
            self.messages.push(Message::tutor(self.output_buf.clone()));
            appended += 1;
        }

        self.input_buf.clear();
        self.output_buf.clear();

        appended
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Attach a translation to a committed message. Appended once; a second
    /// attempt for the same message is rejected.
    pub fn set_translation(&mut self, index: usize, translation: String) -> Result<()> {
        let message = match self.messages.get_mut(index) {
            Some(m) => m,
            None => bail!("No transcript message at index {}", index),
        };

        if message.translation.is_some() {
            bail!("Message {} already has a translation", index);
        }

        message.translation = Some(translation);
        Ok(())
    }

    /// Snapshot into a session log if there is more than the greeting.
    pub fn snapshot(&self, id: String, language: String) -> Option<ChatSessionLog> {
        if self.messages.len() <= 1 {
            return None;
        }

        Some(ChatSessionLog {
            id,
            date: Utc::now(),
            language,
            messages: self.messages.clone(),
        })
    }
}

/// Session-opening greeting in the target language.
pub fn greeting_for(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "spanish" | "es" => "¡Hola! ¿Listo para practicar?",
        "french" | "fr" => "Bonjour ! Prêt à pratiquer ?",
        "german" | "de" => "Hallo! Bereit zum Üben?",
        "italian" | "it" => "Ciao! Pronto per esercitarti?",
        "japanese" | "ja" => "こんにちは！練習の準備はいいですか？",
        "portuguese" | "pt" => "Olá! Pronto para praticar?",
        _ => "Hello! Ready to practice?",
    }
}
