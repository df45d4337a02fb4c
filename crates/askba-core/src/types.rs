//! Common types used across the askba system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Languages the engine can answer in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    De,
    En,
    Tr,
}

impl Language {
    /// Parse a language code.
    ///
    /// Matching is case-insensitive and ignores a region subtag, so `de`,
    /// `DE` and `de-AT` all select German. Any other code is rejected with
    /// [`Error::UnsupportedLanguage`]; there is no silent default.
    pub fn from_code(code: &str) -> Result<Self> {
        let primary = code
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_lowercase();

        match primary.as_str() {
            "de" => Ok(Language::De),
            "en" => Ok(Language::En),
            "tr" => Ok(Language::Tr),
            _ => Err(Error::UnsupportedLanguage(code.to_string())),
        }
    }

    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            Language::De => "de",
            Language::En => "en",
            Language::Tr => "tr",
        }
    }

    /// Get all supported languages
    pub fn all() -> [Language; 3] {
        [Language::De, Language::En, Language::Tr]
    }

    /// Section labels used when a prompt is rendered as plain text
    pub fn labels(&self) -> PromptLabels {
        match self {
            Language::De => PromptLabels {
                source: "Quelle",
                context_header: "Relevanter Kontext (aus Unterlagen der Bundesagentur für Arbeit):",
                no_context: "(Es wurde kein relevanter Kontext gefunden.)",
                question_header: "Frage der Nutzerin / des Nutzers:",
                clarify: "Wenn die Frage unklar ist oder vom Kontext nicht abgedeckt wird, bitte um eine Präzisierung und schlage 2-3 verwandte Themen vor.",
            },
            Language::En => PromptLabels {
                source: "Source",
                context_header: "Relevant context (retrieved from Federal Employment Agency documents):",
                no_context: "(No relevant context was found.)",
                question_header: "User question:",
                clarify: "If the question is unclear or not covered, ask the user to clarify and propose 2-3 related options.",
            },
            Language::Tr => PromptLabels {
                source: "Kaynak",
                context_header: "İlgili bağlam (Federal İş Ajansı belgelerinden alınmıştır):",
                no_context: "(İlgili bağlam bulunamadı.)",
                question_header: "Kullanıcı sorusu:",
                clarify: "Soru belirsizse veya kapsanmıyorsa, kullanıcıdan açıklama iste ve 2-3 ilgili seçenek öner.",
            },
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Language::from_code(s)
    }
}

/// Localized fixed strings of a rendered prompt
#[derive(Debug, Clone, Copy)]
pub struct PromptLabels {
    pub source: &'static str,
    pub context_header: &'static str,
    pub no_context: &'static str,
    pub question_header: &'static str,
    pub clarify: &'static str,
}

/// Requested answer length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Short,
    Detailed,
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verbosity::Short => f.write_str("short"),
            Verbosity::Detailed => f.write_str("detailed"),
        }
    }
}

/// A model-ready prompt for one verbosity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSpec {
    pub system_instruction: String,
    /// Retrieved passages with source labels; empty when nothing relevant was found.
    pub context_block: String,
    pub user_question: String,
    pub language: Language,
    pub verbosity: Verbosity,
}

impl PromptSpec {
    /// Whether any retrieved context made it into the prompt
    pub fn has_context(&self) -> bool {
        !self.context_block.is_empty()
    }

    /// The user-turn text: context, question and the clarification hint.
    ///
    /// Providers with a dedicated system-instruction channel send
    /// `system_instruction` separately and this as the user content.
    pub fn user_content(&self) -> String {
        let labels = self.language.labels();
        let context = if self.has_context() {
            self.context_block.as_str()
        } else {
            labels.no_context
        };

        [
            labels.context_header,
            context,
            "",
            labels.question_header,
            self.user_question.as_str(),
            "",
            labels.clarify,
        ]
        .join("\n")
    }

    /// Render the whole prompt as a single text
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.system_instruction, self.user_content())
    }
}

/// The two answers returned for one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerPair {
    pub short: String,
    pub detailed: String,
}

/// Why one model candidate could not produce an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFailure {
    pub model_id: String,
    pub reason: String,
}

impl ModelFailure {
    pub fn new(model_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ModelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.model_id, self.reason)
    }
}
