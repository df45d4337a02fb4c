//! Prompt assembly: instruction, bounded context block and question

use askba_core::{Language, PromptSpec, Verbosity};

use crate::retriever::RetrievalResult;
use crate::store::DocumentStore;

const ENTRY_SEPARATOR: &str = "\n\n---\n\n";

/// Least text kept next to a full source header when truncating
const MIN_TRUNCATED_TEXT: usize = 20;

/// System instruction for a language and answer length.
///
/// Grounding in the supplied context is requested through the instruction
/// text only; nothing in code can enforce what the model writes.
pub fn system_instruction(language: Language, verbosity: Verbosity) -> &'static str {
    match (language, verbosity) {
        (Language::De, Verbosity::Short) => {
            "Du bist ein Assistent der Bundesagentur für Arbeit. Antworte kurz, klar und höflich auf Deutsch in höchstens drei Sätzen. \
             Stütze dich nur auf den bereitgestellten Kontext. Wenn der Kontext die Frage nicht beantwortet, sage ausdrücklich, dass du dir nicht sicher bist."
        }
        (Language::De, Verbosity::Detailed) => {
            "Du bist ein Assistent der Bundesagentur für Arbeit. Antworte ausführlich und strukturiert auf Deutsch, mit Zwischenüberschriften oder Aufzählungen, \
             konkreten Beispielen und den nächsten Schritten. Verwende ausschließlich Fakten aus dem bereitgestellten Kontext und erfinde nichts. \
             Wenn der Kontext nicht ausreicht, sage das offen."
        }
        (Language::En, Verbosity::Short) => {
            "You are an assistant of the German Federal Employment Agency. Answer briefly, clearly and politely in English, in at most three sentences. \
             Rely only on the supplied context. If the context does not answer the question, say explicitly that you are not sure."
        }
        (Language::En, Verbosity::Detailed) => {
            "You are an assistant of the German Federal Employment Agency. Answer in detail and in a structured way in English, using headings or bullet points, \
             concrete examples and the next steps to take. Use only facts stated in the supplied context and do not invent anything. \
             If the context is insufficient, say so openly."
        }
        (Language::Tr, Verbosity::Short) => {
            "Sen Almanya Federal İş Ajansı'nın bir asistanısın. Türkçe olarak en fazla üç cümleyle kısa, açık ve nazik cevap ver. \
             Yalnızca verilen bağlama dayan. Bağlam soruyu cevaplamıyorsa emin olmadığını açıkça söyle."
        }
        (Language::Tr, Verbosity::Detailed) => {
            "Sen Almanya Federal İş Ajansı'nın bir asistanısın. Türkçe olarak ayrıntılı ve yapılandırılmış cevap ver; başlıklar veya maddeler, \
             somut örnekler ve sonraki adımlar kullan. Yalnızca verilen bağlamdaki bilgileri kullan ve hiçbir şey uydurma. \
             Bağlam yetersizse bunu açıkça belirt."
        }
    }
}

/// Builds size-bounded prompts from retrieval results
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    max_context_chars: usize,
}

impl PromptBuilder {
    /// Create a builder with a context budget in characters
    pub fn new(max_context_chars: usize) -> Self {
        Self { max_context_chars }
    }

    pub fn max_context_chars(&self) -> usize {
        self.max_context_chars
    }

    /// Compose the prompt for one answer length
    pub fn build_prompt(
        &self,
        question: &str,
        results: &[RetrievalResult],
        store: &DocumentStore,
        language: Language,
        verbosity: Verbosity,
    ) -> PromptSpec {
        PromptSpec {
            system_instruction: system_instruction(language, verbosity).to_string(),
            context_block: self.build_context(results, store, language),
            user_question: question.trim().to_string(),
            language,
            verbosity,
        }
    }

    /// Concatenate retrieved texts with source labels, within the budget.
    ///
    /// Entries are added in rank order; the first one that does not fit ends
    /// the block, so lower-ranked context is dropped first. When even the
    /// top-ranked entry is too long, its text is cut to fit instead.
    pub fn build_context(
        &self,
        results: &[RetrievalResult],
        store: &DocumentStore,
        language: Language,
    ) -> String {
        let labels = language.labels();
        let separator_len = ENTRY_SEPARATOR.chars().count();
        let mut block = String::new();
        let mut used = 0;

        for (rank, result) in results.iter().enumerate() {
            let Some(doc) = store.document(result.index) else {
                continue;
            };

            let header = format!("[{}] {}: {}\n", rank + 1, labels.source, doc.source_name);
            let header_len = header.chars().count();
            let text_len = doc.raw_text.chars().count();
            let separator = if block.is_empty() { 0 } else { separator_len };

            if used + separator + header_len + text_len <= self.max_context_chars {
                if separator > 0 {
                    block.push_str(ENTRY_SEPARATOR);
                }
                block.push_str(&header);
                block.push_str(&doc.raw_text);
                used += separator + header_len + text_len;
                continue;
            }

            if block.is_empty() {
                block = truncate_entry(rank, &header, &doc.raw_text, self.max_context_chars);
            }
            break;
        }

        block
    }
}

/// Fit the top-ranked entry into `budget` characters.
///
/// The labelled header is kept when it leaves room for at least
/// `MIN_TRUNCATED_TEXT` characters of text; otherwise only the rank marker
/// precedes the text. The result is never empty for a non-empty text.
fn truncate_entry(rank: usize, header: &str, text: &str, budget: usize) -> String {
    let header_len = header.chars().count();
    let prefix = if header_len + MIN_TRUNCATED_TEXT <= budget {
        header.to_string()
    } else {
        format!("[{}]\n", rank + 1)
    };

    let prefix_len = prefix.chars().count();
    if prefix_len >= budget {
        return text.chars().take(budget).collect();
    }

    let mut entry = prefix;
    entry.extend(text.chars().take(budget - prefix_len));
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::retrieve;
    use crate::store::{build_store, CorpusSource};
    use std::fs;
    use tempfile::TempDir;

    fn store(files: &[(&str, &str)]) -> (TempDir, DocumentStore) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let store = build_store(&CorpusSource::new(dir.path())).unwrap();
        (dir, store)
    }

    fn hit(store: &DocumentStore, index: usize, score: f32) -> RetrievalResult {
        RetrievalResult {
            index,
            document_id: store.documents()[index].id.clone(),
            score,
        }
    }

    #[test]
    fn test_instructions_differ_per_language_and_verbosity() {
        let mut seen = std::collections::HashSet::new();
        for language in Language::all() {
            for verbosity in [Verbosity::Short, Verbosity::Detailed] {
                assert!(seen.insert(system_instruction(language, verbosity)));
            }
        }
        assert!(system_instruction(Language::En, Verbosity::Short).contains("three sentences"));
        assert!(system_instruction(Language::De, Verbosity::Detailed).contains("erfinde nichts"));
    }

    #[test]
    fn test_context_block_labels_sources() {
        let (_dir, store) = store(&[
            ("alg.txt", "Arbeitslosengeld gibt es nach Arbeitslosmeldung."),
            ("bgs.txt", "Der Bildungsgutschein fördert Weiterbildung."),
        ]);
        let builder = PromptBuilder::new(1000);
        let results = vec![hit(&store, 1, 0.8), hit(&store, 0, 0.3)];

        let context = builder.build_context(&results, &store, Language::De);
        insta::assert_snapshot!(context, @r###"
        [1] Quelle: bgs.txt
        Der Bildungsgutschein fördert Weiterbildung.

        ---

        [2] Quelle: alg.txt
        Arbeitslosengeld gibt es nach Arbeitslosmeldung.
        "###);
    }

    #[test]
    fn test_budget_drops_lowest_ranked_first() {
        let (_dir, store) = store(&[
            ("a.txt", "aaaaaaaaaa"),
            ("b.txt", "bbbbbbbbbb"),
            ("c.txt", "cccccccccc"),
        ]);
        let results = vec![hit(&store, 0, 0.9), hit(&store, 1, 0.8), hit(&store, 2, 0.7)];

        // "[1] Source: a.txt\n" is 18 chars, each entry 28, separator 7
        let builder = PromptBuilder::new(28 + 7 + 28 + 5);
        let context = builder.build_context(&results, &store, Language::En);
        assert!(context.contains("aaaaaaaaaa"));
        assert!(context.contains("bbbbbbbbbb"));
        assert!(!context.contains("ccc"));
        assert!(context.chars().count() <= builder.max_context_chars());
    }

    #[test]
    fn test_oversized_top_entry_is_truncated() {
        let long_text = "Weiterbildung ".repeat(100);
        let (_dir, store) = store(&[("long.txt", long_text.as_str()), ("b.txt", "kurz")]);
        // b.txt sorts first, so long.txt is index 1
        let results = vec![hit(&store, 1, 0.9), hit(&store, 0, 0.5)];

        let builder = PromptBuilder::new(60);
        let context = builder.build_context(&results, &store, Language::En);
        assert!(context.starts_with("[1] Source: long.txt\nWeiterbildung"));
        assert_eq!(context.chars().count(), 60);
        assert!(!context.contains("kurz"));
    }

    #[test]
    fn test_tiny_budget_keeps_part_of_top_entry() {
        let text = "Weiterbildung wird mit dem Bildungsgutschein gefördert.";
        let (_dir, store) = store(&[("merkblatt-6-weiterbildung.txt", text)]);
        let results = vec![hit(&store, 0, 0.7)];

        // the labelled header alone is longer than the budget
        let builder = PromptBuilder::new(20);
        let context = builder.build_context(&results, &store, Language::De);
        assert_eq!(context, "[1]\nWeiterbildung wi");
        assert_eq!(context.chars().count(), 20);

        let prompt = builder.build_prompt("Weiterbildung?", &results, &store, Language::De, Verbosity::Short);
        assert!(prompt.has_context());

        let context = PromptBuilder::new(2).build_context(&results, &store, Language::De);
        assert_eq!(context, "We");
    }

    #[tokio::test]
    async fn test_prompt_for_relevant_question_contains_document() {
        let text = "Bildungsgutschein is an education voucher issued by the employment agency.";
        let (_dir, store) = store(&[("doc1.txt", text)]);
        let builder = PromptBuilder::new(8000);

        let results = retrieve(&store, "What is a Bildungsgutschein?", 4).await.unwrap();
        let prompt = builder.build_prompt(
            "What is a Bildungsgutschein?",
            &results,
            &store,
            Language::En,
            Verbosity::Short,
        );

        assert!(prompt.context_block.contains(text));
        assert!(prompt.context_block.contains("doc1.txt"));
        assert_eq!(prompt.user_question, "What is a Bildungsgutschein?");
        assert_eq!(prompt.verbosity, Verbosity::Short);
    }

    #[test]
    fn test_prompt_without_results_has_empty_context() {
        let (_dir, store) = store(&[("doc1.txt", "Bildungsgutschein")]);
        let prompt = PromptBuilder::new(8000).build_prompt(
            "What is the capital of France?",
            &[],
            &store,
            Language::En,
            Verbosity::Detailed,
        );

        assert_eq!(prompt.context_block, "");
        assert!(prompt.render().contains("(No relevant context was found.)"));
    }
}
