//! services/worker/src/pipeline/prompt.rs
//!
//! Prompt assembly for story generation: a complexity-specific persona as
//! the system prompt, and a user prompt embedding the document title, the
//! (already truncated) source text, and the fixed instruction block that
//! pins the response to exactly four JSON keys.

use cat_tales_core::domain::Complexity;

/// Persona and audience instruction, selected by complexity level.
pub fn system_prompt(complexity: Complexity) -> &'static str {
    match complexity {
        Complexity::Basic => {
            "You are a friendly storyteller who explains things to young children \
             through the adventures of curious cats. Use very short sentences, \
             everyday words, and a warm, playful tone. Every idea from the source \
             material should become something a cat sees, does, or discovers."
        }
        Complexity::Intermediate => {
            "You are a storyteller who teaches middle-school students by retelling \
             complex material as stories about clever cats. Keep the language clear \
             and concrete, define any necessary term inside the story itself, and \
             make sure the cat's adventures follow the structure of the source \
             material."
        }
        Complexity::Advanced => {
            "You are a witty essayist who retells sophisticated material for adult \
             readers as allegorical stories about cats. Preserve the nuance and the \
             key terminology of the source while keeping the narrative engaging and \
             the feline framing consistent throughout."
        }
    }
}

const USER_TEMPLATE: &str = "\
Document title: {title}

Source material:
{content}

Rewrite the source material above as a story about cats that teaches the same \
ideas. Respond with a single JSON object containing exactly these four keys and \
nothing else:
  \"simplified_title\": a short, catchy title for the story
  \"cat_story\": the full story text
  \"summary\": a 2-3 sentence summary of what the story teaches
  \"key_concepts\": an array of the main concepts from the source material

Do not include any text outside the JSON object.";

/// Builds the user prompt around the truncated source text.
pub fn user_prompt(title: &str, content: &str) -> String {
    USER_TEMPLATE
        .replace("{title}", title)
        .replace("{content}", content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_embeds_title_and_content() {
        let prompt = user_prompt("Intro to Momentum", "Momentum is mass times velocity.");
        assert!(prompt.contains("Document title: Intro to Momentum"));
        assert!(prompt.contains("Momentum is mass times velocity."));
        assert!(!prompt.contains("{title}"));
        assert!(!prompt.contains("{content}"));
    }

    #[test]
    fn instruction_block_names_all_four_keys() {
        let prompt = user_prompt("t", "c");
        for key in ["simplified_title", "cat_story", "summary", "key_concepts"] {
            assert!(prompt.contains(key), "missing key {key}");
        }
    }

    #[test]
    fn personas_differ_by_complexity() {
        let basic = system_prompt(Complexity::Basic);
        let mid = system_prompt(Complexity::Intermediate);
        let adv = system_prompt(Complexity::Advanced);
        assert_ne!(basic, mid);
        assert_ne!(mid, adv);
        assert!(basic.contains("children"));
        assert!(adv.contains("adult"));
    }
}
