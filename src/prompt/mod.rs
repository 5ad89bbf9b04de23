//! System instruction assembly.
//!
//! Segment order is fixed: critical language rule, persona and style,
//! filtering and format rules, then the corpus. Models weight the head and
//! tail of an instruction most heavily, so the rules lead and the data closes.

use std::fmt::{Display, Formatter};

pub const DEFAULT_PERSONA_NAME: &str = "Adam";
pub const MAX_RESULTS_CEILING: u8 = 3;

const NAME_PLACEHOLDER: &str = "{name}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaTemplate {
    pub name: String,
    pub language_rule: String,
    pub persona: String,
    pub verbosity: String,
    pub max_results: u8,
    pub emoji_policy: String,
    pub off_topic_policy: String,
    pub field_rule: String,
    pub image_rule: String,
}

impl Default for PersonaTemplate {
    fn default() -> Self {
        Self {
            name: DEFAULT_PERSONA_NAME.to_string(),
            language_rule: "You MUST respond using the EXACT SAME LANGUAGE the user is currently using. NO EXCEPTIONS. If the user switches language, you must switch immediately and never fall back to a previous language.".to_string(),
            persona: "You are '{name}', a cool, friendly, and informal Property Agent. Use slang and informal language appropriate to the response language, in a pleasant, calming tone. If the user writes in English, keep an American/Western chill, friendly tone with natural English slang (e.g. 'Bro', 'Fam', 'What's up?'). For any other language, stay friendly and informal with slang that fits that culture and language.".to_string(),
            verbosity: "Responses must be CONCISE and DENSE. Use bullet points (star *) for details.".to_string(),
            max_results: 1,
            emoji_policy: "Always use relevant emojis.".to_string(),
            off_topic_policy: "Answer ONLY based on the property data provided below. If the user asks about anything outside these properties, decline in a relaxed, positive way and steer the conversation back to {name}'s listings.".to_string(),
            field_rule: "Every summarized property MUST mention its price, location, and key features.".to_string(),
            image_rule: "If the property data contains an image file name (example: Christopher-Street.png), put it on a separate line at the end of the property description using exactly the format 'Image: FILE_NAME.png'. NEVER output external image URLs.".to_string(),
        }
    }
}

impl PersonaTemplate {
    pub fn effective_max_results(&self) -> u8 {
        self.max_results.clamp(1, MAX_RESULTS_CEILING)
    }

    fn fill(&self, slot: &str) -> String {
        slot.replace(NAME_PLACEHOLDER, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInstruction(String);

impl SystemInstruction {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SystemInstruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn compose(template: &PersonaTemplate, corpus: &str) -> SystemInstruction {
    let critical = format!(
        "***CRITICAL LANGUAGE INSTRUCTION (ABSOLUTE PRIORITY)***: {}",
        template.fill(&template.language_rule)
    );

    let style = format!(
        "**Role & Style:** {} {} {}",
        template.fill(&template.persona),
        template.fill(&template.emoji_policy),
        template.fill(&template.verbosity),
    );

    let max_results = template.effective_max_results();
    let noun = if max_results == 1 {
        "property"
    } else {
        "properties"
    };
    let rules = format!(
        "***CRITICAL FILTRATION:*** Summarize a MAXIMUM of {max_results} best {noun} matching the user's criteria. {} {}\n**--- PROPERTY IMAGE RULE ---** {}",
        template.fill(&template.field_rule),
        template.fill(&template.off_topic_policy),
        template.fill(&template.image_rule),
    );

    SystemInstruction(format!(
        "{critical}\n\n{style}\n\n{rules}\n\nProperty Data: \n\n{corpus}"
    ))
}
