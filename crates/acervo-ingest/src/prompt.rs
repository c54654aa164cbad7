//! Prompt construction.
//!
//! Every prompt carries the organization's instructions, guardrails and
//! cultural context in the system instruction. User-supplied text is always
//! fenced in labelled blocks so it cannot be confused with instructions.

use acervo_core::{
    Agent, GenerateLessonPlanRequest, Memory, OrganizationConfig, Prompt, PromptPart,
    StructuredMemory,
};

use crate::youtube::VideoMetadata;

/// Header of the transcript block in link prompts.
pub const TRANSCRIPT_MARKER: &str = "VIDEO TRANSCRIPT";

/// Header of the visual-inference instructions.
pub const VISUAL_MARKER: &str = "VISUAL ANALYSIS";

/// Header used when neither transcript nor image is available.
pub const METADATA_ONLY_MARKER: &str = "METADATA ONLY";

const BASE_INSTRUCTION: &str = "You are an archivist for a community cultural memory collection. \
You turn raw submissions into well-described catalogue records. \
Write every text field in Brazilian Portuguese. Never invent names of people.";

const MEMORY_RESPONSE_FORMAT: &str = r#"Respond with a single JSON object and nothing else:
{
  "title": "short descriptive title",
  "description": "two to four paragraphs describing the memory and its cultural significance",
  "date": "best known date (YYYY, YYYY-MM or YYYY-MM-DD) or null",
  "location": "place name or null",
  "tags": ["3 to 8 lowercase keywords"]
}"#;

const CHAPTERS_FORMAT: &str = r#"Also include:
  "chapters": [{"time": "mm:ss", "title": "chapter title", "description": "one sentence"}]"#;

pub struct PromptBuilder {
    config: OrganizationConfig,
}

impl PromptBuilder {
    pub fn new(config: OrganizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OrganizationConfig {
        &self.config
    }

    /// Base instruction followed by the organization's own sections.
    pub fn system_instruction(&self) -> String {
        let mut out = String::from(BASE_INSTRUCTION);
        let sections = [
            ("Organization instructions", &self.config.ai_instructions),
            ("Guardrails (must always be respected)", &self.config.guardrails),
            ("Cultural context", &self.config.cultural_context),
        ];
        for (label, value) in sections {
            if let Some(text) = value.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                out.push_str(&format!("\n\n{}:\n{}", label, text));
            }
        }
        out
    }

    fn base(&self) -> Prompt {
        Prompt::default().with_system(self.system_instruction()).json()
    }

    /// Prompt for a direct submission: the user's note plus whatever media
    /// the file strategy produced (possibly nothing).
    pub fn submission_prompt(&self, text_input: Option<&str>, media: Vec<PromptPart>) -> Prompt {
        let mut text = String::from("Catalogue the following memory submission.\n\n");
        match text_input.map(str::trim).filter(|t| !t.is_empty()) {
            Some(note) => text.push_str(&user_note_block(note)),
            None => text.push_str("The contributor did not write a description."),
        }
        if !media.is_empty() {
            text.push_str("\n\nThe attached media is part of the submission; describe what it shows or says.");
        }
        text.push_str("\n\n");
        text.push_str(MEMORY_RESPONSE_FORMAT);

        media
            .into_iter()
            .fold(self.base().with_part(PromptPart::Text(text)), Prompt::with_part)
    }

    /// Strategy A: transcript plus metadata, chapters requested.
    pub fn transcript_prompt(&self, meta: &VideoMetadata, transcript: &str, note: Option<&str>) -> Prompt {
        let mut text = String::from("Catalogue this video as a cultural memory.\n\n");
        text.push_str(&metadata_block(meta));
        text.push_str(&format!(
            "\n\n=== {} START ===\n{}\n=== {} END ===",
            TRANSCRIPT_MARKER, transcript, TRANSCRIPT_MARKER
        ));
        if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
            text.push_str("\n\n");
            text.push_str(&user_note_block(note));
        }
        text.push_str(
            "\n\nUse the transcript timestamps to split the video into chapters.\n\n",
        );
        text.push_str(MEMORY_RESPONSE_FORMAT);
        text.push('\n');
        text.push_str(CHAPTERS_FORMAT);
        self.base().with_part(PromptPart::Text(text))
    }

    /// Strategy C: image plus metadata, pedagogical reading of the visuals.
    pub fn visual_prompt(&self, meta: &VideoMetadata, note: Option<&str>, image: PromptPart) -> Prompt {
        let mut text = String::from("Catalogue this video as a cultural memory.\n\n");
        text.push_str(&metadata_block(meta));
        if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
            text.push_str("\n\n");
            text.push_str(&user_note_block(note));
        }
        text.push_str(&format!(
            "\n\n{}: no transcript is available. The attached image is a frame of the video. \
             Infer the setting, period, activities and pedagogical value from what is visible, \
             and say so when something is uncertain.\n\n",
            VISUAL_MARKER
        ));
        text.push_str(MEMORY_RESPONSE_FORMAT);
        text.push('\n');
        text.push_str(CHAPTERS_FORMAT);
        self.base().with_part(PromptPart::Text(text)).with_part(image)
    }

    /// Strategy D: title, description and note only; chapters are inferred.
    pub fn metadata_prompt(&self, meta: &VideoMetadata, note: Option<&str>) -> Prompt {
        let mut text = String::from("Catalogue this video as a cultural memory.\n\n");
        text.push_str(&metadata_block(meta));
        if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
            text.push_str("\n\n");
            text.push_str(&user_note_block(note));
        }
        text.push_str(&format!(
            "\n\n{}: there is no transcript and no image. Base the record on the information above \
             and infer plausible chapters for a video of this kind.\n\n",
            METADATA_ONLY_MARKER
        ));
        text.push_str(MEMORY_RESPONSE_FORMAT);
        text.push('\n');
        text.push_str(CHAPTERS_FORMAT);
        self.base().with_part(PromptPart::Text(text))
    }

    /// Plain-text image prompt for a synthesized cover.
    pub fn cover_prompt(&self, memory: &StructuredMemory) -> String {
        let mut text = format!(
            "Create an evocative illustrated cover image, without any text or lettering, for a cultural memory titled \"{}\".",
            memory.title
        );
        if !memory.description.is_empty() {
            let summary: String = memory.description.chars().take(500).collect();
            text.push_str(&format!(" About: {}", summary));
        }
        if let Some(date) = &memory.date {
            text.push_str(&format!(" Period: {}.", date));
        }
        if let Some(location) = &memory.location {
            text.push_str(&format!(" Place: {}.", location));
        }
        text
    }

    /// BNCC-aligned lesson plan, optionally grounded in a memory and voiced
    /// by an agent persona.
    pub fn lesson_plan_prompt(
        &self,
        request: &GenerateLessonPlanRequest,
        memory: Option<&Memory>,
        agent: Option<&Agent>,
    ) -> Prompt {
        let mut system = self.system_instruction();
        if let Some(agent) = agent {
            system.push_str(&format!(
                "\n\nPersona ({}, {}):\n{}",
                agent.name, agent.role, agent.system_prompt
            ));
        }

        let mut text = format!(
            "Write a lesson plan aligned with the Brazilian BNCC.\n\nGrade level: {}\nSubject: {}\nTopic: {}\nDuration: {} minutes",
            request.grade_level,
            request.subject,
            request.topic,
            request.duration_minutes.unwrap_or(50)
        );
        if let Some(memory) = memory {
            text.push_str(&format!(
                "\n\n=== MEMORY START ===\nTitle: {}\n{}\n=== MEMORY END ===\nUse this memory as the central resource of the lesson.",
                memory.title, memory.description
            ));
        }
        if let Some(notes) = request.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            text.push_str("\n\n");
            text.push_str(&user_note_block(notes));
        }
        text.push_str(
            r#"

Respond with a single JSON object:
{
  "title": "...",
  "bnccSkills": [{"code": "EF05HI01", "description": "..."}],
  "objectives": ["..."],
  "materials": ["..."],
  "steps": [{"title": "...", "durationMinutes": 10, "description": "..."}],
  "assessment": "..."
}"#,
        );

        Prompt::default()
            .with_system(system)
            .with_part(PromptPart::Text(text))
            .json()
    }

    pub fn social_post_prompt(&self, memory: &Memory, platform: &str, tone: &str) -> Prompt {
        let text = format!(
            "Write a {} post for {} sharing this cultural memory.\n\n=== MEMORY START ===\nTitle: {}\nDate: {}\nPlace: {}\n{}\n=== MEMORY END ===\n\n\
             Respond with a single JSON object: {{\"text\": \"post body\", \"hashtags\": [\"tag\"]}}",
            tone,
            platform,
            memory.title,
            memory.date.as_deref().unwrap_or("unknown"),
            memory.location.as_deref().unwrap_or("unknown"),
            memory.description
        );
        self.base().with_part(PromptPart::Text(text))
    }
}

/// Labelled block for extracted document text.
pub fn document_block(filename: &str, text: &str) -> String {
    format!(
        "=== DOCUMENT START: {} ===\n{}\n=== DOCUMENT END ===",
        filename,
        text.trim()
    )
}

fn user_note_block(note: &str) -> String {
    format!(
        "=== CONTRIBUTOR NOTE START ===\n{}\n=== CONTRIBUTOR NOTE END ===",
        note
    )
}

fn metadata_block(meta: &VideoMetadata) -> String {
    let mut lines = vec![format!("Title: {}", meta.title_or_default())];
    if let Some(channel) = &meta.channel {
        lines.push(format!("Channel: {}", channel));
    }
    if let Some(published) = &meta.published_at {
        lines.push(format!("Published: {}", published));
    }
    if let Some(duration) = &meta.duration {
        lines.push(format!("Duration: {}", duration));
    }
    if let Some(description) = meta.description.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push(format!("Description:\n{}", description.trim()));
    }
    format!(
        "=== VIDEO METADATA START ===\n{}\n=== VIDEO METADATA END ===",
        lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> VideoMetadata {
        VideoMetadata {
            title: Some("Festa do Divino em Pirenópolis".into()),
            description: Some("Cavalhadas e folia".into()),
            channel: Some("TV Goiás".into()),
            ..VideoMetadata::new("abcdefghijk")
        }
    }

    #[test]
    fn test_system_instruction_includes_org_sections() {
        let builder = PromptBuilder::new(OrganizationConfig {
            ai_instructions: Some("Foque na história local.".into()),
            guardrails: Some("Não cite menores.".into()),
            cultural_context: Some("   ".into()),
            ..Default::default()
        });
        let system = builder.system_instruction();
        assert!(system.contains("Foque na história local."));
        assert!(system.contains("Guardrails"));
        assert!(!system.contains("Cultural context"));
    }

    #[test]
    fn test_transcript_prompt_requests_chapters() {
        let prompt = PromptBuilder::new(OrganizationConfig::default()).transcript_prompt(
            &meta(),
            "[00:01] olá",
            Some("gravado em 1998"),
        );
        let text = prompt.text_content();
        assert!(text.contains(TRANSCRIPT_MARKER));
        assert!(text.contains("[00:01] olá"));
        assert!(text.contains("\"chapters\""));
        assert!(text.contains("gravado em 1998"));
        assert!(prompt.json_output);
        assert!(!prompt.has_media());
    }

    #[test]
    fn test_visual_prompt_attaches_image() {
        let image = PromptPart::File {
            mime_type: "image/jpeg".into(),
            uri: "https://files/thumb".into(),
        };
        let prompt = PromptBuilder::new(OrganizationConfig::default()).visual_prompt(&meta(), None, image.clone());
        assert!(prompt.text_content().contains(VISUAL_MARKER));
        assert_eq!(prompt.parts.last(), Some(&image));
    }

    #[test]
    fn test_metadata_prompt_asks_to_infer_chapters() {
        let text = PromptBuilder::new(OrganizationConfig::default())
            .metadata_prompt(&meta(), None)
            .text_content();
        assert!(text.contains(METADATA_ONLY_MARKER));
        assert!(text.contains("infer plausible chapters"));
        assert!(text.contains("Cavalhadas e folia"));
        assert!(!text.contains(TRANSCRIPT_MARKER));
    }

    #[test]
    fn test_submission_prompt_without_media_or_note() {
        let prompt = PromptBuilder::new(OrganizationConfig::default()).submission_prompt(None, vec![]);
        assert_eq!(prompt.parts.len(), 1);
        assert!(prompt.text_content().contains("did not write a description"));
    }

    #[test]
    fn test_submission_prompt_keeps_media_order() {
        let parts = vec![
            PromptPart::Text(document_block("ata.docx", "conteúdo")),
            PromptPart::Inline {
                mime_type: "image/png".into(),
                data: vec![1],
            },
        ];
        let prompt = PromptBuilder::new(OrganizationConfig::default())
            .submission_prompt(Some("minha avó"), parts);
        assert_eq!(prompt.parts.len(), 3);
        assert!(prompt.text_content().contains("=== DOCUMENT START: ata.docx ==="));
        assert!(prompt.has_media());
    }

    #[test]
    fn test_cover_prompt_mentions_title_and_place() {
        let memory = StructuredMemory {
            title: "Congada".into(),
            location: Some("Catalão".into()),
            ..Default::default()
        };
        let text = PromptBuilder::new(OrganizationConfig::default()).cover_prompt(&memory);
        assert!(text.contains("\"Congada\""));
        assert!(text.contains("Catalão"));
    }
}
