use uuid::Uuid;

use crate::domain::SpeakerGender;
use crate::error::{PipelineError, Result};

/// Static voice pool split into disjoint gender lists, matching the remote
/// TTS service's supported voice identifiers.
const FEMALE_VOICES: &[&str] = &[
    "Achernar",
    "Aoede",
    "Autonoe",
    "Callirrhoe",
    "Despina",
    "Erinome",
    "Kore",
    "Laomedeia",
    "Leda",
    "Pulcherrima",
    "Sulafat",
    "Vindemiatrix",
    "Zephyr",
];

const MALE_VOICES: &[&str] = &[
    "Achird",
    "Algenib",
    "Algieba",
    "Alnilam",
    "Charon",
    "Enceladus",
    "Fenrir",
    "Gacrux",
    "Iapetus",
    "Orus",
    "Puck",
    "Rasalgethi",
    "Sadachbia",
    "Sadaltager",
    "Schedar",
    "Umbriel",
    "Zubenelgenubi",
];

fn voices_for(gender: SpeakerGender) -> &'static [&'static str] {
    match gender {
        SpeakerGender::Female => FEMALE_VOICES,
        SpeakerGender::Male => MALE_VOICES,
    }
}

/// Per-language default voice pair and delivery style.
#[derive(Debug, Clone, Copy)]
pub struct LanguageDefaults {
    pub male_default: &'static str,
    pub female_default: &'static str,
    pub bcp47: &'static str,
}

fn language_defaults(language: &str) -> LanguageDefaults {
    match language.to_lowercase().as_str() {
        "hebrew" => LanguageDefaults {
            male_default: "Alnilam",
            female_default: "Aoede",
            bcp47: "he-IL",
        },
        "english" => LanguageDefaults {
            male_default: "Gacrux",
            female_default: "Leda",
            bcp47: "en-US",
        },
        _ => LanguageDefaults {
            male_default: "Gacrux",
            female_default: "Leda",
            bcp47: "en-US",
        },
    }
}

/// Pace/tone/volume/instruction fragment for one content type, merged over
/// the language defaults to build the final delivery style.
#[derive(Debug, Clone, Copy)]
pub struct ContentStyleOverride {
    pub pace: &'static str,
    pub tone: &'static str,
    pub volume: &'static str,
    pub style_instruction: &'static str,
}

fn content_style_override(content_type: &str) -> ContentStyleOverride {
    match content_type {
        "news" => ContentStyleOverride {
            pace: "measured",
            tone: "authoritative",
            volume: "steady",
            style_instruction: "Deliver with the clarity and gravity of a news anchor.",
        },
        "technology" => ContentStyleOverride {
            pace: "brisk",
            tone: "curious",
            volume: "steady",
            style_instruction: "Speak with the energy of an enthusiast explaining something new.",
        },
        "finance" => ContentStyleOverride {
            pace: "measured",
            tone: "serious",
            volume: "steady",
            style_instruction: "Keep the delivery precise and unhurried, as in a markets briefing.",
        },
        "entertainment" => ContentStyleOverride {
            pace: "lively",
            tone: "playful",
            volume: "animated",
            style_instruction: "Bring warmth and light energy, as in a culture segment.",
        },
        _ => ContentStyleOverride {
            pace: "natural",
            tone: "conversational",
            volume: "steady",
            style_instruction: "Speak naturally, as in a casual conversation between two hosts.",
        },
    }
}

/// Composite speech-style descriptor handed to the TTS client: language
/// defaults merged with content-type overrides, overrides taking precedence.
#[derive(Debug, Clone)]
pub struct SpeechStyle {
    pub bcp47: &'static str,
    pub pace: &'static str,
    pub tone: &'static str,
    pub volume: &'static str,
    pub style_instruction: &'static str,
}

/// A resolved pair of voices for a multi-speaker episode (or a single entry
/// for single-speaker, with `speaker2` unset).
#[derive(Debug, Clone)]
pub struct VoiceSelection {
    pub speaker1_voice: String,
    pub speaker2_voice: Option<String>,
}

/// Maps `(language, gender, role, episode_id)` to a stable voice identifier
/// and assembles delivery style descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceRegistry;

impl VoiceRegistry {
    pub fn new() -> Self {
        VoiceRegistry
    }

    /// Style descriptor for `(language, content_type)`.
    pub fn style_for(&self, language: &str, content_type: &str) -> SpeechStyle {
        let defaults = language_defaults(language);
        let style = content_style_override(content_type);
        SpeechStyle {
            bcp47: defaults.bcp47,
            pace: style.pace,
            tone: style.tone,
            volume: style.volume,
            style_instruction: style.style_instruction,
        }
    }

    /// Resolves a single-speaker voice: always the language default for the
    /// given gender.
    pub fn select_single(&self, language: &str, gender: SpeakerGender) -> VoiceSelection {
        let defaults = language_defaults(language);
        let voice = match gender {
            SpeakerGender::Male => defaults.male_default,
            SpeakerGender::Female => defaults.female_default,
        };
        VoiceSelection {
            speaker1_voice: voice.to_string(),
            speaker2_voice: None,
        }
    }

    /// Resolves a two-speaker voice pair. Speaker 1 always gets the
    /// language-default voice for `gender1`; speaker 2 is chosen by a seeded
    /// pseudo-random index into its gender's voice list, re-seeded with an
    /// `:alt` suffix on collision.
    pub fn select_pair(
        &self,
        language: &str,
        episode_id: Uuid,
        role1: &str,
        gender1: SpeakerGender,
        role2: &str,
        gender2: SpeakerGender,
        randomize_speaker2: bool,
    ) -> Result<VoiceSelection> {
        let defaults = language_defaults(language);
        let speaker1_voice = match gender1 {
            SpeakerGender::Male => defaults.male_default,
            SpeakerGender::Female => defaults.female_default,
        };

        if !randomize_speaker2 {
            let speaker2_voice = match gender2 {
                SpeakerGender::Male => defaults.male_default,
                SpeakerGender::Female => defaults.female_default,
            };
            return Ok(VoiceSelection {
                speaker1_voice: speaker1_voice.to_string(),
                speaker2_voice: Some(speaker2_voice.to_string()),
            });
        }

        let candidates = voices_for(gender2);
        if candidates.is_empty() {
            return Err(PipelineError::fatal_external(
                "no voices available for speaker 2's gender",
            ));
        }

        let mut speaker2_voice = pick_seeded(episode_id, role2, gender2, candidates);

        if speaker2_voice == speaker1_voice {
            let remaining: Vec<&str> = candidates
                .iter()
                .copied()
                .filter(|v| *v != speaker1_voice)
                .collect();
            if remaining.is_empty() {
                return Err(PipelineError::fatal_external(
                    "voice selection impossible: no distinct voice remains for speaker 2",
                ));
            }
            speaker2_voice = pick_seeded_alt(episode_id, role2, gender2, &remaining);
        }

        Ok(VoiceSelection {
            speaker1_voice: speaker1_voice.to_string(),
            speaker2_voice: Some(speaker2_voice.to_string()),
        })
    }
}

fn seed_index(seed_string: &str, list_len: usize) -> usize {
    let digest = md5::compute(seed_string.as_bytes());
    let seed_u32 = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (seed_u32 as usize) % list_len
}

fn pick_seeded(episode_id: Uuid, role: &str, gender: SpeakerGender, list: &[&str]) -> String {
    let seed_string = format!("{}:{}:{}", episode_id, role, gender.as_str());
    list[seed_index(&seed_string, list.len())].to_string()
}

fn pick_seeded_alt(episode_id: Uuid, role: &str, gender: SpeakerGender, list: &[&str]) -> String {
    let seed_string = format!("{}:{}:{}:alt", episode_id, role, gender.as_str());
    list[seed_index(&seed_string, list.len())].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_speaker_uses_language_default() {
        let registry = VoiceRegistry::new();
        let selection = registry.select_single("hebrew", SpeakerGender::Male);
        assert_eq!(selection.speaker1_voice, "Alnilam");
        assert!(selection.speaker2_voice.is_none());
    }

    #[test]
    fn pair_selection_is_deterministic_per_episode() {
        let registry = VoiceRegistry::new();
        let episode_id = Uuid::new_v4();
        let a = registry
            .select_pair(
                "english",
                episode_id,
                "host",
                SpeakerGender::Male,
                "guest",
                SpeakerGender::Female,
                true,
            )
            .unwrap();
        let b = registry
            .select_pair(
                "english",
                episode_id,
                "host",
                SpeakerGender::Male,
                "guest",
                SpeakerGender::Female,
                true,
            )
            .unwrap();
        assert_eq!(a.speaker2_voice, b.speaker2_voice);
    }

    #[test]
    fn pair_selection_yields_distinct_voices_on_same_gender() {
        let registry = VoiceRegistry::new();
        let episode_id = Uuid::new_v4();
        let selection = registry
            .select_pair(
                "english",
                episode_id,
                "host",
                SpeakerGender::Male,
                "guest",
                SpeakerGender::Male,
                true,
            )
            .unwrap();
        assert_ne!(
            selection.speaker1_voice,
            selection.speaker2_voice.unwrap()
        );
    }

    #[test]
    fn non_randomized_pair_uses_both_language_defaults() {
        let registry = VoiceRegistry::new();
        let episode_id = Uuid::new_v4();
        let selection = registry
            .select_pair(
                "hebrew",
                episode_id,
                "host",
                SpeakerGender::Male,
                "guest",
                SpeakerGender::Female,
                false,
            )
            .unwrap();
        assert_eq!(selection.speaker1_voice, "Alnilam");
        assert_eq!(selection.speaker2_voice.unwrap(), "Aoede");
    }

    #[test]
    fn style_merges_language_defaults_with_content_overrides() {
        let registry = VoiceRegistry::new();
        let style = registry.style_for("hebrew", "news");
        assert_eq!(style.bcp47, "he-IL");
        assert_eq!(style.tone, "authoritative");
    }
}
