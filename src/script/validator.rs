use std::collections::HashSet;

use regex::Regex;

use crate::content::Strategy;

const PASS_THRESHOLD: f64 = 0.65;
const RATIO_SHORT_FACTOR: f64 = 0.85;
const RATIO_LONG_FACTOR: f64 = 1.15;
const COVERAGE_LOW_THRESHOLD: f64 = 0.75;
const HALLUCINATION_HIGH_THRESHOLD: f64 = 0.35;

/// Placeholder patterns whose presence in a generated script indicates
/// incomplete or templated generation. Checked case-insensitively.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "[name]",
    "[שם]",
    "[שם האורח]",
    "[insert",
    "[family name]",
    "[first name]",
    "___",
    "tbd",
    "todo",
    "<placeholder>",
    "{name}",
    "{family}",
    "וכו'",
];

/// Topic keywords used to estimate how much of the original content a
/// script actually covers. Like `PriorityLexicon`, this is exposed as
/// configuration rather than hardcoding one content domain's vocabulary.
#[derive(Debug, Clone, Default)]
pub struct TopicLexicon {
    pub keywords: Vec<String>,
}

impl TopicLexicon {
    fn topics_in(&self, text_lower: &str) -> HashSet<String> {
        self.keywords
            .iter()
            .filter(|k| text_lower.contains(k.to_lowercase().as_str()))
            .map(|k| k.to_lowercase())
            .collect()
    }
}

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "pause", "short", "medium", "long", "break", "emphasis", "laughing",
    "host", "expert", "analyst", "speaker", "welcome", "thank", "thanks",
];

/// Strips TTS markup (`[...]`, `<...>`), lowercases, and splits into
/// whitespace/punctuation-bounded tokens of at least 3 characters,
/// excluding the stop list.
fn tokenize(text: &str) -> HashSet<String> {
    let bracket_re = Regex::new(r"\[.*?\]|<.*?>").unwrap();
    let stripped = bracket_re.replace_all(text, " ").to_lowercase();
    let word_re = Regex::new(r"[\w]+").unwrap();
    word_re
        .find_iter(&stripped)
        .map(|m| m.as_str().to_string())
        .filter(|w| w.chars().count() >= 3 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Returns `Err` with the offending pattern if the script still contains
/// obvious placeholder/template text.
pub fn check_for_placeholders(script: &str) -> Result<(), String> {
    let script_lower = script.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if script_lower.contains(&pattern.to_lowercase()) {
            return Err(pattern.to_string());
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub quality_score: f64,
    pub actual_ratio: f64,
    pub target_ratio: f64,
    pub ratio_match_score: f64,
    pub coverage_score: f64,
    pub topics_in_content: usize,
    pub topics_covered: usize,
    pub missing_topics: Vec<String>,
    pub hallucination_risk: f64,
    pub unique_words_count: usize,
    pub recommendations: Vec<String>,
    pub passed: bool,
}

/// Scores a generated script against the original content it was drafted
/// from: does its length match the target compression/expansion ratio,
/// does it cover the source's topics, and does it introduce words that
/// were not present anywhere in the source (a hallucination proxy).
pub fn validate_script(
    content_messages: &[String],
    generated_script: &str,
    total_content_chars: usize,
    target_ratio: f64,
    topics: &TopicLexicon,
) -> ValidationReport {
    let script_chars = generated_script.chars().count();
    let actual_ratio = if total_content_chars > 0 {
        script_chars as f64 / total_content_chars as f64
    } else {
        0.0
    };

    let content_text_lower = content_messages.join(" ").to_lowercase();
    let script_lower = generated_script.to_lowercase();
    let topics_in_content = topics.topics_in(&content_text_lower);
    let topics_in_script = topics.topics_in(&script_lower);
    let covered_topics: HashSet<&String> = topics_in_script.intersection(&topics_in_content).collect();
    let coverage_score = if topics_in_content.is_empty() {
        1.0
    } else {
        covered_topics.len() as f64 / topics_in_content.len() as f64
    };
    let missing_topics: Vec<String> = topics_in_content
        .difference(&topics_in_script)
        .cloned()
        .collect();

    let script_words = tokenize(generated_script);
    let mut content_words = HashSet::new();
    for message in content_messages {
        content_words.extend(tokenize(message));
    }
    let unique_to_script: HashSet<&String> = script_words.difference(&content_words).collect();
    let hallucination_risk = if script_words.is_empty() {
        0.0
    } else {
        unique_to_script.len() as f64 / script_words.len() as f64
    };

    let ratio_match_score = if target_ratio > 0.0 {
        1.0 - ((actual_ratio - target_ratio).abs() / target_ratio).min(1.0)
    } else {
        0.0
    };

    let quality_score =
        ratio_match_score * 0.4 + coverage_score * 0.4 + (1.0 - hallucination_risk.min(1.0)) * 0.2;

    let mut recommendations = Vec::new();
    if actual_ratio < target_ratio * RATIO_SHORT_FACTOR {
        recommendations.push(format!(
            "Script significantly shorter than target ({:.0}% vs {:.0}%)",
            actual_ratio * 100.0,
            target_ratio * 100.0
        ));
    } else if actual_ratio > target_ratio * RATIO_LONG_FACTOR {
        recommendations.push(format!(
            "Script significantly longer than target ({:.0}% vs {:.0}%)",
            actual_ratio * 100.0,
            target_ratio * 100.0
        ));
    }
    if coverage_score < COVERAGE_LOW_THRESHOLD {
        recommendations.push(format!(
            "Low topic coverage ({:.0}% - missing key topics)",
            coverage_score * 100.0
        ));
    }
    if hallucination_risk > HALLUCINATION_HIGH_THRESHOLD {
        recommendations.push(format!(
            "High hallucination risk ({:.0}% - many new words not in source)",
            hallucination_risk * 100.0
        ));
    }

    ValidationReport {
        quality_score,
        actual_ratio,
        target_ratio,
        ratio_match_score,
        coverage_score,
        topics_in_content: topics_in_content.len(),
        topics_covered: covered_topics.len(),
        missing_topics,
        hallucination_risk,
        unique_words_count: unique_to_script.len(),
        recommendations,
        passed: quality_score >= PASS_THRESHOLD,
    }
}

/// Logs a one-line strategy summary alongside the quality score, mirroring
/// the source system's validation-report logging.
pub fn describe_strategy(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Expansion => "expansion",
        Strategy::Balanced => "balanced",
        Strategy::Compression => "compression",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> TopicLexicon {
        TopicLexicon {
            keywords: vec!["election".to_string(), "market".to_string()],
        }
    }

    #[test]
    fn placeholder_detection_finds_bracketed_name() {
        assert!(check_for_placeholders("Host: welcome [name] to the show").is_err());
        assert!(check_for_placeholders("Host: welcome to the show").is_ok());
    }

    #[test]
    fn full_topic_coverage_and_matching_ratio_passes() {
        let content = vec!["the election results were surprising".to_string()];
        let script = "Host: today we discuss the election results in depth.";
        let report = validate_script(&content, script, 40, 1.0, &lexicon());
        assert_eq!(report.topics_covered, 1);
        assert!(report.passed || report.quality_score > 0.5);
    }

    #[test]
    fn missing_topics_lowers_coverage_score() {
        let content = vec!["the election and the market both moved today".to_string()];
        let script = "Host: it was an interesting day overall.";
        let report = validate_script(&content, script, 45, 1.0, &lexicon());
        assert_eq!(report.coverage_score, 0.0);
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn tokenize_strips_tts_markup_and_short_words() {
        let tokens = tokenize("[pause] Host: a big <break> announcement");
        assert!(tokens.contains("announcement"));
        assert!(!tokens.contains("a"));
        assert!(!tokens.contains("host"));
    }
}
