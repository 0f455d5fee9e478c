/// Keyword tiers used to score messages for priority selection under the
/// `compression` strategy. The source system hardcodes a domain-specific
/// (Israeli politics/security) Hebrew+English keyword set; this
/// implementation keeps the scoring mechanism but exposes the lexicon as
/// configuration rather than baking in one domain's vocabulary (see
/// DESIGN.md).
#[derive(Debug, Clone)]
pub struct PriorityLexicon {
    pub critical: Vec<String>,
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub low: Vec<String>,
}

impl Default for PriorityLexicon {
    fn default() -> Self {
        PriorityLexicon {
            critical: vec!["breaking".into(), "urgent".into(), "exclusive".into()],
            high: vec!["announced".into(), "report".into(), "investigation".into()],
            medium: vec!["update".into(), "statement".into(), "comment".into()],
            low: vec!["mentioned".into(), "also".into(), "noted".into()],
        }
    }
}

impl PriorityLexicon {
    fn score_keywords(&self, text_lower: &str) -> u32 {
        let mut score = 0u32;
        for word in &self.critical {
            if text_lower.contains(word.as_str()) {
                score += 100;
            }
        }
        for word in &self.high {
            if text_lower.contains(word.as_str()) {
                score += 50;
            }
        }
        for word in &self.medium {
            if text_lower.contains(word.as_str()) {
                score += 20;
            }
        }
        for word in &self.low {
            if text_lower.contains(word.as_str()) {
                score += 5;
            }
        }
        score
    }
}

/// A message plus its original chronological position and a priority
/// score, used to select the top fraction while preserving chronology in
/// the output.
#[derive(Debug, Clone)]
pub struct ScoredMessage {
    pub index: usize,
    pub text: String,
    pub score: u32,
}

/// Scores one message: keyword matches plus length and structural bonuses
/// (long text, presence of digits, presence of quotes), mirroring the
/// source system's heuristics.
fn score_message(lexicon: &PriorityLexicon, text: &str) -> u32 {
    let text_lower = text.to_lowercase();
    let mut score = lexicon.score_keywords(&text_lower);

    if text.len() > 200 {
        score += 30;
    } else if text.len() > 100 {
        score += 15;
    }
    if text.chars().any(|c| c.is_ascii_digit()) {
        score += 10;
    }
    if text.contains('"') || text.contains('\u{201c}') {
        score += 15;
    }

    score
}

/// Scores every message against `lexicon`.
pub fn score_messages(lexicon: &PriorityLexicon, messages: &[String]) -> Vec<ScoredMessage> {
    messages
        .iter()
        .enumerate()
        .map(|(index, text)| ScoredMessage {
            index,
            text: text.clone(),
            score: score_message(lexicon, text),
        })
        .collect()
}

/// Selects the top `max(1, 70%)` highest-scored messages, then re-sorts the
/// selection back into its original chronological order.
pub fn select_priority_messages(scored: &[ScoredMessage]) -> Vec<ScoredMessage> {
    let keep_count = ((scored.len() as f64) * 0.7).floor().max(1.0) as usize;

    let mut ranked: Vec<&ScoredMessage> = scored.iter().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(keep_count);

    let mut selected: Vec<ScoredMessage> = ranked.into_iter().cloned().collect();
    selected.sort_by_key(|m| m.index);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaking_news_scores_higher_than_plain_mention() {
        let lexicon = PriorityLexicon::default();
        let a = score_message(&lexicon, "breaking: major announcement today");
        let b = score_message(&lexicon, "also mentioned in passing");
        assert!(a > b);
    }

    #[test]
    fn select_priority_keeps_seventy_percent_chronologically() {
        let lexicon = PriorityLexicon::default();
        let messages: Vec<String> = (0..10).map(|i| format!("message {}", i)).collect();
        let scored = score_messages(&lexicon, &messages);
        let selected = select_priority_messages(&scored);
        assert_eq!(selected.len(), 7);
        let indices: Vec<usize> = selected.iter().map(|m| m.index).collect();
        let mut sorted_indices = indices.clone();
        sorted_indices.sort();
        assert_eq!(indices, sorted_indices);
    }

    #[test]
    fn select_priority_keeps_at_least_one() {
        let lexicon = PriorityLexicon::default();
        let messages = vec!["only message".to_string()];
        let scored = score_messages(&lexicon, &messages);
        let selected = select_priority_messages(&scored);
        assert_eq!(selected.len(), 1);
    }
}
