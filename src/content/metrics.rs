const LOW_CONTENT_THRESHOLD: usize = 5;
const HIGH_CONTENT_THRESHOLD: usize = 20;
const MIN_RATIO: f64 = 0.80;
const MAX_RATIO: f64 = 1.20;
const IDEAL_RATIO: f64 = 1.00;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCategory {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Expansion,
    Balanced,
    Compression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageMode {
    Comprehensive,
    Balanced,
    Selective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    Detailed,
    Moderate,
    Summary,
}

#[derive(Debug, Clone, Copy)]
pub struct ContentMetrics {
    pub message_count: usize,
    pub total_chars: usize,
    pub avg_chars_per_message: f64,
    pub category: ContentCategory,
    pub strategy: Strategy,
    pub target_ratio: f64,
    pub coverage_mode: CoverageMode,
    pub detail_level: DetailLevel,
}

/// Pure function of the raw content: message count and char volume drive a
/// compression/expansion/balanced strategy and a target script:content
/// char ratio.
pub fn analyze_content(messages: &[String]) -> ContentMetrics {
    let message_count = messages.len();
    let total_chars: usize = messages.iter().map(|m| m.chars().count()).sum();
    let avg_chars_per_message = if message_count > 0 {
        total_chars as f64 / message_count as f64
    } else {
        0.0
    };

    let (category, strategy, target_ratio, coverage_mode, detail_level) =
        if message_count <= LOW_CONTENT_THRESHOLD {
            (
                ContentCategory::Low,
                Strategy::Expansion,
                MAX_RATIO,
                CoverageMode::Comprehensive,
                DetailLevel::Detailed,
            )
        } else if message_count >= HIGH_CONTENT_THRESHOLD {
            (
                ContentCategory::High,
                Strategy::Compression,
                MIN_RATIO,
                CoverageMode::Selective,
                DetailLevel::Summary,
            )
        } else {
            (
                ContentCategory::Medium,
                Strategy::Balanced,
                IDEAL_RATIO,
                CoverageMode::Balanced,
                DetailLevel::Moderate,
            )
        };

    ContentMetrics {
        message_count,
        total_chars,
        avg_chars_per_message,
        category,
        strategy,
        target_ratio,
        coverage_mode,
        detail_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("message {}", i)).collect()
    }

    #[test]
    fn few_messages_yield_expansion_strategy() {
        let metrics = analyze_content(&messages(3));
        assert_eq!(metrics.strategy, Strategy::Expansion);
        assert_eq!(metrics.target_ratio, MAX_RATIO);
    }

    #[test]
    fn many_messages_yield_compression_strategy() {
        let metrics = analyze_content(&messages(25));
        assert_eq!(metrics.strategy, Strategy::Compression);
        assert_eq!(metrics.target_ratio, MIN_RATIO);
    }

    #[test]
    fn moderate_messages_yield_balanced_strategy() {
        let metrics = analyze_content(&messages(10));
        assert_eq!(metrics.strategy, Strategy::Balanced);
        assert_eq!(metrics.target_ratio, IDEAL_RATIO);
    }

    #[test]
    fn boundary_counts_match_thresholds() {
        assert_eq!(analyze_content(&messages(5)).strategy, Strategy::Expansion);
        assert_eq!(analyze_content(&messages(20)).strategy, Strategy::Compression);
    }
}
