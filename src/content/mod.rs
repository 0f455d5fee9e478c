pub mod analyzer;
pub mod metrics;
pub mod prioritizer;

pub use analyzer::{
    analyze_content, analyze_topics, ContentAnalysisResult, ContentType, ConversationStructure,
    Topic, TopicAnalysisResult, TransitionStyle,
};
pub use metrics::{analyze_content as analyze_metrics, ContentCategory, ContentMetrics, CoverageMode, DetailLevel, Strategy};
pub use prioritizer::{score_messages, select_priority_messages, PriorityLexicon, ScoredMessage};
