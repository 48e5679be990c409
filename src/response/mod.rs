//! Response controller: context classification and answer shaping
//!
//! Classification is a deterministic rules engine over (message, history):
//! the same pair always classifies identically. Shaping bounds a candidate
//! answer to the classified context: minimal replies stay conversational,
//! deep replies keep their structure and grow quick-action chips.

use crate::agents::message::{Attachment, AttachmentKind, QuickAction, Role};
use crate::agents::message::ConversationTurn;
use serde::{Deserialize, Serialize};

/// Classified shape of one chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Greeting,
    SimpleQuestion,
    FollowUp,
    ResearchRequest,
    General,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Greeting => "greeting",
            MessageType::SimpleQuestion => "simple_question",
            MessageType::FollowUp => "follow_up",
            MessageType::ResearchRequest => "research_request",
            MessageType::General => "general",
        }
    }
}

/// How much of the answer survives shaping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseComplexity {
    Minimal,
    Standard,
    Deep,
}

/// Output of the classification step, computed fresh per turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseContext {
    pub message_type: MessageType,
    pub complexity: ResponseComplexity,
    pub word_count: usize,
    pub has_assistant_turn: bool,
}

/// Candidate answer after shaping
#[derive(Debug, Clone)]
pub struct ShapedResponse {
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub quick_actions: Vec<QuickAction>,
}

/// Bounds applied by the shaping step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapingLimits {
    /// Sentences kept for minimal replies
    pub minimal_sentences: usize,
    /// Character bound for standard replies
    pub standard_max_chars: usize,
    /// Attachments kept for standard replies
    pub standard_max_attachments: usize,
    /// Attachments kept for deep replies
    pub deep_max_attachments: usize,
    /// Quick-action chips derived for deep replies
    pub max_quick_actions: usize,
}

impl Default for ShapingLimits {
    fn default() -> Self {
        Self {
            minimal_sentences: 2,
            standard_max_chars: 1200,
            standard_max_attachments: 2,
            deep_max_attachments: 4,
            max_quick_actions: 4,
        }
    }
}

const GREETING_WORDS: &[&str] = &[
    "hi", "hello", "hey", "greetings", "howdy", "good morning", "good afternoon", "good evening",
];

const RESEARCH_KEYWORDS: &[&str] = &[
    "research",
    "trend",
    "trends",
    "analysis",
    "analyze",
    "compare",
    "comparison",
    "landscape",
    "outlook",
    "forecast",
    "deep dive",
    "benchmark",
];

const FOLLOW_UP_CUES: &[&str] = &[
    "what about", "how about", "and ", "also", "why", "then", "ok but", "got it",
];

/// Classifies and shapes chat turns according to configured limits
pub struct ResponseController {
    limits: ShapingLimits,
}

impl ResponseController {
    pub fn new(limits: ShapingLimits) -> Self {
        Self { limits }
    }

    /// Classify a message against its conversation history.
    ///
    /// Specific classes win over the default; a message matching nothing
    /// specific falls to simple-question or general. Empty or whitespace-only
    /// input classifies as the most conservative context rather than erroring.
    pub fn analyze(&self, message: &str, history: &[ConversationTurn]) -> ResponseContext {
        let trimmed = message.trim();
        let lower = trimmed.to_lowercase();
        let word_count = trimmed.split_whitespace().count();
        let has_assistant_turn = history.iter().any(|t| t.role == Role::Assistant);

        if trimmed.is_empty() {
            return ResponseContext {
                message_type: MessageType::SimpleQuestion,
                complexity: ResponseComplexity::Minimal,
                word_count: 0,
                has_assistant_turn,
            };
        }

        let (message_type, complexity) = if Self::is_research(&lower, word_count) {
            (MessageType::ResearchRequest, ResponseComplexity::Deep)
        } else if Self::is_greeting(&lower, word_count, history) {
            (MessageType::Greeting, ResponseComplexity::Minimal)
        } else if Self::is_follow_up(&lower, word_count, has_assistant_turn) {
            (MessageType::FollowUp, ResponseComplexity::Standard)
        } else if trimmed.contains('?') || word_count <= 20 {
            (MessageType::SimpleQuestion, ResponseComplexity::Standard)
        } else {
            (MessageType::General, ResponseComplexity::Standard)
        };

        ResponseContext {
            message_type,
            complexity,
            word_count,
            has_assistant_turn,
        }
    }

    fn is_research(lower: &str, word_count: usize) -> bool {
        RESEARCH_KEYWORDS.iter().any(|k| lower.contains(k)) || word_count > 40
    }

    fn is_greeting(lower: &str, word_count: usize, history: &[ConversationTurn]) -> bool {
        if word_count <= 6 && GREETING_WORDS.iter().any(|g| lower.starts_with(g)) {
            return true;
        }
        // Cold start: a very short opener with no question is treated as a
        // greeting even without a greeting word.
        history.is_empty() && word_count <= 3 && !lower.contains('?')
    }

    fn is_follow_up(lower: &str, word_count: usize, has_assistant_turn: bool) -> bool {
        has_assistant_turn
            && (word_count <= 8 || FOLLOW_UP_CUES.iter().any(|c| lower.starts_with(c)))
    }

    /// Reshape a candidate answer to fit its classified context
    pub fn shape(
        &self,
        content: &str,
        ctx: &ResponseContext,
        attachments: Vec<Attachment>,
    ) -> ShapedResponse {
        match ctx.complexity {
            ResponseComplexity::Minimal => ShapedResponse {
                content: take_sentences(content, self.limits.minimal_sentences),
                attachments: attachments
                    .into_iter()
                    .filter(|a| a.kind == AttachmentKind::Link)
                    .take(1)
                    .collect(),
                quick_actions: Vec::new(),
            },
            ResponseComplexity::Standard => ShapedResponse {
                content: truncate_at_boundary(content, self.limits.standard_max_chars),
                attachments: attachments
                    .into_iter()
                    .take(self.limits.standard_max_attachments)
                    .collect(),
                quick_actions: Vec::new(),
            },
            ResponseComplexity::Deep => {
                let quick_actions = derive_quick_actions(content, self.limits.max_quick_actions);
                ShapedResponse {
                    content: content.to_string(),
                    attachments: attachments
                        .into_iter()
                        .take(self.limits.deep_max_attachments)
                        .collect(),
                    quick_actions,
                }
            }
        }
    }
}

impl Default for ResponseController {
    fn default() -> Self {
        Self::new(ShapingLimits::default())
    }
}

/// Keep the first `count` sentences, trimming trailing whitespace
fn take_sentences(content: &str, count: usize) -> String {
    let mut out = String::new();
    let mut sentences = 0;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        out.push(c);
        if matches!(c, '.' | '!' | '?') {
            let boundary = chars.peek().map(|n| n.is_whitespace()).unwrap_or(true);
            if boundary {
                sentences += 1;
                if sentences >= count {
                    break;
                }
            }
        }
    }

    out.trim().to_string()
}

/// Truncate at the last paragraph or word boundary before `max_chars`
fn truncate_at_boundary(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }

    let prefix: String = content.chars().take(max_chars).collect();
    let cut = prefix
        .rfind("\n\n")
        .or_else(|| prefix.rfind(|c: char| c.is_whitespace()))
        .unwrap_or(prefix.len());

    let mut out = prefix[..cut].trim_end().to_string();
    out.push('…');
    out
}

/// Detected list items become action chips for rich contexts
fn derive_quick_actions(content: &str, max: usize) -> Vec<QuickAction> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim_start();
            let item = line
                .strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .or_else(|| {
                    line.split_once(". ").and_then(|(num, rest)| {
                        num.chars().all(|c| c.is_ascii_digit()).then_some(rest)
                    })
                })?;
            let label: String = item.trim_matches('*').chars().take(48).collect();
            if label.is_empty() {
                return None;
            }
            Some(QuickAction {
                action: slugify(&label),
                label,
                icon: None,
            })
        })
        .take(max)
        .collect()
}

fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::message::ConversationTurn;

    fn controller() -> ResponseController {
        ResponseController::default()
    }

    fn assistant_turn() -> ConversationTurn {
        ConversationTurn::assistant("Sure, here is an overview.", Some("general"))
    }

    #[test]
    fn classification_is_deterministic() {
        let c = controller();
        let a = c.analyze("Hello", &[]);
        let b = c.analyze("Hello", &[]);
        assert_eq!(a, b);
        assert_eq!(a.message_type, MessageType::Greeting);
    }

    #[test]
    fn greeting_with_empty_history() {
        let ctx = controller().analyze("hi", &[]);
        assert_eq!(ctx.message_type, MessageType::Greeting);
        assert_eq!(ctx.complexity, ResponseComplexity::Minimal);
    }

    #[test]
    fn cold_start_short_opener_is_greeting() {
        let ctx = controller().analyze("yo there", &[]);
        assert_eq!(ctx.message_type, MessageType::Greeting);
    }

    #[test]
    fn research_keywords_classify_deep() {
        let ctx = controller().analyze(
            "What are current funding trends in early-stage ventures?",
            &[],
        );
        assert_eq!(ctx.message_type, MessageType::ResearchRequest);
        assert_eq!(ctx.complexity, ResponseComplexity::Deep);
    }

    #[test]
    fn mixed_keywords_prefer_specific_class() {
        // Greeting word plus research keyword: the non-default research class wins.
        let ctx = controller().analyze("hi, any market trends?", &[]);
        assert_eq!(ctx.message_type, MessageType::ResearchRequest);
    }

    #[test]
    fn short_reply_after_assistant_turn_is_follow_up() {
        let ctx = controller().analyze("what about later rounds?", &[assistant_turn()]);
        assert_eq!(ctx.message_type, MessageType::FollowUp);
        assert_eq!(ctx.complexity, ResponseComplexity::Standard);
    }

    #[test]
    fn empty_message_falls_to_conservative_default() {
        let ctx = controller().analyze("   ", &[]);
        assert_eq!(ctx.message_type, MessageType::SimpleQuestion);
        assert_eq!(ctx.complexity, ResponseComplexity::Minimal);
        assert_eq!(ctx.word_count, 0);
    }

    #[test]
    fn plain_question_is_simple_question() {
        let ctx = controller().analyze("How do convertible notes work?", &[]);
        assert_eq!(ctx.message_type, MessageType::SimpleQuestion);
    }

    #[test]
    fn minimal_shape_keeps_two_sentences_and_one_link() {
        let c = controller();
        let ctx = c.analyze("hi", &[]);
        let attachments = vec![
            Attachment::link("About the advisor", "/about"),
            Attachment::document("Pitch deck guide", "Template walkthrough"),
        ];
        let shaped = c.shape(
            "Hello! I help founders with strategy. Ask me anything about fundraising. More text here.",
            &ctx,
            attachments,
        );
        assert_eq!(
            shaped.content,
            "Hello! I help founders with strategy."
        );
        assert_eq!(shaped.attachments.len(), 1);
        assert_eq!(shaped.attachments[0].kind, AttachmentKind::Link);
        assert!(shaped.quick_actions.is_empty());
    }

    #[test]
    fn standard_shape_bounds_length_and_attachments() {
        let c = ResponseController::new(ShapingLimits {
            standard_max_chars: 40,
            ..Default::default()
        });
        let ctx = c.analyze("How should I price my seed round?", &[]);
        let long = "Pricing a seed round depends on traction, team and market comparables across many dimensions.";
        let shaped = c.shape(long, &ctx, vec![
            Attachment::document("a", ""),
            Attachment::document("b", ""),
            Attachment::document("c", ""),
        ]);
        assert!(shaped.content.chars().count() <= 41);
        assert!(shaped.content.ends_with('…'));
        assert_eq!(shaped.attachments.len(), 2);
    }

    #[test]
    fn deep_shape_derives_quick_actions_from_lists() {
        let c = controller();
        let ctx = c.analyze("Give me a deep dive analysis of valuation methods", &[]);
        let content = "Valuation methods:\n- Comparable transactions\n- Discounted cash flow\n- Scorecard method\n";
        let shaped = c.shape(content, &ctx, Vec::new());
        assert_eq!(shaped.quick_actions.len(), 3);
        assert_eq!(shaped.quick_actions[0].label, "Comparable transactions");
        assert_eq!(shaped.quick_actions[0].action, "comparable-transactions");
        assert_eq!(shaped.content, content);
    }

    #[test]
    fn take_sentences_handles_fewer_sentences_than_requested() {
        assert_eq!(take_sentences("Just one sentence", 2), "Just one sentence");
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Comparable, transactions!"), "comparable-transactions");
    }
}
