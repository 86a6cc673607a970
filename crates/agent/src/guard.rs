//! Detection of unreliable model replies: claimed-but-unexecuted actions and
//! needless "I can't access that" refusals.

use regex_lite::Regex;

const ACTION_VERBS: &str = "sent|created|scheduled|booked|posted|deleted|removed|updated|added|saved|uploaded|emailed|messaged|forwarded|cancell?ed|moved|shared|replied|archived|invited";

const REFUSAL_PATTERNS: &[&str] = &[
    r"(?i)\b(?:i\s+(?:don'?t|do\s+not)|i\s+(?:can'?t|cannot)|i(?:'m|\s+am)\s+(?:not\s+able|unable))\s+(?:to\s+)?(?:have\s+)?(?:access|browse|check|see|view|retrieve|look\s+up|read|reach)\b",
    r"(?i)\b(?:no|without)\s+(?:real-?time|live|internet|direct)\s+access\b",
    r"(?i)\bdon'?t\s+have\s+(?:real-?time|live|internet)\b",
    r"(?i)\bas\s+an?\s+(?:ai|language\s+model)\b[^.]*\b(?:can'?t|cannot|unable|don'?t)\b",
];

/// Heuristic checks over a model reply. Build once and share.
#[derive(Debug, Clone)]
pub struct HallucinationGuard {
    action: Vec<Regex>,
    refusal: Vec<Regex>,
}

impl HallucinationGuard {
    pub fn new() -> Result<Self, regex_lite::Error> {
        let action = [
            format!(r"(?i)\bi(?:'ve|’ve|\s+have)\s+(?:just\s+|now\s+|already\s+|successfully\s+)?(?:{ACTION_VERBS})\b"),
            format!(r"(?i)\b(?:the|your)\s+(?:email|message|event|meeting|invite|invitation|reminder|file|document|post|task|job|reply)\s+(?:has|have)\s+(?:been\s+)?(?:successfully\s+)?(?:{ACTION_VERBS})\b"),
            format!(r"(?i)\bsuccessfully\s+(?:{ACTION_VERBS})\b"),
            format!(r"(?i)\b(?:done|all\s+set)[!.,]\s+(?:i|it)\b[^.]*\b(?:{ACTION_VERBS})\b"),
        ]
        .iter()
        .map(|p| Regex::new(p))
        .collect::<Result<Vec<_>, _>>()?;

        let refusal = REFUSAL_PATTERNS
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { action, refusal })
    }

    /// The phrase claiming a completed action, if any.
    pub fn detect_action_hallucination(&self, text: &str) -> Option<String> {
        first_match(&self.action, text)
    }

    /// The refusal phrase, if any. Only flagged when matching tools exist:
    /// without them the refusal is honest.
    pub fn detect_tool_refusal(&self, text: &str, has_matching_tools: bool) -> Option<String> {
        if !has_matching_tools {
            return None;
        }
        first_match(&self.refusal, text)
    }
}

fn first_match(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().to_string())
}
