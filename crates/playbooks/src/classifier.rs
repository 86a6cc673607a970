//! Keyword classification of free text against playbooks.
//!
//! Single-word keywords (letters, digits, underscore) must match a whole
//! word: "email" does not match "emailed". Any other keyword ("daily
//! briefing", "e-mail", "c++") matches as a plain substring.

use crate::model::CachedPlaybook;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_single_word(keyword: &str) -> bool {
    keyword.chars().all(is_word_char)
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

/// Whether `keyword` (already lowercased) occurs in `message` (already lowercased).
pub fn keyword_matches(message: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    if is_single_word(keyword) {
        contains_word(message, keyword)
    } else {
        message.contains(keyword)
    }
}

/// Playbooks whose keywords occur in `message`, by descending priority.
/// Ties keep their input order.
pub fn classify_message(message: &str, playbooks: &[CachedPlaybook]) -> Vec<CachedPlaybook> {
    let message = message.to_lowercase();
    let mut matched: Vec<CachedPlaybook> = playbooks
        .iter()
        .filter(|p| p.keywords.iter().any(|k| keyword_matches(&message, k)))
        .cloned()
        .collect();
    matched.sort_by(|a, b| b.priority.cmp(&a.priority));
    matched
}

/// Union of the required tools of `matches`, first occurrence order.
pub fn required_tools(matches: &[CachedPlaybook]) -> Vec<String> {
    let mut tools: Vec<String> = Vec::new();
    for tool in matches.iter().flat_map(|p| p.required_tools.iter()) {
        if !tools.contains(tool) {
            tools.push(tool.clone());
        }
    }
    tools
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlaybookSource;

    fn playbook(name: &str, keywords: &[&str], priority: i32) -> CachedPlaybook {
        CachedPlaybook {
            id: 1,
            name: name.into(),
            description: String::new(),
            instructions: String::new(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            priority,
            required_tools: vec![],
            source: PlaybookSource::Database,
            trigger_config: None,
            max_steps: None,
            execution_plan: None,
        }
    }

    #[test]
    fn single_word_keyword_respects_word_boundaries() {
        let playbooks = [playbook("inbox", &["email"], 0)];
        assert!(classify_message("emailed you", &playbooks).is_empty());
        assert_eq!(classify_message("Check my email please", &playbooks).len(), 1);
        assert_eq!(classify_message("email", &playbooks).len(), 1);
        assert_eq!(classify_message("(email)", &playbooks).len(), 1);
    }

    #[test]
    fn phrase_keyword_matches_as_substring() {
        let playbooks = [playbook("briefing", &["daily briefing"], 0)];
        assert_eq!(classify_message("give me a daily briefing", &playbooks).len(), 1);
        assert_eq!(classify_message("GIVE ME A DAILY BRIEFINGS", &playbooks).len(), 1);
    }

    #[test]
    fn symbol_keyword_matches_as_substring() {
        let playbooks = [playbook("mail", &["e-mail"], 0)];
        assert_eq!(classify_message("send an e-mails", &playbooks).len(), 1);
    }

    #[test]
    fn word_boundary_finds_later_occurrence() {
        let playbooks = [playbook("cal", &["meeting"], 0)];
        assert_eq!(classify_message("meetings and a meeting", &playbooks).len(), 1);
    }

    #[test]
    fn matches_sorted_by_priority_stable_on_ties() {
        let playbooks = [
            playbook("low", &["report"], 1),
            playbook("first-tie", &["report"], 5),
            playbook("high", &["report"], 9),
            playbook("second-tie", &["report"], 5),
            playbook("unrelated", &["weather"], 10),
        ];
        let names: Vec<_> = classify_message("weekly report", &playbooks)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["high", "first-tie", "second-tie", "low"]);
    }

    #[test]
    fn required_tools_are_unioned() {
        let mut a = playbook("a", &["x"], 0);
        a.required_tools = vec!["mail.send".into(), "calendar.create".into()];
        let mut b = playbook("b", &["x"], 0);
        b.required_tools = vec!["calendar.create".into(), "slack.post".into()];
        assert_eq!(
            required_tools(&[a, b]),
            vec!["mail.send", "calendar.create", "slack.post"]
        );
    }

    #[test]
    fn unicode_message_does_not_panic() {
        let playbooks = [playbook("p", &["café"], 0)];
        assert_eq!(classify_message("Un CAFÉ, s'il vous plaît", &playbooks).len(), 1);
        assert!(classify_message("cafés ☕", &playbooks).is_empty());
    }
}
