//! `switchyard classify`: Show which playbooks a message would trigger.

use std::fmt::Write;
use std::path::PathBuf;
use switchyard_playbooks::classifier::keyword_matches;
use switchyard_playbooks::{CachedPlaybook, SkillLoader, classify_message, required_tools};

pub fn run(message: &str, dir: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let dir = super::skills_dir(dir)?;
    let scan = SkillLoader::new(&dir).scan()?;
    let matches = classify_message(message, &scan.playbooks);
    print!("{}", render(message, &matches));
    Ok(())
}

fn render(message: &str, matches: &[CachedPlaybook]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "🔎 \"{message}\"");
    if matches.is_empty() {
        let _ = writeln!(out, "  No playbook matched.");
        return out;
    }

    let lowered = message.to_lowercase();
    for (rank, playbook) in matches.iter().enumerate() {
        let hits: Vec<&str> = playbook
            .keywords
            .iter()
            .filter(|k| keyword_matches(&lowered, k))
            .map(String::as_str)
            .collect();
        let _ = writeln!(
            out,
            "  {}. {} (priority {}) matched on: {}",
            rank + 1,
            playbook.name,
            playbook.priority,
            hits.join(", ")
        );
    }

    let tools = required_tools(matches);
    if !tools.is_empty() {
        let _ = writeln!(out, "  Tools forced into scope: {}", tools.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_playbooks::PlaybookSource;

    fn playbook(name: &str, keywords: &[&str], priority: i32, tools: &[&str]) -> CachedPlaybook {
        CachedPlaybook {
            id: -1,
            name: name.into(),
            description: String::new(),
            instructions: String::new(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            priority,
            required_tools: tools.iter().map(|t| t.to_string()).collect(),
            source: PlaybookSource::File,
            trigger_config: None,
            max_steps: None,
            execution_plan: None,
        }
    }

    #[test]
    fn render_ranks_matches_and_lists_tools() {
        let playbooks = vec![
            playbook("triage", &["inbox"], 1, &["mail.search"]),
            playbook("briefing", &["morning"], 5, &["calendar.list", "mail.search"]),
        ];
        let message = "Morning! Clean my inbox";
        let matches = classify_message(message, &playbooks);
        let text = render(message, &matches);

        assert!(text.contains("1. briefing (priority 5) matched on: morning"));
        assert!(text.contains("2. triage (priority 1) matched on: inbox"));
        assert!(text.contains("Tools forced into scope: calendar.list, mail.search"));
    }

    #[test]
    fn render_no_match() {
        assert!(render("hello", &[]).contains("No playbook matched."));
    }
}
