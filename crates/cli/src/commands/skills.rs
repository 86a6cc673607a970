//! `switchyard skills`: List skill bundles.

use std::fmt::Write;
use std::path::{Path, PathBuf};
use switchyard_playbooks::{SkillLoader, SkillScan};

pub fn run(dir: Option<PathBuf>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let dir = super::skills_dir(dir)?;
    let scan = SkillLoader::new(&dir).scan()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&scan.playbooks)?);
    } else {
        print!("{}", render(&dir, &scan));
    }
    Ok(())
}

fn render(dir: &Path, scan: &SkillScan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "📚 Skills in {}", dir.display());
    let _ = writeln!(out);

    if scan.playbooks.is_empty() {
        let _ = writeln!(out, "  (no skill bundles found)");
    }
    for playbook in &scan.playbooks {
        let mut tags = Vec::new();
        if !playbook.is_classifiable() {
            tags.push("catalog-only");
        }
        if playbook.is_schedulable() {
            tags.push("scheduled");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };

        let _ = writeln!(out, "  • {} (priority {}){tags}", playbook.name, playbook.priority);
        let _ = writeln!(out, "      {}", playbook.description);
        if !playbook.keywords.is_empty() {
            let _ = writeln!(out, "      keywords: {}", playbook.keywords.join(", "));
        }
        if !playbook.required_tools.is_empty() {
            let _ = writeln!(out, "      tools:    {}", playbook.required_tools.join(", "));
        }
    }

    if !scan.errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  ⚠️  {} bundle(s) rejected:", scan.errors.len());
        for error in &scan.errors {
            let _ = writeln!(out, "    ❌ {error}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn render_lists_playbooks_and_rejections() {
        let temp = tempdir().unwrap();
        let good = temp.path().join("standup");
        std::fs::create_dir_all(&good).unwrap();
        std::fs::write(
            good.join("SKILL.md"),
            "---\nname: standup\ndescription: Daily standup notes\nplaybook:\n  keywords: [standup]\n  priority: 2\n---\nAsk for yesterday, today, blockers.\n",
        )
        .unwrap();
        let bad = temp.path().join("misnamed");
        std::fs::create_dir_all(&bad).unwrap();
        std::fs::write(bad.join("SKILL.md"), "---\nname: other\ndescription: x\n---\n").unwrap();

        let scan = SkillLoader::new(temp.path()).scan().unwrap();
        let text = render(temp.path(), &scan);
        assert!(text.contains("• standup (priority 2)"));
        assert!(text.contains("keywords: standup"));
        assert!(text.contains("1 bundle(s) rejected"));
    }

    #[test]
    fn render_empty_directory() {
        let temp = tempdir().unwrap();
        let scan = SkillLoader::new(temp.path()).scan().unwrap();
        assert!(render(temp.path(), &scan).contains("no skill bundles found"));
    }
}
