//! `switchyard doctor`: Check configuration and the skills directory.

use switchyard_config::AppConfig;
use switchyard_core::scanner::FailMode;
use switchyard_playbooks::SkillLoader;
use switchyard_security::SecurityPolicy;

/// Settings that block every message when no safety scanner is wired,
/// as in the CLI. Each entry names the key to change.
pub fn unscanned_policy_issues(policy: &SecurityPolicy) -> Vec<&'static str> {
    let mut issues = Vec::new();
    if policy.input.enabled && policy.input.fail_mode == FailMode::Closed {
        issues.push("input scanning fails closed: set security.input_enabled = false or input_fail_mode = \"open\"");
    }
    if policy.output.fail_mode == FailMode::Closed {
        issues.push("output scanning fails closed: set security.output_fail_mode = \"open\"");
    }
    issues
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Switchyard Doctor");
    println!("====================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    let config = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ✅ Config file valid ({})", config_path.display());
                config
            }
            Err(e) => {
                println!("  ❌ Config file invalid: {e}");
                return Ok(());
            }
        }
    } else {
        println!("  ⚠️  No config file at {}, using defaults", config_path.display());
        AppConfig::default()
    };

    let skills_dir = config.playbooks.skills_dir();
    if skills_dir.is_dir() {
        match SkillLoader::new(&skills_dir).scan() {
            Ok(scan) => {
                println!(
                    "  ✅ Skills directory: {} playbook(s) in {}",
                    scan.playbooks.len(),
                    skills_dir.display()
                );
                if !scan.errors.is_empty() {
                    println!("  ⚠️  {} skill bundle(s) rejected, run `switchyard skills`", scan.errors.len());
                    issues += 1;
                }
            }
            Err(e) => {
                println!("  ❌ Skills directory unreadable: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ⚠️  No skills directory at {}", skills_dir.display());
        issues += 1;
    }

    if config.agent.api_key.is_some() {
        println!("  ✅ Chat model key configured ({})", config.agent.model);
    } else {
        println!("  ⚠️  No chat model key, set SWITCHYARD_API_KEY or OPENAI_API_KEY");
        issues += 1;
    }

    if config.embeddings.enabled {
        if config.embeddings.api_key.is_some() {
            println!("  ✅ Embedding selector enabled ({})", config.embeddings.model);
        } else {
            println!("  ❌ Embedding selector enabled but no API key configured");
            issues += 1;
        }
    } else {
        println!("  ℹ️  Embedding selector disabled, every tool is offered");
    }

    let policy = SecurityPolicy::from_config(&config.security);
    let blocking = unscanned_policy_issues(&policy);
    if blocking.is_empty() {
        println!("  ✅ Security policy usable without a scanner");
    } else {
        println!("  ⚠️  No safety scanner is wired, so `ask` will refuse every message:");
        for issue in &blocking {
            println!("      - {issue}");
        }
        issues += blocking.len();
    }
    for (provider, output) in &policy.providers {
        if output.fail_mode == FailMode::Closed {
            println!("  ℹ️  Replies after `{provider}` tools fail closed without a scanner");
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
