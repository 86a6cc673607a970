//! `switchyard check-reply`: Diagnose a piece of model output.

use std::fmt::Write;
use switchyard_agent::{HallucinationGuard, LeakedToolCall, detect_leaked_tool_call};

pub fn run(text: &str, tools: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let guard = HallucinationGuard::new()?;
    print!("{}", render(&diagnose(&guard, text, tools)));
    Ok(())
}

#[derive(Debug, Default)]
struct Diagnosis {
    action: Option<String>,
    refusal: Option<String>,
    leak: Option<LeakedToolCall>,
}

fn diagnose(guard: &HallucinationGuard, text: &str, tools: &[String]) -> Diagnosis {
    Diagnosis {
        action: guard.detect_action_hallucination(text),
        refusal: guard.detect_tool_refusal(text, !tools.is_empty()),
        leak: detect_leaked_tool_call(text, tools),
    }
}

fn render(diagnosis: &Diagnosis) -> String {
    let mut out = String::new();
    match &diagnosis.action {
        Some(phrase) => {
            let _ = writeln!(out, "  ⚠️  Claims an action: \"{phrase}\" (verify a tool actually ran)");
        }
        None => {
            let _ = writeln!(out, "  ✅ No unverified action claims");
        }
    }
    match &diagnosis.refusal {
        Some(phrase) => {
            let _ = writeln!(out, "  ⚠️  Refuses despite available tools: \"{phrase}\"");
        }
        None => {
            let _ = writeln!(out, "  ✅ No needless refusal");
        }
    }
    match &diagnosis.leak {
        Some(leak) => {
            let _ = writeln!(out, "  🔧 Leaked tool call: {} {}", leak.tool_name, leak.parameters);
            if !leak.preamble.is_empty() {
                let _ = writeln!(out, "      preamble: {}", leak.preamble);
            }
        }
        None => {
            let _ = writeln!(out, "  ✅ No leaked tool call");
        }
    }
    out
}
