//! `rivet classify`: Show how an error message would be classified.

use rivet_agent::classify_message;

fn report(message: &str) -> String {
    let code = classify_message(Some(message));
    let handling = if code.is_transient() {
        "retried with backoff"
    } else if code.is_context_overflow() {
        "compaction, then one retry"
    } else {
        "fatal for the turn"
    };
    format!("{code}\n   handling: {handling}")
}

pub fn run(message: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", report(message));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_names_code_and_handling() {
        let out = report("Rate limit exceeded, slow down");
        assert!(out.starts_with("llm.rate_limit"));
        assert!(out.contains("retried with backoff"));

        let out = report("prompt exceeds maximum context length");
        assert!(out.starts_with("llm.context.length_exceeded"));

        assert!(report("something odd").contains("fatal"));
    }
}
