//! Message sanitization so that errors differing only in volatile parts
//! (addresses, ports, timestamps) collapse into one dedup bucket.

use once_cell::sync::Lazy;
use regex::Regex;

struct Rule {
    re: Regex,
    placeholder: &'static str,
}

fn rule(pattern: &str, placeholder: &'static str) -> Rule {
    Rule {
        // Patterns are literals below; a bad one is a programming error.
        re: Regex::new(pattern).expect("invalid sanitizer pattern"),
        placeholder,
    }
}

// Order matters: socket addresses go before bare IPs.
static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule(
            r"\b\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d{1,9})?(?:Z|[+-]\d{2}:\d{2})\b",
            "<ts>",
        ),
        rule(r"\b(?:\d{1,3}\.){3}\d{1,3}:\d{1,5}\b", "<addr>"),
        rule(r"\[[0-9A-Fa-f:]+\]:\d{1,5}\b", "<addr>"),
        rule(r"\b(?:\d{1,3}\.){3}\d{1,3}\b", "<ip4>"),
        rule(r"\b(?:[A-Fa-f0-9]{1,4}:){2,7}[A-Fa-f0-9]{1,4}\b|::1\b", "<ip6>"),
        rule(r"\(os error \d+\)", "(os error)"),
    ]
});

/// Sanitizer applies the ordered rule set to a message.
pub struct Sanitizer {
    collapse_spaces: bool,
}

/// Options for customizing Sanitizer
pub struct WithCollapseSpaces(pub bool);

impl Sanitizer {
    pub fn new(opts: WithCollapseSpaces) -> Self {
        Self {
            collapse_spaces: opts.0,
        }
    }

    pub fn sanitize(&self, msg: &str) -> String {
        if msg.is_empty() {
            return String::new();
        }

        let mut result = msg.to_string();
        for rule in RULES.iter() {
            result = rule.re.replace_all(&result, rule.placeholder).into_owned();
        }

        if self.collapse_spaces {
            result = result.split_whitespace().collect::<Vec<_>>().join(" ");
        }

        result
    }
}
