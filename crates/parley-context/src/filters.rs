use parley_protocol::{OutputRule, Settings, TriggerHits};
use regex::Regex;
use tracing::{debug, error};

/// Apply display-time regex replacements in order.
///
/// A rule with an invalid pattern is logged and skipped; the rest still run.
pub fn apply_output_rules(rules: &[OutputRule], text: &str) -> String {
    let mut processed = text.to_string();
    for rule in rules {
        match Regex::new(&rule.regex) {
            Ok(re) => {
                processed = re
                    .replace_all(&processed, rule.replacement.as_str())
                    .into_owned();
            }
            Err(e) => error!(pattern = %rule.regex, error = %e, "Invalid output rule"),
        }
    }
    processed
}

/// Find background and expression triggers mentioned in a reply.
///
/// Matching is a case-insensitive substring test. The text itself is never
/// modified; callers decide what to do with the hits.
pub fn scan_triggers(settings: &Settings, text: &str) -> TriggerHits {
    let lower = text.to_lowercase();
    let mut hits = TriggerHits::default();

    for trigger in &settings.background_triggers {
        if !trigger.trigger.is_empty() && lower.contains(&trigger.trigger.to_lowercase()) {
            debug!(trigger = %trigger.trigger, url = %trigger.url, "Background trigger matched");
            hits.background = Some(trigger.url.clone());
        }
    }

    for link in &settings.expression_links {
        if !link.trigger.is_empty() && lower.contains(&link.trigger.to_lowercase()) {
            debug!(trigger = %link.trigger, action = %link.action, "Expression trigger matched");
            hits.actions.push(link.action.clone());
        }
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_protocol::{BackgroundTrigger, ExpressionLink};

    fn rule(regex: &str, replacement: &str) -> OutputRule {
        OutputRule {
            regex: regex.to_string(),
            replacement: replacement.to_string(),
        }
    }

    #[test]
    fn rules_apply_in_order() {
        let rules = vec![rule(r"\*(\w+)\*", "<$1>"), rule("<smiles>", ":)")];
        assert_eq!(apply_output_rules(&rules, "*smiles* hi *waves*"), ":) hi <waves>");
    }

    #[test]
    fn invalid_rule_is_skipped() {
        let rules = vec![rule("(unclosed", "x"), rule("cat", "dog")];
        assert_eq!(apply_output_rules(&rules, "cat (unclosed"), "dog (unclosed");
    }

    #[test]
    fn no_rules_is_identity() {
        assert_eq!(apply_output_rules(&[], "unchanged"), "unchanged");
    }

    #[test]
    fn triggers_are_case_insensitive() {
        let settings = Settings {
            background_triggers: vec![
                BackgroundTrigger {
                    trigger: "forest".to_string(),
                    url: "https://img/forest.png".to_string(),
                },
                BackgroundTrigger {
                    trigger: "castle".to_string(),
                    url: "https://img/castle.png".to_string(),
                },
            ],
            expression_links: vec![
                ExpressionLink {
                    trigger: "*laughs*".to_string(),
                    action: "laugh".to_string(),
                },
                ExpressionLink {
                    trigger: "*cries*".to_string(),
                    action: "cry".to_string(),
                },
            ],
            ..Settings::default()
        };

        let hits = scan_triggers(&settings, "We reach the FOREST and the Castle. *Laughs*");
        assert_eq!(hits.background.as_deref(), Some("https://img/castle.png"));
        assert_eq!(hits.actions, vec!["laugh".to_string()]);

        assert!(scan_triggers(&settings, "nothing here").is_empty());
    }

    #[test]
    fn empty_trigger_never_matches() {
        let settings = Settings {
            expression_links: vec![ExpressionLink {
                trigger: String::new(),
                action: "idle".to_string(),
            }],
            ..Settings::default()
        };
        assert!(scan_triggers(&settings, "anything").is_empty());
    }
}
