use parley_protocol::Node;

use crate::ProviderError;

/// Whether a failed attempt on `node` should hand off to the next node.
///
/// Timeouts, network failures and triggered statuses always advance. Any
/// other failure ends the sequence with that error.
pub fn should_advance(node: &Node, error: &ProviderError) -> bool {
    match error {
        ProviderError::Timeout
        | ProviderError::TriggeredStatus { .. }
        | ProviderError::Network(_) => true,
        ProviderError::Api { status, .. } => node.triggers.matches(*status),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_protocol::TriggerRules;

    fn node() -> Node {
        Node {
            triggers: TriggerRules::new([429, 503], 5_000),
            ..Node::default()
        }
    }

    #[test]
    fn transient_failures_advance() {
        let node = node();
        assert!(should_advance(&node, &ProviderError::Timeout));
        assert!(should_advance(&node, &ProviderError::Network("refused".into())));
        assert!(should_advance(&node, &ProviderError::TriggeredStatus { status: 429 }));
    }

    #[test]
    fn api_status_advances_only_when_listed() {
        let node = node();
        let listed = ProviderError::Api {
            status: 503,
            message: String::new(),
        };
        let unlisted = ProviderError::Api {
            status: 400,
            message: "bad request".into(),
        };
        assert!(should_advance(&node, &listed));
        assert!(!should_advance(&node, &unlisted));
    }

    #[test]
    fn everything_else_is_terminal() {
        let node = node();
        assert!(!should_advance(&node, &ProviderError::MalformedResponse("x".into())));
        assert!(!should_advance(&node, &ProviderError::NotConfigured("x".into())));
        assert!(!should_advance(&node, &ProviderError::AllNodesFailed));
    }
}
