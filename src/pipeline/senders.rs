//! Sender allowlist, parsed once from config.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    Anyone,
    Domain(String),
    Address(String),
}

/// Which senders the service will answer.
///
/// Entries are comma-separated: `*` admits everyone, `@example.com` or
/// `example.com` admits one domain (not its subdomains), anything with an
/// `@` in it admits one address. Matching ignores case and accepts senders
/// in `Name <addr>` form. A list with no entries admits nobody.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderAllowList {
    rules: Vec<Rule>,
}

impl SenderAllowList {
    pub fn parse(raw: &str) -> Self {
        let rules = raw
            .split(',')
            .filter_map(|entry| {
                let entry = entry.trim();
                if entry == "*" {
                    return Some(Rule::Anyone);
                }
                let entry = mailbox_address(entry)?;
                match entry.strip_prefix('@') {
                    Some(domain) if !domain.is_empty() => Some(Rule::Domain(domain.to_string())),
                    Some(_) => None,
                    None if entry.contains('@') => Some(Rule::Address(entry)),
                    None => Some(Rule::Domain(entry)),
                }
            })
            .collect();
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn permits(&self, sender: &str) -> bool {
        let Some(address) = mailbox_address(sender) else {
            return false;
        };
        let domain = address.rsplit_once('@').map(|(_, domain)| domain);
        self.rules.iter().any(|rule| match rule {
            Rule::Anyone => true,
            Rule::Domain(allowed) => domain == Some(allowed.as_str()),
            Rule::Address(allowed) => *allowed == address,
        })
    }
}

impl fmt::Display for SenderAllowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rules.is_empty() {
            return f.write_str("nobody");
        }
        let entries: Vec<String> = self
            .rules
            .iter()
            .map(|rule| match rule {
                Rule::Anyone => "*".to_string(),
                Rule::Domain(domain) => format!("@{domain}"),
                Rule::Address(address) => address.clone(),
            })
            .collect();
        f.write_str(&entries.join(", "))
    }
}

/// Lowercased bare address from `addr` or `Display Name <addr>`.
fn mailbox_address(value: &str) -> Option<String> {
    let value = value.trim();
    let address = match (value.rfind('<'), value.rfind('>')) {
        (Some(start), Some(end)) if start < end => &value[start + 1..end],
        _ => value,
    };
    let address = address.trim();
    (!address.is_empty()).then(|| address.to_lowercase())
}
