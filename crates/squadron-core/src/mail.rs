// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mail: a message pushed directly into an active agent's next prompt
//! Distinct from the Inbox, which is pull-style and drained by
//! the agent itself via a tool call.

use serde::{Deserialize, Serialize};

/// Where a piece of mail came from, carried through so the prompt builder
/// can render a readable provenance line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MailProvenance {
    IssueComment { issue_id: u64 },
    PrComment { pr_id: u64, comment_id: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mail {
    pub sender: String,
    pub body: String,
    pub provenance: MailProvenance,
    pub received_at: u64,
}

impl Mail {
    pub fn new(
        sender: impl Into<String>,
        body: impl Into<String>,
        provenance: MailProvenance,
        received_at: u64,
    ) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            provenance,
            received_at,
        }
    }

    /// Render the "Inbound Messages" section prepended to the next prompt
    /// during prompt construction.
    pub fn format_section(mail: &[Mail]) -> Option<String> {
        if mail.is_empty() {
            return None;
        }
        let mut out = String::from("## Inbound Messages\n\n");
        for m in mail {
            let source = match &m.provenance {
                MailProvenance::IssueComment { issue_id } => format!("issue #{issue_id}"),
                MailProvenance::PrComment { pr_id, .. } => format!("PR #{pr_id}"),
            };
            out.push_str(&format!("- **{}** (via {}): {}\n", m.sender, source, m.body));
        }
        Some(out)
    }
}

#[cfg(test)]
#[path = "mail_tests.rs"]
mod tests;
