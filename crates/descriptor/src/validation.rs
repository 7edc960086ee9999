//! Which messages need generated validation code
//!
//! A message needs validation when one of its fields carries a rule, or
//! when a message-typed field refers to a message that does. The message
//! graph may be cyclic, so every (declaring message, referenced type) pair
//! is visited at most once per run: a provisional `false` is recorded
//! before descending and overwritten with `true` once a rule is found.

use crate::registry::Registry;
use crate::types::MessageId;
use prost_types::field_descriptor_proto::Type;
use std::collections::HashMap;
use tracing::trace;

/// Memoized rule analysis for one generator run
#[derive(Debug, Default)]
pub struct RuleAnalyzer {
    /// (declaring message, `package:type_name`) → has rule
    checked: HashMap<(MessageId, String), bool>,
}

impl RuleAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `message` or any message reachable through its fields
    /// carries a validation rule
    pub fn has_rule(&mut self, reg: &Registry, message: MessageId) -> bool {
        let msg = reg.message(message);
        for field in &msg.fields {
            if field.has_rule() {
                return true;
            }
            if field.r#type != Type::Message {
                continue;
            }

            let key = (message, format!("{}:{}", msg.package, field.type_name));
            if let Some(&cached) = self.checked.get(&key) {
                if cached {
                    return true;
                }
                continue;
            }

            self.checked.insert(key.clone(), false);
            let Ok(referenced) = reg.lookup_message(&msg.package, &field.type_name) else {
                trace!(type_name = %field.type_name, "unresolved type counts as no rule");
                continue;
            };
            if referenced != message && self.has_rule(reg, referenced) {
                self.checked.insert(key, true);
                return true;
            }
        }

        false
    }

    /// Number of memoized (message, type) pairs
    pub fn len(&self) -> usize {
        self.checked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checked.is_empty()
    }
}
