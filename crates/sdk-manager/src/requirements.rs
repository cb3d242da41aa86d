//! SDK requirement checks
//!
//! A manifest lists requirement descriptors such as `pebble-tool>=4.2`.
//! Each one names a component and a version constraint; all of them must
//! hold before anything is written to disk.

use std::cmp::Ordering;

use crate::error::{Result, SdkError};
use crate::version::VersionKey;

/// Decides whether a set of requirement descriptors is satisfied
pub trait RequirementsChecker: Send + Sync {
    fn ensure_satisfied(&self, requirements: &[String]) -> Result<()>;
}

const OPERATORS: &[&str] = &[">=", "<=", "==", ">", "<"];

/// Checks requirements against the running tool's own version
#[derive(Debug, Clone)]
pub struct ToolRequirements {
    component: String,
    version: String,
}

impl ToolRequirements {
    pub fn new(component: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            version: version.into(),
        }
    }

    fn is_satisfied(&self, requirement: &str) -> bool {
        let Some((name, op, wanted)) = split_requirement(requirement) else {
            return false;
        };
        if name != self.component {
            return false;
        }

        let ordering = VersionKey::parse(&self.version).cmp(&VersionKey::parse(wanted));
        match op {
            ">=" => ordering != Ordering::Less,
            "<=" => ordering != Ordering::Greater,
            "==" => ordering == Ordering::Equal,
            ">" => ordering == Ordering::Greater,
            "<" => ordering == Ordering::Less,
            _ => false,
        }
    }
}

impl RequirementsChecker for ToolRequirements {
    fn ensure_satisfied(&self, requirements: &[String]) -> Result<()> {
        let unmet: Vec<&str> = requirements
            .iter()
            .map(String::as_str)
            .filter(|r| !self.is_satisfied(r))
            .collect();

        if unmet.is_empty() {
            Ok(())
        } else {
            Err(SdkError::UnmetRequirements(format!(
                "{} (running {} {})",
                unmet.join(", "),
                self.component,
                self.version
            )))
        }
    }
}

fn split_requirement(requirement: &str) -> Option<(&str, &str, &str)> {
    let start = requirement.find(|c| matches!(c, '<' | '>' | '='))?;
    let rest = &requirement[start..];
    let op = *OPERATORS.iter().find(|op| rest.starts_with(**op))?;
    let name = requirement[..start].trim();
    let wanted = rest[op.len()..].trim();
    if name.is_empty() || wanted.is_empty() {
        return None;
    }
    Some((name, op, wanted))
}
