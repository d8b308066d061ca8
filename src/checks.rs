//! Instruction checks: exact member targets matched one instruction at a time.

use serde::{Deserialize, Serialize};

use crate::bytecode::Instruction;
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Method,
    Field,
}

/// A member reference to match. `descriptor: None` matches every overload of
/// the exact owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberTarget {
    pub kind: TargetKind,
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub descriptor: Option<String>,
}

impl MemberTarget {
    pub fn method(owner: &str, name: &str, descriptor: Option<&str>) -> Self {
        Self {
            kind: TargetKind::Method,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.map(str::to_string),
        }
    }

    pub fn field(owner: &str, name: &str, descriptor: Option<&str>) -> Self {
        Self {
            kind: TargetKind::Field,
            ..Self::method(owner, name, descriptor)
        }
    }

    pub fn matches(&self, instruction: &Instruction) -> bool {
        let kind_ok = match self.kind {
            TargetKind::Method => instruction.is_invoke(),
            TargetKind::Field => instruction.is_field_access(),
        };
        if !kind_ok {
            return false;
        }
        let Some(member) = instruction.member() else {
            return false;
        };
        member.owner == self.owner
            && member.name == self.name
            && self
                .descriptor
                .as_deref()
                .is_none_or(|d| d == member.descriptor)
    }
}

/// Where an instruction lives.
#[derive(Debug, Clone, Copy)]
pub struct Site<'a> {
    pub class_name: &'a str,
    /// Method name followed by its descriptor, e.g. `onEnable()V`.
    pub method: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule_id: String,
    pub class_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Check {
    pub id: String,
    pub target: MemberTarget,
    pub severity: Severity,
    pub message: String,
}

impl Check {
    pub fn new(id: &str, target: MemberTarget, severity: Severity, message: &str) -> Self {
        Self {
            id: id.to_string(),
            target,
            severity,
            message: message.to_string(),
        }
    }

    pub fn matches(&self, site: &Site<'_>, instruction: &Instruction) -> Option<Finding> {
        if !self.target.matches(instruction) {
            return None;
        }
        Some(Finding {
            rule_id: self.id.clone(),
            class_name: site.class_name.to_string(),
            method: site.method.map(str::to_string),
            offset: Some(instruction.offset),
            message: self.message.clone(),
            severity: self.severity,
        })
    }
}

/// Ordered, append-only set of checks. Once built it is only read, so a
/// shared reference can be handed to any number of scanning threads.
#[derive(Debug, Clone, Default)]
pub struct CheckRegistry {
    checks: Vec<Check>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for descriptor in ["(J)V", "(JI)V"] {
            registry.push(Check::new(
                "thread-sleep",
                MemberTarget::method("java/lang/Thread", "sleep", Some(descriptor)),
                Severity::Medium,
                "Thread.sleep blocks the calling thread; on the main thread this stalls the server",
            ));
        }
        for owner in [
            "org/bukkit/entity/Player",
            "org/bukkit/OfflinePlayer",
            "org/bukkit/permissions/ServerOperator",
        ] {
            registry.push(Check::new(
                "set-op",
                MemberTarget::method(owner, "setOp", Some("(Z)V")),
                Severity::High,
                "grants or revokes operator status",
            ));
        }
        registry.push(Check::new(
            "open-connection",
            MemberTarget::method(
                "java/net/URL",
                "openConnection",
                Some("()Ljava/net/URLConnection;"),
            ),
            Severity::Medium,
            "opens a raw URL connection",
        ));
        registry.push(Check::new(
            "raw-socket",
            MemberTarget::method("java/net/Socket", "<init>", Some("(Ljava/lang/String;I)V")),
            Severity::Medium,
            "opens a raw TCP socket",
        ));
        registry.push(Check::new(
            "runtime-exec",
            MemberTarget::method(
                "java/lang/Runtime",
                "exec",
                Some("(Ljava/lang/String;)Ljava/lang/Process;"),
            ),
            Severity::High,
            "spawns an external process",
        ));
        registry
    }

    /// Built-in checks (unless disabled) followed by the configured ones.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = if config.builtin_checks {
            Self::builtin()
        } else {
            Self::new()
        };
        for check in &config.checks {
            registry.push(check.clone());
        }
        registry
    }

    pub fn push(&mut self, check: Check) {
        self.checks.push(check);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check against one instruction, appending in registry order.
    pub fn evaluate(&self, site: &Site<'_>, instruction: &Instruction, out: &mut Vec<Finding>) {
        out.extend(self.checks.iter().filter_map(|c| c.matches(site, instruction)));
    }
}
