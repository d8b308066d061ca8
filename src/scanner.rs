//! Drives the class decoder and the check registry across an archive.
//!
//! Class entries are decoded in parallel, a chunk at a time, and merged back
//! in entry order. Within a class, findings follow method order, then
//! instruction order, then registry order, so the report is identical
//! regardless of how many workers ran.

use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, warn};

use crate::archive::{Archive, ArchiveEntry};
use crate::cancel::CancelToken;
use crate::checks::{CheckRegistry, Finding, Site};
use crate::classfile;
use crate::config::ScanBudget;
use crate::error::ClassParseFailure;

/// Entries decoded between two budget checks.
const CHUNK_SIZE: usize = 256;

const CODELESS_CLASSES: [&str; 2] = ["module-info.class", "package-info.class"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub findings: Vec<Finding>,
    pub failures: Vec<ClassParseFailure>,
    pub classes_scanned: usize,
    pub instructions_scanned: u64,
    /// Set when the instruction or time budget cut the scan short.
    pub partial: bool,
}

enum Outcome {
    /// Findings tagged with the ordinal of the instruction that produced them.
    Scanned {
        findings: Vec<(u64, Finding)>,
        instructions: u64,
    },
    Failed(ClassParseFailure),
    Interrupted,
}

pub fn is_scannable(entry: &ArchiveEntry) -> bool {
    if !entry.is_class() {
        return false;
    }
    let file_name = entry.name.rsplit('/').next().unwrap_or(&entry.name);
    !CODELESS_CLASSES.contains(&file_name)
}

fn scan_entry(archive: &Archive, entry: &ArchiveEntry, registry: &CheckRegistry) -> Outcome {
    let bytes = match archive.read(entry) {
        Ok(bytes) => bytes,
        Err(e) => return Outcome::Failed(ClassParseFailure::new(&entry.name, e.to_string())),
    };
    let class = match classfile::decode(&bytes) {
        Ok(class) => class,
        Err(e) => return Outcome::Failed(e.into_failure(&entry.name)),
    };

    let mut findings = Vec::new();
    let mut scratch = Vec::new();
    let mut ordinal = 0u64;
    for method in &class.methods {
        let signature = format!("{}{}", method.name, method.descriptor);
        let site = Site {
            class_name: &class.name,
            method: Some(&signature),
        };
        for instruction in &method.instructions {
            registry.evaluate(&site, instruction, &mut scratch);
            findings.extend(scratch.drain(..).map(|f| (ordinal, f)));
            ordinal += 1;
        }
    }

    Outcome::Scanned {
        findings,
        instructions: ordinal,
    }
}

/// Scan every class entry of `archive` against `registry`.
///
/// Runs on the current rayon pool. Never fails: unreadable classes become
/// [`ClassParseFailure`]s, and exhausting `budget` or observing `cancel`
/// truncates the report and sets `partial`.
pub fn scan(
    archive: &Archive,
    registry: &CheckRegistry,
    budget: ScanBudget,
    cancel: &CancelToken,
) -> ScanReport {
    let deadline = Instant::now().checked_add(budget.max_duration);
    let interrupted = || cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d);

    let candidates: Vec<&ArchiveEntry> = archive.entries().filter(|e| is_scannable(e)).collect();
    let mut report = ScanReport::default();

    'chunks: for chunk in candidates.chunks(CHUNK_SIZE) {
        let outcomes: Vec<Outcome> = chunk
            .par_iter()
            .map(|entry| {
                if interrupted() {
                    return Outcome::Interrupted;
                }
                scan_entry(archive, entry, registry)
            })
            .collect();

        for (entry, outcome) in chunk.iter().zip(outcomes) {
            match outcome {
                Outcome::Interrupted => {
                    report.partial = true;
                    break 'chunks;
                }
                Outcome::Failed(failure) => {
                    warn!(entry = %entry.name, reason = %failure.reason, "class parse failure");
                    report.failures.push(failure);
                }
                Outcome::Scanned {
                    findings,
                    instructions,
                } => {
                    let remaining = budget.max_instructions - report.instructions_scanned;
                    if instructions > remaining {
                        report.findings.extend(
                            findings
                                .into_iter()
                                .filter(|(n, _)| *n < remaining)
                                .map(|(_, f)| f),
                        );
                        if remaining > 0 {
                            report.classes_scanned += 1;
                        }
                        report.instructions_scanned += remaining;
                        report.partial = true;
                        break 'chunks;
                    }
                    debug!(entry = %entry.name, instructions, findings = findings.len(), "class scanned");
                    report.findings.extend(findings.into_iter().map(|(_, f)| f));
                    report.instructions_scanned += instructions;
                    report.classes_scanned += 1;
                }
            }
        }
    }

    if report.partial {
        warn!(
            classes = report.classes_scanned,
            instructions = report.instructions_scanned,
            "scan budget exhausted, report is partial"
        );
    }
    report
}
