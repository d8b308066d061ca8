//! # plugin-intake
//!
//! Metadata extraction and static bytecode screening for uploaded plugin jars.
//!
//! ## Architecture
//!
//! - **archive**: Bounded zip/jar access with one level of nesting
//! - **classfile**: JVM class-file decoding (constant pool, methods, annotations)
//! - **bytecode**: Instruction stream decoding with resolved operands
//! - **checks**: Exact-member instruction checks and their registry
//! - **scanner**: Parallel, deterministic scan of every class entry
//! - **platform**: Supported platforms and their metadata locators
//! - **descriptor**: Descriptor schemas (`plugin.yml`, `bungee.yml`, `velocity-plugin.json`, `@Plugin`)
//! - **metadata**: Metadata model and cross-platform assembly
//! - **cancel**: Cooperative cancellation with an optional deadline
//! - **config**: TOML configuration and lookup
//! - **error**: Typed failures with stable codes

pub mod archive;
pub mod bytecode;
pub mod cancel;
pub mod checks;
pub mod classfile;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod metadata;
pub mod platform;
pub mod scanner;

#[cfg(test)]
pub(crate) mod testing;

use anyhow::Context;
use regex::Regex;
use serde::Serialize;
use tracing::{Span, debug, info, info_span};

pub use archive::{Archive, ArchiveSource, ArchiveSummary};
pub use cancel::CancelToken;
pub use checks::{Check, CheckRegistry, Finding, Severity};
pub use config::Config;
pub use error::{ArchiveError, ClassParseFailure, InspectError, MetaError};
pub use metadata::{PlatformMetadata, PluginDependency, PluginMetadata};
pub use platform::Platform;
pub use scanner::ScanReport;

/// Everything learned about one upload.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub correlation_id: String,
    pub archive: ArchiveSummary,
    pub metadata: PluginMetadata,
    pub scan: ScanReport,
}

/// Long-lived, immutable inspection context: the check registry, platform
/// locators and optional worker pool are built once from a [`Config`] and
/// shared by every invocation.
pub struct Inspector {
    config: Config,
    registry: CheckRegistry,
    locators: Vec<platform::Locator>,
    version_rule: Regex,
    pool: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for Inspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspector")
            .field("checks", &self.registry.len())
            .field("locators", &self.locators)
            .field("dedicated_pool", &self.pool.is_some())
            .finish()
    }
}

impl Inspector {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let version_rule = Regex::new(&config.metadata.version_pattern).with_context(|| {
            format!(
                "Invalid metadata.version_pattern: {}",
                config.metadata.version_pattern
            )
        })?;

        let pool = match config.scan.threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("plugin-intake-{i}"))
                    .build()
                    .context("Failed to build scan worker pool")?,
            ),
            None => None,
        };

        Ok(Self {
            registry: CheckRegistry::from_config(&config),
            locators: platform::locators(&config.platforms),
            version_rule,
            pool,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    pub fn open(&self, source: impl Into<ArchiveSource>) -> Result<Archive, ArchiveError> {
        Archive::open(source, self.config.limits)
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Locate every platform's descriptor and assemble the plugin metadata.
    pub fn extract_metadata(
        &self,
        archive: &Archive,
        cancel: &CancelToken,
    ) -> Result<PluginMetadata, MetaError> {
        self.install(|| {
            let found = platform::locate_all(archive, &self.locators, &self.version_rule, cancel)?;
            debug!(platforms = found.len(), "platform metadata located");
            metadata::assemble(found)
        })
    }

    /// Scan the archive's classes with the configured checks and budget.
    pub fn scan(&self, archive: &Archive, cancel: &CancelToken) -> ScanReport {
        self.install(|| scanner::scan(archive, &self.registry, self.config.scan.budget(), cancel))
    }

    /// Open `source`, extract its metadata and scan it, concurrently.
    ///
    /// Metadata failures reject the whole inspection; scan problems are
    /// reported inside [`ScanReport`]. If `cancel` fires, whatever was
    /// computed is dropped and [`InspectError::Cancelled`] is returned.
    pub fn inspect(
        &self,
        source: impl Into<ArchiveSource>,
        correlation_id: &str,
        cancel: &CancelToken,
    ) -> Result<Inspection, InspectError> {
        let span = info_span!("inspect", correlation_id = %correlation_id);
        let _entered = span.enter();

        if cancel.is_cancelled() {
            return Err(InspectError::Cancelled);
        }
        let archive = self.open(source)?;
        debug!(
            entries = archive.len(),
            sha256 = %archive.fingerprint(),
            "archive opened"
        );

        let current = Span::current();
        let (metadata, scan) = self.install(|| {
            rayon::join(
                || current.in_scope(|| self.extract_metadata(&archive, cancel)),
                || current.in_scope(|| self.scan(&archive, cancel)),
            )
        });

        if cancel.is_cancelled() {
            info!("inspection cancelled");
            return Err(InspectError::Cancelled);
        }
        let metadata = metadata?;

        info!(
            name = %metadata.name,
            version = %metadata.version,
            platforms = metadata.platforms.len(),
            findings = scan.findings.len(),
            failures = scan.failures.len(),
            partial = scan.partial,
            "inspection complete"
        );

        Ok(Inspection {
            correlation_id: correlation_id.to_string(),
            archive: archive.summary().clone(),
            metadata,
            scan,
        })
    }
}
