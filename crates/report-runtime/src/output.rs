//! Output boundary: delivering the rendered document to every destination.

use std::path::{Path, PathBuf};

use report_core::settings::{DestinationsConfig, S3DestinationConfig};
use report_core::{ReportError, Result};
use tracing::{error, info};

/// File name of a report artifact, `cost_report_<stamp>.<extension>`.
pub fn report_file_name(stamp: &str, extension: &str) -> String {
    format!("cost_report_{}.{}", stamp, extension)
}

/// Somewhere a rendered report can be delivered.
pub trait Destination {
    /// Human-readable location, used in logs and errors.
    fn name(&self) -> String;

    fn deliver(&self, file_name: &str, document: &str) -> Result<()>;
}

// ── LocalDestination ──────────────────────────────────────────────────────────

/// Writes the report into a local directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct LocalDestination {
    directory: PathBuf,
}

impl LocalDestination {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Destination for LocalDestination {
    fn name(&self) -> String {
        self.directory.display().to_string()
    }

    fn deliver(&self, file_name: &str, document: &str) -> Result<()> {
        std::fs::create_dir_all(&self.directory)?;
        let path = self.directory.join(file_name);
        std::fs::write(&path, document)?;
        info!(path = %path.display(), "report written");
        Ok(())
    }
}

// ── Object storage ────────────────────────────────────────────────────────────

/// A configured object-storage destination with no uploader wired in.
///
/// Every delivery fails, so the run reports the missing upload instead of
/// silently dropping it.
#[derive(Debug, Clone)]
pub struct UnavailableObjectStore {
    config: S3DestinationConfig,
}

impl UnavailableObjectStore {
    pub fn new(config: S3DestinationConfig) -> Self {
        Self { config }
    }
}

impl Destination for UnavailableObjectStore {
    fn name(&self) -> String {
        match &self.config.object_key_prefix {
            Some(prefix) => format!("s3://{}/{}", self.config.bucket_name, prefix),
            None => format!("s3://{}", self.config.bucket_name),
        }
    }

    fn deliver(&self, file_name: &str, _document: &str) -> Result<()> {
        Err(ReportError::Delivery {
            destination: self.name(),
            reason: format!("no object storage uploader is registered for {}", file_name),
        })
    }
}

// ── OutputManager ─────────────────────────────────────────────────────────────

/// Delivers a document to each configured destination.
pub struct OutputManager {
    destinations: Vec<Box<dyn Destination>>,
}

impl OutputManager {
    pub fn new(destinations: Vec<Box<dyn Destination>>) -> Self {
        Self { destinations }
    }

    /// Destinations named in the configuration.
    pub fn from_config(config: &DestinationsConfig) -> Self {
        let mut destinations: Vec<Box<dyn Destination>> = Vec::new();
        if let Some(local) = &config.local {
            destinations.push(Box::new(LocalDestination::new(&local.directory)));
        }
        if let Some(s3) = &config.s3 {
            destinations.push(Box::new(UnavailableObjectStore::new(s3.clone())));
        }
        Self::new(destinations)
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Deliver to every destination.
    ///
    /// A failed delivery is logged and does not stop the others. Returns the
    /// destinations that received the document. When some failed the error is
    /// [`ReportError::PartialDelivery`] if at least one destination got the
    /// document, [`ReportError::Delivery`] otherwise.
    pub fn output(&self, file_name: &str, document: &str) -> Result<Vec<String>> {
        let mut delivered = Vec::new();
        let mut failed = Vec::new();

        for destination in &self.destinations {
            let name = destination.name();
            match destination.deliver(file_name, document) {
                Ok(()) => delivered.push(name),
                Err(e) => {
                    error!(destination = %name, error = %e, "delivery failed");
                    failed.push((name, e.to_string()));
                }
            }
        }

        if failed.is_empty() {
            return Ok(delivered);
        }
        let (names, reasons): (Vec<String>, Vec<String>) = failed.into_iter().unzip();
        let (destination, reason) = (names.join(", "), reasons.join("; "));
        if delivered.is_empty() {
            Err(ReportError::Delivery {
                destination,
                reason,
            })
        } else {
            Err(ReportError::PartialDelivery {
                delivered: delivered.join(", "),
                destination,
                reason,
            })
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use report_core::settings::LocalDestinationConfig;
    use tempfile::TempDir;

    struct FailingDestination;

    impl Destination for FailingDestination {
        fn name(&self) -> String {
            "broken".to_string()
        }

        fn deliver(&self, _file_name: &str, _document: &str) -> Result<()> {
            Err(ReportError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }
    }

    #[test]
    fn test_report_file_name() {
        assert_eq!(
            report_file_name("2024-03-15_10-00-00", "json"),
            "cost_report_2024-03-15_10-00-00.json"
        );
    }

    #[test]
    fn test_local_destination_creates_directory() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join("reports").join("nested");
        LocalDestination::new(&dir).deliver("r.json", "{}").unwrap();
        assert_eq!(std::fs::read_to_string(dir.join("r.json")).unwrap(), "{}");
    }

    #[test]
    fn test_failure_does_not_cancel_other_destinations() {
        let tmp = TempDir::new().expect("tempdir");
        let manager = OutputManager::new(vec![
            Box::new(FailingDestination),
            Box::new(LocalDestination::new(tmp.path())),
        ]);

        let err = manager.output("r.txt", "report").unwrap_err();

        assert!(tmp.path().join("r.txt").is_file());
        match err {
            ReportError::PartialDelivery {
                delivered,
                destination,
                reason,
            } => {
                assert_eq!(delivered, tmp.path().display().to_string());
                assert_eq!(destination, "broken");
                assert!(reason.contains("read-only"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_all_destinations_failing_is_delivery_error() {
        let manager = OutputManager::new(vec![
            Box::new(FailingDestination),
            Box::new(FailingDestination),
        ]);

        match manager.output("r.txt", "report").unwrap_err() {
            ReportError::Delivery { destination, .. } => {
                assert_eq!(destination, "broken, broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_config_s3_reports_failure() {
        let tmp = TempDir::new().expect("tempdir");
        let config = DestinationsConfig {
            local: Some(LocalDestinationConfig {
                directory: tmp.path().to_path_buf(),
            }),
            s3: Some(S3DestinationConfig {
                bucket_name: "reports".to_string(),
                object_key_prefix: Some("costs".to_string()),
            }),
        };
        let manager = OutputManager::from_config(&config);
        assert_eq!(manager.len(), 2);

        let err = manager.output("r.json", "{}").unwrap_err();
        assert!(matches!(err, ReportError::PartialDelivery { .. }));
        assert!(err.to_string().contains("s3://reports/costs"));
        assert!(tmp.path().join("r.json").is_file());
    }

    #[test]
    fn test_all_delivered() {
        let tmp = TempDir::new().expect("tempdir");
        let manager = OutputManager::new(vec![Box::new(LocalDestination::new(tmp.path()))]);
        let delivered = manager.output("r.json", "{}").unwrap();
        assert_eq!(delivered, vec![tmp.path().display().to_string()]);
    }
}
