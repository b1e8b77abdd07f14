//! Run reports and persisted artifacts.
//!
//! [`RemediationReport`] bundles every stage result of one run. Use
//! [`ArtifactWriter`] to persist it:
//!
//! ```rust,ignore
//! use lex_remediation::reporting::ArtifactWriter;
//!
//! let mut outcome = pipeline.run(df)?;
//! let writer = ArtifactWriter::new("output");
//! let paths = writer.write("sales", &outcome.report, Some(&mut outcome.data))?;
//! println!("{}", paths.remediation_report.display());
//! ```

mod artifacts;
mod report;

pub use artifacts::{ArtifactPaths, ArtifactWriter};
pub use report::{RemediationReport, StageTiming};
