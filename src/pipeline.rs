// src/pipeline.rs

//! Runs the stages in order for one pair of trade documents:
//! extract → project → post-process → type-fix.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{Instrument, info, warn};

use crate::config::Config;
use crate::error::{PipelineError, require_file};
use crate::extraction::{DocumentExtractor, save_extraction};
use crate::postprocess::postprocess;
use crate::projector::project;
use crate::serial_store::SerialStore;
use crate::typefix::fix_text_columns;

/// Hex characters kept from the job hash.
const JOB_ID_LEN: usize = 16;

static RUNS_STARTED: AtomicU64 = AtomicU64::new(0);

/// Short unique name for one run's working and output directories.
pub fn job_id(inputs: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.update(OffsetDateTime::now_utc().unix_timestamp_nanos().to_le_bytes());
    hasher.update(RUNS_STARTED.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..JOB_ID_LEN].to_string()
}

pub struct Pipeline<E> {
    config: Config,
    extractor: E,
}

impl<E> Pipeline<E> {
    pub fn new(config: Config, extractor: E) -> Self {
        Self { config, extractor }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn open_serials(&self) -> Result<SerialStore, PipelineError> {
        let legacy = self.config.legacy_serial_file();
        SerialStore::open(self.config.serial_db(), Some(&legacy))
    }

    /// Stages 2-4 from an existing extraction JSON.
    pub fn run_from_json(&self, json: &Path, serial: Option<u64>) -> Result<PathBuf, PipelineError> {
        require_file("Extraction JSON", json)?;
        let bytes = fs::read(json).map_err(|e| PipelineError::io(json, e))?;
        let job = job_id(&[bytes.as_slice()]);

        let span = tracing::info_span!("job", id = %job);
        let _guard = span.enter();
        self.finish(json, &job, serial)
    }

    fn finish(&self, json: &Path, job: &str, serial: Option<u64>) -> Result<PathBuf, PipelineError> {
        let output_dir = self.config.output_dir().join(job);
        let mut serials = self.open_serials()?;

        let result = project(json, &self.config.template(), &output_dir, &mut serials, serial)
            .and_then(|populated| {
                postprocess(
                    &populated,
                    &self.config.customer_reference(),
                    &self.config.hs_reference(),
                    &self.config.postprocess,
                )
            })
            .and_then(|processed| fix_text_columns(&processed));

        match result {
            Ok(path) => {
                info!(output = %path.display(), "Pipeline finished");
                Ok(path)
            }
            Err(e) => {
                if output_dir.exists() {
                    if let Err(cleanup) = fs::remove_dir_all(&output_dir) {
                        warn!(dir = %output_dir.display(), error = %cleanup, "Could not remove partial output");
                    }
                }
                Err(e)
            }
        }
    }
}

impl<E: DocumentExtractor> Pipeline<E> {
    /// Full run from the invoice and packing list PDFs. Returns the finished
    /// workbook; any stage failure aborts the run.
    pub async fn run(
        &self,
        invoice: &Path,
        packing: &Path,
        serial: Option<u64>,
    ) -> Result<PathBuf, PipelineError> {
        require_file("Invoice PDF", invoice)?;
        require_file("Packing list PDF", packing)?;

        let invoice_bytes = fs::read(invoice).map_err(|e| PipelineError::io(invoice, e))?;
        let packing_bytes = fs::read(packing).map_err(|e| PipelineError::io(packing, e))?;
        let job = job_id(&[invoice_bytes.as_slice(), packing_bytes.as_slice()]);

        let span = tracing::info_span!("job", id = %job);
        async {
            let job_dir = self.config.work_dir().join(&job);
            fs::create_dir_all(&job_dir).map_err(|e| PipelineError::io(&job_dir, e))?;
            let invoice_copy = stage_input(&job_dir, "invoice", invoice, &invoice_bytes)?;
            let packing_copy = stage_input(&job_dir, "packing_list", packing, &packing_bytes)?;
            info!(dir = %job_dir.display(), "Inputs staged");

            let doc = self.extractor.extract(&invoice_copy, &packing_copy).await?;
            let json_path = save_extraction(&doc, &job_dir)?;

            self.finish(&json_path, &job, serial)
        }
        .instrument(span)
        .await
    }
}

/// Copy an input into the job directory, keeping its file name when it has one.
fn stage_input(
    job_dir: &Path,
    fallback_stem: &str,
    source: &Path,
    bytes: &[u8],
) -> Result<PathBuf, PipelineError> {
    let name = source
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| format!("{fallback_stem}.pdf").into());
    let target = job_dir.join(name);
    fs::write(&target, bytes).map_err(|e| PipelineError::io(&target, e))?;
    Ok(target)
}
