use std::io::Read;

use crate::address::AddressKey;
use crate::aggregate::{aggregate_partitioned, AddressSummary, Aggregator, KeyedRecord};
use crate::config::{ErrorPolicy, PipelineConfig};
use crate::emit::SummaryWriter;
use crate::error::PipelineError;
use crate::identifier::IdentifierAssigner;
use crate::records::{read_records, RecordReader};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// Well-formed records, before filtering.
    pub records_read: usize,
    pub filtered_out: usize,
    pub skipped_malformed: usize,
    pub groups_emitted: usize,
    pub groups_failed: usize,
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub summaries: Vec<AddressSummary>,
    pub stats: RunStats,
}

/// Parses, filters and keys records as they are read, applying the error
/// policy to malformed lines.
struct KeyedRecords<'a, R> {
    records: RecordReader<R>,
    config: &'a PipelineConfig,
    stats: &'a mut RunStats,
}

impl<R: Read> Iterator for KeyedRecords<'_, R> {
    type Item = Result<KeyedRecord, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = match self.records.next()? {
                Err(e) => return Some(Err(e.into())),
                Ok(Ok(raw)) => raw,
                Ok(Err(malformed)) => match self.config.error_policy {
                    ErrorPolicy::FailFast => return Some(Err(malformed.into())),
                    ErrorPolicy::SkipAndLog => {
                        log::warn!("skipping {malformed}: {:?}", malformed.raw());
                        self.stats.skipped_malformed += 1;
                        continue;
                    }
                },
            };
            self.stats.records_read += 1;

            if !self.config.postcode_filter.accepts(&raw.postcode) {
                self.stats.filtered_out += 1;
                continue;
            }

            let key = AddressKey::build(&raw.location, &raw.postcode, self.config.key_layout);
            return Some(Ok(KeyedRecord {
                key,
                record: raw.into_transaction(),
            }));
        }
    }
}

/// Splits records into contiguous runs, one per worker, keeping input order.
fn partition(records: Vec<KeyedRecord>, workers: usize) -> Vec<Vec<KeyedRecord>> {
    let chunk_size = records.len().div_ceil(workers).max(1);
    let mut records = records.into_iter().peekable();
    let mut partitions = Vec::with_capacity(workers);

    while records.peek().is_some() {
        partitions.push(records.by_ref().take(chunk_size).collect());
    }

    partitions
}

pub fn run<R: Read>(reader: R, config: &PipelineConfig) -> Result<PipelineOutput, PipelineError> {
    run_with_assigner(reader, config, IdentifierAssigner::new(config.id_width))
}

fn run_with_assigner<R: Read>(
    reader: R,
    config: &PipelineConfig,
    mut assigner: IdentifierAssigner,
) -> Result<PipelineOutput, PipelineError> {
    let mut stats = RunStats::default();
    let keyed = KeyedRecords {
        records: read_records(reader),
        config,
        stats: &mut stats,
    };

    let workers = config.workers.get();
    let aggregator = if workers == 1 {
        let mut aggregator = Aggregator::new();
        for record in keyed {
            aggregator.push(record?);
        }
        aggregator
    } else {
        let records = keyed.collect::<Result<Vec<_>, _>>()?;
        aggregate_partitioned(partition(records, workers))
    };

    let report = aggregator.finish(&mut assigner)?;

    if let Some(first) = report.failed.first() {
        match config.error_policy {
            ErrorPolicy::FailFast => {
                return Err(PipelineError::FailedGroups {
                    count: report.failed.len(),
                    first_key: first.key.clone(),
                    reason: first.reason(),
                })
            }
            ErrorPolicy::SkipAndLog => {
                for group in &report.failed {
                    log::warn!("dropping address {:?}: {}", group.key.as_str(), group.reason());
                }
            }
        }
    }

    stats.groups_emitted = report.summaries.len();
    stats.groups_failed = report.failed.len();
    log::info!(
        "read {} records ({} filtered out, {} malformed skipped); {} addresses summarised with {} ids, {} failed",
        stats.records_read,
        stats.filtered_out,
        stats.skipped_malformed,
        stats.groups_emitted,
        assigner.assigned_count(),
        stats.groups_failed,
    );

    Ok(PipelineOutput {
        summaries: report.summaries,
        stats,
    })
}

pub fn emit(summaries: &[AddressSummary], writer: &mut dyn SummaryWriter) -> Result<(), PipelineError> {
    for summary in summaries {
        writer.write_summary(summary)?;
    }
    writer.flush()
}
