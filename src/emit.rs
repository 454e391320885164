use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

use crate::address::AddressKey;
use crate::aggregate::AddressSummary;
use crate::error::PipelineError;
use crate::identifier::AddressId;

/// Optional columns on top of the fixed summary schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputFields {
    pub mean_price: bool,
    pub duration: bool,
    pub ppd_category: bool,
    pub record_status: bool,
}

/// The serialized shape of one summary. `Ids` is a sequence for JSON and a
/// joined string for CSV, which has no nested values.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord<'a, Ids> {
    pub address_id: &'a AddressId,
    pub address_key: &'a AddressKey,
    pub transaction_ids: Ids,
    pub transaction_count: usize,
    pub most_recent_transfer_date: NaiveDate,
    pub max_price: Decimal,
    pub min_price: Decimal,
    pub new_build: &'a str,
    pub property_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ppd_category: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_status: Option<&'a str>,
}

pub fn summary_record<'a, Ids>(
    summary: &'a AddressSummary,
    fields: OutputFields,
    transaction_ids: Ids,
) -> SummaryRecord<'a, Ids> {
    SummaryRecord {
        address_id: &summary.address_id,
        address_key: &summary.address_key,
        transaction_ids,
        transaction_count: summary.transaction_count,
        most_recent_transfer_date: summary.most_recent_transfer_date,
        max_price: summary.max_price,
        min_price: summary.min_price,
        new_build: &summary.new_build,
        property_type: &summary.property_type,
        mean_price: fields.mean_price.then_some(summary.mean_price),
        duration: fields.duration.then_some(summary.duration.as_str()),
        ppd_category: fields.ppd_category.then_some(summary.ppd_category.as_str()),
        record_status: fields.record_status.then_some(summary.record_status.as_str()),
    }
}

/// Destination for finished summaries. Encoding lives behind this trait.
pub trait SummaryWriter {
    fn write_summary(&mut self, summary: &AddressSummary) -> Result<(), PipelineError>;
    fn flush(&mut self) -> Result<(), PipelineError>;
}

/// One JSON object per line.
pub struct JsonLinesWriter<W: Write> {
    writer: W,
    fields: OutputFields,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(writer: W, fields: OutputFields) -> Self {
        Self { writer, fields }
    }
}

impl<W: Write> SummaryWriter for JsonLinesWriter<W> {
    fn write_summary(&mut self, summary: &AddressSummary) -> Result<(), PipelineError> {
        let record = summary_record(summary, self.fields, summary.transaction_ids.as_slice());
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PipelineError> {
        self.writer.flush()?;
        Ok(())
    }
}

pub const CSV_ID_SEPARATOR: &str = "|";

pub struct CsvSummaryWriter<W: Write> {
    writer: csv::Writer<W>,
    fields: OutputFields,
}

impl<W: Write> CsvSummaryWriter<W> {
    pub fn new(writer: W, fields: OutputFields) -> Self {
        Self {
            writer: csv::WriterBuilder::new().from_writer(writer),
            fields,
        }
    }
}

impl<W: Write> SummaryWriter for CsvSummaryWriter<W> {
    fn write_summary(&mut self, summary: &AddressSummary) -> Result<(), PipelineError> {
        let ids = summary.transaction_ids.join(CSV_ID_SEPARATOR);
        self.writer
            .serialize(summary_record(summary, self.fields, ids))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PipelineError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddressMapRow<'a> {
    address_id: &'a AddressId,
    address_key: &'a AddressKey,
}

/// Writes the distinct `addressId,addressKey` pairs as CSV.
pub fn write_address_map<W: Write>(
    writer: W,
    summaries: &[AddressSummary],
) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for summary in summaries {
        wtr.serialize(AddressMapRow {
            address_id: &summary.address_id,
            address_key: &summary.address_key,
        })?;
    }
    wtr.flush()?;
    Ok(())
}
