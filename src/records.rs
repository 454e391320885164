use chrono::NaiveDate;
use rust_decimal::Decimal;
use csv::ByteRecord;
use std::io::Read;

use crate::address::Location;
use crate::error::{FieldError, MalformedRecordError};

pub const FIELD_COUNT: usize = 16;
const DELIMITER: char = ',';

/// One sixteen-field line, split but not yet typed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    pub line_number: usize,
    pub transaction_id: String,
    pub price: String,
    pub transfer_date: String,
    pub postcode: String,
    pub property_type: String,
    pub new_build: String,
    pub duration: String,
    pub location: Location,
    pub ppd_category: String,
    pub record_status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub price: Decimal,
    pub transfer_date: NaiveDate,
    pub postcode: String,
    pub property_type: String,
    pub new_build: String,
    pub duration: String,
    pub location: Location,
    pub ppd_category: String,
    pub record_status: String,
}

/// Reader settings for headerless Price Paid files. Rows are read flexibly so
/// a wrong field count surfaces as a [`MalformedRecordError`] rather than a
/// reader error.
pub fn configured_csv_reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All);
    builder
}

/// Drops delimiters that were carried inside a quoted field, so the joined
/// address never contains one.
fn normalize_field(field: &str) -> String {
    field.replace(DELIMITER, "")
}

fn raw_line(record: &ByteRecord) -> String {
    record
        .iter()
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(",")
}

/// Converts one CSV row into its sixteen fields.
pub fn parse_record(record: &ByteRecord) -> Result<RawRecord, MalformedRecordError> {
    let line_number = record
        .position()
        .map_or(0, |position| position.line() as usize);

    let fields = record
        .iter()
        .enumerate()
        .map(|(index, bytes)| {
            std::str::from_utf8(bytes)
                .map(normalize_field)
                .map_err(|_| MalformedRecordError::InvalidUtf8 {
                    line_number,
                    field: index + 1,
                    raw: raw_line(record),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let [transaction_id, price, transfer_date, postcode, property_type, new_build, duration, paon, saon, street, locality, city, district, county, ppd_category, record_status] =
        <[String; FIELD_COUNT]>::try_from(fields).map_err(|fields| {
            MalformedRecordError::FieldCount {
                line_number,
                expected: FIELD_COUNT,
                found: fields.len(),
                raw: raw_line(record),
            }
        })?;

    Ok(RawRecord {
        line_number,
        transaction_id: transaction_id
            .trim_matches(|c| c == '{' || c == '}')
            .to_owned(),
        price,
        transfer_date,
        postcode,
        property_type,
        new_build,
        duration,
        location: Location {
            paon,
            saon,
            street,
            locality,
            city,
            district,
            county,
        },
        ppd_category,
        record_status,
    })
}

impl RawRecord {
    pub fn into_transaction(self) -> Result<TransactionRecord, FieldError> {
        let price = parse_price(&self)?;
        let transfer_date = parse_transfer_date(&self)?;

        Ok(TransactionRecord {
            transaction_id: self.transaction_id,
            price,
            transfer_date,
            postcode: self.postcode,
            property_type: self.property_type,
            new_build: self.new_build,
            duration: self.duration,
            location: self.location,
            ppd_category: self.ppd_category,
            record_status: self.record_status,
        })
    }
}

fn parse_price(record: &RawRecord) -> Result<Decimal, FieldError> {
    record
        .price
        .trim()
        .parse::<Decimal>()
        .map_err(|e| FieldError::Price {
            line_number: record.line_number,
            transaction_id: record.transaction_id.clone(),
            value: record.price.clone(),
            reason: e.to_string(),
        })
}

// Dates arrive as `2020-01-01 00:00`; the time part is always midnight.
fn parse_transfer_date(record: &RawRecord) -> Result<NaiveDate, FieldError> {
    let value = record.transfer_date.trim();
    let date_part = value.split([' ', 'T']).next().unwrap_or_default();

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| FieldError::TransferDate {
        line_number: record.line_number,
        transaction_id: record.transaction_id.clone(),
        value: record.transfer_date.clone(),
        reason: e.to_string(),
    })
}

/// Streams split records from a headerless CSV source. Rows are read as bytes
/// so a bad encoding only costs its own row.
pub struct RecordReader<R> {
    reader: csv::Reader<R>,
    record: ByteRecord,
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: configured_csv_reader_builder().from_reader(reader),
            record: ByteRecord::new(),
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Result<RawRecord, MalformedRecordError>, csv::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.read_byte_record(&mut self.record) {
                Ok(false) => return None,
                Ok(true) => {}
                Err(e) => return Some(Err(e)),
            }

            // Whitespace-only rows trim down to a single empty field.
            if self.record.len() == 1 && self.record[0].is_empty() {
                continue;
            }

            return Some(Ok(parse_record(&self.record)));
        }
    }
}

pub fn read_records<R: Read>(reader: R) -> RecordReader<R> {
    RecordReader::new(reader)
}
