use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::thread;

use crate::address::AddressKey;
use crate::error::{FieldError, IdentifierCollision};
use crate::identifier::{AddressId, IdentifierAssigner};
use crate::records::TransactionRecord;

/// A record after key derivation. The typed half may have failed to parse; the
/// failure still belongs to the key so the whole group can be reported.
#[derive(Debug, Clone)]
pub struct KeyedRecord {
    pub key: AddressKey,
    pub record: Result<TransactionRecord, FieldError>,
}

/// Per-group values that are not reductions. They come from the record with
/// the greatest (transfer date, price, transaction id), which keeps the choice
/// independent of fold order.
#[derive(Debug, Clone, PartialEq)]
pub struct Representative {
    pub transfer_date: NaiveDate,
    pub price: Decimal,
    pub transaction_id: String,
    pub new_build: String,
    pub property_type: String,
    pub duration: String,
    pub ppd_category: String,
    pub record_status: String,
}

impl Representative {
    fn rank(&self) -> (NaiveDate, Decimal, &str) {
        (self.transfer_date, self.price, &self.transaction_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressAccumulator {
    pub transaction_ids: Vec<String>,
    pub max_price: Decimal,
    pub min_price: Decimal,
    pub price_total: Decimal,
    pub most_recent_transfer_date: NaiveDate,
    pub representative: Representative,
}

impl AddressAccumulator {
    pub fn unit(record: TransactionRecord) -> Self {
        Self {
            transaction_ids: vec![record.transaction_id.clone()],
            max_price: record.price,
            min_price: record.price,
            price_total: record.price,
            most_recent_transfer_date: record.transfer_date,
            representative: Representative {
                transfer_date: record.transfer_date,
                price: record.price,
                transaction_id: record.transaction_id,
                new_build: record.new_build,
                property_type: record.property_type,
                duration: record.duration,
                ppd_category: record.ppd_category,
                record_status: record.record_status,
            },
        }
    }

    /// Merges another partial result for the same key into this one. A single
    /// record is folded in as `merge(unit(record))`.
    pub fn merge(&mut self, other: AddressAccumulator) {
        self.transaction_ids.extend(other.transaction_ids);
        self.max_price = self.max_price.max(other.max_price);
        self.min_price = self.min_price.min(other.min_price);
        self.price_total += other.price_total;
        self.most_recent_transfer_date = self
            .most_recent_transfer_date
            .max(other.most_recent_transfer_date);

        if other.representative.rank() > self.representative.rank() {
            self.representative = other.representative;
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.transaction_ids.len()
    }

    pub fn mean_price(&self) -> Decimal {
        (self.price_total / Decimal::from(self.transaction_count())).round_dp(2)
    }
}

/// A group either folds cleanly or carries every error seen for its key.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupState {
    Active(AddressAccumulator),
    Failed(Vec<FieldError>),
}

impl GroupState {
    pub fn unit(record: Result<TransactionRecord, FieldError>) -> Self {
        match record {
            Ok(record) => GroupState::Active(AddressAccumulator::unit(record)),
            Err(e) => GroupState::Failed(vec![e]),
        }
    }

    pub fn merge(&mut self, other: GroupState) {
        match other {
            GroupState::Active(other) => {
                // A failed group stays failed.
                if let GroupState::Active(acc) = self {
                    acc.merge(other);
                }
            }
            GroupState::Failed(more) => match self {
                GroupState::Failed(errors) => errors.extend(more),
                GroupState::Active(_) => *self = GroupState::Failed(more),
            },
        }
    }
}

/// Groups for one partition of the input.
#[derive(Debug, Default)]
pub struct Aggregator {
    groups: HashMap<AddressKey, GroupState>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, keyed: KeyedRecord) {
        self.insert(keyed.key, GroupState::unit(keyed.record));
    }

    /// Absorbs another partition. Keys present in both are merged with `self`
    /// first, so transaction ids keep partition order.
    pub fn merge(&mut self, other: Aggregator) {
        for (key, state) in other.groups {
            self.insert(key, state);
        }
    }

    fn insert(&mut self, key: AddressKey, state: GroupState) {
        match self.groups.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().merge(state),
            Entry::Vacant(entry) => {
                entry.insert(state);
            }
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Assigns ids and splits the groups into summaries and failures, both
    /// sorted by key.
    pub fn finish(
        self,
        assigner: &mut IdentifierAssigner,
    ) -> Result<AggregateReport, IdentifierCollision> {
        let mut groups: Vec<_> = self.groups.into_iter().collect();
        groups.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut report = AggregateReport::default();
        for (key, state) in groups {
            match state {
                GroupState::Active(acc) => {
                    let address_id = assigner.assign(&key)?;
                    report.summaries.push(AddressSummary::new(key, address_id, acc));
                }
                GroupState::Failed(errors) => report.failed.push(FailedGroup { key, errors }),
            }
        }

        Ok(report)
    }
}

/// Folds each partition on its own thread, then merges the partial results in
/// partition order.
pub fn aggregate_partitioned(partitions: Vec<Vec<KeyedRecord>>) -> Aggregator {
    let partials: Vec<Aggregator> = thread::scope(|scope| {
        let handles: Vec<_> = partitions
            .into_iter()
            .enumerate()
            .map(|(index, partition)| {
                scope.spawn(move || {
                    log::debug!("worker {index}: folding {} records", partition.len());
                    let mut aggregator = Aggregator::new();
                    for keyed in partition {
                        aggregator.push(keyed);
                    }
                    aggregator
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    let mut merged = Aggregator::new();
    for (index, partial) in partials.into_iter().enumerate() {
        log::debug!("merging partition {index} ({} groups)", partial.group_count());
        merged.merge(partial);
    }
    merged
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressSummary {
    pub address_key: AddressKey,
    pub address_id: AddressId,
    pub transaction_ids: Vec<String>,
    pub transaction_count: usize,
    pub most_recent_transfer_date: NaiveDate,
    pub max_price: Decimal,
    pub min_price: Decimal,
    pub mean_price: Decimal,
    pub new_build: String,
    pub property_type: String,
    pub duration: String,
    pub ppd_category: String,
    pub record_status: String,
}

impl AddressSummary {
    fn new(address_key: AddressKey, address_id: AddressId, acc: AddressAccumulator) -> Self {
        Self {
            address_key,
            address_id,
            transaction_count: acc.transaction_count(),
            mean_price: acc.mean_price(),
            transaction_ids: acc.transaction_ids,
            most_recent_transfer_date: acc.most_recent_transfer_date,
            max_price: acc.max_price,
            min_price: acc.min_price,
            new_build: acc.representative.new_build,
            property_type: acc.representative.property_type,
            duration: acc.representative.duration,
            ppd_category: acc.representative.ppd_category,
            record_status: acc.representative.record_status,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedGroup {
    pub key: AddressKey,
    pub errors: Vec<FieldError>,
}

impl FailedGroup {
    pub fn reason(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Default)]
pub struct AggregateReport {
    pub summaries: Vec<AddressSummary>,
    pub failed: Vec<FailedGroup>,
}
