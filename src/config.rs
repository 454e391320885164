use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::address::{KeyLayout, PostcodeFilter};
use crate::emit::OutputFields;
use crate::identifier::IdWidth;

const CSV_EXTENSION: &str = ".csv";

/// Roll Price Paid transactions up into one summary per address
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Input file of sixteen-field Price Paid records
    #[arg(value_parser = csv_path)]
    pub input: PathBuf,

    /// Where to write the summaries (stdout when omitted)
    #[arg(long, env = "ROLLUP_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Keep only records whose postcode starts with this prefix
    #[arg(long, env = "ROLLUP_POSTCODE_FILTER", default_value = "")]
    pub postcode_filter: String,

    /// Bits of SHA-256 used for address ids
    #[arg(long, env = "ROLLUP_ID_WIDTH", value_enum, default_value_t = IdWidthArg::Bits128)]
    pub id_width: IdWidthArg,

    #[arg(long, env = "ROLLUP_FORMAT", value_enum, default_value_t = OutputFormat::default())]
    pub format: OutputFormat,

    /// Optional summary fields, comma separated
    #[arg(long, env = "ROLLUP_EXTRA_FIELDS", value_enum, value_delimiter = ',')]
    pub extra_fields: Vec<ExtraField>,

    /// Append the postcode to the address key
    #[arg(long, env = "ROLLUP_KEY_INCLUDES_POSTCODE")]
    pub key_includes_postcode: bool,

    /// Log and count malformed lines and failed addresses instead of aborting
    #[arg(long, env = "ROLLUP_SKIP_MALFORMED")]
    pub skip_malformed: bool,

    /// Number of partitions folded in parallel
    #[arg(long, env = "ROLLUP_WORKERS", default_value = "1")]
    pub workers: NonZeroUsize,

    /// Also write the distinct addressId,addressKey pairs to this CSV file
    #[arg(long, env = "ROLLUP_ADDRESS_MAP")]
    pub address_map: Option<PathBuf>,
}

fn csv_path(value: &str) -> Result<PathBuf, String> {
    if value.ends_with(CSV_EXTENSION) {
        Ok(PathBuf::from(value))
    } else {
        Err(format!("the file must have a {CSV_EXTENSION} extension"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum IdWidthArg {
    #[value(name = "64")]
    Bits64,
    #[value(name = "128")]
    Bits128,
    #[value(name = "256")]
    Bits256,
}

impl From<IdWidthArg> for IdWidth {
    fn from(arg: IdWidthArg) -> Self {
        match arg {
            IdWidthArg::Bits64 => IdWidth::Bits64,
            IdWidthArg::Bits128 => IdWidth::Bits128,
            IdWidthArg::Bits256 => IdWidth::Bits256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExtraField {
    MeanPrice,
    Duration,
    PpdCategory,
    RecordStatus,
}

impl From<&[ExtraField]> for OutputFields {
    fn from(extras: &[ExtraField]) -> Self {
        let mut fields = OutputFields::default();
        for extra in extras {
            match extra {
                ExtraField::MeanPrice => fields.mean_price = true,
                ExtraField::Duration => fields.duration = true,
                ExtraField::PpdCategory => fields.ppd_category = true,
                ExtraField::RecordStatus => fields.record_status = true,
            }
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    #[default]
    FailFast,
    SkipAndLog,
}

/// Settings the aggregation core reads. Built from [`Args`] or directly.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub postcode_filter: PostcodeFilter,
    pub id_width: IdWidth,
    pub key_layout: KeyLayout,
    pub error_policy: ErrorPolicy,
    pub workers: NonZeroUsize,
    pub output_fields: OutputFields,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            postcode_filter: PostcodeFilter::default(),
            id_width: IdWidth::default(),
            key_layout: KeyLayout::default(),
            error_policy: ErrorPolicy::default(),
            workers: NonZeroUsize::MIN,
            output_fields: OutputFields::default(),
        }
    }
}

impl From<&Args> for PipelineConfig {
    fn from(args: &Args) -> Self {
        Self {
            postcode_filter: PostcodeFilter::new(args.postcode_filter.clone()),
            id_width: args.id_width.into(),
            key_layout: if args.key_includes_postcode {
                KeyLayout::WithPostcode
            } else {
                KeyLayout::Location
            },
            error_policy: if args.skip_malformed {
                ErrorPolicy::SkipAndLog
            } else {
                ErrorPolicy::FailFast
            },
            workers: args.workers,
            output_fields: OutputFields::from(args.extra_fields.as_slice()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_bare_invocation() {
        let args = Args::try_parse_from(["price-paid-rollup", "pp-2020.csv"]).unwrap();
        let config = PipelineConfig::from(&args);

        assert_eq!(args.format, OutputFormat::Jsonl);
        assert_eq!(args.output, None);
        assert_eq!(config.postcode_filter.prefix(), "");
        assert_eq!(config.id_width, IdWidth::Bits128);
        assert_eq!(config.key_layout, KeyLayout::Location);
        assert_eq!(config.error_policy, ErrorPolicy::FailFast);
        assert_eq!(config.workers.get(), 1);
        assert_eq!(config.output_fields, OutputFields::default());
    }

    #[test]
    fn flags_map_onto_config() {
        let args = Args::try_parse_from([
            "price-paid-rollup",
            "pp-2020.csv",
            "--postcode-filter",
            "SW1",
            "--id-width",
            "64",
            "--format",
            "csv",
            "--extra-fields",
            "mean-price,record-status",
            "--key-includes-postcode",
            "--skip-malformed",
            "--workers",
            "4",
        ])
        .unwrap();
        let config = PipelineConfig::from(&args);

        assert_eq!(args.format, OutputFormat::Csv);
        assert_eq!(config.postcode_filter.prefix(), "SW1");
        assert_eq!(config.id_width, IdWidth::Bits64);
        assert_eq!(config.key_layout, KeyLayout::WithPostcode);
        assert_eq!(config.error_policy, ErrorPolicy::SkipAndLog);
        assert_eq!(config.workers.get(), 4);
        assert!(config.output_fields.mean_price);
        assert!(config.output_fields.record_status);
        assert!(!config.output_fields.duration);
    }

    #[test]
    fn cli_enums_map_onto_core_types() {
        assert_eq!(IdWidth::from(IdWidthArg::Bits64), IdWidth::Bits64);
        assert_eq!(IdWidth::from(IdWidthArg::Bits128), IdWidth::Bits128);
        assert_eq!(IdWidth::from(IdWidthArg::Bits256), IdWidth::Bits256);

        let all = [
            ExtraField::MeanPrice,
            ExtraField::Duration,
            ExtraField::PpdCategory,
            ExtraField::RecordStatus,
        ];
        assert_eq!(
            OutputFields::from(all.as_slice()),
            OutputFields {
                mean_price: true,
                duration: true,
                ppd_category: true,
                record_status: true,
            }
        );
        assert_eq!(OutputFields::from(&[][..]), OutputFields::default());
    }

    #[test]
    fn id_width_256_accepted() {
        let args =
            Args::try_parse_from(["price-paid-rollup", "a.csv", "--id-width", "256"]).unwrap();
        assert_eq!(PipelineConfig::from(&args).id_width, IdWidth::Bits256);
        assert!(Args::try_parse_from(["price-paid-rollup", "a.csv", "--id-width", "32"]).is_err());
    }

    #[test]
    fn input_must_be_csv() {
        assert!(Args::try_parse_from(["price-paid-rollup", "pp-2020.txt"]).is_err());
    }

    #[test]
    fn zero_workers_rejected() {
        assert!(Args::try_parse_from(["price-paid-rollup", "a.csv", "--workers", "0"]).is_err());
    }
}
