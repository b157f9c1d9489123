use std::path::PathBuf;

use clap::Parser;

use crate::driver::SyncOptions;

/// Create or update a Kobo question block from a CSV resource in a CKAN/NDX
/// dataset.
#[derive(Parser, Debug)]
#[command(author, version)]
pub struct Cli {
    /// URL to a CSV resource in a CKAN/NDX dataset
    #[arg(long)]
    pub dataset_url: String,

    /// CSV field to be used as key, e.g. ISO3
    #[arg(long)]
    pub key_field: String,

    /// CSV field to be used as value, e.g. "Countries and Territories"
    #[arg(long)]
    pub value_field: String,

    /// Reuse the cached copy of the CSV resource when present
    #[arg(long)]
    pub use_cache: bool,

    /// Label for the question block
    #[arg(long)]
    pub question_label: String,

    /// Kobo collection ID, here or in the config file
    #[arg(long)]
    pub kobo_collection_id: Option<String>,

    /// Kobo question block ID to update; leave empty to create a new one
    #[arg(long)]
    pub kobo_question_block_id: Option<String>,

    /// JSON configuration file
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Directory for the CSV cache and Kobo response dumps
    #[arg(long, default_value = ckan_kobo_core::store::DEFAULT_SAMPLE_DATA_DIR)]
    pub sample_data_dir: PathBuf,
}

impl Cli {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            dataset_url: self.dataset_url.clone(),
            key_field: self.key_field.clone(),
            value_field: self.value_field.clone(),
            use_cache: self.use_cache,
            question_label: self.question_label.clone(),
            kobo_collection_id: self.kobo_collection_id.clone(),
            kobo_question_block_id: self.kobo_question_block_id.clone(),
            sample_data_dir: self.sample_data_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_and_optional_flags() {
        let cli = Cli::try_parse_from([
            "ckan-to-kobo",
            "--dataset-url",
            "https://ndx.local/files/countries.csv",
            "--key-field",
            "ISO3",
            "--value-field",
            "Countries and Territories",
            "--question-label",
            "Country",
            "--use-cache",
            "--kobo-question-block-id",
            "bAbc",
        ])
        .unwrap();
        assert!(cli.use_cache);
        assert_eq!(cli.value_field, "Countries and Territories");
        assert_eq!(cli.kobo_question_block_id.as_deref(), Some("bAbc"));
        assert!(cli.kobo_collection_id.is_none());
        assert_eq!(cli.config, PathBuf::from("config.json"));
        assert_eq!(cli.sample_data_dir, PathBuf::from("sample-data"));
    }

    #[test]
    fn question_label_is_required() {
        let err = Cli::try_parse_from([
            "ckan-to-kobo",
            "--dataset-url",
            "u",
            "--key-field",
            "k",
            "--value-field",
            "v",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
