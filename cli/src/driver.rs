//! One sync run: resolve ids, confirm, fetch, preview, push to Kobo.
//!
//! User-facing progress goes to the `out` writer; diagnostics go through
//! `tracing`. Nothing here installs a subscriber or touches the terminal
//! directly, so a run can be driven entirely from tests.

use std::io::Write;
use std::path::PathBuf;

use ckan_kobo_core::{
    fetch_choice_map, Choice, ChoiceMap, DiagnosticStore, KoboApi, KoboClient, QuestionSpec,
    SyncError, Transport,
};
use tracing::info;

use crate::config::{optional, AppConfig};
use crate::confirm::Confirm;

/// Entries shown at each end of the preview.
const PREVIEW_EDGE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub dataset_url: String,
    pub key_field: String,
    pub value_field: String,
    pub use_cache: bool,
    pub question_label: String,
    pub kobo_collection_id: Option<String>,
    pub kobo_question_block_id: Option<String>,
    pub sample_data_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The resource had no rows; Kobo was not contacted.
    Empty,
    Created { uid: String },
    Updated { uid: String },
}

/// Where the run is heading once flags and config are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub collection_id: String,
    pub question_block_id: Option<String>,
}

/// Flags win over the config file unless blank. The collection id is
/// mandatory, the block id selects update (present) or create (absent).
pub fn resolve_target(options: &SyncOptions, config: &AppConfig) -> Result<Target, SyncError> {
    let collection_id = optional(options.kobo_collection_id.clone())
        .or_else(|| config.kobo_collection_id.clone())
        .ok_or_else(|| SyncError::missing_config("kobo_collection_id"))?;
    let question_block_id = optional(options.kobo_question_block_id.clone())
        .or_else(|| config.kobo_question_block_id.clone());
    Ok(Target {
        collection_id,
        question_block_id,
    })
}

pub fn run_sync<T, C, W>(
    options: &SyncOptions,
    config: &AppConfig,
    transport: &T,
    confirm: &mut C,
    out: &mut W,
) -> Result<SyncOutcome, SyncError>
where
    T: Transport,
    C: Confirm + ?Sized,
    W: Write + ?Sized,
{
    let target = resolve_target(options, config)?;

    let prompt = match &target.question_block_id {
        Some(block_id) => {
            writeln!(out, "Using question block ID {block_id}")?;
            "Are you sure you want to use this question block ID?"
        }
        None => {
            writeln!(out, "No question block ID provided, a new question block will be created")?;
            "Are you sure you want to create a new question block?"
        }
    };
    if !confirm.confirm(prompt)? {
        return Err(SyncError::UserAborted);
    }

    writeln!(
        out,
        "Params:\n\tdataset_url={}\n\tkey_field={}\n\tvalue_field={}\n\tuse_cache={}\n\tkobo_collection_id={}\n\tkobo_question_block_id={}",
        options.dataset_url,
        options.key_field,
        options.value_field,
        options.use_cache,
        target.collection_id,
        target.question_block_id.as_deref().unwrap_or("-"),
    )?;

    writeln!(out, "Getting data from CKAN")?;
    let store = DiagnosticStore::new(&options.sample_data_dir);
    let data_map = fetch_choice_map(
        transport,
        &store,
        &options.dataset_url,
        &config.ckan_api_token,
        &options.key_field,
        &options.value_field,
        options.use_cache,
    )?;

    writeln!(out, "{} records found", data_map.len())?;
    if data_map.is_empty() {
        writeln!(out, "No records found")?;
        return Ok(SyncOutcome::Empty);
    }
    write_preview(out, &data_map)?;

    writeln!(out, "Connecting to Kobo")?;
    let api = KoboApi::new(
        KoboClient::new(&config.kobo_base_url, &config.kobo_api_token),
        transport,
        store,
    );
    let collection = api.get_collection(&target.collection_id)?;
    writeln!(out, "Kobo collection found")?;
    writeln!(
        out,
        " - Owner @{}",
        collection.owner_username.as_deref().unwrap_or("unknown")
    )?;

    let choices: Vec<Choice> = data_map
        .iter()
        .map(|(code, label)| Choice::new(code, label))
        .collect();
    let question = QuestionSpec::select_one(options.question_label.as_str());

    let outcome = match &target.question_block_id {
        None => {
            let block = api.create_question_block(&target.collection_id, &question, &choices)?;
            writeln!(out, "Question block created: ID:{}", block.uid)?;
            SyncOutcome::Created { uid: block.uid }
        }
        Some(block_id) => {
            let block = api.update_question_block(block_id, &question, &choices)?;
            writeln!(out, "Question block updated")?;
            SyncOutcome::Updated { uid: block.uid }
        }
    };
    info!(?outcome, choices = choices.len(), "sync finished");
    Ok(outcome)
}

/// First and last `PREVIEW_EDGE` entries, with `...` in between when some
/// are skipped.
pub fn write_preview<W: Write + ?Sized>(out: &mut W, map: &ChoiceMap) -> std::io::Result<()> {
    let total = map.len();
    for (pos, (code, label)) in map.iter().enumerate() {
        if pos < PREVIEW_EDGE || pos >= total.saturating_sub(PREVIEW_EDGE) {
            writeln!(out, " - {code}: {label}")?;
        } else if pos == PREVIEW_EDGE {
            writeln!(out, "...")?;
        }
    }
    Ok(())
}
