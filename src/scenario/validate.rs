use std::collections::BTreeMap;

use super::{FieldValue, Scenario, Transaction};
use crate::error::{AppError, AppResult, ScenarioError};
use crate::session::FileCache;

/// Rejects graphs the crew cannot execute and preloads every disk fetch
/// into `files`, so a missing file aborts before the first request.
///
/// # Errors
///
/// Returns an error for an empty graph or stage, a relative path, multipart
/// data on a verb without a body, a disk fetch in headers or cookies, or an
/// unreadable disk file.
pub fn validate_scenario(scenario: &Scenario, files: &FileCache) -> AppResult<()> {
    if scenario.stages.is_empty() {
        return Err(AppError::scenario(ScenarioError::NoStages));
    }

    for (index, stage) in scenario.stages.iter().enumerate() {
        if stage.transactions.is_empty() {
            return Err(AppError::scenario(ScenarioError::EmptyStage { index }));
        }
        for transaction in &stage.transactions {
            validate_transaction(transaction)?;
            preload_files(transaction, files)?;
        }
    }

    Ok(())
}

fn validate_transaction(transaction: &Transaction) -> AppResult<()> {
    if !transaction.path.starts_with('/') {
        return Err(AppError::scenario(ScenarioError::RelativePath {
            path: transaction.path.clone(),
        }));
    }

    if transaction.is_multipart() && !transaction.verb.carries_body() {
        return Err(AppError::scenario(ScenarioError::MultipartWithoutBody {
            verb: transaction.verb.as_str(),
            path: transaction.path.clone(),
        }));
    }

    reject_disk_fields(transaction, "header", &transaction.headers)?;
    reject_disk_fields(transaction, "cookie", &transaction.cookies)
}

fn reject_disk_fields(
    transaction: &Transaction,
    context: &'static str,
    fields: &BTreeMap<String, FieldValue>,
) -> AppResult<()> {
    match fields.iter().find(|(_, value)| value.is_disk()) {
        Some((field, _)) => Err(AppError::scenario(ScenarioError::DiskFetchNotAllowed {
            context,
            field: field.clone(),
            verb: transaction.verb.as_str(),
            path: transaction.path.clone(),
        })),
        None => Ok(()),
    }
}

fn preload_files(transaction: &Transaction, files: &FileCache) -> AppResult<()> {
    for value in transaction.body.values() {
        if let FieldValue::Fetch(super::FetchRef::FromDisk { path, .. }) = value {
            files.load(path).map_err(AppError::fetch)?;
        }
    }
    Ok(())
}
