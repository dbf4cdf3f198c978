use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Scenario has no stages.")]
    NoStages,
    #[error("Stage {index} has no transactions.")]
    EmptyStage { index: usize },
    #[error("{verb} {path} cannot carry multipart data.")]
    MultipartWithoutBody { verb: &'static str, path: String },
    #[error("Disk fetch cannot be used for {context} '{field}' in {verb} {path}.")]
    DiskFetchNotAllowed {
        context: &'static str,
        field: String,
        verb: &'static str,
        path: String,
    },
    #[error("Transaction path '{path}' must start with '/'.")]
    RelativePath { path: String },
}
