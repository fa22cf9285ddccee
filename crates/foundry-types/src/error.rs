use thiserror::Error;

/// Errors from repository operations (used by trait definitions in foundry-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors produced while turning a model response into a [`crate::plan::Plan`].
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("planner backend failed: {0}")]
    Backend(String),

    #[error("plan response is not valid JSON: {0}")]
    Parse(String),

    #[error("plan response is missing required field '{0}'")]
    MissingField(String),

    #[error("invalid plan: {0}")]
    Invalid(String),

    #[error("planning failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Errors from capability synthesis. A rejection never reaches storage.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("generated source does not declare a callable named '{0}'")]
    MissingDeclaration(String),

    #[error("invalid capability name '{0}': expected snake_case identifier")]
    InvalidName(String),

    #[error("'{0}' is a built-in capability name")]
    ReservedName(String),

    #[error("failed to persist source: {0}")]
    Storage(String),
}

/// Errors from the capability registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("'{0}' is a built-in capability and cannot be replaced")]
    ReservedName(String),

    #[error("capability '{0}' has not passed validation")]
    NotValidated(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors from worker materialization.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("plan has an empty goal")]
    EmptyGoal,

    #[error("could not allocate a unique worker id after {0} attempts")]
    IdExhausted(u32),

    #[error("failed to write worker program: {0}")]
    Program(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors from the launch controller. Any of these means nothing was spawned.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("worker '{0}' not found")]
    NotFound(String),

    #[error("worker program missing at {0}")]
    ProgramMissing(String),

    #[error("worker '{id}' is {status}, expected {expected}")]
    WrongStatus {
        id: String,
        status: String,
        expected: String,
    },

    #[error("failed to spawn worker: {0}")]
    Spawn(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors that abort a build. Synthesis failures are not among them: an
/// abandoned gap is reported in the build outcome instead.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_plan_exhausted_display() {
        let err = PlanError::Exhausted {
            attempts: 2,
            last_error: "missing goal".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "planning failed after 2 attempts: missing goal"
        );
    }

    #[test]
    fn test_launch_wrong_status_display() {
        let err = LaunchError::WrongStatus {
            id: "worker_001".to_string(),
            status: "starting".to_string(),
            expected: "ready".to_string(),
        };
        assert!(err.to_string().contains("worker_001"));
        assert!(err.to_string().contains("expected ready"));
    }

    #[test]
    fn test_build_error_wraps_plan_error() {
        let err: BuildError = PlanError::MissingField("goal".to_string()).into();
        assert_eq!(
            err.to_string(),
            "plan response is missing required field 'goal'"
        );
    }
}
