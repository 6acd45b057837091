use xmlview_compiler::diagnostics::{DiagnosticKind, Diagnostics, Span};

/// Failures that stop a run.
#[derive(Clone, Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("execution limit of {0} steps exceeded")]
    ExecFuelExhausted(u32),

    #[error("template nesting deeper than {0}")]
    RecursionLimitExceeded(u32),

    #[error("{message}")]
    Evaluation {
        message: String,
        span: Option<Span>,
    },

    #[error("{message}")]
    Output {
        message: String,
        span: Option<Span>,
    },

    #[error("{message}")]
    Terminated {
        message: String,
        span: Option<Span>,
    },
}

impl RuntimeError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            RuntimeError::ExecFuelExhausted(_) => DiagnosticKind::ExecFuelExhausted,
            RuntimeError::RecursionLimitExceeded(_) => DiagnosticKind::RecursionLimitExceeded,
            RuntimeError::Evaluation { .. } => DiagnosticKind::EvaluationFailed,
            RuntimeError::Output { .. } => DiagnosticKind::OutputConflict,
            RuntimeError::Terminated { .. } => DiagnosticKind::Terminated,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            RuntimeError::ExecFuelExhausted(_) | RuntimeError::RecursionLimitExceeded(_) => None,
            RuntimeError::Evaluation { span, .. }
            | RuntimeError::Output { span, .. }
            | RuntimeError::Terminated { span, .. } => *span,
        }
    }

    fn detail(&self) -> String {
        match self {
            RuntimeError::ExecFuelExhausted(fuel) => format!("{fuel} steps"),
            RuntimeError::RecursionLimitExceeded(limit) => format!("depth {limit}"),
            other => other.to_string(),
        }
    }

    /// Append this error to `diagnostics` as an error message.
    pub(crate) fn report(&self, diagnostics: &mut Diagnostics) {
        diagnostics
            .report(self.kind(), self.span())
            .message(self.detail())
            .emit();
    }
}

/// A program failed while being applied.
///
/// Carries the run's full diagnostic log, with the failure as its last error.
#[derive(Clone, Debug, thiserror::Error)]
#[error("transform failed: {}", summary(.diagnostics))]
pub struct TransformError {
    pub diagnostics: Diagnostics,
}

impl TransformError {
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self { diagnostics }
    }

    pub(crate) fn from_runtime(error: RuntimeError, mut diagnostics: Diagnostics) -> Self {
        error.report(&mut diagnostics);
        Self { diagnostics }
    }
}

fn summary(diagnostics: &Diagnostics) -> String {
    diagnostics
        .iter()
        .rev()
        .find(|d| d.is_error())
        .map(|d| d.message.clone())
        .unwrap_or_else(|| "unknown error".to_string())
}
