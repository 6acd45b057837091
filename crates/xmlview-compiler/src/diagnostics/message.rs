use super::Span;

/// Diagnostic kinds, grouped by the stage that reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
    // The program text itself is unusable
    NotWellFormed,
    NotAStylesheet,
    NotARuleSchema,

    // Something required is absent
    MissingAttribute,

    // Something present does not belong
    UnknownInstruction,
    UnsupportedInstruction,
    MisplacedInstruction,
    InvalidExpression,
    InvalidAttributeValue,
    IgnoredElement,

    // Valid structure, invalid references
    DuplicateTemplate,
    UndefinedTemplate,
    UndefinedPhase,
    UndefinedPattern,

    // Reported while a program runs
    EvaluationFailed,
    OutputConflict,
    ExecFuelExhausted,
    RecursionLimitExceeded,
    Terminated,
    Message,
}

impl DiagnosticKind {
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::IgnoredElement => Severity::Warning,
            Self::Message => Severity::Info,
            _ => Severity::Error,
        }
    }

    pub fn default_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotAStylesheet => Some("the root element must be `xsl:stylesheet` or `xsl:transform`"),
            Self::NotARuleSchema => Some("the root element must be `sch:schema`"),
            Self::ExecFuelExhausted => Some("the program may loop; raise the limit if the input is large"),
            _ => None,
        }
    }

    pub fn fallback_message(&self) -> &'static str {
        match self {
            Self::NotWellFormed => "program is not well-formed",
            Self::NotAStylesheet => "not a stylesheet",
            Self::NotARuleSchema => "not a rule schema",

            Self::MissingAttribute => "missing required attribute",

            Self::UnknownInstruction => "unknown instruction",
            Self::UnsupportedInstruction => "unsupported instruction",
            Self::MisplacedInstruction => "instruction not allowed here",
            Self::InvalidExpression => "invalid expression",
            Self::InvalidAttributeValue => "invalid attribute value",
            Self::IgnoredElement => "element is ignored",

            Self::DuplicateTemplate => "duplicate template",
            Self::UndefinedTemplate => "undefined template",
            Self::UndefinedPhase => "undefined phase",
            Self::UndefinedPattern => "undefined pattern",

            Self::EvaluationFailed => "evaluation failed",
            Self::OutputConflict => "output cannot be built",
            Self::ExecFuelExhausted => "execution limit exceeded",
            Self::RecursionLimitExceeded => "recursion limit exceeded",
            Self::Terminated => "transform terminated",
            Self::Message => "message",
        }
    }

    /// Template for custom messages; `{}` is replaced by the caller's detail.
    pub fn custom_message(&self) -> String {
        match self {
            Self::MissingAttribute => "missing required attribute `{}`".to_string(),
            Self::UnknownInstruction => "`{}` is not a known instruction".to_string(),
            Self::UnsupportedInstruction => "`{}` is not supported".to_string(),
            Self::MisplacedInstruction => "`{}` is not allowed here".to_string(),
            Self::DuplicateTemplate => "template `{}` is already defined".to_string(),
            Self::UndefinedTemplate => "template `{}` is not defined".to_string(),
            Self::UndefinedPhase => "phase `{}` is not defined".to_string(),
            Self::UndefinedPattern => "pattern `{}` is not defined".to_string(),
            Self::IgnoredElement => "`{}` is ignored".to_string(),
            Self::Terminated | Self::Message => "{}".to_string(),
            _ => format!("{}: {{}}", self.fallback_message()),
        }
    }

    /// `None` gives the fallback message, `Some` fills the custom template.
    pub fn message(&self, detail: Option<&str>) -> String {
        match detail {
            None => self.fallback_message().to_string(),
            Some(detail) => self.custom_message().replace("{}", detail),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedInfo {
    pub span: Span,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Byte range in the program source, when it could be located.
    pub span: Option<Span>,
    pub message: String,
    pub related: Vec<RelatedInfo>,
    pub hints: Vec<String>,
}

impl DiagnosticMessage {
    pub(crate) fn new(kind: DiagnosticKind, span: Option<Span>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            span,
            message: message.into(),
            related: Vec::new(),
            hints: kind.default_hint().map(str::to_string).into_iter().collect(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl std::fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.severity)?;
        if let Some(span) = self.span {
            write!(f, " at {}..{}", span.start, span.end)?;
        }
        write!(f, ": {}", self.message)?;
        for related in &self.related {
            write!(
                f,
                " (related: {} at {}..{})",
                related.message, related.span.start, related.span.end
            )?;
        }
        for hint in &self.hints {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}
