//! Classifies executor failures into a fixed set of resource-error kinds.

use std::io;

/// A resource-exhaustion error kind the backoff controller knows how to
/// react to. All are currently retryable; the flag is kept on
/// [`ClassifiedError`] rather than implied so future non-retryable kinds
/// don't require a signature change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceErrorKind {
    TemporarilyUnavailable,
    OutOfMemory,
    RateLimited,
    TooManyOpenFiles,
    TooManyProcessesSystemWide,
}

/// The result of classifying one executor failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedError {
    pub kind: ResourceErrorKind,
    pub retryable: bool,
}

/// What the classifier looks at. Any field may be absent; the executor is
/// only required to populate what it knows.
#[derive(Debug, Clone, Default)]
pub struct ClassifyInput<'a> {
    pub io_error_kind: Option<io::ErrorKind>,
    pub exit_code: Option<i64>,
    pub message: Option<&'a str>,
    pub stderr: Option<&'a str>,
}

enum Rule {
    ExactIoKind(io::ErrorKind, ResourceErrorKind),
    ExitCode(i64, ResourceErrorKind),
    MessageContains(String, ResourceErrorKind),
    StderrContains(String, ResourceErrorKind),
}

/// An ordered, appendable rule table.
///
/// Classification order is fixed regardless of how rules were appended:
/// exact system-error identity, then exit-code table, then case-insensitive
/// substring match on the error message, then on the stderr sample. Within
/// each group, rules are tried in the order they were added.
pub struct ErrorClassifier {
    rules: Vec<Rule>,
}

impl Default for ErrorClassifier {
    /// Seeds a reasonable default table covering the common Unix resource
    /// exhaustion signatures.
    fn default() -> Self {
        ErrorClassifierBuilder::new()
            .exact_io_kind(io::ErrorKind::WouldBlock, ResourceErrorKind::TemporarilyUnavailable)
            .exit_code(137, ResourceErrorKind::OutOfMemory)
            .message_contains("cannot allocate memory", ResourceErrorKind::OutOfMemory)
            .message_contains("out of memory", ResourceErrorKind::OutOfMemory)
            .message_contains("too many open files", ResourceErrorKind::TooManyOpenFiles)
            .message_contains(
                "resource temporarily unavailable",
                ResourceErrorKind::TemporarilyUnavailable,
            )
            .message_contains("rate limit", ResourceErrorKind::RateLimited)
            .message_contains("too many processes", ResourceErrorKind::TooManyProcessesSystemWide)
            .stderr_contains("cannot fork", ResourceErrorKind::TooManyProcessesSystemWide)
            .stderr_contains("resource temporarily unavailable", ResourceErrorKind::TemporarilyUnavailable)
            .build()
    }
}

impl ErrorClassifier {
    /// Starts a builder with an empty rule table.
    pub fn builder() -> ErrorClassifierBuilder {
        ErrorClassifierBuilder::new()
    }

    /// Classifies one failure. Returns `None` for anything not recognized
    /// as a resource error.
    pub fn classify(&self, input: &ClassifyInput<'_>) -> Option<ClassifiedError> {
        if let Some(kind) = input.io_error_kind {
            if let Some(found) = self.rules.iter().find_map(|rule| match rule {
                Rule::ExactIoKind(expected, resource_kind) if *expected == kind => Some(*resource_kind),
                _ => None,
            }) {
                return Some(ClassifiedError {
                    kind: found,
                    retryable: true,
                });
            }
        }

        if let Some(code) = input.exit_code {
            if let Some(found) = self.rules.iter().find_map(|rule| match rule {
                Rule::ExitCode(expected, resource_kind) if *expected == code => Some(*resource_kind),
                _ => None,
            }) {
                return Some(ClassifiedError {
                    kind: found,
                    retryable: true,
                });
            }
        }

        if let Some(message) = input.message {
            let lower = message.to_lowercase();
            if let Some(found) = self.rules.iter().find_map(|rule| match rule {
                Rule::MessageContains(substr, resource_kind) if lower.contains(substr.as_str()) => {
                    Some(*resource_kind)
                }
                _ => None,
            }) {
                return Some(ClassifiedError {
                    kind: found,
                    retryable: true,
                });
            }
        }

        if let Some(stderr) = input.stderr {
            let lower = stderr.to_lowercase();
            if let Some(found) = self.rules.iter().find_map(|rule| match rule {
                Rule::StderrContains(substr, resource_kind) if lower.contains(substr.as_str()) => {
                    Some(*resource_kind)
                }
                _ => None,
            }) {
                return Some(ClassifiedError {
                    kind: found,
                    retryable: true,
                });
            }
        }

        None
    }
}

/// Builds an [`ErrorClassifier`] one rule at a time.
pub struct ErrorClassifierBuilder {
    rules: Vec<Rule>,
}

impl ErrorClassifierBuilder {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Matches an exact `io::ErrorKind`.
    pub fn exact_io_kind(mut self, kind: io::ErrorKind, resource_kind: ResourceErrorKind) -> Self {
        self.rules.push(Rule::ExactIoKind(kind, resource_kind));
        self
    }

    /// Matches an exact process exit code.
    pub fn exit_code(mut self, code: i64, resource_kind: ResourceErrorKind) -> Self {
        self.rules.push(Rule::ExitCode(code, resource_kind));
        self
    }

    /// Matches a case-insensitive substring of the error message.
    pub fn message_contains(mut self, substr: impl Into<String>, resource_kind: ResourceErrorKind) -> Self {
        self.rules
            .push(Rule::MessageContains(substr.into().to_lowercase(), resource_kind));
        self
    }

    /// Matches a case-insensitive substring of the stderr sample.
    pub fn stderr_contains(mut self, substr: impl Into<String>, resource_kind: ResourceErrorKind) -> Self {
        self.rules
            .push(Rule::StderrContains(substr.into().to_lowercase(), resource_kind));
        self
    }

    pub fn build(self) -> ErrorClassifier {
        ErrorClassifier { rules: self.rules }
    }
}

impl Default for ErrorClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}
