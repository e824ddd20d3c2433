use std::fmt;

/// Errors raised by `Schema` registration calls (`add`, `path`, `virtual`,
/// `pre`, `post`, `method`, `static`). These are misuse-at-registration-time
/// errors: the caller's schema declaration or hook/method wiring is wrong,
/// and the fix belongs in code, not data.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SchemaError {
    /// A schema path declaration did not match any accepted form (§4.C).
    InvalidPathDeclaration { path: String, reason: String },
    /// `pre`/`post` was called with a hook kind other than `save`/`remove`.
    UnknownHookKind(String),
    /// A hook, method, or static argument was not callable context.
    NotCallable { context: String },
    /// `method`/`static` was called with an empty name.
    EmptyMethodName,
    /// The same path was registered twice.
    DuplicatePath(String),
    /// Path traversal during `set` hit a leaf that is not an object.
    PathNotObject { path: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPathDeclaration { path, reason } => {
                write!(f, "invalid value for schema path `{path}`: {reason}")
            }
            Self::UnknownHookKind(kind) => {
                write!(f, "unknown hook kind '{kind}': expected 'save' or 'remove'")
            }
            Self::NotCallable { context } => write!(f, "{context} must be callable"),
            Self::EmptyMethodName => write!(f, "method/static name must not be empty"),
            Self::DuplicatePath(path) => write!(f, "path `{path}` is already registered"),
            Self::PathNotObject { path } => {
                write!(f, "cannot traverse into `{path}`: not an object")
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// Errors raised while applying the setter stack (`_applySetters`), i.e.
/// while validating a document before persistence (§7.2).
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    /// A `required` field was absent and had no default.
    RequiredFieldMissing { path: String },
    /// A type-specific validation rule rejected the value.
    InvalidValue { path: String, reason: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequiredFieldMissing { path } => write!(f, "field `{path}` is required"),
            Self::InvalidValue { path, reason } => {
                write!(f, "field `{path}` is invalid: {reason}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised when a query or update operator is unknown, or applied to
/// an incompatible value (§4.B, §7.4).
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum OperatorError {
    /// `$op` in a query document had no matching `q$op` entry on the type.
    UnknownQueryOperator { type_name: String, op: String },
    /// `$op` in an update document had no matching `u$op` entry on the type.
    UnknownUpdateOperator { type_name: String, op: String },
    /// An operator was applied to a value its implementation cannot handle.
    IncompatibleValue {
        type_name: String,
        op: String,
        reason: String,
    },
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownQueryOperator { type_name, op } => {
                write!(f, "unknown query operator '{op}' for type `{type_name}`")
            }
            Self::UnknownUpdateOperator { type_name, op } => {
                write!(f, "unknown update operator '{op}' for type `{type_name}`")
            }
            Self::IncompatibleValue {
                type_name,
                op,
                reason,
            } => write!(f, "operator '{op}' on type `{type_name}`: {reason}"),
        }
    }
}

impl std::error::Error for OperatorError {}

/// Errors raised by the population descriptor parser (§4.G, §7.3).
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PopulationError {
    /// A populate item had no `path`.
    PathRequired,
    /// A populate item had no `model`, and none could be inferred from the
    /// referenced path's schema type.
    ModelRequired { path: String },
}

impl fmt::Display for PopulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathRequired => write!(f, "path is required"),
            Self::ModelRequired { path } => write!(f, "model is required for path `{path}`"),
        }
    }
}

impl std::error::Error for PopulationError {}

/// Errors raised while compiling a query document into a predicate stack
/// (§4.D).
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum QueryCompileError {
    /// A field key in the query document was an empty string.
    EmptyFieldPath,
    /// A clause (`$and`, `$or`, `$nor`, `$where`, ...) was not the shape
    /// this compiler expects.
    InvalidClause { reason: String },
    Operator(OperatorError),
}

impl fmt::Display for QueryCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyFieldPath => write!(f, "query field path must not be empty"),
            Self::InvalidClause { reason } => write!(f, "invalid query clause: {reason}"),
            Self::Operator(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for QueryCompileError {}

impl From<OperatorError> for QueryCompileError {
    fn from(e: OperatorError) -> Self {
        Self::Operator(e)
    }
}

/// Errors raised while compiling an update document into a mutator stack
/// (§4.E).
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum UpdateCompileError {
    EmptyFieldPath,
    InvalidClause { reason: String },
    Operator(OperatorError),
    Path(SchemaError),
}

impl fmt::Display for UpdateCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyFieldPath => write!(f, "update field path must not be empty"),
            Self::InvalidClause { reason } => write!(f, "invalid update clause: {reason}"),
            Self::Operator(e) => write!(f, "{e}"),
            Self::Path(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for UpdateCompileError {}

impl From<OperatorError> for UpdateCompileError {
    fn from(e: OperatorError) -> Self {
        Self::Operator(e)
    }
}

impl From<SchemaError> for UpdateCompileError {
    fn from(e: SchemaError) -> Self {
        Self::Path(e)
    }
}

/// Errors raised while compiling a sort document (§4.F). Sorting never
/// consults the operator tables, so this only carries structural failures.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SortCompileError {
    EmptyFieldPath,
    InvalidDirection { path: String, reason: String },
}

impl fmt::Display for SortCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyFieldPath => write!(f, "sort field path must not be empty"),
            Self::InvalidDirection { path, reason } => {
                write!(f, "invalid sort direction for `{path}`: {reason}")
            }
        }
    }
}

impl std::error::Error for SortCompileError {}
