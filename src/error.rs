use thiserror::Error;

/// SQL Server error numbers raised when a login or the initial database cannot be opened.
const CONNECTION_CODES: &[u32] = &[233, 4060, 4064, 18452, 18456, 18486, 18487, 18488];

/// Parser errors: incorrect syntax, unclosed quotes, batch placement rules.
const SYNTAX_CODES: &[u32] = &[102, 105, 111, 156, 170, 319, 1038];

/// Missing permission on an object, schema or database.
const PERMISSION_CODES: &[u32] = &[229, 230, 262, 297, 300, 916, 1088, 15247];

/// Key, foreign key, NOT NULL and truncation violations.
const CONSTRAINT_CODES: &[u32] = &[515, 547, 2601, 2627, 2628, 8152];

/// Everything that can abort a harness case.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("syntax error {code}: {message}")]
    Syntax { code: u32, message: String },

    #[error("permission denied {code}: {message}")]
    Permission { code: u32, message: String },

    #[error("constraint violation {code}: {message}")]
    ConstraintViolation { code: u32, message: String },

    #[error("server error {code}: {message}")]
    Server { code: u32, message: String },

    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("statement has {expected} placeholders but {actual} parameters were supplied")]
    ParameterCount { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

impl HarnessError {
    /// Map a SQL Server error number onto the harness taxonomy.
    pub fn from_server(code: u32, message: impl Into<String>) -> Self {
        let message = message.into();
        if CONNECTION_CODES.contains(&code) {
            HarnessError::Connection(format!("{} (error {})", message, code))
        } else if SYNTAX_CODES.contains(&code) {
            HarnessError::Syntax { code, message }
        } else if PERMISSION_CODES.contains(&code) {
            HarnessError::Permission { code, message }
        } else if CONSTRAINT_CODES.contains(&code) {
            HarnessError::ConstraintViolation { code, message }
        } else {
            HarnessError::Server { code, message }
        }
    }

    /// Short label used in suite reports.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Connection(_) => "connection",
            HarnessError::Syntax { .. } => "syntax",
            HarnessError::Permission { .. } => "permission",
            HarnessError::ConstraintViolation { .. } => "constraint",
            HarnessError::Server { .. } => "server",
            HarnessError::Assertion(_) => "assertion",
            HarnessError::InvalidConnectionString(_) => "connection-string",
            HarnessError::ParameterCount { .. } => "parameters",
            HarnessError::Config(_) => "config",
            HarnessError::Driver(_) => "driver",
            HarnessError::Io(_) => "io",
            HarnessError::Json(_) => "json",
        }
    }
}

impl From<tiberius::error::Error> for HarnessError {
    fn from(err: tiberius::error::Error) -> Self {
        use tiberius::error::Error;

        match err {
            Error::Server(token) => HarnessError::from_server(token.code(), token.message()),
            Error::Io { kind, message } => {
                HarnessError::Connection(format!("{:?}: {}", kind, message))
            }
            Error::Tls(message) => HarnessError::Connection(format!("TLS: {}", message)),
            Error::Routing { host, port } => HarnessError::Connection(format!(
                "server requested routing to {}:{}",
                host, port
            )),
            other => HarnessError::Driver(other.to_string()),
        }
    }
}
