//! Expression errors.

/// Error while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ExprError {
    /// Input contains a character no token starts with.
    #[error("unexpected character at offset {0}")]
    Lex(usize),

    /// Token stream does not form an expression.
    #[error("syntax error at offset {position}: {message}")]
    Syntax {
        /// Byte offset in the expression source.
        position: usize,
        /// What the parser expected.
        message: String,
    },

    /// Identifier or member not present in the context.
    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    /// Call to a function that is not registered.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// Function called with the wrong number of arguments.
    #[error("{function}() takes {expected} argument(s), got {found}")]
    Arity {
        /// Function name.
        function: String,
        /// Accepted argument count.
        expected: String,
        /// Supplied argument count.
        found: usize,
    },

    /// Operand of the wrong type.
    #[error("cannot {operation} {found}")]
    Type {
        /// Attempted operation.
        operation: &'static str,
        /// JSON type of the offending operand.
        found: &'static str,
    },

    /// Array index outside the array.
    #[error("index {0} out of bounds")]
    IndexOutOfBounds(i64),

    /// Division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Failure reported by a registered function.
    #[error("{0}")]
    Custom(String),
}
