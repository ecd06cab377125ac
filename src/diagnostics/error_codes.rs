//! Error code definitions

/// Declaration errors (E1xxx)
pub mod declarations {
    pub const DUPLICATE_DECLARATION: &str = "E1001";
    pub const UNDEFINED_IDENTIFIER: &str = "E1002";
    pub const INFERRED_PARAMETER_REDECLARED: &str = "E1003";
}

/// Type errors (E2xxx)
pub mod types {
    pub const TYPE_MISMATCH: &str = "E2001";
    pub const LITERAL_OUT_OF_RANGE: &str = "E2002";
    pub const WRONG_ARGUMENT_COUNT: &str = "E2003";
    pub const INVALID_OPERANDS: &str = "E2004";
}

/// Implementation errors (E3xxx)
pub mod implementations {
    pub const UNKNOWN_INTERFACE: &str = "E3001";
    pub const MISSING_METHOD: &str = "E3002";
    pub const EXTRA_METHOD: &str = "E3003";
    pub const METHOD_ARITY: &str = "E3004";
    pub const AMBIGUOUS_IMPLEMENTATION: &str = "E3005";
}

/// Package and import errors (E4xxx)
pub mod packages {
    pub const UNKNOWN_PACKAGE: &str = "E4001";
    pub const UNKNOWN_SYMBOL: &str = "E4002";
    pub const PRIVATE_SYMBOL: &str = "E4003";
}

/// Control flow errors (E5xxx)
pub mod control {
    pub const RETHROW_OUTSIDE_RESCUE: &str = "E5001";
    pub const UNKNOWN_BREAK_LABEL: &str = "E5002";
}

/// Warnings (W1xxx)
pub mod warnings {
    pub const REDUNDANT_UNION_MEMBER: &str = "W1001";
}

/// Runtime error codes carried by `RuntimeError` (R0xxx)
pub mod runtime {
    pub const UNDEFINED_IDENTIFIER: &str = "R0001";
    pub const NO_METHOD: &str = "R0002";
    pub const PATTERN_MISMATCH: &str = "R0003";
    pub const TYPE_MISMATCH: &str = "R0004";
    pub const NOT_CALLABLE: &str = "R0005";
    pub const ARITY_MISMATCH: &str = "R0006";
    pub const INVALID_CONTROL_FLOW: &str = "R0007";
    pub const IMPORT_FAILURE: &str = "R0008";
    pub const PACKAGE_COLLISION: &str = "R0009";
    pub const SCHEDULER: &str = "R0010";
    pub const UNCAUGHT_RAISE: &str = "R0011";
    pub const INVALID_ASSIGNMENT: &str = "R0012";
    pub const UNKNOWN_FIELD: &str = "R0013";
    pub const TYPECHECK_FAILED: &str = "R0014";
}
