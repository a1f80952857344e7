/// Failures raised while reading a statement.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("Number too big.")]
    NumberTooBig,
    #[error("Symbol not defined.")]
    SymbolNotDefined,
    #[error("Bad hex.")]
    BadHex,
    #[error("Bad binary expression.")]
    BadBin,
    #[error("Expression not found.")]
    EmptyExpression,
    #[error("Unexpected comma encountered.")]
    UnexpectedComma,
    #[error("Wrong number of parameters.")]
    ParameterCount,
    #[error("Bad expression.")]
    InvalidCharacter,
    #[error("Mismatched parentheses.")]
    MismatchedParentheses,
    #[error("Missing value in expression.")]
    MissingValue,
    #[error("Unterminated string.")]
    MissingQuote,
    #[error("Division by zero.")]
    DivisionByZero,
    #[error("Type mismatch.")]
    TypeMismatch,
    #[error("Illegal operation.")]
    IllegalOperation,
    #[error("Missing comma.")]
    MissingComma,
    #[error("Implied mode not allowed for this instruction.")]
    NoImplied,
    #[error("Immediate mode not allowed for this instruction.")]
    NoImmediate,
    #[error("Immediate constants cannot be greater than 255.")]
    ImmTooLarge,
    #[error("Constant cannot be negative.")]
    ImmNegative,
    #[error("X indexed mode does not exist for this instruction.")]
    NoIndexedX,
    #[error("Y indexed mode does not exist for this instruction.")]
    NoIndexedY,
    #[error("Absolute addressing mode not allowed for this instruction.")]
    NoAbsolute,
    #[error("Bad indexed addressing.")]
    BadIndexed,
    #[error("Address is not in zero-page.")]
    NotZeroPage,
    #[error("Branch out of range.")]
    BranchOutOfRange,
    #[error("Out of range address.")]
    BadAddress,
    #[error("Value out of range.")]
    OutOfRange,
    #[error("Bad alignment.")]
    BadAlignment,
    #[error("Attempted to skip backwards to an address.")]
    BackwardsSkip,
    #[error("Symbol already defined.")]
    LabelAlreadyDefined,
    #[error("Invalid symbol name; must start with a letter and contain only numbers and underscore.")]
    InvalidSymbolName,
    #[error("Fatal error: the second assembler pass has generated different code to the first.")]
    SecondPassProblem,
    #[error("Step value cannot be zero.")]
    BadStep,
    #[error("Too many nested FORs or braces.")]
    TooManyFors,
    #[error("Mismatched braces.")]
    MismatchedBraces,
    #[error("NEXT without FOR.")]
    NextWithoutFor,
    #[error("FOR without NEXT.")]
    ForWithoutNext,
    #[error("Too many nested IFs.")]
    TooManyIfs,
    #[error("ELSE without IF.")]
    ElseWithoutIf,
    #[error("ELIF without IF.")]
    ElifWithoutIf,
    #[error("ELIF after ELSE.")]
    ElifAfterElse,
    #[error("ELSE after ELSE.")]
    ElseAfterElse,
    #[error("ENDIF without IF.")]
    EndifWithoutIf,
    #[error("IF without ENDIF.")]
    IfWithoutEndif,
    #[error("ENDMACRO encountered without a corresponding MACRO.")]
    EndMacroUnexpected,
    #[error("Unterminated macro (ENDMACRO not found).")]
    NoEndMacro,
    #[error("Macro definitions cannot be nested.")]
    NoNestedMacros,
    #[error("Macro name already defined.")]
    DuplicateMacroName,
    #[error("Macro not found.")]
    MacroNotFound,
    #[error("Unrecognised token.")]
    UnrecognisedToken,
    #[error("Cannot include a source file within a FOR loop.")]
    CantInclude,
    #[error("Too many nested INCLUDEs.")]
    TooManyIncludes,
    #[error("Too many nested EVAL or ASM calls.")]
    TooManyEvals,
    #[error("Error opening file.")]
    FileOpen,
    #[error("Cannot specify SAVE without a filename if no default output filename has been specified.")]
    NoAnonSave,
    #[error("Cannot promote a label out of a FOR loop.")]
    PromoteOutOfFor,
    #[error("Cannot promote a label out of a macro.")]
    PromoteOutOfMacro,
    #[error("Assertion failed.")]
    AssertionFailed,
    #[error("{0}")]
    UserError(String),
}

/// Failures raised while placing bytes into object code.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssembleError {
    #[error("Out of memory.")]
    OutOfMemory,
    #[error("Guard point hit.")]
    GuardHit,
    #[error("Trying to assemble over existing code.")]
    Overlap,
    #[error("Assembled object code has changed between 1st and 2nd pass. Has a zero-page symbol been forward-declared?")]
    InconsistentCode,
    #[error("JMP (addr) will not execute as intended due to 6502 bug (addr = &xxFF).")]
    Jmp6502Bug,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

/// An error attributed to a column of one source line.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct AsmError {
    pub kind: ErrorKind,
    pub line: String,
    pub column: usize,
}

impl AsmError {
    pub fn new(kind: impl Into<ErrorKind>, line: &str, column: usize) -> Self {
        Self {
            kind: kind.into(),
            line: line.to_string(),
            column,
        }
    }
}

/// Raised when a run was superseded before it finished.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("assembly cancelled")]
pub struct Cancelled;
