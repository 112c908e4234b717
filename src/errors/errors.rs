use std::fmt::Display;

use thiserror::Error;

use crate::Position;

/// Which stage of the pipeline an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Lexical,
    Syntax,
    Semantic,
    Internal,
}

#[derive(Debug, Clone)]
pub struct Error {
    internal_error: ErrorImpl,
    position: Position,
}

impl Error {
    pub fn new(error_impl: ErrorImpl, position: Position) -> Self {
        Error {
            internal_error: error_impl,
            position,
        }
    }

    pub fn get_position(&self) -> &Position {
        &self.position
    }

    pub fn get_kind(&self) -> &ErrorImpl {
        &self.internal_error
    }

    pub fn line(&self) -> u32 {
        self.position.line
    }

    pub fn column(&self) -> u32 {
        self.position.column
    }

    pub fn category(&self) -> ErrorCategory {
        match &self.internal_error {
            ErrorImpl::UnrecognisedToken { .. } => ErrorCategory::Lexical,
            ErrorImpl::UnexpectedToken { .. }
            | ErrorImpl::UnexpectedTokenDetailed { .. }
            | ErrorImpl::NumberParseError { .. } => ErrorCategory::Syntax,
            ErrorImpl::InternalError { .. } => ErrorCategory::Internal,
            _ => ErrorCategory::Semantic,
        }
    }

    pub fn is_semantic(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Semantic | ErrorCategory::Internal
        )
    }

    pub fn get_error_name(&self) -> &str {
        match &self.internal_error {
            ErrorImpl::UnrecognisedToken { .. } => "UnrecognisedToken",
            ErrorImpl::UnexpectedToken { .. } => "UnexpectedToken",
            ErrorImpl::UnexpectedTokenDetailed { .. } => "UnexpectedTokenDetailed",
            ErrorImpl::NumberParseError { .. } => "NumberParseError",
            ErrorImpl::VariableAlreadyDeclared { .. } => "VariableAlreadyDeclared",
            ErrorImpl::VariableNotDeclared { .. } => "VariableNotDeclared",
            ErrorImpl::FunctionAlreadyDeclared { .. } => "FunctionAlreadyDeclared",
            ErrorImpl::FunctionNotDeclared { .. } => "FunctionNotDeclared",
            ErrorImpl::TypeAlreadyDeclared { .. } => "TypeAlreadyDeclared",
            ErrorImpl::UnknownType { .. } => "UnknownType",
            ErrorImpl::DuplicateClassMember { .. } => "DuplicateClassMember",
            ErrorImpl::UnknownMember { .. } => "UnknownMember",
            ErrorImpl::InvalidOperands { .. } => "InvalidOperands",
            ErrorImpl::InvalidOperand { .. } => "InvalidOperand",
            ErrorImpl::ConditionNotBool { .. } => "ConditionNotBool",
            ErrorImpl::TypeMatchError { .. } => "TypeMatchError",
            ErrorImpl::NotAssignable => "NotAssignable",
            ErrorImpl::OutsideOfLoop { .. } => "OutsideOfLoop",
            ErrorImpl::UnexpectedArguments { .. } => "UnexpectedArguments",
            ErrorImpl::MissingArguments { .. } => "MissingArguments",
            ErrorImpl::ArgumentTypeMatchError { .. } => "ArgumentTypeMatchError",
            ErrorImpl::ReturnTypeMismatch { .. } => "ReturnTypeMismatch",
            ErrorImpl::InvalidArraySize { .. } => "InvalidArraySize",
            ErrorImpl::VoidValue => "VoidValue",
            ErrorImpl::NotPrintable { .. } => "NotPrintable",
            ErrorImpl::MissingEntryPoint => "MissingEntryPoint",
            ErrorImpl::UnsupportedFeature { .. } => "UnsupportedFeature",
            ErrorImpl::InternalError { .. } => "InternalError",
        }
    }

    pub fn get_tip(&self) -> ErrorTip {
        match &self.internal_error {
            ErrorImpl::UnrecognisedToken { .. } => ErrorTip::None,
            ErrorImpl::UnexpectedToken { token } => ErrorTip::Suggestion(format!(
                "Unexpected token: `{}`, did you miss a semicolon?",
                token
            )),
            ErrorImpl::UnexpectedTokenDetailed { token, message } => {
                ErrorTip::Suggestion(format!("Unexpected token: `{}`, {}", token, message))
            }
            ErrorImpl::NumberParseError { token } => ErrorTip::Suggestion(format!(
                "Invalid number: `{}`, is it above the integer limit?",
                token
            )),
            ErrorImpl::VariableAlreadyDeclared { variable } => {
                ErrorTip::Suggestion(format!("Variable `{}` already declared", variable))
            }
            ErrorImpl::VariableNotDeclared { variable } => {
                ErrorTip::Suggestion(format!("Variable `{}` not declared", variable))
            }
            ErrorImpl::FunctionAlreadyDeclared { function } => {
                ErrorTip::Suggestion(format!("Function `{}` already declared", function))
            }
            ErrorImpl::FunctionNotDeclared { function } => {
                ErrorTip::Suggestion(format!("Function `{}` not declared", function))
            }
            ErrorImpl::TypeAlreadyDeclared { type_ } => {
                ErrorTip::Suggestion(format!("Type `{}` already declared", type_))
            }
            ErrorImpl::UnknownType { type_ } => {
                ErrorTip::Suggestion(format!("Unknown type `{}` found", type_))
            }
            ErrorImpl::DuplicateClassMember { class, member } => ErrorTip::Suggestion(format!(
                "`{}` is both a field and a method of class `{}`",
                member, class
            )),
            ErrorImpl::UnknownMember { type_, member } => {
                ErrorTip::Suggestion(format!("Type `{}` has no member `{}`", type_, member))
            }
            ErrorImpl::InvalidOperands {
                operator,
                left,
                right,
            } => ErrorTip::Suggestion(format!(
                "Operator `{}` cannot be applied to `{}` and `{}`",
                operator, left, right
            )),
            ErrorImpl::InvalidOperand { operator, operand } => ErrorTip::Suggestion(format!(
                "Operator `{}` cannot be applied to `{}`",
                operator, operand
            )),
            ErrorImpl::ConditionNotBool { received } => ErrorTip::Suggestion(format!(
                "Conditions must be `bool`, received `{}`",
                received
            )),
            ErrorImpl::TypeMatchError { expected, received } => ErrorTip::Suggestion(format!(
                "Expected type `{}`, received `{}`",
                expected, received
            )),
            ErrorImpl::NotAssignable => ErrorTip::Suggestion(String::from(
                "Only variables, fields and array elements can be assigned to",
            )),
            ErrorImpl::OutsideOfLoop { keyword } => {
                ErrorTip::Suggestion(format!("`{}` must appear inside a loop", keyword))
            }
            ErrorImpl::UnexpectedArguments { expected, received } => ErrorTip::Suggestion(
                format!("Expected {} arguments, received {}", expected, received),
            ),
            ErrorImpl::MissingArguments { expected, received } => ErrorTip::Suggestion(format!(
                "Expected {} arguments, received {}",
                expected, received
            )),
            ErrorImpl::ArgumentTypeMatchError { expected, received } => {
                ErrorTip::Suggestion(format!(
                    "Expected argument type `{}`, received `{}`",
                    expected, received
                ))
            }
            ErrorImpl::ReturnTypeMismatch { expected, received } => ErrorTip::Suggestion(
                format!("Function returns `{}`, received `{}`", expected, received),
            ),
            ErrorImpl::InvalidArraySize { reason } => {
                ErrorTip::Suggestion(format!("Invalid array size: {}", reason))
            }
            ErrorImpl::VoidValue => ErrorTip::Suggestion(String::from(
                "A void function call does not produce a value",
            )),
            ErrorImpl::NotPrintable { type_ } => {
                ErrorTip::Suggestion(format!("Values of type `{}` cannot be printed", type_))
            }
            ErrorImpl::MissingEntryPoint => {
                ErrorTip::Suggestion(String::from("Declare a global `main` function"))
            }
            ErrorImpl::UnsupportedFeature { feature } => ErrorTip::Suggestion(format!(
                "{} support is disabled for this compilation",
                feature
            )),
            ErrorImpl::InternalError { .. } => ErrorTip::None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "l{}-c{}:: {}",
            self.position.line, self.position.column, self.internal_error
        )
    }
}

impl std::error::Error for Error {}

pub enum ErrorTip {
    None,
    Suggestion(String),
}

impl Display for ErrorTip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTip::None => write!(f, ""),
            ErrorTip::Suggestion(suggestion) => write!(f, "{}", suggestion),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorImpl {
    #[error("unrecognised token: {token:?}")]
    UnrecognisedToken { token: String },
    #[error("unexpected token: {token:?}")]
    UnexpectedToken { token: String },
    #[error("unexpected token ({message:?}): {token:?}")]
    UnexpectedTokenDetailed { token: String, message: String },
    #[error("error parsing number: {token:?}")]
    NumberParseError { token: String },
    #[error("variable {variable:?} already exists in scope")]
    VariableAlreadyDeclared { variable: String },
    #[error("variable {variable:?} not found")]
    VariableNotDeclared { variable: String },
    #[error("function {function:?} already exists in scope")]
    FunctionAlreadyDeclared { function: String },
    #[error("function {function:?} not found")]
    FunctionNotDeclared { function: String },
    #[error("type {type_:?} already exists in scope")]
    TypeAlreadyDeclared { type_: String },
    #[error("type {type_:?} not found")]
    UnknownType { type_: String },
    #[error("class {class:?} declares {member:?} as both field and method")]
    DuplicateClassMember { class: String, member: String },
    #[error("type {type_:?} has no member {member:?}")]
    UnknownMember { type_: String, member: String },
    #[error("operator {operator:?} applied to {left:?} and {right:?}")]
    InvalidOperands {
        operator: String,
        left: String,
        right: String,
    },
    #[error("operator {operator:?} applied to {operand:?}")]
    InvalidOperand { operator: String, operand: String },
    #[error("condition must be bool, received {received:?}")]
    ConditionNotBool { received: String },
    #[error("types do not match: expected {expected:?}, received {received:?}")]
    TypeMatchError { expected: String, received: String },
    #[error("left side of assignment is not assignable")]
    NotAssignable,
    #[error("{keyword:?} outside of any loop")]
    OutsideOfLoop { keyword: String },
    #[error("unexpected arguments: expected {expected:?}, received {received:?}")]
    UnexpectedArguments { expected: usize, received: usize },
    #[error("missing arguments: expected {expected:?}, received {received:?}")]
    MissingArguments { expected: usize, received: usize },
    #[error("argument types do not match: expected {expected:?}, received {received:?}")]
    ArgumentTypeMatchError { expected: String, received: String },
    #[error("return type mismatch: expected {expected:?}, received {received:?}")]
    ReturnTypeMismatch { expected: String, received: String },
    #[error("invalid array size: {reason}")]
    InvalidArraySize { reason: String },
    #[error("void value used as an operand")]
    VoidValue,
    #[error("cannot print values of type {type_:?}")]
    NotPrintable { type_: String },
    #[error("no main function declared")]
    MissingEntryPoint,
    #[error("{feature} support is disabled")]
    UnsupportedFeature { feature: String },
    #[error("internal compiler error: {message}")]
    InternalError { message: String },
}
