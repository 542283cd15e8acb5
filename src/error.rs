use crate::value::Value;
use std::error;
use std::fmt;

/// A runtime failure, carrying the source line of the offending opcode.
/// `Display` renders the two-line diagnostic the interpreter reports.
#[derive(Debug)]
pub struct RuntimeError {
    line: u32,
    kind: ErrorKind,
}

#[derive(Debug)]
pub enum ErrorKind {
    OperandMustBeNumber,
    OperandsMustBeNumbers,
    OperandsMustBeNumbersOrStrings,
    UndefinedVariable(String),
    InternalError(VmError),
}

/// Invariant violations: well-formed bytecode never triggers these.
#[derive(Debug)]
pub enum VmError {
    EmptyStackPop,
    StackOverflow,
    InvalidStackSlot(u8),
    InvalidOpCode,
    UnexpectedValue(Value),
}

impl RuntimeError {
    pub fn new(line: u32, kind: ErrorKind) -> Self {
        RuntimeError { line, kind }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::OperandMustBeNumber => {
                f.write_str("Operand must be a number.")?;
            }
            ErrorKind::OperandsMustBeNumbers => {
                f.write_str("Operands must be numbers.")?;
            }
            ErrorKind::OperandsMustBeNumbersOrStrings => {
                f.write_str("Operands must be two numbers or two strings.")?;
            }
            ErrorKind::UndefinedVariable(name) => {
                f.write_fmt(format_args!("Undefined variable '{}'.", name))?;
            }
            ErrorKind::InternalError(ref vm_err) => match vm_err {
                VmError::EmptyStackPop => {
                    f.write_str("illegal pop on empty stack")?;
                }
                VmError::StackOverflow => {
                    f.write_str("value stack overflow")?;
                }
                VmError::InvalidStackSlot(slot) => {
                    f.write_fmt(format_args!("local slot {} out of range", slot))?;
                }
                VmError::InvalidOpCode => {
                    f.write_str("invalid op code")?;
                }
                VmError::UnexpectedValue(val) => {
                    f.write_fmt(format_args!("unexpected value {}", val))?;
                }
            },
        }
        f.write_fmt(format_args!("\n[line {}] in script", self.line))
    }
}

impl error::Error for RuntimeError {}
