use crate::chunk::{Chunk, Instruction};
use crate::error::{ErrorKind, RuntimeError, VmError};
use crate::value::Value;
use fnv::FnvHashMap;
use std::io::Write;

/// Slot indices are one byte wide, so the stack never needs to grow past
/// this.
const STACK_MAX: usize = 256;

/// Stack interpreter over a single chunk. Holds exclusive read access to
/// the chunk for the duration of `run` and owns the value stack and the
/// global-variable table outright.
pub struct Vm<'a, W: Write> {
    chunk: &'a Chunk,
    ip: usize,
    stack: Vec<Value>,
    globals: FnvHashMap<String, Value>,
    out: &'a mut W,
}

impl<'a, W: Write> Vm<'a, W> {
    pub fn new(chunk: &'a Chunk, out: &'a mut W) -> Self {
        Vm {
            chunk,
            ip: 0,
            stack: Vec::with_capacity(STACK_MAX),
            globals: FnvHashMap::default(),
            out,
        }
    }

    /// Executes until `Return`. On a runtime error the stack is reset and
    /// the error handed back for reporting.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let result = self.execute();
        if result.is_err() {
            self.stack.clear();
        }
        result
    }

    fn execute(&mut self) -> Result<(), RuntimeError> {
        loop {
            let (instr_size, instr) = self.chunk.read_instruction(self.ip);

            #[cfg(feature = "trace-execution")]
            {
                let slots: Vec<String> =
                    self.stack.iter().map(|val| format!("[ {} ]", val)).collect();
                eprintln!("          {}", slots.concat());
                eprintln!("{}", crate::debug::disassemble_instruction(self.chunk, self.ip));
            }

            match instr {
                Instruction::Constant(offset) => {
                    let val = self.chunk.constant(offset).clone();
                    self.push(val)?;
                }

                Instruction::Nil => self.push(Value::Nil)?,
                Instruction::True => self.push(Value::Boolean(true))?,
                Instruction::False => self.push(Value::Boolean(false))?,

                Instruction::Pop => {
                    self.pop()?;
                }

                Instruction::Print => {
                    let val = self.pop()?;
                    writeln!(self.out, "{}", val).expect("write to output sink failed");
                }

                Instruction::DefineGlobal(offset) => {
                    // the value stays on the stack through the insert, so
                    // re-definition through the old binding sees it
                    let var_name = self.read_string(offset)?;
                    let init_val = self.peek()?;
                    self.globals.insert(var_name, init_val);
                    self.pop()?;
                }

                Instruction::GetGlobal(offset) => {
                    let var_name = self.read_string(offset)?;
                    match self.globals.get(&var_name) {
                        Some(val) => {
                            let val = val.clone();
                            self.push(val)?;
                        }
                        None => {
                            let err_kind = ErrorKind::UndefinedVariable(var_name);
                            return Err(self.runtime_error(err_kind));
                        }
                    }
                }

                Instruction::SetGlobal(offset) => {
                    // assignment is an expression; the value stays put.
                    // assigning to an unknown name is an error, never an
                    // implicit definition
                    let var_name = self.read_string(offset)?;
                    let new_val = self.peek()?;
                    match self.globals.get_mut(&var_name) {
                        Some(val) => *val = new_val,
                        None => {
                            let err_kind = ErrorKind::UndefinedVariable(var_name);
                            return Err(self.runtime_error(err_kind));
                        }
                    }
                }

                Instruction::GetLocal(slot) => match self.stack.get(slot as usize) {
                    Some(val) => {
                        let val = val.clone();
                        self.push(val)?;
                    }
                    None => {
                        let err_kind = ErrorKind::InternalError(VmError::InvalidStackSlot(slot));
                        return Err(self.runtime_error(err_kind));
                    }
                },

                Instruction::SetLocal(slot) => {
                    let new_val = self.peek()?;
                    match self.stack.get_mut(slot as usize) {
                        Some(val) => *val = new_val,
                        None => {
                            let err_kind =
                                ErrorKind::InternalError(VmError::InvalidStackSlot(slot));
                            return Err(self.runtime_error(err_kind));
                        }
                    }
                }

                Instruction::Equal => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push(Value::Boolean(lhs == rhs))?;
                }

                Instruction::Greater => {
                    let rhs = self.pop_number()?;
                    let lhs = self.pop_number()?;
                    self.push(Value::Boolean(lhs > rhs))?;
                }

                Instruction::Less => {
                    let rhs = self.pop_number()?;
                    let lhs = self.pop_number()?;
                    self.push(Value::Boolean(lhs < rhs))?;
                }

                Instruction::Add => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    let result = match (lhs, rhs) {
                        (Value::Double(lnum), Value::Double(rnum)) => Value::Double(lnum + rnum),
                        (Value::String(mut lstr), Value::String(rstr)) => {
                            lstr.push_str(&rstr);
                            Value::String(lstr)
                        }
                        _ => {
                            let err_kind = ErrorKind::OperandsMustBeNumbersOrStrings;
                            return Err(self.runtime_error(err_kind));
                        }
                    };
                    self.push(result)?;
                }

                Instruction::Subtract => {
                    let rhs = self.pop_number()?;
                    let lhs = self.pop_number()?;
                    self.push(Value::Double(lhs - rhs))?;
                }

                Instruction::Multiply => {
                    let rhs = self.pop_number()?;
                    let lhs = self.pop_number()?;
                    self.push(Value::Double(lhs * rhs))?;
                }

                Instruction::Divide => {
                    // division by zero follows IEEE-754
                    let rhs = self.pop_number()?;
                    let lhs = self.pop_number()?;
                    self.push(Value::Double(lhs / rhs))?;
                }

                Instruction::Negate => match self.peek()? {
                    Value::Double(val) => {
                        self.pop()?;
                        self.push(Value::Double(-val))?;
                    }
                    _ => {
                        return Err(self.runtime_error(ErrorKind::OperandMustBeNumber));
                    }
                },

                Instruction::Not => {
                    let val = self.pop()?;
                    self.push(Value::Boolean(val.is_falsey()))?;
                }

                Instruction::Return => {
                    return Ok(());
                }

                Instruction::Invalid => {
                    let err_kind = ErrorKind::InternalError(VmError::InvalidOpCode);
                    return Err(self.runtime_error(err_kind));
                }
            }
            self.ip += instr_size;
        }
    }

    fn read_string(&self, offset: u8) -> Result<String, RuntimeError> {
        match self.chunk.constant(offset) {
            Value::String(name) => Ok(name.clone()),
            other => {
                let err_kind = ErrorKind::InternalError(VmError::UnexpectedValue(other.clone()));
                Err(self.runtime_error(err_kind))
            }
        }
    }

    // === error reporting ===
    fn runtime_error(&self, kind: ErrorKind) -> RuntimeError {
        // `ip` still points at the opcode byte of the failing instruction
        RuntimeError::new(self.chunk.line(self.ip), kind)
    }

    // === stack APIs ===
    fn push(&mut self, val: Value) -> Result<(), RuntimeError> {
        if self.stack.len() == STACK_MAX {
            let err_kind = ErrorKind::InternalError(VmError::StackOverflow);
            return Err(self.runtime_error(err_kind));
        }
        self.stack.push(val);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        match self.stack.pop() {
            Some(val) => Ok(val),
            None => {
                let err_kind = ErrorKind::InternalError(VmError::EmptyStackPop);
                Err(self.runtime_error(err_kind))
            }
        }
    }

    fn peek(&self) -> Result<Value, RuntimeError> {
        match self.stack.last() {
            Some(val) => Ok(val.clone()),
            None => {
                let err_kind = ErrorKind::InternalError(VmError::EmptyStackPop);
                Err(self.runtime_error(err_kind))
            }
        }
    }

    fn pop_number(&mut self) -> Result<f64, RuntimeError> {
        match self.pop()? {
            Value::Double(val) => Ok(val),
            _ => Err(self.runtime_error(ErrorKind::OperandsMustBeNumbers)),
        }
    }

    #[cfg(test)]
    fn stack_depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler;

    fn run_chunk(source: &str) -> (String, Result<(), RuntimeError>) {
        let mut diag = Vec::new();
        let chunk = compiler::compile(source, &mut diag).expect("compile error");
        let mut out = Vec::new();
        let mut vm = Vm::new(&chunk, &mut out);
        let result = vm.run();
        (String::from_utf8(out).unwrap(), result)
    }

    #[test]
    fn stack_is_empty_after_a_clean_run() {
        let mut diag = Vec::new();
        let chunk = compiler::compile("print 1 + 2;", &mut diag).unwrap();
        let mut out = Vec::new();
        let mut vm = Vm::new(&chunk, &mut out);
        vm.run().unwrap();
        assert_eq!(vm.stack_depth(), 0);
    }

    #[test]
    fn stack_is_reset_after_a_runtime_error() {
        let mut diag = Vec::new();
        let chunk = compiler::compile("1 + true;", &mut diag).unwrap();
        let mut out = Vec::new();
        let mut vm = Vm::new(&chunk, &mut out);
        assert!(vm.run().is_err());
        assert_eq!(vm.stack_depth(), 0);
    }

    #[test]
    fn define_global_reads_before_popping() {
        let (out, result) = run_chunk("var greeting = \"hi\"; print greeting;");
        assert!(result.is_ok());
        assert_eq!(out, "hi\n");
    }

    #[test]
    fn set_global_does_not_create_bindings() {
        let (_, result) = run_chunk("missing = 1;");
        let err = result.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Undefined variable 'missing'.\n[line 1] in script"
        );
    }

    #[test]
    fn error_line_comes_from_byte_offset() {
        let (_, result) = run_chunk("var a = 1;\nvar b = 2;\nprint -\"x\";");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("[line 3] in script"));
    }
}
