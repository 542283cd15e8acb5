pub mod chunk;
pub mod compiler;
pub mod debug;
pub mod error;
pub mod scanner;
pub mod value;
pub mod vm;

use std::io::Write;

/// Overall outcome of interpreting one source string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

/// Compiles and runs `source`. Printed values go to `out`, one per line;
/// compile and runtime diagnostics go to `diag`.
pub fn interpret<W: Write, E: Write>(source: &str, out: &mut W, diag: &mut E) -> InterpretResult {
    let chunk = match compiler::compile(source, diag) {
        Some(chunk) => chunk,
        None => return InterpretResult::CompileError,
    };

    let mut vm = vm::Vm::new(&chunk, out);
    match vm.run() {
        Ok(()) => InterpretResult::Ok,
        Err(err) => {
            let _ = writeln!(diag, "{}", err);
            InterpretResult::RuntimeError
        }
    }
}
