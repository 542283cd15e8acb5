use loxbyte::InterpretResult;

pub struct Run {
    pub out: String,
    pub diag: String,
    pub result: InterpretResult,
}

/// Interprets `source` against in-memory sinks.
pub fn run(source: &str) -> Run {
    let mut out = Vec::new();
    let mut diag = Vec::new();
    let result = loxbyte::interpret(source, &mut out, &mut diag);
    Run {
        out: String::from_utf8(out).unwrap(),
        diag: String::from_utf8(diag).unwrap(),
        result,
    }
}
