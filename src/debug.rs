use crate::chunk::{Chunk, Instruction, InstructionOffsetIter};

/// Iterator over a chunk producing one formatted line per instruction.
pub struct Disassembler<'a> {
    chunk: &'a Chunk,
    iter: InstructionOffsetIter<'a>,
}

impl<'a> Disassembler<'a> {
    pub fn new(chunk: &'a Chunk) -> Self {
        Disassembler {
            iter: chunk.iter().with_code_offset(),
            chunk,
        }
    }
}

impl<'a> Iterator for Disassembler<'a> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let (code_offset, instr) = self.iter.next()?;
        Some(format_instruction(self.chunk, code_offset, &instr))
    }
}

fn line_column(chunk: &Chunk, offset: usize) -> String {
    if offset > 0 && chunk.line(offset) == chunk.line(offset - 1) {
        format!("{:>4} ", "|")
    } else {
        format!("{:04} ", chunk.line(offset))
    }
}

fn constant_column(chunk: &Chunk, const_index: u8) -> String {
    if let Some(val) = chunk.constant_checked(const_index) {
        format!("'{:?}'", val)
    } else {
        "<out-of-bound>".to_string()
    }
}

fn format_instruction(chunk: &Chunk, offset: usize, instr: &Instruction) -> String {
    let mut result = format!("{:04} {}", offset, line_column(chunk, offset));
    match *instr {
        Instruction::Constant(val_offset) => {
            result.push_str(
                format!(
                    "OP_CONSTANT {:>16} {}",
                    format!("{:04}", val_offset),
                    constant_column(chunk, val_offset)
                )
                .as_str(),
            );
        }
        Instruction::DefineGlobal(val_offset) => {
            result.push_str(
                format!(
                    "OP_DEFINE_GLOBAL {:>11} {}",
                    format!("{:04}", val_offset),
                    constant_column(chunk, val_offset)
                )
                .as_str(),
            );
        }
        Instruction::GetGlobal(val_offset) => {
            result.push_str(
                format!(
                    "OP_GET_GLOBAL {:>14} {}",
                    format!("{:04}", val_offset),
                    constant_column(chunk, val_offset)
                )
                .as_str(),
            );
        }
        Instruction::SetGlobal(val_offset) => {
            result.push_str(
                format!(
                    "OP_SET_GLOBAL {:>14} {}",
                    format!("{:04}", val_offset),
                    constant_column(chunk, val_offset)
                )
                .as_str(),
            );
        }
        Instruction::GetLocal(slot) => {
            result.push_str(format!("OP_GET_LOCAL {:>15}", format!("{:04}", slot)).as_str());
        }
        Instruction::SetLocal(slot) => {
            result.push_str(format!("OP_SET_LOCAL {:>15}", format!("{:04}", slot)).as_str());
        }
        Instruction::Nil => result.push_str("OP_NIL"),
        Instruction::True => result.push_str("OP_TRUE"),
        Instruction::False => result.push_str("OP_FALSE"),
        Instruction::Pop => result.push_str("OP_POP"),
        Instruction::Equal => result.push_str("OP_EQUAL"),
        Instruction::Greater => result.push_str("OP_GREATER"),
        Instruction::Less => result.push_str("OP_LESS"),
        Instruction::Add => result.push_str("OP_ADD"),
        Instruction::Subtract => result.push_str("OP_SUBTRACT"),
        Instruction::Multiply => result.push_str("OP_MULTIPLY"),
        Instruction::Divide => result.push_str("OP_DIVIDE"),
        Instruction::Negate => result.push_str("OP_NEGATE"),
        Instruction::Not => result.push_str("OP_NOT"),
        Instruction::Print => result.push_str("OP_PRINT"),
        Instruction::Return => result.push_str("OP_RETURN"),
        Instruction::Invalid => result.push_str("OP_INVALID"),
    }
    result
}

/// Formats the single instruction starting at `offset`.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> String {
    let (_, instr) = chunk.read_instruction(offset);
    format_instruction(chunk, offset, &instr)
}

pub fn disassemble_chunk(chunk: &Chunk, name: &str) {
    println!("== {} ==", name);
    for instr_str in Disassembler::new(chunk) {
        println!("{}", instr_str);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn listing_marks_line_continuations() {
        let mut chunk = Chunk::new();
        let ix = chunk.add_constant(Value::Double(1.0));
        chunk.push_instruction(Instruction::Constant(ix as u8), 1);
        chunk.push_instruction(Instruction::Print, 1);
        chunk.push_instruction(Instruction::Return, 2);

        let listing: Vec<String> = Disassembler::new(&chunk).collect();
        assert_eq!(listing.len(), 3);
        assert!(listing[0].starts_with("0000 0001 OP_CONSTANT"));
        assert!(listing[0].ends_with("'Double(1.0)'"));
        assert!(listing[1].starts_with("0002    | OP_PRINT"));
        assert!(listing[2].starts_with("0003 0002 OP_RETURN"));
    }

    #[test]
    fn out_of_bound_constant_is_flagged() {
        let mut chunk = Chunk::new();
        chunk.push_instruction(Instruction::Constant(9), 1);
        let listing: Vec<String> = Disassembler::new(&chunk).collect();
        assert!(listing[0].ends_with("<out-of-bound>"));
    }
}
