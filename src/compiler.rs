use crate::chunk::{Chunk, Instruction};
use crate::scanner::{Scanner, ScannerError, Token, TokenKind};
use crate::value::Value;
use log::debug;
use std::io::Write;

/// Local slots are addressed with one bytecode byte.
const MAX_LOCALS: usize = u8::MAX as usize + 1;

/// Compiles a source string into a chunk in a single pass. Diagnostics go
/// to `diag`; `None` means at least one compile error was reported.
pub fn compile<E: Write>(source: &str, diag: &mut E) -> Option<Chunk> {
    let scanner = Scanner::new(source);
    let parser = Parser::new(scanner, diag);
    let chunk = parser.parse()?;

    debug!(
        "compiled chunk: {} bytes, {} constants",
        chunk.code_len(),
        chunk.constants().len()
    );
    #[cfg(feature = "print-code")]
    crate::debug::disassemble_chunk(&chunk, "code");

    Some(chunk)
}

// the full ladder; Or, And, Call and Primary are levels no current
// operator sits at
#[derive(Copy, Clone)]
#[allow(dead_code)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

struct Local<'a> {
    name: Token<'a>,
    depth: usize,
    initialized: bool,
}

/// Compile-time mirror of the VM's value stack: a local's index in
/// `locals` is the stack slot its value lives in at runtime.
struct Scope<'a> {
    locals: Vec<Local<'a>>,
    depth: usize,
}

enum LookupError {
    Unresolved,
    ResolvedUninit,
}

impl<'a> Scope<'a> {
    fn new() -> Self {
        Scope {
            locals: Vec::new(),
            depth: 0,
        }
    }

    fn in_global_scope(&self) -> bool {
        self.depth == 0
    }

    fn add_local(&mut self, name: Token<'a>) {
        self.locals.push(Local {
            name,
            depth: self.depth,
            initialized: false,
        });
    }

    fn init_last_local(&mut self) {
        if let Some(last) = self.locals.last_mut() {
            last.initialized = true;
        }
    }

    fn resolve_local(&self, name: &str) -> Result<usize, LookupError> {
        if let Some((r_ix, found)) = self
            .locals
            .iter()
            .rev()
            .enumerate()
            .find(|item| item.1.name.lexeme == name)
        {
            if !found.initialized {
                return Err(LookupError::ResolvedUninit);
            }
            return Ok(self.locals.len() - r_ix - 1);
        }
        Err(LookupError::Unresolved)
    }
}

enum VarKind {
    Local,
    Global { offset: u8, line: u32 },
}

type Parselet<'a, E> = fn(&mut Parser<'a, E>, Token<'a>, bool);

struct Parser<'a, E: Write> {
    scanner: std::iter::Peekable<Scanner<'a>>,
    diag: &'a mut E,
    chunk: Chunk,
    scope: Scope<'a>,
    had_error: bool,
    panic_mode: bool,
    curr_line: u32,
}

impl<'a, E: Write> Parser<'a, E> {
    fn new(scanner: Scanner<'a>, diag: &'a mut E) -> Self {
        Parser {
            scanner: scanner.peekable(),
            diag,
            chunk: Chunk::new(),
            scope: Scope::new(),
            had_error: false,
            panic_mode: false,
            curr_line: 1,
        }
    }

    fn parse(mut self) -> Option<Chunk> {
        while !self.is_eof() {
            self.declaration();
        }

        if self.had_error {
            None
        } else {
            self.emit_return();
            Some(self.chunk)
        }
    }

    // === scope management ===
    fn begin_scope(&mut self) {
        self.scope.depth += 1;
    }

    fn end_scope(&mut self) {
        self.scope.depth -= 1;
        let curr_depth = self.scope.depth;
        let mut drop_count = self
            .scope
            .locals
            .iter()
            .rev()
            .take_while(|loc| loc.depth > curr_depth)
            .count();

        while drop_count > 0 {
            self.scope.locals.pop();
            self.emit_instruction(Instruction::Pop, self.curr_line);
            drop_count -= 1;
        }
    }

    // === code emitters ===
    fn emit_instruction(&mut self, instr: Instruction, line: u32) {
        self.chunk.push_instruction(instr, line);
    }

    fn emit_constant(&mut self, val: Value) -> u8 {
        let index = self.chunk.add_constant(val);
        if index > u8::MAX as usize {
            self.error_bare(self.curr_line, "Too many constants in one chunk.");
            return 0;
        }
        index as u8
    }

    fn emit_identifier(&mut self, name: &str) -> u8 {
        self.emit_constant(Value::String(name.to_string()))
    }

    fn emit_return(&mut self) {
        self.emit_instruction(Instruction::Return, self.curr_line);
    }

    // === declarations and statements ===
    fn declaration(&mut self) {
        match self.peek() {
            Some(tok) if tok.kind == TokenKind::Var => {
                self.advance();
                self.var_decl();
            }
            Some(_) => self.statement(),
            None => {}
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn statement(&mut self) {
        match self.peek() {
            Some(tok) => match tok.kind {
                TokenKind::Print => {
                    self.advance();
                    self.print_statement();
                }
                TokenKind::LeftBrace => {
                    self.advance();
                    self.begin_scope();
                    self.block();
                    self.end_scope();
                    self.consume(TokenKind::RightBrace, "Expect '}' after block.");
                }
                _ => {
                    self.expr_statement();
                }
            },
            None => {}
        }
    }

    fn var_decl(&mut self) {
        let var_kind = self.parse_var("Expect variable name.");

        // compile the initializer, leaving its value on top of the stack;
        // a missing initializer means nil
        if self.consume_if(TokenKind::Equal).is_some() {
            self.expression();
        } else {
            self.emit_instruction(Instruction::Nil, self.curr_line);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");

        match var_kind {
            VarKind::Global { offset, line } => {
                self.emit_instruction(Instruction::DefineGlobal(offset), line);
            }
            VarKind::Local => {
                // becomes visible to lookups only now, so its own
                // initializer could not read it
                self.scope.init_last_local();
            }
        }
    }

    fn parse_var(&mut self, msg: &str) -> VarKind {
        let ident = match self.consume(TokenKind::Identifier, msg) {
            Some(tok) => tok,
            None => return VarKind::Local,
        };

        if self.scope.in_global_scope() {
            // globals are looked up by name at runtime; stash the name in
            // the constant pool
            let line = ident.line;
            let offset = self.emit_identifier(ident.lexeme);
            VarKind::Global { offset, line }
        } else {
            self.declare_local(ident);
            VarKind::Local
        }
    }

    fn declare_local(&mut self, ident: Token<'a>) {
        if self.scope.locals.len() == MAX_LOCALS {
            self.error_at(&ident, "Too many local variables in scope.");
            return;
        }

        let curr_depth = self.scope.depth;
        let dup_var = self
            .scope
            .locals
            .iter()
            .rev()
            .take_while(|loc| loc.depth == curr_depth)
            .any(|loc| loc.name.lexeme == ident.lexeme);
        if dup_var {
            self.error_at(&ident, "Re-definition of an existing variable in this scope.");
        }

        self.scope.add_local(ident);
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_instruction(Instruction::Print, self.curr_line);
    }

    fn expr_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_instruction(Instruction::Pop, self.curr_line);
    }

    fn block(&mut self) {
        while let Some(tok) = self.peek() {
            if tok.kind == TokenKind::RightBrace {
                break;
            }
            self.declaration();
        }
    }

    // === expressions ===
    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment as i32)
    }

    fn number(&mut self, tok: Token<'a>, _: bool) {
        let val = tok.lexeme.parse::<f64>().unwrap();
        let offset = self.emit_constant(Value::Double(val));
        self.emit_instruction(Instruction::Constant(offset), tok.line);
    }

    fn string(&mut self, tok: Token<'a>, _: bool) {
        // the lexeme carries its enclosing quotes
        let contents = &tok.lexeme[1..tok.lexeme.len() - 1];
        let offset = self.emit_constant(Value::String(contents.to_string()));
        self.emit_instruction(Instruction::Constant(offset), tok.line);
    }

    fn literal(&mut self, tok: Token<'a>, _: bool) {
        match tok.kind {
            TokenKind::True => self.emit_instruction(Instruction::True, tok.line),
            TokenKind::False => self.emit_instruction(Instruction::False, tok.line),
            TokenKind::Nil => self.emit_instruction(Instruction::Nil, tok.line),
            _ => self.error_at(&tok, "Expect expression."),
        }
    }

    fn grouping(&mut self, _: Token<'a>, _: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self, tok: Token<'a>, _: bool) {
        self.parse_precedence(Precedence::Unary as i32);
        match tok.kind {
            TokenKind::Minus => self.emit_instruction(Instruction::Negate, tok.line),
            TokenKind::Bang => self.emit_instruction(Instruction::Not, tok.line),
            _ => self.error_at(&tok, "Expect expression."),
        }
    }

    fn binary(&mut self, tok: Token<'a>, _: bool) {
        let my_prec = Self::infix_prec(tok.kind);
        self.parse_precedence(my_prec as i32 + 1);

        match tok.kind {
            TokenKind::Plus => self.emit_instruction(Instruction::Add, tok.line),
            TokenKind::Minus => self.emit_instruction(Instruction::Subtract, tok.line),
            TokenKind::Star => self.emit_instruction(Instruction::Multiply, tok.line),
            TokenKind::Slash => self.emit_instruction(Instruction::Divide, tok.line),
            TokenKind::EqualEqual => self.emit_instruction(Instruction::Equal, tok.line),
            TokenKind::BangEqual => {
                self.emit_instruction(Instruction::Equal, tok.line);
                self.emit_instruction(Instruction::Not, tok.line);
            }
            TokenKind::Greater => self.emit_instruction(Instruction::Greater, tok.line),
            TokenKind::GreaterEqual => {
                self.emit_instruction(Instruction::Less, tok.line);
                self.emit_instruction(Instruction::Not, tok.line);
            }
            TokenKind::Less => self.emit_instruction(Instruction::Less, tok.line),
            TokenKind::LessEqual => {
                self.emit_instruction(Instruction::Greater, tok.line);
                self.emit_instruction(Instruction::Not, tok.line);
            }
            _ => self.error_at(&tok, "Expect expression."),
        }
    }

    fn variable(&mut self, tok: Token<'a>, can_assign: bool) {
        let is_assign = can_assign && self.consume_if(TokenKind::Equal).is_some();

        match self.scope.resolve_local(tok.lexeme) {
            Ok(slot) => {
                if is_assign {
                    self.expression();
                    self.emit_instruction(Instruction::SetLocal(slot as u8), tok.line);
                } else {
                    self.emit_instruction(Instruction::GetLocal(slot as u8), tok.line);
                }
            }
            Err(LookupError::Unresolved) => {
                // not a local; assume a global and resolve by name at runtime
                let offset = self.emit_identifier(tok.lexeme);
                if is_assign {
                    self.expression();
                    self.emit_instruction(Instruction::SetGlobal(offset), tok.line);
                } else {
                    self.emit_instruction(Instruction::GetGlobal(offset), tok.line);
                }
            }
            Err(LookupError::ResolvedUninit) => {
                self.error_at(&tok, "Can't read local variable in its own initializer.");
            }
        }
    }

    fn parse_precedence(&mut self, prec: i32) {
        let tok = match self.advance() {
            Some(tok) => tok,
            None => {
                self.error_at_end("Expect expression.");
                return;
            }
        };

        // individual parselets look for a following '=' only when told to
        let can_assign = prec <= Precedence::Assignment as i32;

        match Self::prefix_rule(tok.kind) {
            Some(parselet) => parselet(self, tok, can_assign),
            None => {
                self.error_at(&tok, "Expect expression.");
                return;
            }
        }

        while let Some(next) = self.peek() {
            if prec <= Self::infix_prec(next.kind) as i32 {
                let parselet = Self::infix_rule(next.kind).unwrap();
                self.advance();
                parselet(self, next, can_assign);
            } else {
                break;
            }
        }

        if can_assign {
            if let Some(assign) = self.consume_if(TokenKind::Equal) {
                self.error_at(&assign, "Invalid assignment target.");
            }
        }
    }

    fn prefix_rule(kind: TokenKind) -> Option<Parselet<'a, E>> {
        match kind {
            TokenKind::LeftParen => Some(Self::grouping),
            TokenKind::Number => Some(Self::number),
            TokenKind::String => Some(Self::string),
            TokenKind::Identifier => Some(Self::variable),
            TokenKind::True => Some(Self::literal),
            TokenKind::False => Some(Self::literal),
            TokenKind::Nil => Some(Self::literal),
            TokenKind::Minus => Some(Self::unary),
            TokenKind::Bang => Some(Self::unary),
            _ => None,
        }
    }

    fn infix_prec(kind: TokenKind) -> Precedence {
        match kind {
            TokenKind::Minus => Precedence::Term,
            TokenKind::Plus => Precedence::Term,
            TokenKind::Star => Precedence::Factor,
            TokenKind::Slash => Precedence::Factor,
            TokenKind::BangEqual => Precedence::Equality,
            TokenKind::EqualEqual => Precedence::Equality,
            TokenKind::Greater => Precedence::Comparison,
            TokenKind::GreaterEqual => Precedence::Comparison,
            TokenKind::Less => Precedence::Comparison,
            TokenKind::LessEqual => Precedence::Comparison,
            _ => Precedence::None,
        }
    }

    fn infix_rule(kind: TokenKind) -> Option<Parselet<'a, E>> {
        match kind {
            TokenKind::Minus => Some(Self::binary),
            TokenKind::Plus => Some(Self::binary),
            TokenKind::Star => Some(Self::binary),
            TokenKind::Slash => Some(Self::binary),
            TokenKind::BangEqual => Some(Self::binary),
            TokenKind::EqualEqual => Some(Self::binary),
            TokenKind::Greater => Some(Self::binary),
            TokenKind::GreaterEqual => Some(Self::binary),
            TokenKind::Less => Some(Self::binary),
            TokenKind::LessEqual => Some(Self::binary),
            _ => None,
        }
    }

    // === parse utils ===
    fn advance(&mut self) -> Option<Token<'a>> {
        while let Some(tok_or_err) = self.scanner.next() {
            match tok_or_err {
                Ok(tok) => {
                    self.curr_line = tok.line;
                    return Some(tok);
                }
                Err(err) => self.error_in_scan(err),
            }
        }
        None
    }

    fn peek(&mut self) -> Option<Token<'a>> {
        loop {
            match self.scanner.peek() {
                Some(Ok(tok)) => return Some(tok.clone()),
                Some(Err(err)) => {
                    let err = *err;
                    self.scanner.next();
                    self.error_in_scan(err);
                }
                None => return None,
            }
        }
    }

    fn consume(&mut self, kind: TokenKind, msg: &str) -> Option<Token<'a>> {
        match self.peek() {
            Some(tok) if tok.kind == kind => self.advance(),
            Some(tok) => {
                self.error_at(&tok, msg);
                None
            }
            None => {
                self.error_at_end(msg);
                None
            }
        }
    }

    fn consume_if(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        match self.peek() {
            Some(tok) if tok.kind == kind => {
                self.advance();
                Some(tok)
            }
            _ => None,
        }
    }

    fn is_eof(&mut self) -> bool {
        self.peek().is_none()
    }

    // === error reporting ===
    fn report(&mut self, line: u32, place: &str, msg: &str) {
        // in panic mode, follow-on diagnostics are noise; stay quiet
        // until the next synchronization point
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        let _ = writeln!(self.diag, "[line {}] Error{}: {}", line, place, msg);
    }

    fn error_at(&mut self, tok: &Token<'a>, msg: &str) {
        let place = format!(" at {}", tok.lexeme);
        self.report(tok.line, &place, msg);
    }

    fn error_at_end(&mut self, msg: &str) {
        self.report(self.curr_line, " at end", msg);
    }

    fn error_bare(&mut self, line: u32, msg: &str) {
        self.report(line, "", msg);
    }

    fn error_in_scan(&mut self, err: ScannerError) {
        match err {
            ScannerError::UnterminatedString(line) => {
                self.error_bare(line, "Unterminated string.");
            }
            ScannerError::UnrecognizedChar(line) => {
                self.error_bare(line, "Unexpected character.");
            }
        }
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;

        while let Some(tok) = self.peek() {
            match tok.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => {
                    return;
                }
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }
}
