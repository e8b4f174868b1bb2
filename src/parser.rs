use std::rc::Rc;

use log::{debug, info};

use crate::error::{ProlangError, Result};
use crate::expr::Expr;
use crate::reporting;
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};

/// Parameter and argument lists are capped; exceeding the cap is reported
/// but does not abort the parse.
const MAX_ARITY: usize = 255;

/// Recursive-descent parser with panic-mode recovery.
///
/// Errors are reported to the sink as they occur; on an error the parser
/// discards tokens until the likely start of the next declaration and keeps
/// going, so one pass surfaces as many syntax errors as possible.  Every
/// `Variable`/`Assign`/`This`/`Super` node is stamped with a unique id for
/// the resolver's side-table.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    next_id: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        info!("Initializing Parser with {} token(s)", tokens.len());
        Parser {
            tokens,
            current: 0,
            next_id: 0,
        }
    }

    /// program → declaration* EOF
    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        statements
    }

    /// declaration → classDecl | funDecl | varDecl | statement
    ///
    /// This is the recovery point: a broken declaration yields `None` and
    /// parsing resumes at the next statement boundary.
    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_tokens(&[TokenType::CLASS]) {
            self.class_declaration()
        } else if self.match_tokens(&[TokenType::FUNC]) {
            self.function("function").map(Stmt::Function)
        } else if self.match_tokens(&[TokenType::LET]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),

            Err(e) => {
                debug!("Synchronizing after parse error: {}", e);
                self.synchronize();
                None
            }
        }
    }

    /// classDecl → "class" IDENT ("extends" IDENT)? "{" function* "}"
    fn class_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume(TokenType::IDENTIFIER, "Expect class name.")?;

        let superclass = if self.match_tokens(&[TokenType::EXTENDS]) {
            let super_name = self.consume(TokenType::IDENTIFIER, "Expect superclass name.")?;
            Some(Expr::Variable {
                name: super_name,
                id: self.fresh_id(),
            })
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    /// function → IDENT "(" params? ")" block
    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>> {
        let name = self.consume(TokenType::IDENTIFIER, &format!("Expect {} name.", kind))?;

        self.consume(
            TokenType::LEFT_PAREN,
            &format!("Expect '(' after {} name.", kind),
        )?;

        let mut params = Vec::new();
        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_ARITY {
                    reporting::error(
                        self.peek().line,
                        "Can't have more than 255 parameters.",
                    );
                }

                params.push(self.consume(TokenType::IDENTIFIER, "Expect parameter name.")?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;

        self.consume(
            TokenType::LEFT_BRACE,
            &format!("Expect '{{' before {} body.", kind),
        )?;

        let body = self.block()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    /// varDecl → "let" IDENT ("=" expression)? ";"
    fn var_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume(TokenType::IDENTIFIER, "Expect variable name.")?;

        let initializer = if self.match_tokens(&[TokenType::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    /// statement → forStmt | ifStmt | printStmt | returnStmt | whileStmt
    ///           | block | exprStmt
    fn statement(&mut self) -> Result<Stmt> {
        if self.match_tokens(&[TokenType::FOR]) {
            return self.for_statement();
        }
        if self.match_tokens(&[TokenType::IF]) {
            return self.if_statement();
        }
        if self.match_tokens(&[TokenType::PRINT]) {
            return self.print_statement();
        }
        if self.match_tokens(&[TokenType::RETURN]) {
            return self.return_statement();
        }
        if self.match_tokens(&[TokenType::WHILE]) {
            return self.while_statement();
        }
        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            return Ok(Stmt::Block(self.block()?));
        }

        self.expression_statement()
    }

    /// forStmt → "for" "(" (varDecl | exprStmt | ";") expression? ";"
    ///           expression? ")" statement
    ///
    /// Desugared into a while loop: the initializer and loop wrap the body
    /// in blocks, the increment is appended to the body, and a missing
    /// condition becomes a `true` literal.
    fn for_statement(&mut self) -> Result<Stmt> {
        let paren = self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer = if self.match_tokens(&[TokenType::SEMICOLON]) {
            None
        } else if self.match_tokens(&[TokenType::LET]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment = if !self.check(&TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition = condition.unwrap_or_else(|| {
            Expr::Literal(Token::new(TokenType::TRUE, "true".to_string(), paren.line))
        });

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    /// ifStmt → "if" "(" expression ")" statement ("else" statement)?
    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after condition.")?;

        let then_branch = Box::new(self.statement()?);

        let else_branch = if self.match_tokens(&[TokenType::ELSE]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    /// printStmt → "print" expression ";"
    fn print_statement(&mut self) -> Result<Stmt> {
        let value = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;

        Ok(Stmt::Print(value))
    }

    /// returnStmt → "return" expression? ";"
    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous().clone();

        let value = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    /// whileStmt → "while" "(" expression ")" statement
    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after condition.")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    /// block → "{" declaration* "}"
    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;

        Ok(statements)
    }

    /// expressionStmt → expression ";"
    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after value.")?;

        Ok(Stmt::Expression(expr))
    }

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    /// assignment → (call ".")? IDENT "=" assignment | logicOr
    ///
    /// The left-hand side is parsed as an ordinary expression and then
    /// checked: only variables and property accesses are assignable.
    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.logical_or()?;

        if self.match_tokens(&[TokenType::EQUAL]) {
            let equals = self.previous().clone();

            // right-associative
            let value = self.assignment()?;

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign {
                    name,
                    value: Box::new(value),
                    id: self.fresh_id(),
                }),

                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                }),

                _ => Err(self.error(&equals, "Invalid assignment target.")),
            };
        }

        Ok(expr)
    }

    /// logicOr → logicAnd ("or" logicAnd)*
    fn logical_or(&mut self) -> Result<Expr> {
        let mut expr = self.logical_and()?;

        while self.match_tokens(&[TokenType::OR]) {
            let operator = self.previous().clone();
            let right = self.logical_and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// logicAnd → equality ("and" equality)*
    fn logical_and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while self.match_tokens(&[TokenType::AND]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// equality → comparison (("!=" | "==") comparison)*
    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;

        while self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// comparison → term ((">" | ">=" | "<" | "<=") term)*
    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;

        while self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// term → factor (("-" | "+") factor)*
    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.factor()?;

        while self.match_tokens(&[TokenType::MINUS, TokenType::PLUS]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// factor → unary (("/" | "*") unary)*
    fn factor(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;

        while self.match_tokens(&[TokenType::SLASH, TokenType::STAR]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// unary → ("!" | "-") unary | call
    fn unary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    /// call → primary ("(" args? ")" | "." IDENT)*
    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_tokens(&[TokenType::LEFT_PAREN]) {
                expr = self.finish_call(expr)?;
            } else if self.match_tokens(&[TokenType::DOT]) {
                let name =
                    self.consume(TokenType::IDENTIFIER, "Expect property name after '.'.")?;
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    reporting::error(self.peek().line, "Can't have more than 255 arguments.");
                }

                arguments.push(self.expression()?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    /// primary → "true" | "false" | "nil" | NUMBER | STRING | IDENT | "this"
    ///         | "super" "." IDENT | "(" expression ")"
    fn primary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[
            TokenType::NUMBER(0.0),
            TokenType::STRING(String::new()),
            TokenType::TRUE,
            TokenType::FALSE,
            TokenType::NIL,
        ]) {
            return Ok(Expr::Literal(self.previous().clone()));
        }

        if self.match_tokens(&[TokenType::THIS]) {
            return Ok(Expr::This {
                keyword: self.previous().clone(),
                id: self.fresh_id(),
            });
        }

        if self.match_tokens(&[TokenType::SUPER]) {
            let keyword = self.previous().clone();
            self.consume(TokenType::DOT, "Expect '.' after 'super'.")?;
            let method =
                self.consume(TokenType::IDENTIFIER, "Expect superclass method name.")?;
            return Ok(Expr::Super {
                keyword,
                method,
                id: self.fresh_id(),
            });
        }

        if self.match_tokens(&[TokenType::IDENTIFIER]) {
            return Ok(Expr::Variable {
                name: self.previous().clone(),
                id: self.fresh_id(),
            });
        }

        if self.match_tokens(&[TokenType::LEFT_PAREN]) {
            let expr = self.expression()?;
            self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }

        Err(self.error(&self.peek().clone(), "Expect expression."))
    }

    /// Discard tokens until the likely beginning of the next declaration.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUNC
                | TokenType::LET
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => return,

                _ => {}
            }

            self.advance();
        }
    }

    /// Report a parse error at the given token and hand it back for `?`.
    fn error(&self, token: &Token, message: &str) -> ProlangError {
        if token.token_type == TokenType::EOF {
            reporting::report(token.line, "at end", message);
        } else {
            reporting::report(token.line, &format!("at '{}'", token.lexeme), message);
        }

        ProlangError::parse(token.line, message)
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<Token> {
        if self.check(&token_type) {
            return Ok(self.advance().clone());
        }

        Err(self.error(&self.peek().clone(), message))
    }

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }

        false
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        &self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn fresh_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_printer::Ast;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> Vec<Stmt> {
        let tokens: Vec<Token> = Scanner::new(source.as_bytes())
            .filter_map(std::result::Result::ok)
            .collect();
        Parser::new(tokens).parse()
    }

    fn parse_expr(source: &str) -> Expr {
        match parse(source).into_iter().next() {
            Some(Stmt::Expression(expr)) => expr,
            other => panic!("expected an expression statement, got {:?}", other),
        }
    }

    #[test]
    fn factor_binds_tighter_than_term() {
        let expr = parse_expr("1 + 2 * 3;");

        assert_eq!(Ast.print(&expr), "(+ 1.0 (* 2.0 3.0))");
    }

    #[test]
    fn unary_and_grouping() {
        let expr = parse_expr("-(1 + 2);");

        assert_eq!(Ast.print(&expr), "(- (group (+ 1.0 2.0)))");
    }

    #[test]
    fn comparison_binds_tighter_than_equality() {
        let expr = parse_expr("1 < 2 == true;");

        assert_eq!(Ast.print(&expr), "(== (< 1.0 2.0) true)");
    }

    #[test]
    fn logical_operators_nest_or_over_and() {
        let expr = parse_expr("a or b and c;");

        assert_eq!(Ast.print(&expr), "(or a (and b c))");
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = parse_expr("a = b = 1;");

        assert_eq!(Ast.print(&expr), "(= a (= b 1.0))");
    }

    #[test]
    fn property_chains_and_calls() {
        let expr = parse_expr("obj.field.method(1, 2);");

        assert_eq!(
            Ast.print(&expr),
            "(call (. (. obj field) method) 1.0 2.0)"
        );
    }

    #[test]
    fn super_requires_a_method_name() {
        // bare 'super' is a parse error, so the declaration is dropped
        let statements = parse("class B extends A { m() { return super; } }");

        assert!(statements.is_empty());
    }

    #[test]
    fn invalid_assignment_target_is_rejected() {
        let statements = parse("1 = 2;");

        assert!(statements.is_empty());
    }

    #[test]
    fn for_loop_desugars_to_while_in_a_block() {
        let statements = parse("for (let i = 0; i < 3; i = i + 1) print i;");

        assert_eq!(statements.len(), 1);
        match &statements[0] {
            Stmt::Block(stmts) => {
                assert!(matches!(stmts[0], Stmt::Var { .. }));
                match &stmts[1] {
                    Stmt::While { body, .. } => match body.as_ref() {
                        Stmt::Block(inner) => {
                            assert!(matches!(inner[0], Stmt::Print(_)));
                            assert!(matches!(inner[1], Stmt::Expression(_)));
                        }
                        other => panic!("expected a block body, got {:?}", other),
                    },
                    other => panic!("expected a while loop, got {:?}", other),
                }
            }
            other => panic!("expected a block, got {:?}", other),
        }
    }

    #[test]
    fn for_loop_without_condition_gets_a_true_literal() {
        let statements = parse("for (;;) print 1;");

        match &statements[0] {
            Stmt::While { condition, .. } => {
                assert!(matches!(
                    condition,
                    Expr::Literal(token) if token.token_type == TokenType::TRUE
                ));
            }
            other => panic!("expected a while loop, got {:?}", other),
        }
    }

    #[test]
    fn class_declaration_with_superclass() {
        let statements = parse("class B extends A { m() { print 1; } }");

        match &statements[0] {
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                assert_eq!(name.lexeme, "B");
                assert!(matches!(
                    superclass,
                    Some(Expr::Variable { name, .. }) if name.lexeme == "A"
                ));
                assert_eq!(methods.len(), 1);
                assert_eq!(methods[0].name.lexeme, "m");
            }
            other => panic!("expected a class declaration, got {:?}", other),
        }
    }

    #[test]
    fn recovery_continues_after_a_broken_declaration() {
        let statements = parse("let = 1; print 2;");

        // the broken declaration is dropped, the print survives
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Stmt::Print(_)));
    }

    #[test]
    fn variable_occurrences_get_distinct_ids() {
        let expr = parse_expr("a + a;");

        match expr {
            Expr::Binary { left, right, .. } => match (*left, *right) {
                (Expr::Variable { id: lhs, .. }, Expr::Variable { id: rhs, .. }) => {
                    assert_ne!(lhs, rhs);
                }
                other => panic!("expected two variables, got {:?}", other),
            },
            other => panic!("expected a binary expression, got {:?}", other),
        }
    }
}
