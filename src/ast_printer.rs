use itertools::Itertools;

use crate::expr::Expr;
use crate::token::TokenType;

/// Renders expressions in parenthesized prefix form, e.g. `(+ 1.0 (* 2.0 3.0))`.
/// Used by parser tests to pin down precedence and tree shapes.
pub struct Ast;

impl Ast {
    pub fn print(&self, expr: &Expr) -> String {
        match expr {
            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                self.print(left),
                self.print(right)
            ),

            Expr::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, self.print(right))
            }

            Expr::Literal(token) => match &token.token_type {
                TokenType::NUMBER(n) => {
                    if n.fract() == 0.0 {
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }

                TokenType::STRING(s) => s.to_string(),

                TokenType::TRUE => "true".to_string(),

                TokenType::FALSE => "false".to_string(),

                TokenType::NIL => "nil".to_string(),

                _ => unreachable!("Invalid literal"),
            },

            Expr::Grouping(expr) => format!("(group {})", self.print(expr)),

            Expr::Variable { name, .. } => name.lexeme.to_string(),

            Expr::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, self.print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                if arguments.is_empty() {
                    format!("(call {})", self.print(callee))
                } else {
                    format!(
                        "(call {} {})",
                        self.print(callee),
                        arguments.iter().map(|arg| self.print(arg)).join(" ")
                    )
                }
            }

            Expr::Get { object, name } => format!("(. {} {})", self.print(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                self.print(object),
                name.lexeme,
                self.print(value)
            ),

            Expr::This { .. } => "this".to_string(),

            Expr::Super { method, .. } => format!("(super {})", method.lexeme),
        }
    }
}
