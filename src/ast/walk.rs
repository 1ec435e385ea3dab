//! Depth-first traversal over the AST.

use crate::ast::{
    DataType, Dimension, Expr, Field, Metric, Query, SelectStatement, SortField, Source, Statement,
    SubQuery, Target,
};

/// A borrowed reference to any node in the tree.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Query(&'a Query),
    SelectStatement(&'a SelectStatement),
    Field(&'a Field),
    Dimension(&'a Dimension),
    SortField(&'a SortField),
    Target(&'a Target),
    Metric(&'a Metric),
    SubQuery(&'a SubQuery),
    Expr(&'a Expr),
}

/// Called by [`walk`] once per node. Return false to skip the node's
/// children.
pub trait Visitor {
    fn visit(&mut self, node: Node<'_>) -> bool;
}

/// Traverses a node hierarchy in depth-first order, visiting children in
/// field declaration order.
pub fn walk(v: &mut dyn Visitor, node: Node<'_>) {
    if !v.visit(node) {
        return;
    }

    match node {
        Node::Query(q) => {
            for stmt in &q.statements {
                let Statement::Select(s) = stmt;
                walk(v, Node::SelectStatement(s));
            }
        }
        Node::SelectStatement(s) => {
            for field in &s.fields {
                walk(v, Node::Field(field));
            }
            if let Some(target) = &s.target {
                walk(v, Node::Target(target));
            }
            for dim in &s.dimensions {
                walk(v, Node::Dimension(dim));
            }
            for source in &s.sources {
                match source {
                    Source::Metric(m) => walk(v, Node::Metric(m)),
                    Source::SubQuery(sq) => walk(v, Node::SubQuery(sq)),
                }
            }
            if let Some(condition) = &s.condition {
                walk(v, Node::Expr(condition));
            }
            for sf in &s.sort_fields {
                walk(v, Node::SortField(sf));
            }
        }
        Node::Field(field) => walk(v, Node::Expr(&field.expr)),
        Node::Dimension(dim) => walk(v, Node::Expr(&dim.expr)),
        Node::Target(target) => walk(v, Node::Metric(&target.metric)),
        Node::SubQuery(sq) => walk(v, Node::SelectStatement(&sq.statement)),
        Node::Expr(expr) => match expr {
            Expr::Binary { lhs, rhs, .. } => {
                walk(v, Node::Expr(lhs));
                walk(v, Node::Expr(rhs));
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    walk(v, Node::Expr(arg));
                }
            }
            Expr::Paren(inner) => walk(v, Node::Expr(inner)),
            _ => {}
        },
        Node::Metric(_) | Node::SortField(_) => {}
    }
}

/// Traverses a node hierarchy in depth-first order with a plain callback.
pub fn walk_fn<F: FnMut(Node<'_>)>(node: Node<'_>, f: F) {
    struct FnVisitor<F>(F);
    impl<F: FnMut(Node<'_>)> Visitor for FnVisitor<F> {
        fn visit(&mut self, node: Node<'_>) -> bool {
            (self.0)(node);
            true
        }
    }
    walk(&mut FnVisitor(f), node);
}

/// Returns true if the expression is, or contains, a variable reference.
/// References inside function calls are not counted.
pub fn contains_var_ref(expr: &Expr) -> bool {
    struct ContainsVarRef {
        contains: bool,
    }
    impl Visitor for ContainsVarRef {
        fn visit(&mut self, node: Node<'_>) -> bool {
            if let Node::Expr(e) = node {
                match e {
                    Expr::Call { .. } => return false,
                    Expr::VarRef { .. } => self.contains = true,
                    _ => {}
                }
            }
            true
        }
    }
    let mut v = ContainsVarRef { contains: false };
    walk(&mut v, Node::Expr(expr));
    v.contains
}

/// Returns the distinct non-"time" variable references in an expression,
/// sorted by name and then type. Call arguments contribute only direct
/// references.
pub fn expr_names(expr: &Expr) -> Vec<(String, DataType)> {
    fn collect(expr: &Expr, out: &mut Vec<(String, DataType)>) {
        match expr {
            Expr::VarRef { val, data_type } => out.push((val.clone(), *data_type)),
            Expr::Call { args, .. } => {
                for arg in args {
                    if let Expr::VarRef { val, data_type } = arg {
                        out.push((val.clone(), *data_type));
                    }
                }
            }
            Expr::Binary { lhs, rhs, .. } => {
                collect(lhs, out);
                collect(rhs, out);
            }
            Expr::Paren(inner) => collect(inner, out),
            _ => {}
        }
    }

    let mut refs = Vec::new();
    collect(expr, &mut refs);
    refs.retain(|(val, _)| val != "time");
    refs.sort();
    refs.dedup();
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use crate::token::Token;

    fn var(name: &str) -> Expr {
        Expr::VarRef {
            val: name.to_string(),
            data_type: DataType::Unknown,
        }
    }

    #[test]
    fn test_walk_visits_all_expr_nodes() {
        // (a + b) * mean(c)
        let expr = Expr::Binary {
            op: Token::Mul,
            lhs: Box::new(Expr::Paren(Box::new(Expr::Binary {
                op: Token::Add,
                lhs: Box::new(var("a")),
                rhs: Box::new(var("b")),
            }))),
            rhs: Box::new(Expr::Call {
                name: "mean".to_string(),
                args: vec![var("c")],
            }),
        };

        let mut count = 0;
        walk_fn(Node::Expr(&expr), |n| {
            if matches!(n, Node::Expr(_)) {
                count += 1;
            }
        });
        // binary, paren, inner binary, a, b, call, c
        assert_eq!(count, 7);
    }

    #[test]
    fn test_walk_stops_descent() {
        let expr = Expr::Call {
            name: "mean".to_string(),
            args: vec![var("c")],
        };

        struct StopAtCall {
            saw_var: bool,
        }
        impl Visitor for StopAtCall {
            fn visit(&mut self, node: Node<'_>) -> bool {
                match node {
                    Node::Expr(Expr::Call { .. }) => false,
                    Node::Expr(Expr::VarRef { .. }) => {
                        self.saw_var = true;
                        true
                    }
                    _ => true,
                }
            }
        }

        let mut v = StopAtCall { saw_var: false };
        walk(&mut v, Node::Expr(&expr));
        assert!(!v.saw_var);
    }

    #[test]
    fn test_contains_var_ref() {
        assert!(contains_var_ref(&var("a")));
        assert!(contains_var_ref(&Expr::Binary {
            op: Token::Gt,
            lhs: Box::new(var("a")),
            rhs: Box::new(Expr::Literal(Literal::Integer(1))),
        }));
        // Refs inside calls do not count.
        assert!(!contains_var_ref(&Expr::Call {
            name: "mean".to_string(),
            args: vec![var("a")],
        }));
        assert!(!contains_var_ref(&Expr::Literal(Literal::Integer(1))));
    }

    #[test]
    fn test_expr_names() {
        let expr = Expr::Binary {
            op: Token::And,
            lhs: Box::new(Expr::Binary {
                op: Token::Gt,
                lhs: Box::new(var("b")),
                rhs: Box::new(var("time")),
            }),
            rhs: Box::new(Expr::Binary {
                op: Token::Lt,
                lhs: Box::new(var("a")),
                rhs: Box::new(var("b")),
            }),
        };
        let names = expr_names(&expr);
        assert_eq!(
            names,
            vec![
                ("a".to_string(), DataType::Unknown),
                ("b".to_string(), DataType::Unknown),
            ]
        );
    }
}
