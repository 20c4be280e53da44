//! Predicate AST data structures.
//!
//! A predicate is a boolean test over one entity record:
//! - comparisons of a numeric attribute against a constant
//! - equality against a number, text or boolean literal
//! - existence checks
//! - composites (`AND`, `OR`, `NOT`)
//! - array quantifiers (`ANY`, `NONE`) evaluated against each element

use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Exists(String),
    Above {
        path: String,
        value: f64,
    },
    Below {
        path: String,
        value: f64,
    },
    AtLeast {
        path: String,
        value: f64,
    },
    AtMost {
        path: String,
        value: f64,
    },
    Between {
        path: String,
        lower: f64,
        upper: f64,
    },
    Equals {
        path: String,
        value: Literal,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    AnyOf {
        path: String,
        predicate: Box<Predicate>,
    },
    NoneOf {
        path: String,
        predicate: Box<Predicate>,
    },
}

impl Predicate {
    /// Top-level attribute paths referenced by this predicate. Paths inside
    /// `ANY`/`NONE` are reported relative to the array, prefixed by it.
    pub fn paths(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_paths("", &mut out);
        out
    }

    fn collect_paths(&self, prefix: &str, out: &mut BTreeSet<String>) {
        let qualify = |p: &str| {
            if prefix.is_empty() {
                p.to_string()
            } else {
                format!("{prefix}[].{p}")
            }
        };
        match self {
            Predicate::Exists(path)
            | Predicate::Above { path, .. }
            | Predicate::Below { path, .. }
            | Predicate::AtLeast { path, .. }
            | Predicate::AtMost { path, .. }
            | Predicate::Between { path, .. }
            | Predicate::Equals { path, .. } => {
                out.insert(qualify(path));
            }
            Predicate::And(items) | Predicate::Or(items) => {
                for p in items {
                    p.collect_paths(prefix, out);
                }
            }
            Predicate::Not(inner) => inner.collect_paths(prefix, out),
            Predicate::AnyOf { path, predicate } | Predicate::NoneOf { path, predicate } => {
                let array = qualify(path);
                out.insert(array.clone());
                predicate.collect_paths(&array, out);
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Text(s) => write!(f, "'{s}'"),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, keyword: &str, items: &[Predicate]) -> fmt::Result {
    write!(f, "{keyword}(")?;
    for (i, p) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{p}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Exists(path) => write!(f, "EXISTS({path})"),
            Predicate::Above { path, value } => write!(f, "ABOVE({path}, {value})"),
            Predicate::Below { path, value } => write!(f, "BELOW({path}, {value})"),
            Predicate::AtLeast { path, value } => write!(f, "AT_LEAST({path}, {value})"),
            Predicate::AtMost { path, value } => write!(f, "AT_MOST({path}, {value})"),
            Predicate::Between { path, lower, upper } => {
                write!(f, "BETWEEN({path}, {lower}, {upper})")
            }
            Predicate::Equals { path, value } => write!(f, "EQUALS({path}, {value})"),
            Predicate::And(items) => write_list(f, "AND", items),
            Predicate::Or(items) => write_list(f, "OR", items),
            Predicate::Not(inner) => write!(f, "NOT({inner})"),
            Predicate::AnyOf { path, predicate } => write!(f, "ANY({path}, {predicate})"),
            Predicate::NoneOf { path, predicate } => write!(f, "NONE({path}, {predicate})"),
        }
    }
}
