use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Print an SmtTerm as SMT-LIB2 format.
pub fn to_smtlib(term: &SmtTerm) -> String {
    match term {
        SmtTerm::Var(name) => symbol(name),
        SmtTerm::App(head, args) => {
            if args.is_empty() {
                symbol(head)
            } else {
                let inner: Vec<String> = args.iter().map(to_smtlib).collect();
                format!("({} {})", symbol(head), inner.join(" "))
            }
        }
        SmtTerm::IntLit(n) => {
            if *n < 0 {
                format!("(- {})", n.unsigned_abs())
            } else {
                n.to_string()
            }
        }
        SmtTerm::BoolLit(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        SmtTerm::Add(lhs, rhs) => format!("(+ {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Sub(lhs, rhs) => format!("(- {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Mul(lhs, rhs) => format!("(* {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Eq(lhs, rhs) => format!("(= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Lt(lhs, rhs) => format!("(< {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Le(lhs, rhs) => format!("(<= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Gt(lhs, rhs) => format!("(> {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Ge(lhs, rhs) => format!("(>= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::And(terms) => {
            if terms.is_empty() {
                "true".to_string()
            } else if terms.len() == 1 {
                to_smtlib(&terms[0])
            } else {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(and {})", inner.join(" "))
            }
        }
        SmtTerm::Or(terms) => {
            if terms.is_empty() {
                "false".to_string()
            } else if terms.len() == 1 {
                to_smtlib(&terms[0])
            } else {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(or {})", inner.join(" "))
            }
        }
        SmtTerm::Not(inner) => format!("(not {})", to_smtlib(inner)),
        SmtTerm::Implies(lhs, rhs) => {
            format!("(=> {} {})", to_smtlib(lhs), to_smtlib(rhs))
        }
        SmtTerm::ForAll(bindings, body) => {
            format!("(forall ({}) {})", binders(bindings), to_smtlib(body))
        }
        SmtTerm::Exists(bindings, body) => {
            format!("(exists ({}) {})", binders(bindings), to_smtlib(body))
        }
        SmtTerm::Ite(cond, then, els) => {
            format!(
                "(ite {} {} {})",
                to_smtlib(cond),
                to_smtlib(then),
                to_smtlib(els)
            )
        }
    }
}

fn binders(bindings: &[(String, SmtSort)]) -> String {
    let vars: Vec<String> = bindings
        .iter()
        .map(|(n, s)| format!("({} {})", symbol(n), sort_to_smtlib(s)))
        .collect();
    vars.join(" ")
}

/// Print a sort as SMT-LIB2 format.
pub fn sort_to_smtlib(sort: &SmtSort) -> String {
    match sort {
        SmtSort::Bool => "Bool".to_string(),
        SmtSort::Int => "Int".to_string(),
        SmtSort::Uninterpreted(name) => symbol(name),
    }
}

/// Print a symbol, quoting it with `|...|` unless it is a plain simple symbol.
///
/// Engine-generated names carry `#`, `@` and `.`; `@`-prefixed simple
/// symbols are reserved for solvers, so anything outside
/// `[A-Za-z_][A-Za-z0-9_]*` is quoted.
pub fn symbol(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if plain {
        name.to_string()
    } else {
        format!("|{name}|")
    }
}

/// `(declare-fun ...)` / `(declare-const ...)` command for one symbol.
pub fn declaration_to_smtlib(name: &str, domain: &[SmtSort], range: &SmtSort) -> String {
    if domain.is_empty() {
        format!("(declare-const {} {})", symbol(name), sort_to_smtlib(range))
    } else {
        let args: Vec<String> = domain.iter().map(sort_to_smtlib).collect();
        format!(
            "(declare-fun {} ({}) {})",
            symbol(name),
            args.join(" "),
            sort_to_smtlib(range)
        )
    }
}

/// A complete, standalone SMT-LIB2 script for one satisfiability query.
pub fn query_to_smt2_script(
    sorts: &[String],
    declarations: &[(String, Vec<SmtSort>, SmtSort)],
    assertions: &[SmtTerm],
) -> String {
    let mut smt = String::new();
    smt.push_str("(set-logic ALL)\n");
    for sort in sorts {
        smt.push_str(&format!("(declare-sort {} 0)\n", symbol(sort)));
    }
    for (name, domain, range) in declarations {
        smt.push_str(&declaration_to_smtlib(name, domain, range));
        smt.push('\n');
    }
    for assertion in assertions {
        smt.push_str(&format!("(assert {})\n", to_smtlib(assertion)));
    }
    smt.push_str("(check-sat)\n");
    smt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_simple_term() {
        let term = SmtTerm::var("x").add(SmtTerm::int(1)).ge(SmtTerm::int(0));
        assert_eq!(to_smtlib(&term), "(>= (+ x 1) 0)");
    }

    #[test]
    fn print_and_term() {
        let term = SmtTerm::and(vec![
            SmtTerm::var("a").gt(SmtTerm::int(0)),
            SmtTerm::var("b").lt(SmtTerm::int(-10)),
        ]);
        assert_eq!(to_smtlib(&term), "(and (> a 0) (< b (- 10)))");
    }

    #[test]
    fn engine_names_are_quoted() {
        let term = SmtTerm::app("holds#2", vec![SmtTerm::var("@N")]);
        assert_eq!(to_smtlib(&term), "(|holds#2| |@N|)");
        assert_eq!(symbol("plain_name1"), "plain_name1");
        assert_eq!(symbol("1abc"), "|1abc|");
    }

    #[test]
    fn print_quantifier_over_uninterpreted_sort() {
        let term = SmtTerm::forall(
            vec![("N".into(), SmtSort::uninterpreted("node"))],
            SmtTerm::app("r", vec![SmtTerm::var("N")]).not(),
        );
        assert_eq!(to_smtlib(&term), "(forall ((N node)) (not (r N)))");
    }

    #[test]
    fn script_declares_sorts_before_symbols() {
        let script = query_to_smt2_script(
            &["node".to_string()],
            &[
                ("n".to_string(), Vec::new(), SmtSort::uninterpreted("node")),
                (
                    "r".to_string(),
                    vec![SmtSort::uninterpreted("node")],
                    SmtSort::Bool,
                ),
            ],
            &[SmtTerm::app("r", vec![SmtTerm::var("n")])],
        );
        assert_eq!(
            script,
            "(set-logic ALL)\n(declare-sort node 0)\n(declare-const n node)\n\
             (declare-fun r (node) Bool)\n(assert (r n))\n(check-sat)\n"
        );
    }
}
