//! Arithmetic and comparison over dynamic values

use crate::heap::DynHeap;
use crate::value::DynValue;
use std::rc::Rc;

/// Binary arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    /// `+`, which concatenates when either side is a string
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNe,
}

impl DynHeap {
    /// Apply an arithmetic operator
    ///
    /// `+` concatenates when either operand is a string, stringifying the
    /// other one. Every other combination coerces both operands to numbers,
    /// booleans counting as 0 and 1.
    pub fn arithmetic(&self, op: ArithOp, lhs: &DynValue, rhs: &DynValue) -> DynValue {
        if op == ArithOp::Add {
            if let (DynValue::String(_), _) | (_, DynValue::String(_)) = (lhs, rhs) {
                let mut text = self.to_display(lhs);
                text.push_str(&self.to_display(rhs));
                return DynValue::String(Rc::from(text));
            }
        }
        let left = self.to_number(lhs);
        let right = self.to_number(rhs);
        DynValue::Number(match op {
            ArithOp::Add => left + right,
            ArithOp::Sub => left - right,
            ArithOp::Mul => left * right,
            ArithOp::Div => left / right,
            ArithOp::Mod => left % right,
        })
    }

    /// Apply a comparison operator
    ///
    /// Relational operators compare strings lexicographically when both
    /// sides are strings and numerically otherwise. Strict equality needs
    /// equal tags; references compare by identity.
    pub fn compare(&self, op: CompareOp, lhs: &DynValue, rhs: &DynValue) -> bool {
        match op {
            CompareOp::StrictEq => self.strict_equals(lhs, rhs),
            CompareOp::StrictNe => !self.strict_equals(lhs, rhs),
            CompareOp::Lt | CompareOp::Gt | CompareOp::Le | CompareOp::Ge => {
                if let (DynValue::String(left), DynValue::String(right)) = (lhs, rhs) {
                    return match op {
                        CompareOp::Lt => left < right,
                        CompareOp::Gt => left > right,
                        CompareOp::Le => left <= right,
                        _ => left >= right,
                    };
                }
                let left = self.to_number(lhs);
                let right = self.to_number(rhs);
                match op {
                    CompareOp::Lt => left < right,
                    CompareOp::Gt => left > right,
                    CompareOp::Le => left <= right,
                    _ => left >= right,
                }
            }
        }
    }

    fn strict_equals(&self, lhs: &DynValue, rhs: &DynValue) -> bool {
        match (lhs, rhs) {
            (DynValue::Number(left), DynValue::Number(right)) => left == right,
            (DynValue::Boolean(left), DynValue::Boolean(right)) => left == right,
            (DynValue::String(left), DynValue::String(right)) => left == right,
            (DynValue::Null, DynValue::Null) | (DynValue::Undefined, DynValue::Undefined) => true,
            (DynValue::Object(left), DynValue::Object(right)) => left == right,
            (DynValue::Array(left), DynValue::Array(right)) => left == right,
            (DynValue::ExtRef(left), DynValue::ExtRef(right)) => {
                left == right
                    || matches!(
                        (self.extref(*left), self.extref(*right)),
                        (Ok(left), Ok(right)) if left.handle == right.handle
                    )
            }
            _ => false,
        }
    }

    /// Unary minus
    pub fn negate(&self, value: &DynValue) -> DynValue {
        DynValue::Number(-self.to_number(value))
    }

    /// `typeof value` as a dynamic string
    pub fn type_of_value(&self, value: &DynValue) -> DynValue {
        DynValue::string(self.type_of(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_plus_boolean_is_number() {
        let heap = DynHeap::new();
        let sum = heap.arithmetic(ArithOp::Add, &DynValue::Number(1.0), &DynValue::Boolean(true));
        assert_eq!(sum, DynValue::Number(2.0));
    }

    #[test]
    fn test_string_concatenation_stringifies_numbers() {
        let heap = DynHeap::new();
        let joined = heap.arithmetic(ArithOp::Add, &DynValue::string("n="), &DynValue::Number(4.0));
        assert_eq!(joined, DynValue::string("n=4"));
        let joined = heap.arithmetic(ArithOp::Add, &DynValue::Number(0.5), &DynValue::string("!"));
        assert_eq!(joined, DynValue::string("0.5!"));
    }

    #[test]
    fn test_other_operators_coerce_to_number() {
        let heap = DynHeap::new();
        assert_eq!(
            heap.arithmetic(ArithOp::Mul, &DynValue::string("3"), &DynValue::Null),
            DynValue::Number(0.0)
        );
        let nan = heap.arithmetic(ArithOp::Sub, &DynValue::Number(1.0), &DynValue::Undefined);
        assert!(nan.as_number().is_some_and(f64::is_nan));
    }

    #[test]
    fn test_comparisons() {
        let heap = DynHeap::new();
        assert!(heap.compare(CompareOp::Lt, &DynValue::Number(1.0), &DynValue::string("2")));
        assert!(heap.compare(CompareOp::Gt, &DynValue::string("b"), &DynValue::string("a")));
        assert!(!heap.compare(CompareOp::StrictEq, &DynValue::Number(1.0), &DynValue::string("1")));
        assert!(heap.compare(CompareOp::StrictNe, &DynValue::Null, &DynValue::Undefined));
        let nan = DynValue::Number(f64::NAN);
        assert!(!heap.compare(CompareOp::StrictEq, &nan, &nan));
    }
}
