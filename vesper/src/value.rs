use std::ops;
use std::{fmt, rc::Rc};

use crate::{intern, ObjClosure, ObjFun, RuntimeError, StrId};

/// This represents a Vesper type and its data.
#[derive(Debug, Clone)]
pub enum Value {
    /// A nothing value in Vesper
    Nil,
    /// A boolean value in Vesper
    Bool(bool),
    /// A number value in Vesper
    Number(f64),
    /// An interned string
    Str(StrId),
    /// A function object, only ever surfacing wrapped in a closure
    Fun(Rc<ObjFun>),
    /// A native function reference
    NativeFun(NativeFun),
    /// A closure that can capture surrounding variables
    Closure(Rc<ObjClosure>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => {
                if n.trunc().eq(n) {
                    write!(f, "{n:.0?}")
                } else {
                    write!(f, "{n:?}")
                }
            }
            Self::Str(s) => write!(f, "{}", intern::resolve(*s)),
            Self::Fun(fun) => write!(f, "{fun}"),
            Self::NativeFun(fun) => write!(f, "{fun}"),
            Self::Closure(c) => write!(f, "{c}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(b1), Self::Bool(b2)) => b1 == b2,
            // IEEE equality, so NaN is not equal to itself
            (Self::Number(n1), Self::Number(n2)) => n1 == n2,
            (Self::Str(s1), Self::Str(s2)) => s1 == s2,
            (Self::Fun(f1), Self::Fun(f2)) => Rc::ptr_eq(f1, f2),
            (Self::NativeFun(f1), Self::NativeFun(f2)) => f1.name == f2.name,
            (Self::Closure(c1), Self::Closure(c2)) => Rc::ptr_eq(c1, c2),
            _ => false,
        }
    }
}

impl ops::Add for &Value {
    type Output = Result<Value, RuntimeError>;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(n1), Value::Number(n2)) => Ok(Value::Number(n1 + n2)),
            (Value::Str(s1), Value::Str(s2)) => {
                let res = intern::resolve(*s1) + &intern::resolve(*s2);
                Ok(Value::Str(intern::sym(res)))
            }
            _ => Err(RuntimeError::InvalidAddOperands),
        }
    }
}

impl ops::Sub for &Value {
    type Output = Result<Value, RuntimeError>;

    fn sub(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(n1), Value::Number(n2)) => Ok(Value::Number(n1 - n2)),
            _ => Err(RuntimeError::ExpectedNumbers),
        }
    }
}

impl ops::Mul for &Value {
    type Output = Result<Value, RuntimeError>;

    fn mul(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(n1), Value::Number(n2)) => Ok(Value::Number(n1 * n2)),
            _ => Err(RuntimeError::ExpectedNumbers),
        }
    }
}

impl ops::Div for &Value {
    type Output = Result<Value, RuntimeError>;

    fn div(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(n1), Value::Number(n2)) => Ok(Value::Number(n1 / n2)),
            _ => Err(RuntimeError::ExpectedNumbers),
        }
    }
}

impl ops::Neg for &Value {
    type Output = Result<Value, RuntimeError>;

    fn neg(self) -> Self::Output {
        match self {
            Value::Number(n) => Ok(Value::Number(-n)),
            _ => Err(RuntimeError::ExpectedNumber),
        }
    }
}

impl Value {
    /// Only `nil` and `false` are falsey, every other value is truthy.
    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Check if the current value is less than the given value
    pub fn lt(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Number(n1), Value::Number(n2)) => Ok(Value::Bool(n1 < n2)),
            _ => Err(RuntimeError::ExpectedNumbers),
        }
    }

    /// Check if the current value is greater than the given value
    pub fn gt(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Number(n1), Value::Number(n2)) => Ok(Value::Bool(n1 > n2)),
            _ => Err(RuntimeError::ExpectedNumbers),
        }
    }

    /// Divide after truncating both operands toward zero. Evaluated in
    /// floating point, so a zero divisor gives an infinity or NaN.
    pub fn int_div(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Number(n1), Value::Number(n2)) => {
                Ok(Value::Number((n1.trunc() / n2.trunc()).trunc()))
            }
            _ => Err(RuntimeError::ExpectedNumbers),
        }
    }

    /// Remainder of a division truncated toward zero.
    pub fn modulo(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Number(n1), Value::Number(n2)) => {
                Ok(Value::Number(n1 - (n1 / n2).trunc() * n2))
            }
            _ => Err(RuntimeError::ExpectedNumbers),
        }
    }
}

/// A native function
#[derive(Clone)]
pub struct NativeFun {
    /// Name the function is bound to in the globals table
    pub name: StrId,
    /// Number of arguments the function expects
    pub arity: u8,
    /// Native function reference
    pub call: fn(&[Value]) -> Value,
}

impl fmt::Display for NativeFun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

impl fmt::Debug for NativeFun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_print_without_a_trailing_zero() {
        assert_eq!(Value::Number(7.0).to_string(), "7");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::Number(-3.0).to_string(), "-3");
    }

    #[test]
    fn equality_is_strict_per_variant() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_eq!(Value::Bool(true), Value::Bool(true));
        assert_eq!(Value::Number(1.0), Value::Number(1.0));
        assert_ne!(Value::Number(1.0), Value::Str(intern::sym("1")));
        assert_ne!(Value::Nil, Value::Bool(false));
        assert_ne!(Value::Number(0.0), Value::Bool(false));
    }

    #[test]
    fn nan_is_not_equal_to_itself() {
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn interned_strings_compare_by_contents() {
        assert_eq!(
            Value::Str(intern::sym("knot")),
            Value::Str(intern::sym("knot"))
        );
        assert_ne!(
            Value::Str(intern::sym("knot")),
            Value::Str(intern::sym("not"))
        );
    }

    #[test]
    fn only_nil_and_false_are_falsey() {
        assert!(Value::Nil.is_falsey());
        assert!(Value::Bool(false).is_falsey());
        assert!(!Value::Bool(true).is_falsey());
        assert!(!Value::Number(0.0).is_falsey());
        assert!(!Value::Str(intern::sym("")).is_falsey());
    }

    #[test]
    fn adding_strings_interns_the_result() {
        let sum = (&Value::Str(intern::sym("fog")) + &Value::Str(intern::sym("horn")))
            .expect("strings concatenate");
        assert_eq!(sum, Value::Str(intern::sym("foghorn")));
    }

    #[test]
    fn mixed_addition_is_an_error() {
        let res = &Value::Str(intern::sym("a")) + &Value::Number(1.0);
        assert_eq!(res, Err(RuntimeError::InvalidAddOperands));
    }

    #[test]
    fn arithmetic_requires_numbers() {
        assert_eq!(
            &Value::Nil - &Value::Number(1.0),
            Err(RuntimeError::ExpectedNumbers)
        );
        assert_eq!(-&Value::Bool(true), Err(RuntimeError::ExpectedNumber));
    }

    #[test]
    fn integer_division_truncates_toward_zero() {
        let div = |a: f64, b: f64| {
            Value::Number(a)
                .int_div(&Value::Number(b))
                .expect("numbers divide")
        };
        assert_eq!(div(7.0, 2.0), Value::Number(3.0));
        assert_eq!(div(-7.0, 2.0), Value::Number(-3.0));
        assert_eq!(div(7.9, 2.9), Value::Number(3.0));
    }

    #[test]
    fn modulo_matches_truncated_division() {
        let rem = |a: f64, b: f64| {
            Value::Number(a)
                .modulo(&Value::Number(b))
                .expect("numbers divide")
        };
        assert_eq!(rem(7.0, 2.0), Value::Number(1.0));
        assert_eq!(rem(-7.0, 2.0), Value::Number(-1.0));
    }
}
