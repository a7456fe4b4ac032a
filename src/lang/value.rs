use super::name::Name;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A heap-allocated value. Heap values are referenced through [`Handle`]s and
/// have identity: two handles are the same object only if they share an
/// allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeapObject {
    /// A number that is not representable as a small integer.
    HeapNumber(f64),

    /// A string value.
    String(Name),
}

pub type Handle = Arc<HeapObject>;

/// A tagged value as seen by the bytecode and the interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    /// Small integer, stored inline. Its identity is its value.
    Smi(i32),

    /// Reference to a heap object.
    Heap(Handle),

    Undefined,
    Null,
    TheHole,
    True,
    False,
}

impl Object {
    /// Canonical number representation: a Smi when the value is an integer that
    /// fits (and is not `-0`), otherwise a fresh heap number.
    pub fn number(value: f64) -> Object {
        let is_minus_zero = value == 0.0 && value.is_sign_negative();
        if value.fract() == 0.0
            && value >= i32::MIN as f64
            && value <= i32::MAX as f64
            && !is_minus_zero
        {
            Object::Smi(value as i32)
        } else {
            Object::new_heap_number(value)
        }
    }

    pub fn new_heap_number(value: f64) -> Object {
        Object::Heap(Arc::new(HeapObject::HeapNumber(value)))
    }

    pub fn string(name: Name) -> Object {
        Object::Heap(Arc::new(HeapObject::String(name)))
    }

    pub fn boolean(value: bool) -> Object {
        if value { Object::True } else { Object::False }
    }

    /// Singletons that have their own load bytecodes.
    pub fn is_oddball(&self) -> bool {
        matches!(
            self,
            Object::Undefined | Object::Null | Object::TheHole | Object::True | Object::False
        )
    }

    pub fn is_smi(&self) -> bool {
        matches!(self, Object::Smi(_))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Object::True | Object::False)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Object::Heap(h) if matches!(**h, HeapObject::String(_)))
    }

    pub fn is_number(&self) -> bool {
        match self {
            Object::Smi(_) => true,
            Object::Heap(h) => matches!(**h, HeapObject::HeapNumber(_)),
            _ => false,
        }
    }

    /// Identity comparison: Smis by value, heap objects by handle, singletons
    /// by kind.
    pub fn same_identity(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Smi(a), Object::Smi(b)) => a == b,
            (Object::Heap(a), Object::Heap(b)) => Arc::ptr_eq(a, b),
            (a, b) => a.is_oddball() && std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            Object::Smi(v) => *v != 0,
            Object::Heap(h) => match &**h {
                HeapObject::HeapNumber(v) => *v != 0.0 && !v.is_nan(),
                HeapObject::String(s) => !s.is_empty(),
            },
            Object::True => true,
            Object::Undefined | Object::Null | Object::TheHole | Object::False => false,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Object::Smi(v) => *v as f64,
            Object::Heap(h) => match &**h {
                HeapObject::HeapNumber(v) => *v,
                HeapObject::String(s) => string_to_number(s.as_str()),
            },
            Object::True => 1.0,
            Object::False | Object::Null => 0.0,
            Object::Undefined | Object::TheHole => f64::NAN,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Object::Smi(_) => "number",
            Object::Heap(h) => match **h {
                HeapObject::HeapNumber(_) => "number",
                HeapObject::String(_) => "string",
            },
            Object::True | Object::False => "boolean",
            Object::Undefined | Object::TheHole => "undefined",
            Object::Null => "object",
        }
    }

    pub fn strict_equals(&self, other: &Object) -> bool {
        if self.is_number() && other.is_number() {
            return self.to_number() == other.to_number();
        }
        match (self, other) {
            (Object::Heap(a), Object::Heap(b)) => match (&**a, &**b) {
                (HeapObject::String(x), HeapObject::String(y)) => x.content_eq(y),
                _ => Arc::ptr_eq(a, b),
            },
            _ => self.same_identity(other),
        }
    }

    pub fn loose_equals(&self, other: &Object) -> bool {
        let nullish = |o: &Object| matches!(o, Object::Undefined | Object::Null);
        if nullish(self) || nullish(other) {
            return nullish(self) && nullish(other);
        }
        if self.is_string() && other.is_string() {
            return self.strict_equals(other);
        }
        if self.is_number() || other.is_number() || self.is_boolean() || other.is_boolean() {
            return self.to_number() == other.to_number();
        }
        self.strict_equals(other)
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => {
            if let Some(value) = radix_literal(trimmed) {
                return value;
            }
            // f64::from_str also takes "inf" and "nan" spellings
            let decimal = trimmed
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
            if !decimal {
                return f64::NAN;
            }
            trimmed.parse::<f64>().unwrap_or(f64::NAN)
        }
    }
}

/// `0x`, `0o` and `0b` literals. Unsigned only.
fn radix_literal(s: &str) -> Option<f64> {
    let prefix = s.get(..2)?;
    let radix = match prefix {
        "0x" | "0X" => 16,
        "0o" | "0O" => 8,
        "0b" | "0B" => 2,
        _ => return None,
    };
    let digits = &s[2..];
    if digits.is_empty() {
        return Some(f64::NAN);
    }
    let mut value = 0.0;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => value = value * radix as f64 + d as f64,
            None => return Some(f64::NAN),
        }
    }
    Some(value)
}

pub(crate) fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if value == 0.0 {
        "0".to_string()
    } else if value.abs() >= 1e21 || value.abs() < 1e-6 {
        // exponent form with an explicit sign, as in 1e+21 and 1.5e-7
        let text = format!("{:e}", value);
        match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => text,
        }
    } else {
        format!("{}", value)
    }
}

impl std::fmt::Display for Object {
    /// Formats a value the way `String(value)` would.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Object::Smi(v) => write!(f, "{}", v),
            Object::Heap(h) => match &**h {
                HeapObject::HeapNumber(v) => write!(f, "{}", format_number(*v)),
                HeapObject::String(s) => write!(f, "{}", s),
            },
            Object::Undefined => write!(f, "undefined"),
            Object::Null => write!(f, "null"),
            Object::TheHole => write!(f, "<the_hole>"),
            Object::True => write!(f, "true"),
            Object::False => write!(f, "false"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_canonicalizes_to_smi() {
        assert_eq!(Object::number(6.0), Object::Smi(6));
        assert!(matches!(Object::number(1.5), Object::Heap(_)));
        assert!(matches!(Object::number(-0.0), Object::Heap(_)));
        assert!(matches!(Object::number(4_294_967_296.0), Object::Heap(_)));
    }

    #[test]
    fn test_identity_of_heap_numbers() {
        let a = Object::new_heap_number(2.5);
        let b = Object::new_heap_number(2.5);
        assert!(a.same_identity(&a.clone()));
        assert!(!a.same_identity(&b));
        assert!(a.strict_equals(&b));
    }

    #[test]
    fn test_to_boolean() {
        assert!(!Object::Smi(0).to_boolean());
        assert!(Object::Smi(-1).to_boolean());
        assert!(!Object::string(Name::new_uninterned("")).to_boolean());
        assert!(Object::string(Name::new_uninterned("x")).to_boolean());
        assert!(!Object::new_heap_number(f64::NAN).to_boolean());
        assert!(!Object::Undefined.to_boolean());
    }

    #[test]
    fn test_loose_equality() {
        assert!(Object::Undefined.loose_equals(&Object::Null));
        assert!(!Object::Undefined.loose_equals(&Object::Smi(0)));
        assert!(Object::Smi(1).loose_equals(&Object::True));
        assert!(Object::string(Name::new_uninterned(" 7 ")).loose_equals(&Object::Smi(7)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Object::Smi(6).to_string(), "6");
        assert_eq!(Object::new_heap_number(0.5).to_string(), "0.5");
        assert_eq!(Object::new_heap_number(f64::NEG_INFINITY).to_string(), "-Infinity");
        assert_eq!(Object::Null.to_string(), "null");
    }

    #[test]
    fn test_string_to_number_rejects_rust_only_spellings() {
        let number = |text: &str| Object::string(Name::new_uninterned(text)).to_number();
        for text in ["inf", "INF", "infinity", "-infinity", "nan", "NaN", "1_000", "12px"] {
            assert!(number(text).is_nan(), "{} should be NaN", text);
        }
        assert_eq!(number("Infinity"), f64::INFINITY);
        assert_eq!(number("-Infinity"), f64::NEG_INFINITY);
        assert_eq!(number(" 12 "), 12.0);
        assert_eq!(number("-2.5e3"), -2500.0);
        assert_eq!(number(".5"), 0.5);
        assert_eq!(number("0x1F"), 31.0);
        assert_eq!(number("0b101"), 5.0);
        assert!(number("0x").is_nan());
        assert_eq!(number(""), 0.0);
    }

    #[test]
    fn test_display_uses_exponent_outside_decimal_range() {
        assert_eq!(Object::new_heap_number(1e21).to_string(), "1e+21");
        assert_eq!(Object::new_heap_number(-1.5e22).to_string(), "-1.5e+22");
        assert_eq!(Object::new_heap_number(1.5e-7).to_string(), "1.5e-7");
        assert_eq!(Object::new_heap_number(1e20).to_string(), "100000000000000000000");
        assert_eq!(Object::new_heap_number(0.000001).to_string(), "0.000001");
        assert_eq!(Object::new_heap_number(123456.5).to_string(), "123456.5");
    }
}
