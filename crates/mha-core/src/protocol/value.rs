//! Typed values of MHA configuration variables.
//!
//! The MHA prints every variable as text.  The `?type` query tells how to
//! read that text back:
//!
//! ```text
//! type              ?val reply                written as
//! ────              ──────────                ──────────
//! int / float       3      0.5                MhaValue::Int / Float
//! bool              yes    no                 MhaValue::Bool
//! complex           (1+2i)  1                 MhaValue::Complex
//! vector<float>     [1 2 3]                   MhaValue::Vector
//! matrix<float>     [[1 2];[3 4]]             MhaValue::Matrix
//! vector<complex>   [(1+2i) 3]                MhaValue::ComplexVector
//! matrix<complex>   [[(0+1i) 2];[3 4]]        MhaValue::ComplexMatrix
//! vector<string>    [alpha beta]              MhaValue::Strings
//! string            any text                  MhaValue::Text
//! ```
//!
//! Integer vectors and matrices are read as `f64`; every `i32` the MHA can
//! hold is represented exactly.
//!
//! Rendering produces the same syntax the server prints, so a value read with
//! [`MhaValue::parse`] can be written back unchanged.  Complex numbers always
//! carry an explicit real part (`(0+1.5i)`), because the MHA parser does not
//! accept a bare imaginary literal.

use std::fmt;

use super::command::CommandError;

/// A complex number as used by `complex`, `vector<complex>` and
/// `matrix<complex>` variables.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// Parses `(a+bi)`, `(a-bi)`, a bare real `a` or a bare imaginary `bi`.
    fn parse(token: &str) -> Option<Self> {
        let body = token.trim();
        let body = body
            .strip_prefix('(')
            .and_then(|b| b.strip_suffix(')'))
            .unwrap_or(body)
            .trim();

        let Some(imaginary) = body.strip_suffix('i') else {
            return Some(Self::new(body.parse().ok()?, 0.0));
        };
        match split_real_imag(imaginary) {
            Some((re, im)) => Some(Self::new(re.parse().ok()?, parse_imag(im)?)),
            None => Some(Self::new(0.0, parse_imag(imaginary)?)),
        }
    }
}

/// Splits `a+b` / `a-b` at the sign that starts the imaginary part.  A sign
/// at position 0 or directly after an exponent marker belongs to a number.
fn split_real_imag(text: &str) -> Option<(&str, &str)> {
    let bytes = text.as_bytes();
    (1..bytes.len())
        .rev()
        .find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E'))
        .map(|i| (&text[..i], &text[i..]))
}

/// Parses the coefficient of `i`; `+` and `-` alone mean ±1.
fn parse_imag(text: &str) -> Option<f64> {
    match text {
        "" | "+" => Some(1.0),
        "-" => Some(-1.0),
        _ => text.parse().ok(),
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.im == 0.0 {
            write!(f, "{}", self.re)
        } else if self.im < 0.0 {
            write!(f, "({}{}i)", self.re, self.im)
        } else {
            write!(f, "({}+{}i)", self.re, self.im)
        }
    }
}

/// The value of an MHA variable, decoded according to its `?type`.
#[derive(Debug, Clone, PartialEq)]
pub enum MhaValue {
    /// `string`, and any type without a structured form (e.g. keyword lists).
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex),
    /// `vector<int>` or `vector<float>`.
    Vector(Vec<f64>),
    /// `matrix<int>` or `matrix<float>`, row by row.
    Matrix(Vec<Vec<f64>>),
    ComplexVector(Vec<Complex>),
    ComplexMatrix(Vec<Vec<Complex>>),
    /// `vector<string>`.
    Strings(Vec<String>),
}

impl MhaValue {
    /// Decodes a `?val` reply using the `?type` reply of the same variable.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::MalformedValue`] if `text` does not match the
    /// syntax of `data_type`.
    pub fn parse(data_type: &str, text: &str) -> Result<Self, CommandError> {
        let malformed = || CommandError::MalformedValue {
            data_type: data_type.to_string(),
            text: text.to_string(),
        };
        let data_type = data_type.trim();
        let text = text.trim();

        let is_matrix = data_type.contains("matrix") || data_type.contains("mcomplex");
        let is_vector = data_type.contains("vector") || data_type.contains("vcomplex");
        let is_complex = data_type.contains("complex");

        let value = if data_type == "string" {
            MhaValue::Text(text.to_string())
        } else if is_complex && is_matrix {
            MhaValue::ComplexMatrix(parse_rows(text, Complex::parse).ok_or_else(malformed)?)
        } else if is_complex && is_vector {
            MhaValue::ComplexVector(parse_row(text, Complex::parse).ok_or_else(malformed)?)
        } else if is_complex {
            MhaValue::Complex(Complex::parse(text).ok_or_else(malformed)?)
        } else if is_matrix {
            MhaValue::Matrix(parse_rows(text, parse_real).ok_or_else(malformed)?)
        } else if is_vector && data_type.contains("string") {
            MhaValue::Strings(
                strip_brackets(text)
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
            )
        } else if is_vector {
            MhaValue::Vector(parse_row(text, parse_real).ok_or_else(malformed)?)
        } else {
            match data_type {
                "int" => MhaValue::Int(text.parse().map_err(|_| malformed())?),
                "float" => MhaValue::Float(text.parse().map_err(|_| malformed())?),
                "bool" => MhaValue::Bool(match text {
                    "yes" | "1" => true,
                    "no" | "0" => false,
                    _ => return Err(malformed()),
                }),
                _ => MhaValue::Text(text.to_string()),
            }
        };
        Ok(value)
    }
}

fn parse_real(token: &str) -> Option<f64> {
    token.parse().ok()
}

fn strip_brackets(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(text)
        .trim()
}

fn parse_row<T>(text: &str, element: impl Fn(&str) -> Option<T>) -> Option<Vec<T>> {
    strip_brackets(text).split_whitespace().map(element).collect()
}

/// Reads `[[a b];[c d]]` as well as the flat `[a b;c d]` form.
fn parse_rows<T>(text: &str, element: impl Fn(&str) -> Option<T>) -> Option<Vec<Vec<T>>> {
    let inner = strip_brackets(text);
    if inner.is_empty() {
        return Some(Vec::new());
    }
    inner.split(';').map(|row| parse_row(row, &element)).collect()
}

fn write_row<T: fmt::Display>(f: &mut fmt::Formatter<'_>, row: &[T]) -> fmt::Result {
    f.write_str("[")?;
    for (i, element) in row.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{element}")?;
    }
    f.write_str("]")
}

fn write_rows<T: fmt::Display>(f: &mut fmt::Formatter<'_>, rows: &[Vec<T>]) -> fmt::Result {
    f.write_str("[")?;
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            f.write_str(";")?;
        }
        write_row(f, row)?;
    }
    f.write_str("]")
}

impl fmt::Display for MhaValue {
    /// Renders the value in MHA syntax, ready for `path=value`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MhaValue::Text(text) => f.write_str(text),
            MhaValue::Bool(true) => f.write_str("yes"),
            MhaValue::Bool(false) => f.write_str("no"),
            MhaValue::Int(v) => write!(f, "{v}"),
            MhaValue::Float(v) => write!(f, "{v}"),
            MhaValue::Complex(c) => write!(f, "{c}"),
            MhaValue::Vector(row) => write_row(f, row),
            MhaValue::Matrix(rows) => write_rows(f, rows),
            MhaValue::ComplexVector(row) => write_row(f, row),
            MhaValue::ComplexMatrix(rows) => write_rows(f, rows),
            MhaValue::Strings(row) => write_row(f, row),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
