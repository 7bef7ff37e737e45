//! Environment parameters and typed decoding of their textual values.

use dashmap::DashMap;
use std::io::{self, BufRead};
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Source of named string parameters consumed by `env` directives.
///
/// An unset parameter is `""`, never an error.
pub trait Environment: Send + Sync {
  fn get_param(&self, name: &str) -> String;
}

/// The default [`Environment`]: explicit values layered over the process environment.
///
/// Cloning is cheap and clones share the same values, so a handle kept outside the
/// container can still change parameters between compilations.
#[derive(Clone, Debug)]
pub struct Params {
  values: Arc<DashMap<String, String>>,
  inherit: bool,
}

impl Params {
  /// Parameters that fall back to `std::env` for names without an explicit value.
  pub fn new() -> Self {
    Self {
      values: Arc::new(DashMap::new()),
      inherit: true,
    }
  }

  /// Parameters that only ever see explicitly set values.
  pub fn isolated() -> Self {
    Self {
      values: Arc::new(DashMap::new()),
      inherit: false,
    }
  }

  pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
    self.values.insert(name.into(), value.into());
  }

  pub fn remove(&self, name: &str) -> Option<String> {
    self.values.remove(name).map(|(_, value)| value)
  }

  /// Reads `KEY=VALUE` lines, overriding existing values. Blank lines and lines
  /// starting with `#` are skipped. Returns how many parameters were set.
  pub fn load<R: BufRead>(&self, reader: R) -> io::Result<usize> {
    let mut loaded = 0;
    for (number, line) in reader.lines().enumerate() {
      let line = line?;
      let line = line.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      match line.split_once('=') {
        Some((name, value)) => {
          self.set(name.trim(), value.trim());
          loaded += 1;
        }
        None => warn!(line = number + 1, "skipping parameter line without '='"),
      }
    }
    Ok(loaded)
  }
}

impl Default for Params {
  fn default() -> Self {
    Self::new()
  }
}

impl Environment for Params {
  fn get_param(&self, name: &str) -> String {
    if let Some(value) = self.values.get(name) {
      return value.clone();
    }
    if self.inherit {
      return std::env::var(name).unwrap_or_default();
    }
    String::new()
  }
}

/// A scalar that can be decoded from an environment parameter.
///
/// `Default` is the value a field keeps when the parameter and its default are empty.
pub trait EnvValue: Default + Send + Sync + 'static {
  fn decode(raw: &str) -> Result<Self, String>;
}

macro_rules! env_value_from_str {
  ($($t:ty),* $(,)?) => {
    $(
      impl EnvValue for $t {
        fn decode(raw: &str) -> Result<Self, String> {
          raw.parse::<$t>().map_err(|err| err.to_string())
        }
      }
    )*
  };
}

env_value_from_str!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl EnvValue for bool {
  fn decode(raw: &str) -> Result<Self, String> {
    match raw {
      "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
      "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
      _ => Err("invalid boolean".to_string()),
    }
  }
}

impl EnvValue for String {
  fn decode(raw: &str) -> Result<Self, String> {
    Ok(raw.to_owned())
  }
}

/// A complex number decoded from `a`, `bi`, `a+bi` or `(a+bi)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex<F> {
  pub re: F,
  pub im: F,
}

pub type Complex32 = Complex<f32>;
pub type Complex64 = Complex<f64>;

impl<F> Complex<F> {
  pub fn new(re: F, im: F) -> Self {
    Self { re, im }
  }
}

impl<F> FromStr for Complex<F>
where
  F: FromStr + Default + From<i8>,
{
  type Err = String;

  fn from_str(raw: &str) -> Result<Self, Self::Err> {
    let body = raw
      .strip_prefix('(')
      .and_then(|inner| inner.strip_suffix(')'))
      .unwrap_or(raw);

    let Some(imaginary) = body.strip_suffix('i') else {
      return Ok(Self::new(component(body)?, F::default()));
    };

    // The sign that splits the parts is the last one not opening an exponent.
    let bytes = imaginary.as_bytes();
    let split = (1..bytes.len())
      .rev()
      .find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E'));

    match split {
      Some(at) => Ok(Self::new(
        component(&imaginary[..at])?,
        unit_or(&imaginary[at..])?,
      )),
      None => Ok(Self::new(F::default(), unit_or(imaginary)?)),
    }
  }
}

fn component<F: FromStr>(raw: &str) -> Result<F, String> {
  raw
    .parse::<F>()
    .map_err(|_| format!("invalid complex component {raw:?}"))
}

// A bare sign before `i` stands for a unit coefficient.
fn unit_or<F: FromStr + From<i8>>(raw: &str) -> Result<F, String> {
  match raw {
    "" | "+" => Ok(F::from(1)),
    "-" => Ok(F::from(-1)),
    _ => component(raw),
  }
}

impl EnvValue for Complex32 {
  fn decode(raw: &str) -> Result<Self, String> {
    raw.parse()
  }
}

impl EnvValue for Complex64 {
  fn decode(raw: &str) -> Result<Self, String> {
    raw.parse()
  }
}
