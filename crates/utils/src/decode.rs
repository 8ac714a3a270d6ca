//! Decoders turn raw form input into typed values.
//!
//! A decoder never panics on bad input: failures come back as a list of
//! [`ValidationError`]s that the caller renders next to the field. Decoders
//! compose through [`DecoderExt`], so a field definition reads as
//! `NonEmptyString.with_message("This field is required")`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A single structured validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct ValidationError {
    pub message: String,
    /// Field path from the outermost value, empty for a top-level field.
    pub path: Vec<String>,
    pub raw: Option<String>,
}

/// Decode failures. Never empty when returned in `Err`.
pub type Errors = Vec<ValidationError>;

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
            raw: None,
        }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// Prefix the path with `segment`.
    pub fn at(mut self, segment: impl Into<String>) -> Self {
        self.path.insert(0, segment.into());
        self
    }
}

/// Shorthand for a single-error failure.
pub fn failure<V>(message: impl Into<String>, raw: &str) -> Result<V, Errors> {
    Err(vec![ValidationError::new(message).with_raw(raw)])
}

pub trait Decoder<R> {
    type Value;
    type Error;

    fn decode(&self, raw: &R) -> Result<Self::Value, Self::Error>;
}

/// The inverse of a decoder, used to seed a field from a known-good value.
pub trait Encoder<V> {
    type Raw;

    fn encode(&self, value: &V) -> Self::Raw;
}

/// Combinators available on every string decoder.
pub trait DecoderExt: Decoder<String, Error = Errors> + Sized {
    /// Replace every failure message with `message`.
    fn with_message(self, message: impl Into<String>) -> WithMessage<Self> {
        WithMessage {
            inner: self,
            message: message.into(),
        }
    }

    /// Accept only decoded values for which `predicate` holds.
    fn refine<F>(self, predicate: F, message: impl Into<String>) -> Refine<Self, F>
    where
        F: Fn(&Self::Value) -> bool,
    {
        Refine {
            inner: self,
            predicate,
            message: message.into(),
        }
    }

    /// Treat blank input as `None` instead of running the inner decoder.
    fn optional(self) -> Optional<Self> {
        Optional { inner: self }
    }
}

impl<D: Decoder<String, Error = Errors>> DecoderExt for D {}

/// Accepts any string that is not blank. The value is the raw string.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmptyString;

impl Decoder<String> for NonEmptyString {
    type Value = String;
    type Error = Errors;

    fn decode(&self, raw: &String) -> Result<String, Errors> {
        if raw.trim().is_empty() {
            return failure("must not be empty", raw);
        }
        Ok(raw.clone())
    }
}

impl Encoder<String> for NonEmptyString {
    type Raw = String;

    fn encode(&self, value: &String) -> String {
        value.clone()
    }
}

/// Accepts anything, yielding the input with surrounding whitespace removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimmedString;

impl Decoder<String> for TrimmedString {
    type Value = String;
    type Error = Errors;

    fn decode(&self, raw: &String) -> Result<String, Errors> {
        Ok(raw.trim().to_string())
    }
}

impl Encoder<String> for TrimmedString {
    type Raw = String;

    fn encode(&self, value: &String) -> String {
        value.clone()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NumberFromString;

impl Decoder<String> for NumberFromString {
    type Value = f64;
    type Error = Errors;

    fn decode(&self, raw: &String) -> Result<f64, Errors> {
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(n),
            _ => failure("must be a number", raw),
        }
    }
}

impl Encoder<f64> for NumberFromString {
    type Raw = String;

    fn encode(&self, value: &f64) -> String {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntFromString;

impl Decoder<String> for IntFromString {
    type Value = i64;
    type Error = Errors;

    fn decode(&self, raw: &String) -> Result<i64, Errors> {
        raw.trim()
            .parse::<i64>()
            .or_else(|_| failure("must be a whole number", raw))
    }
}

impl Encoder<i64> for IntFromString {
    type Raw = String;

    fn encode(&self, value: &i64) -> String {
        value.to_string()
    }
}

/// Calendar date in `YYYY-MM-DD` form.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateFromIsoString;

const ISO_DATE: &str = "%Y-%m-%d";

impl Decoder<String> for DateFromIsoString {
    type Value = NaiveDate;
    type Error = Errors;

    fn decode(&self, raw: &String) -> Result<NaiveDate, Errors> {
        NaiveDate::parse_from_str(raw.trim(), ISO_DATE)
            .or_else(|_| failure("must be a date (YYYY-MM-DD)", raw))
    }
}

impl Encoder<NaiveDate> for DateFromIsoString {
    type Raw = String;

    fn encode(&self, value: &NaiveDate) -> String {
        value.format(ISO_DATE).to_string()
    }
}

/// RFC 3339 timestamp, normalised to UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeFromIsoString;

impl Decoder<String> for DateTimeFromIsoString {
    type Value = DateTime<Utc>;
    type Error = Errors;

    fn decode(&self, raw: &String) -> Result<DateTime<Utc>, Errors> {
        DateTime::parse_from_rfc3339(raw.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| failure("must be a date and time", raw))
    }
}

impl Encoder<DateTime<Utc>> for DateTimeFromIsoString {
    type Raw = String;

    fn encode(&self, value: &DateTime<Utc>) -> String {
        value.to_rfc3339()
    }
}

/// Accepts one of a closed set of strings, compared after trimming.
#[derive(Debug, Clone, Default)]
pub struct OneOf {
    options: Vec<String>,
}

impl OneOf {
    pub fn new<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }
}

impl Decoder<String> for OneOf {
    type Value = String;
    type Error = Errors;

    fn decode(&self, raw: &String) -> Result<String, Errors> {
        let candidate = raw.trim();
        match self.options.iter().find(|o| o.as_str() == candidate) {
            Some(option) => Ok(option.clone()),
            None => failure(
                format!("must be one of: {}", self.options.join(", ")),
                raw,
            ),
        }
    }
}

impl Encoder<String> for OneOf {
    type Raw = String;

    fn encode(&self, value: &String) -> String {
        value.clone()
    }
}

#[derive(Debug, Clone)]
pub struct WithMessage<D> {
    inner: D,
    message: String,
}

impl<D> Decoder<String> for WithMessage<D>
where
    D: Decoder<String, Error = Errors>,
{
    type Value = D::Value;
    type Error = Errors;

    fn decode(&self, raw: &String) -> Result<D::Value, Errors> {
        self.inner.decode(raw).map_err(|errors| {
            errors
                .into_iter()
                .map(|e| ValidationError {
                    message: self.message.clone(),
                    ..e
                })
                .collect()
        })
    }
}

impl<D, V> Encoder<V> for WithMessage<D>
where
    D: Encoder<V>,
{
    type Raw = D::Raw;

    fn encode(&self, value: &V) -> D::Raw {
        self.inner.encode(value)
    }
}

#[derive(Debug, Clone)]
pub struct Refine<D, F> {
    inner: D,
    predicate: F,
    message: String,
}

impl<D, F> Decoder<String> for Refine<D, F>
where
    D: Decoder<String, Error = Errors>,
    F: Fn(&D::Value) -> bool,
{
    type Value = D::Value;
    type Error = Errors;

    fn decode(&self, raw: &String) -> Result<D::Value, Errors> {
        let value = self.inner.decode(raw)?;
        if (self.predicate)(&value) {
            Ok(value)
        } else {
            failure(self.message.clone(), raw)
        }
    }
}

impl<D, F, V> Encoder<V> for Refine<D, F>
where
    D: Encoder<V>,
{
    type Raw = D::Raw;

    fn encode(&self, value: &V) -> D::Raw {
        self.inner.encode(value)
    }
}

#[derive(Debug, Clone)]
pub struct Optional<D> {
    inner: D,
}

impl<D> Decoder<String> for Optional<D>
where
    D: Decoder<String, Error = Errors>,
{
    type Value = Option<D::Value>;
    type Error = Errors;

    fn decode(&self, raw: &String) -> Result<Option<D::Value>, Errors> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        self.inner.decode(raw).map(Some)
    }
}

impl<D, V> Encoder<Option<V>> for Optional<D>
where
    D: Encoder<V, Raw = String>,
{
    type Raw = String;

    fn encode(&self, value: &Option<V>) -> String {
        value
            .as_ref()
            .map(|v| self.inner.encode(v))
            .unwrap_or_default()
    }
}
