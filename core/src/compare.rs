use std::{borrow::Cow, str::FromStr};

use rust_decimal::{
    prelude::{FromPrimitive, ToPrimitive},
    Decimal,
};

use crate::error::ConfigError;
use crate::testing::SpecialJudge;

/// Tolerances in `(0, MIN_TOLERANCE]` cannot be represented precisely and are rejected.
pub const MIN_TOLERANCE: f64 = 1e-28;

/// Decides whether an actual output is equivalent to an expected one.
///
/// Every variant but [`Comparator::SpecialJudge`] is a pure function of the two buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparator {
    Exact,
    FloatingPoint(FloatTolerance),
    /// Compares whitespace-separated words.
    Split(Box<Comparator>),
    /// Compares lines. Exactly one trailing newline is ignored.
    SplitLines(Box<Comparator>),
    CrlfInsensitive(Box<Comparator>),
    /// Decided by an external checker, see [`SpecialJudge::check`].
    SpecialJudge(SpecialJudge),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatTolerance {
    rel: Decimal,
    abs: Decimal,
}

impl FloatTolerance {
    pub fn new(rel_tol: f64, abs_tol: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            rel: self::tolerance_to_decimal(rel_tol)?,
            abs: self::tolerance_to_decimal(abs_tol)?,
        })
    }

    pub fn uniform(tol: f64) -> Result<Self, ConfigError> {
        Self::new(tol, tol)
    }

    fn is_close(&self, x: Number, y: Number) -> bool {
        if let (Number::Decimal(x), Number::Decimal(y)) = (x, y) {
            if let Some(diff) = x.checked_sub(y).map(|d| d.abs()) {
                // An overflowing bound is larger than any representable difference.
                let within = |bound: Option<Decimal>| bound.map_or(true, |b| diff <= b.abs());
                return within(self.rel.checked_mul(x))
                    || within(self.rel.checked_mul(y))
                    || diff <= self.abs;
            }
        }
        self.is_close_wide(x.to_f64(), y.to_f64())
    }

    /// Same formula as [`FloatTolerance::is_close`], at `f64` precision.
    fn is_close_wide(&self, x: f64, y: f64) -> bool {
        let rel = self.rel.to_f64().unwrap_or(f64::MAX);
        let abs = self.abs.to_f64().unwrap_or(f64::MAX);
        let diff = (x - y).abs();
        diff <= rel * x.abs() || diff <= rel * y.abs() || diff <= abs
    }
}

/// A numeric word. Values that [`Decimal`] cannot hold exactly are kept as `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Decimal(Decimal),
    Wide(f64),
}

impl Number {
    fn to_f64(self) -> f64 {
        match self {
            Number::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
            Number::Wide(f) => f,
        }
    }
}

/// Validates a tolerance value, shared by every float-aware compare mode.
pub fn validate_tolerance(tol: f64) -> Result<(), ConfigError> {
    if !tol.is_finite() || tol < 0.0 {
        return Err(ConfigError::InvalidTolerance(tol));
    }
    if 0.0 < tol && tol <= MIN_TOLERANCE {
        return Err(ConfigError::TooSmallTolerance(tol));
    }
    Ok(())
}

fn tolerance_to_decimal(tol: f64) -> Result<Decimal, ConfigError> {
    self::validate_tolerance(tol)?;
    let parsed = Decimal::from_str(&tol.to_string())
        .ok()
        .or_else(|| Decimal::from_scientific(&format!("{:e}", tol)).ok())
        .or_else(|| Decimal::from_f64(tol));
    match parsed {
        Some(d) => Ok(d),
        None if tol > 1.0 => Ok(Decimal::MAX),
        None => Err(ConfigError::InvalidTolerance(tol)),
    }
}

fn parse_number(bytes: &[u8]) -> Option<Number> {
    let s = std::str::from_utf8(bytes).ok()?.trim();
    if s.is_empty() {
        return None;
    }
    // `from_str_exact` fails instead of rounding away digits beyond scale 28.
    if let Ok(d) = Decimal::from_str_exact(s).or_else(|_| Decimal::from_scientific(s)) {
        return Some(Number::Decimal(d));
    }
    let wide: f64 = s.parse().ok()?;
    wide.is_finite().then_some(Number::Wide(wide))
}

fn is_word_separator(b: &u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
}

fn split_words(s: &[u8]) -> Vec<&[u8]> {
    s.split(self::is_word_separator)
        .filter(|w| !w.is_empty())
        .collect()
}

fn split_lines(s: &[u8]) -> Vec<&[u8]> {
    let s = s.strip_suffix(b"\n").unwrap_or(s);
    s.split(|&b| b == b'\n').collect()
}

/// Replaces every `\r\n` with `\n`.
pub fn normalize_crlf(s: &[u8]) -> Cow<'_, [u8]> {
    if !s.windows(2).any(|w| w == b"\r\n") {
        return Cow::Borrowed(s);
    }
    let mut res = Vec::with_capacity(s.len());
    let mut i = 0;
    while i < s.len() {
        if s[i] == b'\r' && s.get(i + 1) == Some(&b'\n') {
            i += 1;
            continue;
        }
        res.push(s[i]);
        i += 1;
    }
    Cow::Owned(res)
}

fn compare_pairwise(inner: &Comparator, xs: &[&[u8]], ys: &[&[u8]]) -> bool {
    xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| inner.compare(x, y))
}

impl Comparator {
    pub fn split(inner: Comparator) -> Self {
        Self::Split(Box::new(inner))
    }

    pub fn split_lines(inner: Comparator) -> Self {
        Self::SplitLines(Box::new(inner))
    }

    pub fn crlf_insensitive(inner: Comparator) -> Self {
        Self::CrlfInsensitive(Box::new(inner))
    }

    pub fn floating_point(rel_tol: f64, abs_tol: f64) -> Result<Self, ConfigError> {
        FloatTolerance::new(rel_tol, abs_tol).map(Self::FloatingPoint)
    }

    /// Ignores spaces and newlines, compares words exactly.
    /// Used to tell whether a wrong answer is only a formatting issue.
    pub fn non_strict() -> Self {
        Self::crlf_insensitive(Self::split(Self::Exact))
    }

    /// Returns true if `actual` is equivalent to `expected`.
    ///
    /// A special judge cannot be decided from the buffers alone, so it accepts here.
    pub fn compare(&self, actual: &[u8], expected: &[u8]) -> bool {
        match self {
            Self::Exact => actual == expected,
            Self::FloatingPoint(tol) => match (parse_number(actual), parse_number(expected)) {
                (Some(x), Some(y)) => tol.is_close(x, y),
                _ => actual == expected,
            },
            Self::Split(inner) => {
                compare_pairwise(inner, &split_words(actual), &split_words(expected))
            }
            Self::SplitLines(inner) => {
                compare_pairwise(inner, &split_lines(actual), &split_lines(expected))
            }
            Self::CrlfInsensitive(inner) => {
                inner.compare(&normalize_crlf(actual), &normalize_crlf(expected))
            }
            Self::SpecialJudge(_) => true,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum CompareMode {
    #[default]
    ExactMatch,
    CrlfInsensitiveExactMatch,
    IgnoreSpaces,
    IgnoreSpacesAndNewlines,
}

impl CompareMode {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        Self::from_str(s).map_err(|_| ConfigError::UnknownCompareMode(s.to_owned()))
    }

    /// Builds the comparator pipeline of this mode.
    /// `tolerance = None` means numbers are compared exactly as words.
    pub fn comparator(self, tolerance: Option<f64>) -> Result<Comparator, ConfigError> {
        use CompareMode::*;

        let word = match tolerance {
            None => Comparator::Exact,
            Some(tol) => Comparator::FloatingPoint(FloatTolerance::uniform(tol)?),
        };
        let cmp = match (self, tolerance) {
            (ExactMatch, None) => Comparator::Exact,
            (CrlfInsensitiveExactMatch, None) => Comparator::crlf_insensitive(Comparator::Exact),
            (ExactMatch | CrlfInsensitiveExactMatch | IgnoreSpaces, _) => {
                Comparator::crlf_insensitive(Comparator::split_lines(Comparator::split(word)))
            }
            (IgnoreSpacesAndNewlines, _) => Comparator::crlf_insensitive(Comparator::split(word)),
        };
        Ok(cmp)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fp(rel_tol: f64, abs_tol: f64) -> Comparator {
        Comparator::floating_point(rel_tol, abs_tol).unwrap()
    }

    #[test]
    fn exact() {
        let c = Comparator::Exact;
        assert!(c.compare(b"abc def\nghi jkl\n", b"abc def\nghi jkl\n"));
        assert!(!c.compare(b"abc def\nghi jkl\n", b"abc def\nghi jkl"));
        assert!(!c.compare(b"abc def\nghi jkl\n", b"abc def\ngh jkl"));
        assert!(c.compare(b"", b""));
    }

    #[test]
    fn floating_point_accuracy() {
        for digit in [2, 4, 9, 13, 18] {
            let tol: f64 = format!("1e-{}", digit).parse().unwrap();
            let d0 = "0".repeat(digit - 2);
            let d9 = "9".repeat(digit - 2);
            let b = |s: String| s.into_bytes();

            let c = fp(0.0, 0.0);
            assert!(c.compare(&b(format!("1.{d0}11")), &b(format!("1.{d0}11"))));
            assert!(!c.compare(&b(format!("1.{d0}11")), &b(format!("1.{d0}12"))));

            let c = fp(tol, 0.0);
            assert!(c.compare(&b(format!("2.{d0}00")), &b(format!("1.{d9}98"))));
            assert!(c.compare(&b(format!("2.{d0}00")), &b(format!("2.{d0}02"))));
            assert!(!c.compare(&b(format!("2.{d0}00")), &b(format!("1.{d9}979"))));
            assert!(!c.compare(&b(format!("2.{d0}00")), &b(format!("2.{d0}021"))));

            let c = fp(0.0, tol);
            assert!(c.compare(&b(format!("2.{d0}00")), &b(format!("2.{d0}01"))));
            assert!(c.compare(&b(format!("2.{d0}00")), &b(format!("1.{d9}99"))));
            assert!(!c.compare(&b(format!("2.{d0}00")), &b(format!("2.{d0}011"))));
            assert!(!c.compare(&b(format!("2.{d0}00")), &b(format!("1.{d9}989"))));
        }
    }

    #[test]
    fn floating_point_zero_tolerance_is_exact_on_numbers() {
        let c = fp(0.0, 0.0);
        assert!(c.compare(b"3.14", b"3.14"));
        assert!(!c.compare(b"3.14", b"3.15"));
        assert!(c.compare(b"1.50", b"1.5"), "same value in another notation");
        assert!(c.compare(b"1e3", b"1000"));
    }

    #[test]
    fn floating_point_not_floatable() {
        let c = fp(1e-1, 1e-1);
        assert!(c.compare(b"abc def\nghi jkl\n", b"abc def\nghi jkl\n"));
        assert!(!c.compare(b"1.23", b"abc def\nghi jkl"));
        assert!(!c.compare(b"abc def\nghi jkl\n", b"1.23"));
        assert!(c.compare(b"1.23\n", b"1.23"));
        assert!(c.compare(b"1.23", b"1.23\n"));
        assert!(!c.compare(b"", b"0"));
    }

    #[test]
    fn floating_point_beyond_decimal_range() {
        let c = CompareMode::ExactMatch.comparator(Some(1e-6)).unwrap();
        assert!(c.compare(b"1e30\n", b"1.0000001e30\n"));
        assert!(!c.compare(b"1e30\n", b"1.1e30\n"));
        assert!(c.compare(
            b"100000000000000000000000000000",
            b"100000000000000000000000000001"
        ));
        assert!(c.compare(b"1e-30", b"0"));
        assert!(c.compare(b"0.0000000000000000000000000000001", b"0"));
        assert!(!c.compare(b"1e-30", b"1"));

        let c = fp(0.0, 0.0);
        assert!(!c.compare(b"1e-30", b"0"));
        assert!(!c.compare(b"0.0000000000000000000000000000001", b"0"));
        assert!(c.compare(b"1e-30", b"0.000000000000000000000000000001"));

        // not representable even as f64, compared as bytes
        let c = fp(1e-6, 1e-6);
        assert!(c.compare(b"1e400", b"1e400"));
        assert!(!c.compare(b"1e400", b"2e400"));
    }

    #[test]
    fn decimal_overflow_falls_back_to_wide_comparison() {
        let max = Decimal::MAX.to_string();
        let min = Decimal::MIN.to_string();
        assert!(fp(3.0, 0.0).compare(max.as_bytes(), min.as_bytes()));
        assert!(!fp(1.0, 0.0).compare(max.as_bytes(), min.as_bytes()));
    }

    #[test]
    fn tolerance_floor() {
        for tol in [1e-28, 1e-30, 5e-29, f64::MIN_POSITIVE] {
            assert!(matches!(
                Comparator::floating_point(tol, 0.0),
                Err(ConfigError::TooSmallTolerance(_))
            ));
            assert!(matches!(
                Comparator::floating_point(0.0, tol),
                Err(ConfigError::TooSmallTolerance(_))
            ));
        }
        assert!(Comparator::floating_point(0.0, 0.0).is_ok());
        assert!(Comparator::floating_point(1e-27, 1e-27).is_ok());
        assert!(Comparator::floating_point(1e40, 1.0).is_ok());
        assert!(matches!(
            Comparator::floating_point(-1.0, 0.0),
            Err(ConfigError::InvalidTolerance(_))
        ));
        assert!(matches!(
            Comparator::floating_point(f64::NAN, 0.0),
            Err(ConfigError::InvalidTolerance(_))
        ));
    }

    #[test]
    fn split() {
        let c = Comparator::split(fp(0.0, 1e-1));
        assert!(!c.compare(b"1.0 2.0\n", b"1.1\n"));
        assert!(c.compare(b"1.0 2.0\n", b"1.1 2.0\n"));
        assert!(c.compare(b"  1.0\t\t2.0 \r\n", b"1.1 2.0"));
        assert!(c.compare(b"a\x0bb\x0c", b"a b"));
    }

    #[test]
    fn split_lines() {
        let c = Comparator::split_lines(Comparator::split(fp(0.0, 1e-1)));
        assert!(!c.compare(b"1.0 2.0\n3.0 4.0\n", b"1.1 2.1\n"));
        assert!(c.compare(b"1.0\n2.0\n", b"1.1\n2.1\n"));
        assert!(c.compare(b"1.0\n2.0\n", b"1.1\n2.1"));
    }

    #[test]
    fn split_lines_strips_only_one_newline() {
        let c = Comparator::split_lines(Comparator::Exact);
        assert!(c.compare(b"a\nb\n", b"a\nb"));
        assert!(!c.compare(b"a\nb\n\n", b"a\nb\n"));
        assert!(c.compare(b"a\nb\n\n", b"a\nb\n\n"));
        assert!(c.compare(b"", b"\n"));
    }

    #[test]
    fn crlf_insensitive() {
        let c = Comparator::crlf_insensitive(Comparator::split_lines(Comparator::split(fp(
            0.0, 1e-1,
        ))));
        assert!(!c.compare(b"1.0 2.0\r\n3.0 4.0\r\n", b"1.1 2.1\r\n"));
        assert!(c.compare(b"1.0\r\n2.0\r\n", b"1.1\r\n2.1\r\n"));
    }

    #[test]
    fn crlf_insensitive_is_inner_after_normalization() {
        let inner = Comparator::Exact;
        let c = Comparator::crlf_insensitive(inner.clone());
        let samples: [&[u8]; 6] = [b"", b"\r\n", b"a\r\nb", b"a\nb", b"a\r\r\nb", b"\r"];
        for a in samples {
            for b in samples {
                assert_eq!(
                    c.compare(a, b),
                    inner.compare(&normalize_crlf(a), &normalize_crlf(b)),
                    "a={:?} b={:?}",
                    a,
                    b
                );
            }
        }
        assert_eq!(normalize_crlf(b"a\r\r\nb").as_ref(), b"a\r\nb");
    }

    #[test]
    fn compare_mode_pipelines() {
        use CompareMode::*;
        let exact = ExactMatch.comparator(None).unwrap();
        assert_eq!(exact, Comparator::Exact);
        assert!(!exact.compare(b"1\r\n", b"1\n"));

        let crlf = CrlfInsensitiveExactMatch.comparator(None).unwrap();
        assert!(crlf.compare(b"1 1\r\n2 2\r\n", b"1 1\n2 2\n"));
        assert!(!crlf.compare(b"1     1\n2 2\n", b"1 1\n2 2\n"));

        let spaces = IgnoreSpaces.comparator(None).unwrap();
        assert!(spaces.compare(b"1     1\r\n2 2\r\n", b"1 1\n2 2\n"));
        assert!(!spaces.compare(b"1     1\r\n\r\n2 2\n", b"1 1\n2 2\n"));

        let newlines = IgnoreSpacesAndNewlines.comparator(None).unwrap();
        assert!(newlines.compare(b"1     1\r\n\r\n2 2", b"1 1\n2 2\n\n"));

        let tolerant = ExactMatch.comparator(Some(1e-6)).unwrap();
        assert!(tolerant.compare(b"0.3333333\r\n", b"0.33333333\n"));
        assert!(!tolerant.compare(b"0.3333\n", b"0.33333333\n"));
        assert_eq!(
            CrlfInsensitiveExactMatch.comparator(Some(1e-6)).unwrap(),
            tolerant
        );
    }

    #[test]
    fn non_strict_ignores_spaces_and_newlines() {
        let c = Comparator::non_strict();
        assert_eq!(c, CompareMode::IgnoreSpacesAndNewlines.comparator(None).unwrap());
        assert!(c.compare(b"1 2\r\n3", b"1\n2 3\n"));
        assert!(!c.compare(b"1.0 2", b"1 2"));
    }

    #[test]
    fn compare_mode_parse() {
        assert_eq!(
            CompareMode::parse("ignore-spaces-and-newlines").unwrap(),
            CompareMode::IgnoreSpacesAndNewlines
        );
        assert_eq!(CompareMode::ExactMatch.to_string(), "exact-match");
        assert!(matches!(
            CompareMode::parse("fuzzy"),
            Err(ConfigError::UnknownCompareMode(m)) if m == "fuzzy"
        ));
        assert!(matches!(
            CompareMode::IgnoreSpaces.comparator(Some(1e-30)),
            Err(ConfigError::TooSmallTolerance(_))
        ));
    }
}
