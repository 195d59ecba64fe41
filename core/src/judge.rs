use serde::Serialize;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum JudgeStatus {
    AC,
    WA,
    RE,
    TLE,
    MLE,
}

impl JudgeStatus {
    pub fn is_accepted(&self) -> bool {
        *self == JudgeStatus::AC
    }
}

/// Decides the verdict of one execution. The first matching rule wins:
/// TLE, MLE, RE, WA, then AC.
///
/// `exit_code` is `None` only when the process was killed by the time limit.
/// `comparison` is `None` when there was nothing to compare against,
/// which is accepted.
pub fn classify(
    exit_code: Option<i32>,
    peak_memory_mb: Option<f64>,
    memory_limit_mb: Option<f64>,
    comparison: Option<bool>,
) -> JudgeStatus {
    use JudgeStatus::*;

    let Some(exit_code) = exit_code else {
        return TLE
    };
    if let (Some(used), Some(limit)) = (peak_memory_mb, memory_limit_mb) {
        if used > limit {
            return MLE;
        }
    }
    if exit_code != 0 {
        return RE;
    }
    match comparison {
        Some(false) => WA,
        Some(true) | None => AC,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;
    use JudgeStatus::*;

    #[test]
    fn tle_wins_over_everything() {
        for mem in [None, Some(1.0), Some(1e9)] {
            for limit in [None, Some(0.5)] {
                for cmp in [None, Some(true), Some(false)] {
                    assert_eq!(classify(None, mem, limit, cmp), TLE);
                }
            }
        }
    }

    #[test]
    fn mle_is_checked_before_exit_code_and_output() {
        assert_eq!(classify(Some(0), Some(300.0), Some(256.0), Some(true)), MLE);
        assert_eq!(classify(Some(1), Some(300.0), Some(256.0), Some(false)), MLE);
        assert_eq!(classify(Some(0), Some(256.0), Some(256.0), Some(true)), AC);
        assert_eq!(classify(Some(0), Some(300.0), None, Some(true)), AC);
        assert_eq!(classify(Some(0), None, Some(256.0), Some(true)), AC);
    }

    #[test]
    fn re_and_wa() {
        assert_eq!(classify(Some(1), None, None, None), RE);
        assert_eq!(classify(Some(-9), None, None, Some(true)), RE);
        assert_eq!(classify(Some(0), None, None, Some(false)), WA);
    }

    #[test]
    fn nothing_to_compare_is_accepted() {
        assert_eq!(classify(Some(0), None, None, None), AC);
        assert_eq!(classify(Some(0), None, None, Some(true)), AC);
    }

    #[test]
    fn display_is_short_code() {
        let codes: Vec<_> = JudgeStatus::iter().map(|j| j.to_string()).collect();
        assert_eq!(codes, ["AC", "WA", "RE", "TLE", "MLE"]);
    }
}
