//! 실시간 티커 분 단위 샘플링.
//!
//! 이벤트 시각을 가장 가까운 초로 반올림(동률은 짝수 쪽)한 뒤
//! 초 값이 00인 이벤트만 저장 대상으로 삼습니다.

/// epoch ms를 가장 가까운 epoch 초로 반올림합니다. 정확히 .500이면 짝수 초를 택합니다.
pub fn round_to_second(ms: i64) -> i64 {
    let secs = ms.div_euclid(1000);
    let rem = ms.rem_euclid(1000);

    if rem > 500 || (rem == 500 && secs.rem_euclid(2) == 1) {
        secs + 1
    } else {
        secs
    }
}

/// 반올림된 시각의 분 내 초 (0..=59).
pub fn second_of_minute(ms: i64) -> u32 {
    round_to_second(ms).rem_euclid(60) as u32
}

/// 분 경계(초 == 00)에 해당하는 이벤트인지 확인합니다.
pub fn is_minute_mark(ms: i64) -> bool {
    second_of_minute(ms) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rounds_up_after_half() {
        // 2021-10-11T19:48:24.662Z
        assert_eq!(second_of_minute(1_633_981_704_662), 25);
        assert!(!is_minute_mark(1_633_981_704_662));
    }

    #[test]
    fn test_half_rounds_to_even() {
        // 739.5 → 740 (:00), 740.5 → 740 (:00), 738.5 → 738 (:58)
        assert!(is_minute_mark(1_633_981_739_500));
        assert!(is_minute_mark(1_633_981_740_500));
        assert_eq!(second_of_minute(1_633_981_738_500), 58);
    }

    #[test]
    fn test_minute_window() {
        assert!(is_minute_mark(1_633_981_739_501));
        assert!(is_minute_mark(1_633_981_740_000));
        assert!(is_minute_mark(1_633_981_740_499));
        assert!(!is_minute_mark(1_633_981_740_501));
        assert!(!is_minute_mark(1_633_981_739_499));
    }

    #[test]
    fn test_negative_epoch() {
        assert_eq!(round_to_second(-1), 0);
        assert_eq!(round_to_second(-1_600), -2);
    }

    proptest! {
        #[test]
        fn prop_rounding_within_half_second(ms in -10_000_000_000_000i64..10_000_000_000_000) {
            let rounded = round_to_second(ms) * 1000;
            prop_assert!((rounded - ms).abs() <= 500);
        }
    }
}
