//! 探索深さのエンコード定数と変換
//!
//! エントリは深さを `depth - DEPTH_ENTRY_OFFSET` のu8で保持する。
//! オフセットにより深さ0が表現でき、静止探索の負の深さも収まる。

/// 静止探索の深さ
pub const DEPTH_QS: i32 = 0;

/// 「深さなし」を表す番兵値
pub const DEPTH_NONE: i32 = -6;

/// エントリに保存される深さのオフセット
///
/// エンジンが保存しうる最小の深さ。呼び出し側は
/// `0 <= depth - DEPTH_ENTRY_OFFSET <= 255` を保証する。
pub const DEPTH_ENTRY_OFFSET: i32 = -3;

/// エントリに保存できる最大の深さ
pub const DEPTH_ENTRY_MAX: i32 = DEPTH_ENTRY_OFFSET + u8::MAX as i32;

/// 深さをエントリ保存形式（u8）へ変換する
#[inline]
pub const fn depth_to_stored(depth: i32) -> u8 {
    (depth - DEPTH_ENTRY_OFFSET) as u8
}

/// エントリ保存形式（u8）から深さを復元する
#[inline]
pub const fn stored_to_depth(depth8: u8) -> i32 {
    depth8 as i32 + DEPTH_ENTRY_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_roundtrip() {
        for depth in DEPTH_ENTRY_OFFSET..=DEPTH_ENTRY_MAX {
            assert_eq!(stored_to_depth(depth_to_stored(depth)), depth);
        }
    }

    #[test]
    fn test_depth_zero_representable() {
        // 深さ0（静止探索）と負の深さがu8に収まる
        assert_eq!(depth_to_stored(DEPTH_QS), 3);
        assert_eq!(depth_to_stored(DEPTH_ENTRY_OFFSET), 0);
        assert_eq!(depth_to_stored(DEPTH_ENTRY_MAX), u8::MAX);
    }
}
