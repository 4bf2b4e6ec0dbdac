//! 置換表エントリー
//!
//! TTEntry: 10バイトのコンパクトなエントリ構造
//! TTData: 読み取り用のデータ構造
//!
//! 複数workerが `&self` 越しにロックなしで読み書きするため、各フィールドは
//! relaxed ordering のatomicセルとして持つ。エントリ全体の原子性はなく、
//! フィールド間で破れた書き込みは読み手の `key16` 一致検査が弾く。
//! relaxedなatomic store は通常のストア命令にコンパイルされ、ホットパスの
//! コストは増えない。

use super::{GENERATION_CYCLE, GENERATION_MASK};
use crate::types::{Bound, DEPTH_ENTRY_OFFSET, Move, Value, depth_to_stored, stored_to_depth};
use std::sync::atomic::{AtomicU8, AtomicU16, Ordering};

/// generation / pv / bound を1バイトにパックする
///
/// bit 7..3: generation、bit 2: pvフラグ、bit 1..0: 境界種別。
#[inline]
pub const fn pack_gen_bound(generation8: u8, is_pv: bool, bound: Bound) -> u8 {
    (generation8 & GENERATION_MASK as u8) | ((is_pv as u8) << 2) | bound as u8
}

/// 置換表エントリー
/// メモリ効率のため、フィールドを詰め込む（10バイト）
///
/// atomicセルは下層の整数型と同じレイアウトを持つため、`repr(C)` の
/// このフィールド順でパディングなしの10バイトに収まる。
#[repr(C)]
pub struct TTEntry {
    /// ハッシュキーの上位16bit（衝突検出用）
    key16: AtomicU16,
    /// 探索深さ（DEPTH_ENTRY_OFFSETを引いた値）
    depth8: AtomicU8,
    /// generation(5bit) | pv(1bit) | bound(2bit)
    gen_bound8: AtomicU8,
    /// 最善手（16bit形式）
    move16: AtomicU16,
    /// 探索値（i16のbitパターン）
    value16: AtomicU16,
    /// 評価値（i16のbitパターン）
    eval16: AtomicU16,
}

// エントリサイズが10バイト・アライメント2であることを保証
const _: () = assert!(std::mem::size_of::<TTEntry>() == 10);
const _: () = assert!(std::mem::align_of::<TTEntry>() == 2);

impl TTEntry {
    /// 新しい空のエントリを作成
    #[inline]
    pub const fn new() -> Self {
        Self {
            key16: AtomicU16::new(0),
            depth8: AtomicU8::new(0),
            gen_bound8: AtomicU8::new(0),
            move16: AtomicU16::new(0),
            value16: AtomicU16::new(0),
            eval16: AtomicU16::new(0),
        }
    }

    /// エントリが空かどうか
    ///
    /// ゼロクリア直後の状態のみが空。上位16bitが偶然0のキーを持つ
    /// 正当なエントリは、世代か境界のbitが立つため空と誤認されない。
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.key16.load(Ordering::Relaxed) == 0 && self.gen_bound8.load(Ordering::Relaxed) == 0
    }

    /// 有効な境界を持つか
    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.bound() != Bound::None
    }

    /// キー署名を取得
    #[inline]
    pub fn key16(&self) -> u16 {
        self.key16.load(Ordering::Relaxed)
    }

    /// 深さを取得（DEPTH_ENTRY_OFFSETを加算）
    #[inline]
    pub fn depth(&self) -> i32 {
        stored_to_depth(self.depth8())
    }

    /// 保存されている生のdepth8を取得
    #[inline]
    pub fn depth8(&self) -> u8 {
        self.depth8.load(Ordering::Relaxed)
    }

    /// 世代bit（上位5bit）を取得
    #[inline]
    pub fn generation(&self) -> u8 {
        self.gen_bound8.load(Ordering::Relaxed) & GENERATION_MASK as u8
    }

    /// 境界種別を取得
    #[inline]
    pub fn bound(&self) -> Bound {
        Bound::from_u8(self.gen_bound8.load(Ordering::Relaxed))
    }

    /// PVノード由来のエントリか
    #[inline]
    pub fn is_pv(&self) -> bool {
        (self.gen_bound8.load(Ordering::Relaxed) & 0x4) != 0
    }

    /// エントリを読み取る
    ///
    /// フィールドごとの独立したrelaxed loadで、並行書き込みと交差した
    /// 場合は破れたスナップショットになりうる。
    pub fn read(&self) -> TTData {
        TTData {
            mv: Move::from_u16(self.move16.load(Ordering::Relaxed)),
            value: Value::new(self.value16.load(Ordering::Relaxed) as i16),
            eval: Value::new(self.eval16.load(Ordering::Relaxed) as i16),
            depth: stored_to_depth(self.depth8.load(Ordering::Relaxed)),
            bound: self.bound(),
            is_pv: self.is_pv(),
        }
    }

    /// エントリに保存
    ///
    /// フィールドごとの独立したrelaxed storeで書く。ロックもCASも使わず、
    /// 同一エントリへの並行書き込みはフィールド単位で混ざりうる。
    ///
    /// # 引数が多い理由
    /// この関数は探索のホットパスで頻繁に呼ばれるため、
    /// 構造体にまとめるオーバーヘッドを避けて個別の引数として渡している。
    pub fn save(
        &self,
        key16: u16,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: i32,
        mv: Move,
        eval: Value,
        generation8: u8,
    ) {
        // 新しい指し手がない場合、同一局面の再保存なら古い指し手を保持
        if mv.is_some() || key16 != self.key16.load(Ordering::Relaxed) {
            self.move16.store(mv.to_u16(), Ordering::Relaxed);
        }

        debug_assert!((0..256).contains(&(depth - DEPTH_ENTRY_OFFSET)));

        self.key16.store(key16, Ordering::Relaxed);
        self.depth8.store(depth_to_stored(depth), Ordering::Relaxed);
        self.gen_bound8.store(pack_gen_bound(generation8, is_pv, bound), Ordering::Relaxed);
        self.value16.store(value.raw() as u16, Ordering::Relaxed);
        self.eval16.store(eval.raw() as u16, Ordering::Relaxed);
    }

    /// 世代bitだけを現在の世代に書き戻す（pv / boundは保持）
    ///
    /// probeヒット時に呼ばれる。load-storeの組はatomicなRMWではないため
    /// 並行書き込みに敗れうるが、古い世代に戻るだけで無害。
    #[inline]
    pub(super) fn refresh(&self, generation8: u8) {
        let gen_bound8 = self.gen_bound8.load(Ordering::Relaxed);
        self.gen_bound8
            .store((generation8 & GENERATION_MASK as u8) | (gen_bound8 & 0x7), Ordering::Relaxed);
    }

    /// 相対的な世代（0 = 最新）
    ///
    /// `GENERATION_CYCLE = 256 + 8` の256が世代カウンタのwrapを打ち消し、
    /// 下位8がpv/boundの3bitをマスク前に吸収する。
    #[inline]
    pub fn relative_age(&self, generation8: u8) -> u8 {
        let age = GENERATION_CYCLE
            .wrapping_add(generation8 as u16)
            .wrapping_sub(self.gen_bound8.load(Ordering::Relaxed) as u16);
        (age & GENERATION_MASK) as u8
    }

    /// 置換価値
    ///
    /// 深いエントリほど高く、古い世代ほど低い。save時の犠牲スロット選択で
    /// 最小のものが置き換えられる。
    #[inline]
    pub fn replace_score(&self, generation8: u8) -> i32 {
        self.depth8() as i32 - self.relative_age(generation8) as i32
    }
}

impl Default for TTEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// 置換表から読み取ったデータ
#[derive(Clone, Copy, Debug)]
pub struct TTData {
    /// 最善手
    pub mv: Move,
    /// 探索値
    pub value: Value,
    /// 評価値
    pub eval: Value,
    /// 探索深さ
    pub depth: i32,
    /// 境界タイプ
    pub bound: Bound,
    /// PVノードかどうか
    pub is_pv: bool,
}

impl TTData {
    /// 空のデータ
    pub const EMPTY: Self = Self {
        mv: Move::NONE,
        value: Value::NONE,
        eval: Value::NONE,
        depth: DEPTH_ENTRY_OFFSET,
        bound: Bound::None,
        is_pv: false,
    };
}

impl Default for TTData {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tt::GENERATION_DELTA;

    #[test]
    fn test_tt_entry_new() {
        let entry = TTEntry::new();
        assert!(entry.is_empty());
        assert!(!entry.is_occupied());
        assert_eq!(entry.key16(), 0);
    }

    #[test]
    fn test_tt_entry_layout() {
        // 10バイト・アライメント2（クラスター3個 + 2パディングで32バイト）
        assert_eq!(std::mem::size_of::<TTEntry>(), 10);
        assert_eq!(std::mem::align_of::<TTEntry>(), 2);
    }

    #[test]
    fn test_pack_gen_bound_roundtrip() {
        for generation in (0u8..=0xF8).step_by(GENERATION_DELTA as usize) {
            for is_pv in [false, true] {
                for bound in [Bound::None, Bound::Upper, Bound::Lower, Bound::Exact] {
                    let packed = pack_gen_bound(generation, is_pv, bound);
                    assert_eq!(packed & GENERATION_MASK as u8, generation);
                    assert_eq!((packed & 0x4) != 0, is_pv);
                    assert_eq!(Bound::from_u8(packed), bound);
                }
            }
        }
    }

    #[test]
    fn test_tt_entry_save_and_read() {
        let entry = TTEntry::new();

        let key = 0x1234u16;
        let value = Value::new(100);
        let eval = Value::new(-50);
        let depth = 10;
        let mv = Move::from_u16(0x7F21);
        let gen8 = 8;

        entry.save(key, value, true, Bound::Exact, depth, mv, eval, gen8);

        assert!(!entry.is_empty());
        assert!(entry.is_occupied());
        assert_eq!(entry.key16(), key);
        assert_eq!(entry.generation(), 8);

        let data = entry.read();
        assert_eq!(data.value.raw(), 100);
        assert_eq!(data.eval.raw(), -50);
        assert_eq!(data.depth, 10);
        assert_eq!(data.mv, mv);
        assert_eq!(data.bound, Bound::Exact);
        assert!(data.is_pv);
    }

    #[test]
    fn test_tt_entry_move_preserved_on_null_resave() {
        let entry = TTEntry::new();
        let key = 0x1234u16;
        let mv = Move::from_u16(0x0042);

        entry.save(key, Value::new(42), true, Bound::Exact, 10, mv, Value::new(-5), 0);

        // 同一キーへの指し手なし再保存では以前の指し手が残る
        entry.save(key, Value::new(50), false, Bound::Lower, 12, Move::NONE, Value::new(-4), 0);
        let data = entry.read();
        assert_eq!(data.mv, mv);
        assert_eq!(data.value.raw(), 50);
        assert_eq!(data.depth, 12);
        assert_eq!(data.bound, Bound::Lower);
        assert!(!data.is_pv);

        // 異なるキーなら指し手なしで上書きされる
        entry.save(0x5678, Value::new(1), false, Bound::Upper, 5, Move::NONE, Value::ZERO, 0);
        assert_eq!(entry.read().mv, Move::NONE);
    }

    #[test]
    fn test_tt_entry_refresh_keeps_payload() {
        let entry = TTEntry::new();
        let mv = Move::from_u16(0x0042);
        entry.save(0x1234, Value::new(7), true, Bound::Lower, 9, mv, Value::new(3), 0);

        entry.refresh(GENERATION_DELTA * 3);

        assert_eq!(entry.generation(), GENERATION_DELTA * 3);
        let data = entry.read();
        assert_eq!(data.bound, Bound::Lower);
        assert!(data.is_pv);
        assert_eq!(data.mv, mv);
        assert_eq!(data.value.raw(), 7);
        assert_eq!(data.eval.raw(), 3);
        assert_eq!(data.depth, 9);
    }

    #[test]
    fn test_tt_entry_relative_age() {
        let entry = TTEntry::new();
        entry.save(1, Value::ZERO, false, Bound::Lower, 10, Move::NONE, Value::ZERO, 8);

        // 同じ世代では0
        assert_eq!(entry.relative_age(8), 0);

        // 世代が進むと8刻みでageが増える（GENERATION_DELTA = 8）
        assert_eq!(entry.relative_age(16), 8);
        assert_eq!(entry.relative_age(16 + 3 * 8), 32);
    }

    #[test]
    fn test_tt_entry_relative_age_wraps() {
        let entry = TTEntry::new();
        entry.save(1, Value::ZERO, false, Bound::Lower, 10, Move::NONE, Value::ZERO, 0xF8);

        // 世代カウンタが256でwrapしてもageは連続する
        assert_eq!(entry.relative_age(0xF8), 0);
        assert_eq!(entry.relative_age(0x00), 8);
        assert_eq!(entry.relative_age(0x08), 16);
    }

    #[test]
    fn test_tt_entry_replace_score() {
        let gen8 = 8u8;
        let deep = TTEntry::new();
        deep.save(1, Value::ZERO, false, Bound::Lower, 20, Move::NONE, Value::ZERO, gen8);
        let shallow = TTEntry::new();
        shallow.save(2, Value::ZERO, false, Bound::Lower, 2, Move::NONE, Value::ZERO, gen8);

        assert!(deep.replace_score(gen8) > shallow.replace_score(gen8));

        // 3世代進むと age 24 が深さの差を逆転しうる
        let later = gen8.wrapping_add(24);
        let fresh = TTEntry::new();
        fresh.save(3, Value::ZERO, false, Bound::Lower, 1, Move::NONE, Value::ZERO, later);
        assert!(fresh.replace_score(later) > deep.replace_score(later));
    }

    #[test]
    fn test_tt_data_empty() {
        let data = TTData::EMPTY;
        assert_eq!(data.mv, Move::NONE);
        assert_eq!(data.bound, Bound::None);
        assert!(!data.is_pv);
    }
}
