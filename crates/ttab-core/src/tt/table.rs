//! TranspositionTable本体
//!
//! - Cluster: エントリのグループ
//! - TranspositionTable: テーブル本体
//! - probe/save操作
//! - resize / 並列clear / 世代管理 / hashfull

use super::alloc::{AllocKind, Allocation};
use super::entry::{TTData, TTEntry};
use super::{CLUSTER_SIZE, GENERATION_DELTA, numa};
use crate::types::{Bound, Move, Value};
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, Ordering};

/// クラスター構造
/// 同じハッシュインデックスに対して複数のエントリを持つ
/// 10bytes × 3 + 2パディング = 32バイト（キャッシュライン64バイトを割り切る）
#[repr(C, align(32))]
pub struct Cluster {
    entries: [TTEntry; CLUSTER_SIZE],
    _padding: [u8; 2],
}

impl Cluster {
    /// 新しいクラスターを作成
    const fn new() -> Self {
        Self {
            entries: [const { TTEntry::new() }; CLUSTER_SIZE],
            _padding: [0; 2],
        }
    }

    /// クラスター内のエントリ
    ///
    /// パディングはエントリとして解釈されない。
    #[inline]
    pub fn entries(&self) -> &[TTEntry; CLUSTER_SIZE] {
        &self.entries
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}

// クラスターは32バイトであることを保証（キャッシュラインを等分する）
const _: () = assert!(std::mem::size_of::<Cluster>() == 32);

// Lazy SMPの探索workerへ共有参照で渡せることを保証
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn check() {
        assert_send_sync::<TranspositionTable>();
    }
    let _ = check;
};

struct ClusterTable {
    alloc: Allocation,
    len: usize,
}

impl ClusterTable {
    /// 未初期化の領域を確保する。呼び出し側が直後にゼロクリアすること。
    ///
    /// first-touch で物理ページ配置が決まるため、ここでは領域に触れない。
    /// ゼロクリアまではスライス（Deref）を構築してはならず、
    /// [`Self::raw_parts`] の生ポインタ経由でのみ書き込める。
    fn new(len: usize) -> Self {
        let bytes = len * std::mem::size_of::<Cluster>();
        let alloc = Allocation::allocate(bytes, std::mem::align_of::<Cluster>());
        Self { alloc, len }
    }

    /// バッキング領域の生ポインタと長さ（クラスター単位）
    ///
    /// clear が未初期化領域をゼロで埋めるために使う。
    fn raw_parts(&mut self) -> (*mut Cluster, usize) {
        (self.alloc.ptr().as_ptr() as *mut Cluster, self.len)
    }

    fn uses_large_pages(&self) -> bool {
        self.alloc.kind() == AllocKind::LargePages
    }
}

impl Default for ClusterTable {
    fn default() -> Self {
        Self {
            alloc: Allocation::dangling(),
            len: 0,
        }
    }
}

impl Deref for ClusterTable {
    type Target = [Cluster];

    // SAFETY: clear がゼロクリアした後にのみ呼ばれる（構築パスはすべて
    // clear を経由する）
    fn deref(&self) -> &Self::Target {
        unsafe { std::slice::from_raw_parts(self.alloc.ptr().as_ptr() as *const Cluster, self.len) }
    }
}

/// 64bitキーのクラスター内署名（上位16bit）
#[inline]
const fn key_signature(key: u64) -> u16 {
    (key >> 48) as u16
}

/// save の犠牲スロット選択（3段階）
///
/// 1. キー署名が一致するスロット
/// 2. 走査順で最初の空スロット
/// 3. 置換価値が最小のスロット。先頭エントリを初期値とし、厳密に小さい
///    ときだけ更新するため、同点では先に走査したスロットが残る
fn select_victim(entries: &[TTEntry; CLUSTER_SIZE], key16: u16, generation8: u8) -> &TTEntry {
    for entry in entries {
        if entry.key16() == key16 && !entry.is_empty() {
            return entry;
        }
    }

    for entry in entries {
        if entry.is_empty() {
            return entry;
        }
    }

    let mut replace = &entries[0];
    for entry in &entries[1..] {
        if entry.replace_score(generation8) < replace.replace_score(generation8) {
            replace = entry;
        }
    }
    replace
}

/// 置換表
///
/// probe / save は `&self` で並行に呼べる。resize / clear は `&mut self` を
/// 取るため、呼び出し時点で全workerの静止が保証される。
pub struct TranspositionTable {
    /// クラスターの配列
    table: ClusterTable,
    /// クラスター数
    cluster_count: usize,
    /// 世代カウンター（下位3bitは使用しない）
    generation8: AtomicU8,
}

impl TranspositionTable {
    /// 新しい置換表を作成（サイズはMB単位）
    ///
    /// ゼロクリアは逐次。大きいテーブルは [`Self::resize`] /
    /// [`Self::clear`] にスレッド数を渡して構築し直すこと。
    pub fn new(mb_size: usize) -> Self {
        let cluster_count = Self::mb_to_cluster_count(mb_size);
        let mut tt = Self {
            table: ClusterTable::new(cluster_count),
            cluster_count,
            generation8: AtomicU8::new(0),
        };
        tt.clear(1);
        tt
    }

    /// クラスター数を直接指定して作成（テスト・ベンチ用）
    ///
    /// インデックス関数は任意のクラスター数で動作する。
    pub fn with_cluster_count(cluster_count: usize) -> Self {
        let cluster_count = cluster_count.max(1);
        let mut tt = Self {
            table: ClusterTable::new(cluster_count),
            cluster_count,
            generation8: AtomicU8::new(0),
        };
        tt.clear(1);
        tt
    }

    /// サイズを変更
    ///
    /// 事前条件: probe / save 実行中のworkerがいないこと（`&mut self` が強制）。
    /// クラスター数が変わる場合は旧領域を先に解放してから確保し直し、
    /// いずれの場合も最後に `threads` 並列でクリアする。
    pub fn resize(&mut self, mb_size: usize, threads: usize) {
        let new_count = Self::mb_to_cluster_count(mb_size);

        if new_count != self.cluster_count {
            // 旧領域の解放を新領域の確保より先に行う
            self.table = ClusterTable::default();
            self.table = ClusterTable::new(new_count);
            self.cluster_count = new_count;
            log::debug!(
                "TT resize: {mb_size} MiB / {new_count} clusters / large_pages={}",
                self.table.uses_large_pages()
            );
        }

        self.clear(threads);
    }

    /// クリア
    ///
    /// クラスター配列を `threads` 個の連続バイトレンジに分割し（端数は
    /// 最終レンジが引き受ける）、scoped threadでゼロクリアする。
    /// first-touch ポリシーの下では、この書き込みが各レンジの物理ページ
    /// 配置を決める。`threads > 8` の場合、各タスクは書き込み前に
    /// タスク番号由来のCPUへ自分を束縛する。
    pub fn clear(&mut self, threads: usize) {
        self.generation8.store(0, Ordering::Relaxed);

        // 確保直後の未初期化領域もここで初期化するため、スライスを
        // 経由せず生ポインタへ書く
        let (ptr, len) = self.table.raw_parts();
        let threads = threads.max(1);

        // 小さいテーブルやスレッド数1では逐次クリアで十分
        if threads == 1 || len < threads * 1024 {
            unsafe {
                std::ptr::write_bytes(ptr, 0, len);
            }
            return;
        }

        let chunk = len / threads;

        std::thread::scope(|scope| {
            for i in 0..threads {
                let start = i * chunk;
                let end = if i == threads - 1 { len } else { start + chunk };
                let count = end - start;
                let ptr_addr = unsafe { ptr.add(start) } as usize;

                scope.spawn(move || {
                    if threads > 8 {
                        numa::bind_this_thread(i);
                    }
                    unsafe {
                        let ptr = ptr_addr as *mut Cluster;
                        std::ptr::write_bytes(ptr, 0, count);
                    }
                });
            }
        });
    }

    /// 新しい探索を開始（世代を進める）
    ///
    /// 既存エントリは消さず、置換価値の上でだけ古くなっていく。
    pub fn new_search(&self) {
        self.generation8.fetch_add(GENERATION_DELTA, Ordering::Relaxed);
    }

    /// 現在の世代を取得
    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation8.load(Ordering::Relaxed)
    }

    /// 置換表を検索
    ///
    /// クラスター内を走査順に調べ、署名が一致したエントリの世代を現在の
    /// 世代へ書き戻して（pv / boundは保持）内容を返す。書き戻しは
    /// relaxedな1バイトstoreで、並行書き込みに敗れても古い世代に
    /// 戻るだけで無害。
    pub fn probe(&self, key: u64) -> ProbeResult {
        let key16 = key_signature(key);
        let cluster = self.first_entry(key);
        let generation8 = self.generation();

        for entry in cluster.entries() {
            if entry.key16() == key16 && !entry.is_empty() {
                entry.refresh(generation8);
                return ProbeResult {
                    found: true,
                    data: entry.read(),
                };
            }
        }

        ProbeResult {
            found: false,
            data: TTData::EMPTY,
        }
    }

    /// 置換表に保存
    ///
    /// 対象クラスターを再走査して犠牲スロットを選び（[`select_victim`]）、
    /// 無条件に書き込む。書き込みはフィールドごとのrelaxed storeで、
    /// ロックもCASも使わない。同一クラスターへの並行書き込みは衝突
    /// しうるが、読み手の `key16` 一致検査が破れたエントリを弾く。
    ///
    /// `value` / `eval` は呼び出し側の値ドメインのまま保存される
    /// （詰み距離の調整は呼び出し側の責務）。
    #[allow(clippy::too_many_arguments)]
    pub fn save(
        &self,
        key: u64,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: i32,
        mv: Move,
        eval: Value,
    ) {
        let key16 = key_signature(key);
        let cluster = self.first_entry(key);
        let generation8 = self.generation();

        let victim = select_victim(cluster.entries(), key16, generation8);
        victim.save(key16, value, is_pv, bound, depth, mv, eval, generation8);
    }

    /// 置換表の使用率を1000分率で返す
    ///
    /// 先頭の最大1000クラスターをサンプルし、現在の世代かつ有効な境界を
    /// 持つエントリを数える近似値。
    pub fn hashfull(&self) -> u16 {
        let generation8 = self.generation();
        let sample_count = 1000.min(self.cluster_count);
        let mut count = 0usize;

        for cluster in self.table.iter().take(sample_count) {
            for entry in cluster.entries() {
                if entry.generation() == generation8 && entry.is_occupied() {
                    count += 1;
                }
            }
        }

        (count / CLUSTER_SIZE) as u16
    }

    /// キーに対応するクラスターの参照を取得
    ///
    /// probeを経ずに近傍エントリを調べたい呼び出し側のために公開している。
    #[inline]
    pub fn first_entry(&self, key: u64) -> &Cluster {
        let index = self.cluster_index(key);
        &self.table[index]
    }

    /// 指定キーのクラスターをプリフェッチ
    #[inline]
    pub fn prefetch(&self, key: u64) {
        let cluster = self.first_entry(key);

        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::{_MM_HINT_T0, _mm_prefetch};
            _mm_prefetch::<_MM_HINT_T0>(cluster as *const Cluster as *const i8);
        }

        #[cfg(not(target_arch = "x86_64"))]
        let _ = cluster; // 何もしない
    }

    /// Large Pagesを使って確保されたかを返す
    pub fn uses_large_pages(&self) -> bool {
        self.table.uses_large_pages()
    }

    /// クラスターインデックスを計算
    ///
    /// key × cluster_count の128bit積の上位64bit（fastrange）。除算なしで
    /// 任意のクラスター数に一様に写像する。マスクによる近道は
    /// 非2冪のクラスター数で偏るため使わない。
    #[inline]
    fn cluster_index(&self, key: u64) -> usize {
        ((key as u128 * self.cluster_count as u128) >> 64) as usize
    }

    /// MBサイズからクラスター数を計算
    #[inline]
    fn mb_to_cluster_count(mb_size: usize) -> usize {
        (mb_size * 1024 * 1024 / std::mem::size_of::<Cluster>()).max(1)
    }
}

/// probe結果
///
/// `data` はヒット時点のエントリ内容のスナップショット。並行書き込みで
/// 破れた値を含みうるが、署名不一致のエントリは返らない。
pub struct ProbeResult {
    /// ヒットしたか
    pub found: bool,
    /// 読み取ったデータ
    pub data: TTData,
}
