//! 置換表モジュール
//!
//! 探索結果をキャッシュする置換表（Transposition Table）。
//!
//! - `TTEntry`: エントリ（10バイト、16bitキー）
//! - `Cluster`: エントリのグループ（32バイト、キャッシュライン共有）
//! - `TranspositionTable`: テーブル本体
//! - 世代管理
//! - 並列クリア（first-touch）
//! - prefetch
//!
//! # Stockfish系（CLUSTER_SIZE=3）準拠
//!
//! クラスターインデックスは64bitキーと cluster_count の128bit積の
//! 上位64bit（いわゆる fastrange）で決定し、クラスター内マッチングに
//! 上位16bitを使用する。10バイトエントリ × 3 + 2パディング =
//! 32バイト/クラスター。
//!
//! probe / save はロックもCASも使わない。エントリの各フィールドは
//! relaxed ordering のatomicセルとして独立に読み書きされ、エントリ全体の
//! 原子性はない。並行する書き込み同士は衝突しうるが、読み手は `key16` の
//! 一致検査で不一致エントリを無視するため、破れた書き込みは「たまに
//! 無視されるエントリ」としてのみ現れる。

mod alloc;
mod entry;
mod numa;
mod table;

pub use entry::{TTData, TTEntry, pack_gen_bound};
pub use table::{Cluster, ProbeResult, TranspositionTable};

/// クラスターサイズ（エントリ数）
/// 10bytes × 3 + 2padding = 32bytes
pub const CLUSTER_SIZE: usize = 3;

/// Generation関連の定数
pub const GENERATION_BITS: u32 = 3;
pub const GENERATION_DELTA: u8 = 1 << GENERATION_BITS; // 8
pub const GENERATION_CYCLE: u16 = 255 + GENERATION_DELTA as u16; // 263
pub const GENERATION_MASK: u16 = 0xF8; // (0xFF << GENERATION_BITS) as u8
