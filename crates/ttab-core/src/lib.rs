//! 置換表（Transposition Table）ライブラリ
//!
//! ゲーム木探索の結果を64bit局面キーでメモ化する、固定容量・lock-freeの
//! キャッシュを提供する。探索側（movegen / search / 前段プロトコル）は
//! 本crateの対象外で、[`tt::TranspositionTable`] のインターフェースだけを
//! 通して置換表を参照する。
//!
//! - `types`: 置換表がエンジンと交換する値ドメイン（評価値・境界・指し手・深さ）
//! - `tt`: エントリcodec、クラスター配列、probe/save、一括ライフサイクル操作
//!
//! 置換表はグローバルsingletonではなく、エンジンのコントローラーが値として
//! 所有し、探索workerへは共有参照で渡す。resize / clear は `&mut self` を
//! 取るため、全workerの静止が型レベルで強制される。

pub mod tt;
pub mod types;

pub use tt::{CLUSTER_SIZE, Cluster, ProbeResult, TTData, TTEntry, TranspositionTable};
pub use types::{Bound, Move, Value};
