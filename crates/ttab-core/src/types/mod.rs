//! 置換表がエンジンと交換する値ドメイン
//!
//! - `Value`: 16bitに収まる評価値・探索値
//! - `Bound`: スコアの境界種別（exact / lower / upper / none）
//! - `Move`: 16bitにパックされた指し手（中身は不透明、0 = 指し手なし）
//! - `depth`: 探索深さのエンコード定数と変換

mod bound;
mod depth;
mod mv;
mod value;

pub use bound::Bound;
pub use depth::{
    DEPTH_ENTRY_MAX, DEPTH_ENTRY_OFFSET, DEPTH_NONE, DEPTH_QS, depth_to_stored, stored_to_depth,
};
pub use mv::Move;
pub use value::Value;
