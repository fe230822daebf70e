//! retloc DWARF デバッグ情報解析
//!
//! このクレートは、ELFファイルとDWARFデバッグ情報の読み込み、
//! 型グラフへの読み取り専用クエリ、ロケーション記述子の表現と評価を提供します。
//! 戻り値の分類そのものはアーキテクチャごとのクレートが行います。

pub mod loader;
pub mod model;
pub mod gimli_model;
pub mod location;
pub mod loc_eval;
pub mod utils;

pub use loader::DwarfLoader;
pub use model::{Encoding, Tag, TypeModel};
pub use gimli_model::{DieRef, DwarfTypeModel};
pub use location::{LocAtom, LocationDescriptor};
pub use loc_eval::{Loc, LocPiece, LocPieceLocation, LocationEvaluator};
pub use utils::{FunctionEntry, FunctionFinder};

/// DWARF解析の結果型
pub type Result<T> = anyhow::Result<T>;
