//! retloc 64-bit PowerPC 戻り値ロケーション
//!
//! 関数の型DIEから、呼び出し後に戻り値がどこにあるか
//! （r3、f1〜f4、または r3 が指す呼び出し側のメモリ）を判定します。
//! ターゲットのコードは実行せず、戻り値型の分類だけで決定します。

pub mod registers;
pub mod descriptors;
pub mod classify;
pub mod error;

pub use classify::{classify, ClassifierConfig, Outcome, ReturnValueClassifier};
pub use descriptors::{
    AGGREGATE, FLOAT_REGISTER, FLOAT_REGISTER_PAIR, FLOAT_REGISTER_QUAD, INT_REGISTER,
};
pub use error::ClassifyError;
pub use registers::{describe, register_name};
