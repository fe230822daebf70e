//! 分類エラー

use thiserror::Error;

/// 戻り値ロケーションを決められなかった理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// 参照が壊れている・循環している
    #[error("return type could not be resolved from debug information")]
    Unresolvable,
    /// 形式は正しいが未対応の型
    #[error("return type is not supported by this classifier")]
    Unsupported,
}
