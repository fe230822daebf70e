//! 戻り値型の分類
//!
//! 関数の戻り値型を typedef・修飾子を剥がしながら辿り、
//! 型のカテゴリとサイズから戻り値ロケーションを1つ選ぶ。

use crate::descriptors::{
    AGGREGATE, FLOAT_REGISTER, FLOAT_REGISTER_PAIR, FLOAT_REGISTER_QUAD, INT_REGISTER,
};
use crate::error::ClassifyError;
use retloc_dwarf::{LocationDescriptor, Tag, TypeModel};
use tracing::{debug, trace, warn};

/// ポインタのサイズ（DW_AT_byte_size が無い場合）
pub const POINTER_SIZE: u64 = 8;

/// 汎用レジスタ1本に収まる最大サイズ
const MAX_INTEGER_SIZE: u64 = 8;

/// 分類結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 戻り値なし（void 関数）
    NoValue,
    /// 戻り値のロケーション
    Location(&'static LocationDescriptor),
    /// デバッグ情報の参照を辿れなかった
    Unresolvable,
    /// 形式は正しいが分類できない型
    Unsupported,
}

impl Outcome {
    /// Result に変換する（戻り値なしは Ok(None)）
    pub fn into_result(self) -> Result<Option<&'static LocationDescriptor>, ClassifyError> {
        match self {
            Outcome::NoValue => Ok(None),
            Outcome::Location(descriptor) => Ok(Some(descriptor)),
            Outcome::Unresolvable => Err(ClassifyError::Unresolvable),
            Outcome::Unsupported => Err(ClassifyError::Unsupported),
        }
    }

    /// ロケーションを取得する
    pub fn location(self) -> Option<&'static LocationDescriptor> {
        match self {
            Outcome::Location(descriptor) => Some(descriptor),
            _ => None,
        }
    }
}

/// 分類器の設定
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// typedef・修飾子・部分範囲を辿る最大段数
    pub max_type_depth: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self { max_type_depth: 64 }
    }
}

/// 戻り値分類器
///
/// 状態を持たないため、複数スレッドから同時に使ってよい。
#[derive(Debug, Clone, Default)]
pub struct ReturnValueClassifier {
    config: ClassifierConfig,
}

/// デフォルト設定で分類する
pub fn classify<M: TypeModel>(model: &M, function: M::TypeRef) -> Outcome {
    ReturnValueClassifier::default().classify(model, function)
}

impl ReturnValueClassifier {
    /// 新しい分類器を作成する
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// 関数型の戻り値ロケーションを求める
    ///
    /// # Arguments
    /// * `model` - 型グラフ
    /// * `function` - 関数（サブプログラム・関数型）への参照
    pub fn classify<M: TypeModel>(&self, model: &M, function: M::TypeRef) -> Outcome {
        let Some(return_type) = model.follow_type_link(function) else {
            trace!("{:?} has no return type", function);
            return Outcome::NoValue;
        };

        let Some((ty, tag)) = self.strip_wrappers(model, return_type) else {
            return Outcome::Unresolvable;
        };
        trace!("Return type of {:?} resolved to {:?} ({:?})", function, ty, tag);

        match tag {
            Tag::Base | Tag::Enumeration | Tag::Pointer | Tag::PtrToMember | Tag::Subrange => {
                classify_scalar(model, ty, tag)
            }
            Tag::Structure | Tag::Class | Tag::Union => classify_aggregate(),
            Tag::Array | Tag::String => classify_array(model, ty, tag),
            Tag::Unresolvable => Outcome::Unresolvable,
            // strip_wrappers が返すことはない
            Tag::Qualifier => Outcome::Unresolvable,
            Tag::Other(raw) => {
                debug!("Unsupported return type tag 0x{:x} at {:?}", raw, ty);
                Outcome::Unsupported
            }
        }
    }

    /// 透過的なラッパーを剥がす
    ///
    /// サイズを持たない部分範囲は要素型の別名として同様に辿る。
    /// 参照が切れている・段数上限を超えた場合は None。
    fn strip_wrappers<M: TypeModel>(
        &self,
        model: &M,
        mut ty: M::TypeRef,
    ) -> Option<(M::TypeRef, Tag)> {
        for _ in 0..=self.config.max_type_depth {
            let tag = model.tag_of(ty);
            let sizeless_subrange =
                tag == Tag::Subrange && model.attribute_byte_size(ty).is_none();
            if !tag.is_transparent() && !sizeless_subrange {
                return Some((ty, tag));
            }

            ty = match model.follow_type_link(ty) {
                Some(next) => next,
                None => {
                    debug!("{:?} ({:?}) has no target type", ty, tag);
                    return None;
                }
            };
        }

        warn!(
            "Type chain exceeded {} levels, giving up at {:?}",
            self.config.max_type_depth, ty
        );
        None
    }
}

/// 汎用レジスタ1本に収まるか
fn is_small_integer_fit(size: u64) -> bool {
    size <= MAX_INTEGER_SIZE
}

/// 隠しポインタで返す
fn classify_aggregate() -> Outcome {
    Outcome::Location(&AGGREGATE)
}

/// 浮動小数点レジスタで返せるサイズならその記述子
fn float_location(size: u64) -> Option<&'static LocationDescriptor> {
    match size {
        0..=8 => Some(&FLOAT_REGISTER),
        9..=16 => Some(&FLOAT_REGISTER_PAIR),
        17..=32 => Some(&FLOAT_REGISTER_QUAD),
        _ => None,
    }
}

/// 基本型・列挙型・ポインタ・サイズ付き部分範囲
fn classify_scalar<M: TypeModel>(model: &M, ty: M::TypeRef, tag: Tag) -> Outcome {
    let size = match model.attribute_byte_size(ty) {
        Some(size) => size,
        None if matches!(tag, Tag::Pointer | Tag::PtrToMember) => POINTER_SIZE,
        None => {
            debug!("{:?} ({:?}) has no byte size", ty, tag);
            return Outcome::Unresolvable;
        }
    };

    if tag == Tag::Base {
        let Some(encoding) = model.attribute_encoding(ty) else {
            debug!("Base type {:?} has no encoding", ty);
            return Outcome::Unresolvable;
        };
        if encoding.is_float() {
            if let Some(location) = float_location(size) {
                return Outcome::Location(location);
            }
        }
    }

    if is_small_integer_fit(size) {
        Outcome::Location(&INT_REGISTER)
    } else {
        classify_aggregate()
    }
}

/// 配列・文字列型
///
/// 8バイト以下の文字配列だけが r3 の下位に詰めて返される。
fn classify_array<M: TypeModel>(model: &M, ty: M::TypeRef, tag: Tag) -> Outcome {
    match model.attribute_byte_size(ty) {
        Some(size) if is_small_integer_fit(size) => {}
        _ => return classify_aggregate(),
    }

    if tag == Tag::Array {
        let Some(element) = model.follow_type_link(ty) else {
            debug!("Array {:?} has no element type", ty);
            return Outcome::Unresolvable;
        };
        match model.tag_of(element) {
            Tag::Base => {}
            Tag::Unresolvable => return Outcome::Unresolvable,
            _ => return classify_aggregate(),
        }
        match model.attribute_byte_size(element) {
            Some(1) => {}
            Some(_) => return classify_aggregate(),
            None => {
                debug!("Array element {:?} has no byte size", element);
                return Outcome::Unresolvable;
            }
        }
    }

    Outcome::Location(&INT_REGISTER)
}
