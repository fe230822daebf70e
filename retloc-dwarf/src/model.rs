//! 型グラフへのクエリインターフェース
//!
//! 分類器はデバッグ情報そのものを所有せず、型ノードへの参照を借用して
//! 必要な属性だけをその都度問い合わせます。

use std::fmt::Debug;

/// 型ノードのカテゴリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// 基本型（int, double など）
    Base,
    /// 表現を変えないラッパー（typedef, const, volatile, restrict 等）
    Qualifier,
    /// ポインタ型
    Pointer,
    /// メンバへのポインタ型
    PtrToMember,
    /// 列挙型
    Enumeration,
    /// 構造体型
    Structure,
    /// クラス型
    Class,
    /// Union型
    Union,
    /// 配列型
    Array,
    /// 文字列型（Fortran の CHARACTER 等）
    String,
    /// 部分範囲型
    Subrange,
    /// 参照が壊れていて辿れない
    Unresolvable,
    /// 正しい形式だが未対応のタグ（生のタグ値）
    Other(u16),
}

/// DW_TAG_mutable_type（DWARF 3 ドラフトにのみ存在）
const DW_TAG_MUTABLE_TYPE: gimli::DwTag = gimli::DwTag(0x3e);

impl Tag {
    /// DWARFタグから変換する
    pub fn from_dw_tag(tag: gimli::DwTag) -> Self {
        match tag {
            gimli::DW_TAG_base_type => Tag::Base,
            gimli::DW_TAG_typedef
            | gimli::DW_TAG_const_type
            | gimli::DW_TAG_volatile_type
            | gimli::DW_TAG_restrict_type
            | gimli::DW_TAG_atomic_type
            | DW_TAG_MUTABLE_TYPE => Tag::Qualifier,
            gimli::DW_TAG_pointer_type => Tag::Pointer,
            gimli::DW_TAG_ptr_to_member_type => Tag::PtrToMember,
            gimli::DW_TAG_enumeration_type => Tag::Enumeration,
            gimli::DW_TAG_structure_type => Tag::Structure,
            gimli::DW_TAG_class_type => Tag::Class,
            gimli::DW_TAG_union_type => Tag::Union,
            gimli::DW_TAG_array_type => Tag::Array,
            gimli::DW_TAG_string_type => Tag::String,
            gimli::DW_TAG_subrange_type => Tag::Subrange,
            other => Tag::Other(other.0),
        }
    }

    /// 透過的なラッパーかどうか
    pub fn is_transparent(self) -> bool {
        matches!(self, Tag::Qualifier)
    }
}

/// 基本型のエンコーディング
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Signed,
    Unsigned,
    Float,
    ComplexFloat,
    Boolean,
    /// その他（decimal float, UTF 以外の拡張等。生の値）
    Other(u8),
}

impl Encoding {
    /// DW_ATE_* から変換する
    pub fn from_dw_ate(ate: gimli::DwAte) -> Self {
        match ate {
            gimli::DW_ATE_signed | gimli::DW_ATE_signed_char => Encoding::Signed,
            gimli::DW_ATE_unsigned | gimli::DW_ATE_unsigned_char | gimli::DW_ATE_UTF => {
                Encoding::Unsigned
            }
            gimli::DW_ATE_float => Encoding::Float,
            gimli::DW_ATE_complex_float => Encoding::ComplexFloat,
            gimli::DW_ATE_boolean => Encoding::Boolean,
            other => Encoding::Other(other.0),
        }
    }

    /// 浮動小数点レジスタで返される種類か
    pub fn is_float(self) -> bool {
        matches!(self, Encoding::Float | Encoding::ComplexFloat)
    }
}

/// 型グラフへの読み取り専用クエリ
///
/// 実装はデバッグ情報の所有者側が提供します。すべての問い合わせは
/// `&self` 経由で行われ、分類器は参照を借用するだけで保持しません。
pub trait TypeModel {
    /// 型ノードへの不透明な参照
    type TypeRef: Copy + Debug;

    /// 型のカテゴリを取得する
    fn tag_of(&self, ty: Self::TypeRef) -> Tag;

    /// DW_AT_byte_size を取得する
    fn attribute_byte_size(&self, ty: Self::TypeRef) -> Option<u64>;

    /// DW_AT_encoding を取得する（基本型のみ意味を持つ）
    fn attribute_encoding(&self, ty: Self::TypeRef) -> Option<Encoding>;

    /// DW_AT_type が指す型を取得する
    ///
    /// 修飾子・typedef の参照先、配列・ポインタ・部分範囲の要素型、
    /// 関数の戻り値型のいずれにも使われます。
    fn follow_type_link(&self, ty: Self::TypeRef) -> Option<Self::TypeRef>;
}
