//! gimli による型グラフの実装
//!
//! 1つのコンパイルユニット内の DIE をオフセットで参照し、
//! 属性はクエリのたびに読み出します。

use crate::model::{Encoding, Tag, TypeModel};
use gimli::Reader;
use tracing::debug;

/// DW_AT_abstract_origin / DW_AT_specification を辿る最大回数
const MAX_ORIGIN_HOPS: usize = 8;

/// ユニット内の DIE への参照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DieRef<O> {
    /// ユニット内オフセット
    Entry(gimli::UnitOffset<O>),
    /// ユニット内で解決できない参照（別ユニットへの参照や未対応の形式）
    Dangling,
}

/// gimli のユニットを型グラフとして公開する
pub struct DwarfTypeModel<'a, R: Reader> {
    unit: &'a gimli::Unit<R>,
}

impl<'a, R: Reader> DwarfTypeModel<'a, R> {
    /// ユニットを借用して型モデルを作成する
    pub fn new(unit: &'a gimli::Unit<R>) -> Self {
        Self { unit }
    }

    /// 関数DIEへの参照を作る
    pub fn die(&self, offset: gimli::UnitOffset<R::Offset>) -> DieRef<R::Offset> {
        DieRef::Entry(offset)
    }

    /// 属性値を読み出す
    fn attr(&self, die: DieRef<R::Offset>, name: gimli::DwAt) -> Option<gimli::AttributeValue<R>> {
        let DieRef::Entry(offset) = die else {
            return None;
        };
        let entry = match self.unit.entry(offset) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Failed to read DIE at {:?}: {}", offset, e);
                return None;
            }
        };
        match entry.attr_value(name) {
            Ok(value) => value,
            Err(e) => {
                debug!("Failed to read {} at {:?}: {}", name, offset, e);
                None
            }
        }
    }

    /// 参照属性をユニット内オフセットに変換する
    fn resolve_ref(&self, value: gimli::AttributeValue<R>) -> DieRef<R::Offset> {
        match value {
            gimli::AttributeValue::UnitRef(offset) => DieRef::Entry(offset),
            gimli::AttributeValue::DebugInfoRef(offset) => {
                match offset.to_unit_offset(&self.unit.header) {
                    Some(offset) => DieRef::Entry(offset),
                    None => {
                        debug!("Reference {:?} points outside of the unit", offset);
                        DieRef::Dangling
                    }
                }
            }
            other => {
                debug!("Unsupported reference form: {:?}", other);
                DieRef::Dangling
            }
        }
    }
}

impl<'a, R: Reader> TypeModel for DwarfTypeModel<'a, R> {
    type TypeRef = DieRef<R::Offset>;

    fn tag_of(&self, ty: Self::TypeRef) -> Tag {
        let DieRef::Entry(offset) = ty else {
            return Tag::Unresolvable;
        };
        match self.unit.entry(offset) {
            Ok(entry) => Tag::from_dw_tag(entry.tag()),
            Err(e) => {
                debug!("Failed to read type DIE at {:?}: {}", offset, e);
                Tag::Unresolvable
            }
        }
    }

    fn attribute_byte_size(&self, ty: Self::TypeRef) -> Option<u64> {
        self.attr(ty, gimli::DW_AT_byte_size)?.udata_value()
    }

    fn attribute_encoding(&self, ty: Self::TypeRef) -> Option<Encoding> {
        match self.attr(ty, gimli::DW_AT_encoding)? {
            gimli::AttributeValue::Encoding(ate) => Some(Encoding::from_dw_ate(ate)),
            other => other
                .udata_value()
                .and_then(|v| u8::try_from(v).ok())
                .map(|v| Encoding::from_dw_ate(gimli::DwAte(v))),
        }
    }

    fn follow_type_link(&self, ty: Self::TypeRef) -> Option<Self::TypeRef> {
        // 具象インスタンスは DW_AT_type を宣言側にしか持たないことがある
        let mut current = ty;
        for _ in 0..MAX_ORIGIN_HOPS {
            // 読めない DIE は「型なし」ではなく壊れた参照として返す
            let DieRef::Entry(offset) = current else {
                return Some(DieRef::Dangling);
            };
            let entry = match self.unit.entry(offset) {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Failed to read DIE at {:?}: {}", offset, e);
                    return Some(DieRef::Dangling);
                }
            };

            let attrs = (|| -> gimli::Result<_> {
                Ok((
                    entry.attr_value(gimli::DW_AT_type)?,
                    entry.attr_value(gimli::DW_AT_abstract_origin)?,
                    entry.attr_value(gimli::DW_AT_specification)?,
                ))
            })();
            let (type_attr, abstract_origin, specification) = match attrs {
                Ok(attrs) => attrs,
                Err(e) => {
                    debug!("Failed to read attributes at {:?}: {}", offset, e);
                    return Some(DieRef::Dangling);
                }
            };

            if let Some(value) = type_attr {
                return Some(self.resolve_ref(value));
            }
            current = self.resolve_ref(abstract_origin.or(specification)?);
        }
        debug!("Too many origin hops from {:?}", ty);
        Some(DieRef::Dangling)
    }
}
