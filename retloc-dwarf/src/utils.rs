//! DWARF解析のユーティリティ関数

use crate::Result;
use gimli::Reader;
use tracing::debug;

/// 関数DIEの情報
#[derive(Debug, Clone)]
pub struct FunctionEntry<O> {
    /// DW_AT_name
    pub name: Option<String>,
    /// デマングルされた DW_AT_linkage_name
    pub linkage_name: Option<String>,
    /// ユニット内オフセット
    pub offset: gimli::UnitOffset<O>,
}

impl<O> FunctionEntry<O> {
    /// 表示用の名前を取得（リンケージ名を優先）
    pub fn display_name(&self) -> &str {
        self.linkage_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("<anonymous>")
    }

    /// 名前が一致するか
    pub fn matches(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name) || self.linkage_name.as_deref() == Some(name)
    }

    /// 名前がパターンを含むか
    pub fn contains(&self, pattern: &str) -> bool {
        self.name.as_deref().is_some_and(|n| n.contains(pattern))
            || self.linkage_name.as_deref().is_some_and(|n| n.contains(pattern))
    }
}

/// 名前を宣言側から引き継ぐ最大段数
const MAX_ORIGIN_HOPS: usize = 8;

/// シンボル名をデマングルする
pub fn demangle_symbol(name: &str) -> String {
    if let Ok(demangled) = rustc_demangle::try_demangle(name) {
        return format!("{:#}", demangled);
    }

    // C++ のシンボルはそのまま
    name.to_string()
}

/// 関数DIE検索ユーティリティ
pub struct FunctionFinder;

impl FunctionFinder {
    /// ユニット内の関数DIEを列挙する（宣言のみのDIEは除く）
    pub fn functions<R: Reader>(
        dwarf: &gimli::Dwarf<R>,
        unit: &gimli::Unit<R>,
    ) -> Result<Vec<FunctionEntry<R::Offset>>> {
        let mut functions = Vec::new();
        let mut entries = unit.entries();

        while let Some((_, entry)) = entries.next_dfs()? {
            if entry.tag() != gimli::DW_TAG_subprogram {
                continue;
            }
            if let Some(gimli::AttributeValue::Flag(true)) =
                entry.attr_value(gimli::DW_AT_declaration)?
            {
                continue;
            }

            functions.push(FunctionEntry {
                name: Self::get_string(dwarf, unit, entry, gimli::DW_AT_name),
                linkage_name: Self::get_string(dwarf, unit, entry, gimli::DW_AT_linkage_name)
                    .map(|n| demangle_symbol(&n)),
                offset: entry.offset(),
            });
        }

        Ok(functions)
    }

    /// PCを含む関数DIEを検索
    ///
    /// # Arguments
    /// * `dwarf` - DWARFコンテキスト
    /// * `unit` - DWARFコンパイルユニット
    /// * `pc` - プログラムカウンタ
    ///
    /// # Returns
    /// 関数DIEのオフセット、見つからない場合はNone
    pub fn find_at_pc<R: Reader>(
        dwarf: &gimli::Dwarf<R>,
        unit: &gimli::Unit<R>,
        pc: u64,
    ) -> Result<Option<gimli::UnitOffset<R::Offset>>> {
        let mut entries = unit.entries();

        while let Some((_, entry)) = entries.next_dfs()? {
            if entry.tag() != gimli::DW_TAG_subprogram {
                continue;
            }
            let ranges = Self::get_function_ranges(dwarf, unit, entry)?;
            if ranges.iter().any(|&(start, end)| pc >= start && pc < end) {
                return Ok(Some(entry.offset()));
            }
        }
        Ok(None)
    }

    /// 関数のアドレス範囲を取得
    ///
    /// DW_AT_ranges（ホット/コールド分割された関数など）と
    /// DW_AT_low_pc / DW_AT_high_pc の両方に対応する。
    fn get_function_ranges<R: Reader>(
        dwarf: &gimli::Dwarf<R>,
        unit: &gimli::Unit<R>,
        entry: &gimli::DebuggingInformationEntry<R>,
    ) -> Result<Vec<(u64, u64)>> {
        let mut ranges = Vec::new();

        if let Some(value) = entry.attr_value(gimli::DW_AT_ranges)? {
            if let Some(offset) = dwarf.attr_ranges_offset(unit, value)? {
                let mut iter = dwarf.ranges(unit, offset)?;
                while let Some(range) = iter.next()? {
                    ranges.push((range.begin, range.end));
                }
            }
            return Ok(ranges);
        }

        let (low_pc, high_pc) = match (
            entry.attr_value(gimli::DW_AT_low_pc)?,
            entry.attr_value(gimli::DW_AT_high_pc)?,
        ) {
            (Some(l), Some(h)) => (l, h),
            _ => return Ok(ranges),
        };

        let Some(start_addr) = dwarf.attr_address(unit, low_pc)? else {
            return Ok(ranges);
        };

        // 壊れたDWARFでは high_pc のオフセットが溢れることがある
        let end_addr = match high_pc {
            gimli::AttributeValue::Udata(offset) => start_addr.checked_add(offset),
            other => match dwarf.attr_address(unit, other.clone())? {
                Some(addr) => Some(addr),
                None => other
                    .udata_value()
                    .and_then(|offset| start_addr.checked_add(offset)),
            },
        };

        match end_addr {
            Some(end_addr) => ranges.push((start_addr, end_addr)),
            None => debug!("Address range of {:?} overflows", entry.offset()),
        }
        Ok(ranges)
    }

    /// 文字列属性を取得する
    ///
    /// 具象インスタンスに無ければ DW_AT_specification / DW_AT_abstract_origin の先を見る。
    fn get_string<R: Reader>(
        dwarf: &gimli::Dwarf<R>,
        unit: &gimli::Unit<R>,
        entry: &gimli::DebuggingInformationEntry<R>,
        name: gimli::DwAt,
    ) -> Option<String> {
        let mut value = entry.attr_value(name).ok()?;
        let mut origin = Self::get_origin(entry);

        for _ in 0..MAX_ORIGIN_HOPS {
            if value.is_some() {
                break;
            }
            let origin_entry = unit.entry(origin?).ok()?;
            value = origin_entry.attr_value(name).ok()?;
            origin = Self::get_origin(&origin_entry);
        }

        let s = dwarf.attr_string(unit, value?).ok()?;
        s.to_string_lossy().ok().map(|s| s.into_owned())
    }

    /// 宣言・抽象インスタンスへの参照を取得する
    fn get_origin<R: Reader>(
        entry: &gimli::DebuggingInformationEntry<R>,
    ) -> Option<gimli::UnitOffset<R::Offset>> {
        [gimli::DW_AT_specification, gimli::DW_AT_abstract_origin]
            .into_iter()
            .find_map(|at| match entry.attr_value(at).ok()?? {
                gimli::AttributeValue::UnitRef(offset) => Some(offset),
                _ => None,
            })
    }
}
