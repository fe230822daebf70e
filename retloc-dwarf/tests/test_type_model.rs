//! gimli 型モデルと関数検索のテスト
//!
//! gimli::write でメモリ上にDWARFを生成し、読み戻して確認する。

use gimli::write::{
    Address, AttributeValue, DwarfUnit, EndianVec, Range, RangeList, Sections, UnitEntryId,
};
use gimli::{EndianSlice, LittleEndian, SectionId};
use retloc_dwarf::{DieRef, DwarfTypeModel, Encoding, FunctionFinder, Tag, TypeModel};
use std::collections::HashMap;

/// 生成したDWARFセクション
struct Fixture {
    sections: HashMap<SectionId, Vec<u8>>,
}

impl Fixture {
    fn build(f: impl FnOnce(&mut DwarfUnit)) -> Self {
        let encoding = gimli::Encoding {
            format: gimli::Format::Dwarf32,
            version: 4,
            address_size: 8,
        };
        let mut dwarf = DwarfUnit::new(encoding);
        f(&mut dwarf);

        let mut sections = Sections::new(EndianVec::new(LittleEndian));
        dwarf.write(&mut sections).expect("Failed to write DWARF");

        let mut data = HashMap::new();
        sections
            .for_each(|id, section| -> gimli::write::Result<()> {
                data.insert(id, section.slice().to_vec());
                Ok(())
            })
            .expect("Failed to collect sections");
        Self { sections: data }
    }

    fn dwarf(&self) -> gimli::Dwarf<EndianSlice<'_, LittleEndian>> {
        gimli::Dwarf::load(|id| -> Result<_, gimli::Error> {
            let data = self.sections.get(&id).map(|v| v.as_slice()).unwrap_or(&[]);
            Ok(EndianSlice::new(data, LittleEndian))
        })
        .expect("Failed to load DWARF")
    }
}

fn add(dwarf: &mut DwarfUnit, tag: gimli::DwTag, name: &str) -> UnitEntryId {
    let root = dwarf.unit.root();
    let id = dwarf.unit.add(root, tag);
    dwarf
        .unit
        .get_mut(id)
        .set(gimli::DW_AT_name, AttributeValue::String(name.as_bytes().to_vec()));
    id
}

fn set(dwarf: &mut DwarfUnit, id: UnitEntryId, attr: gimli::DwAt, value: AttributeValue) {
    dwarf.unit.get_mut(id).set(attr, value);
}

/// 名前で DIE を探す
fn find<R: gimli::Reader>(
    dwarf: &gimli::Dwarf<R>,
    unit: &gimli::Unit<R>,
    name: &str,
) -> gimli::UnitOffset<R::Offset> {
    let mut entries = unit.entries();
    while let Some((_, entry)) = entries.next_dfs().unwrap() {
        if let Some(value) = entry.attr_value(gimli::DW_AT_name).unwrap() {
            let s = dwarf.attr_string(unit, value).unwrap();
            if s.to_string_lossy().unwrap() == name {
                return entry.offset();
            }
        }
    }
    panic!("DIE {} not found", name);
}

fn sample() -> Fixture {
    Fixture::build(|dwarf| {
        let double = add(dwarf, gimli::DW_TAG_base_type, "double");
        set(dwarf, double, gimli::DW_AT_byte_size, AttributeValue::Udata(8));
        set(
            dwarf,
            double,
            gimli::DW_AT_encoding,
            AttributeValue::Encoding(gimli::DW_ATE_float),
        );

        let cdouble = add(dwarf, gimli::DW_TAG_const_type, "const_double");
        set(dwarf, cdouble, gimli::DW_AT_type, AttributeValue::UnitRef(double));

        let real = add(dwarf, gimli::DW_TAG_typedef, "real_t");
        set(dwarf, real, gimli::DW_AT_type, AttributeValue::UnitRef(cdouble));

        let ptr = add(dwarf, gimli::DW_TAG_pointer_type, "ptr");
        set(dwarf, ptr, gimli::DW_AT_type, AttributeValue::UnitRef(double));

        let decl = add(dwarf, gimli::DW_TAG_subprogram, "compute");
        set(dwarf, decl, gimli::DW_AT_declaration, AttributeValue::Flag(true));
        set(dwarf, decl, gimli::DW_AT_type, AttributeValue::UnitRef(real));

        let root = dwarf.unit.root();
        let concrete = dwarf.unit.add(root, gimli::DW_TAG_subprogram);
        set(dwarf, concrete, gimli::DW_AT_specification, AttributeValue::UnitRef(decl));
        set(
            dwarf,
            concrete,
            gimli::DW_AT_low_pc,
            AttributeValue::Address(gimli::write::Address::Constant(0x1000)),
        );
        set(dwarf, concrete, gimli::DW_AT_high_pc, AttributeValue::Udata(0x40));

        add(dwarf, gimli::DW_TAG_subprogram, "do_nothing");
    })
}

#[test]
fn test_tags_and_attributes() {
    let fixture = sample();
    let dwarf = fixture.dwarf();
    let header = dwarf.units().next().unwrap().expect("no unit");
    let unit = dwarf.unit(header).unwrap();
    let model = DwarfTypeModel::new(&unit);

    let double = model.die(find(&dwarf, &unit, "double"));
    assert_eq!(model.tag_of(double), Tag::Base);
    assert_eq!(model.attribute_byte_size(double), Some(8));
    assert_eq!(model.attribute_encoding(double), Some(Encoding::Float));
    assert_eq!(model.follow_type_link(double), None);

    let real = model.die(find(&dwarf, &unit, "real_t"));
    assert_eq!(model.tag_of(real), Tag::Qualifier);
    let cdouble = model.follow_type_link(real).expect("typedef target");
    assert_eq!(model.tag_of(cdouble), Tag::Qualifier);
    assert_eq!(model.follow_type_link(cdouble), Some(double));

    let ptr = model.die(find(&dwarf, &unit, "ptr"));
    assert_eq!(model.tag_of(ptr), Tag::Pointer);
    assert_eq!(model.attribute_byte_size(ptr), None);
}

#[test]
fn test_dangling_reference_is_unresolvable() {
    let fixture = sample();
    let dwarf = fixture.dwarf();
    let header = dwarf.units().next().unwrap().expect("no unit");
    let unit = dwarf.unit(header).unwrap();
    let model = DwarfTypeModel::new(&unit);

    assert_eq!(model.tag_of(DieRef::Dangling), Tag::Unresolvable);
    assert_eq!(model.attribute_byte_size(DieRef::Dangling), None);
    assert_eq!(
        model.follow_type_link(DieRef::Dangling),
        Some(DieRef::Dangling)
    );
}

#[test]
fn test_unreadable_function_is_not_void() {
    let fixture = sample();
    let dwarf = fixture.dwarf();
    let header = dwarf.units().next().unwrap().expect("no unit");
    let unit = dwarf.unit(header).unwrap();
    let model = DwarfTypeModel::new(&unit);

    // ユニット外のオフセットは読めないので壊れた参照として返る
    let garbage = DieRef::Entry(gimli::UnitOffset(0xfff0));
    assert_eq!(model.follow_type_link(garbage), Some(DieRef::Dangling));
    assert_eq!(model.tag_of(garbage), Tag::Unresolvable);

    // 読める DIE で DW_AT_type が無い場合だけ None
    let double = model.die(find(&dwarf, &unit, "double"));
    assert_eq!(model.follow_type_link(double), None);
}

#[test]
fn test_concrete_function_uses_declaration_type() {
    let fixture = sample();
    let dwarf = fixture.dwarf();
    let header = dwarf.units().next().unwrap().expect("no unit");
    let unit = dwarf.unit(header).unwrap();
    let model = DwarfTypeModel::new(&unit);

    let offset = FunctionFinder::find_at_pc(&dwarf, &unit, 0x1010)
        .unwrap()
        .expect("function at pc");
    let real = find(&dwarf, &unit, "real_t");
    assert_eq!(
        model.follow_type_link(model.die(offset)),
        Some(DieRef::Entry(real))
    );

    assert_eq!(FunctionFinder::find_at_pc(&dwarf, &unit, 0x1040).unwrap(), None);
}

#[test]
fn test_function_listing_skips_declarations() {
    let fixture = sample();
    let dwarf = fixture.dwarf();
    let header = dwarf.units().next().unwrap().expect("no unit");
    let unit = dwarf.unit(header).unwrap();

    let functions = FunctionFinder::functions(&dwarf, &unit).unwrap();
    // 宣言の compute は除外、具象インスタンスは宣言の名前を引き継ぐ
    assert_eq!(functions.len(), 2);
    assert!(functions.iter().any(|f| f.name.as_deref() == Some("compute")));

    let compute: Vec<_> = functions.iter().filter(|f| f.matches("compute")).collect();
    assert_eq!(compute.len(), 1);

    let found: Vec<_> = functions.iter().filter(|f| f.matches("do_nothing")).collect();
    assert_eq!(found.len(), 1);
    let model = DwarfTypeModel::new(&unit);
    assert_eq!(model.follow_type_link(model.die(found[0].offset)), None);
}

#[test]
fn test_overflowing_high_pc_is_ignored() {
    let fixture = Fixture::build(|dwarf| {
        let f = add(dwarf, gimli::DW_TAG_subprogram, "wraps_around");
        set(
            dwarf,
            f,
            gimli::DW_AT_low_pc,
            AttributeValue::Address(gimli::write::Address::Constant(u64::MAX - 4)),
        );
        set(dwarf, f, gimli::DW_AT_high_pc, AttributeValue::Udata(0x10));
    });
    let dwarf = fixture.dwarf();
    let header = dwarf.units().next().unwrap().expect("no unit");
    let unit = dwarf.unit(header).unwrap();

    assert_eq!(FunctionFinder::find_at_pc(&dwarf, &unit, 0).unwrap(), None);
    assert_eq!(
        FunctionFinder::find_at_pc(&dwarf, &unit, u64::MAX - 2).unwrap(),
        None
    );
}

#[test]
fn test_split_function_found_through_ranges() {
    let fixture = Fixture::build(|dwarf| {
        let ranges = dwarf.unit.ranges.add(RangeList(vec![
            Range::StartEnd {
                begin: Address::Constant(0x2000),
                end: Address::Constant(0x2100),
            },
            Range::StartEnd {
                begin: Address::Constant(0x9000),
                end: Address::Constant(0x9040),
            },
        ]));
        let f = add(dwarf, gimli::DW_TAG_subprogram, "hot_and_cold");
        set(dwarf, f, gimli::DW_AT_ranges, AttributeValue::RangeListRef(ranges));
    });
    let dwarf = fixture.dwarf();
    let header = dwarf.units().next().unwrap().expect("no unit");
    let unit = dwarf.unit(header).unwrap();
    let expected = find(&dwarf, &unit, "hot_and_cold");

    assert_eq!(
        FunctionFinder::find_at_pc(&dwarf, &unit, 0x2010).unwrap(),
        Some(expected)
    );
    // コールド部分
    assert_eq!(
        FunctionFinder::find_at_pc(&dwarf, &unit, 0x9020).unwrap(),
        Some(expected)
    );
    assert_eq!(FunctionFinder::find_at_pc(&dwarf, &unit, 0x5000).unwrap(), None);
}
