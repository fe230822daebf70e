//! 戻り値ロケーションの定数
//!
//! すべて `'static` な不変値で、問い合わせごとに生成しない。

use crate::registers::{return_fpr, RETURN_GPR};
use retloc_dwarf::{LocAtom, LocationDescriptor};

/// r3
pub static INT_REGISTER: LocationDescriptor =
    LocationDescriptor::new(&[LocAtom::Reg(RETURN_GPR)]);

/// f1
pub static FLOAT_REGISTER: LocationDescriptor =
    LocationDescriptor::new(&[LocAtom::Reg(return_fpr(0))]);

/// f1:f2（8バイトずつ）
pub static FLOAT_REGISTER_PAIR: LocationDescriptor = LocationDescriptor::new(&[
    LocAtom::Reg(return_fpr(0)),
    LocAtom::Piece { size_in_bytes: 8 },
    LocAtom::Reg(return_fpr(1)),
    LocAtom::Piece { size_in_bytes: 8 },
]);

/// f1:f4（8バイトずつ）
pub static FLOAT_REGISTER_QUAD: LocationDescriptor = LocationDescriptor::new(&[
    LocAtom::Reg(return_fpr(0)),
    LocAtom::Piece { size_in_bytes: 8 },
    LocAtom::Reg(return_fpr(1)),
    LocAtom::Piece { size_in_bytes: 8 },
    LocAtom::Reg(return_fpr(2)),
    LocAtom::Piece { size_in_bytes: 8 },
    LocAtom::Reg(return_fpr(3)),
    LocAtom::Piece { size_in_bytes: 8 },
]);

/// 構造体等は呼び出し側が確保した領域に格納され、そのアドレスが r3 に返る
pub static AGGREGATE: LocationDescriptor = LocationDescriptor::new(&[LocAtom::BReg {
    register: RETURN_GPR,
    offset: 0,
}]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_bytes() {
        assert_eq!(INT_REGISTER.to_expression_bytes().unwrap(), vec![0x53]);
        assert_eq!(FLOAT_REGISTER.to_expression_bytes().unwrap(), vec![0x90, 33]);
        assert_eq!(AGGREGATE.to_expression_bytes().unwrap(), vec![0x73, 0x00]);
        assert_eq!(
            FLOAT_REGISTER_PAIR.to_expression_bytes().unwrap(),
            vec![0x90, 33, 0x93, 8, 0x90, 34, 0x93, 8]
        );
        assert_eq!(FLOAT_REGISTER_QUAD.to_expression_bytes().unwrap().len(), 16);
    }

    #[test]
    fn test_shapes() {
        assert_eq!(INT_REGISTER.len(), 1);
        assert_eq!(FLOAT_REGISTER.len(), 1);
        assert_eq!(FLOAT_REGISTER_PAIR.len(), 4);
        assert_eq!(FLOAT_REGISTER_QUAD.len(), 8);
        assert_eq!(FLOAT_REGISTER_QUAD.piece_count(), 4);
        assert!(AGGREGATE.is_indirect());
    }
}
