//! PPC64 の DWARF レジスタ番号

use retloc_dwarf::{LocAtom, LocationDescriptor};

/// 整数の戻り値レジスタ r3
pub const RETURN_GPR: gimli::Register = gimli::Register(3);

/// 浮動小数点の戻り値レジスタの先頭 f1
pub const FIRST_RETURN_FPR: gimli::Register = gimli::Register(33);

/// 浮動小数点レジスタ f0 の DWARF 番号
const FPR_BASE: u16 = 32;

/// 戻り値に使う index 番目の浮動小数点レジスタ（0 が f1）
pub const fn return_fpr(index: u16) -> gimli::Register {
    gimli::Register(FIRST_RETURN_FPR.0 + index)
}

/// DWARFレジスタ番号を名前に変換する
pub fn register_name(register: gimli::Register) -> String {
    match register.0 {
        n @ 0..=31 => format!("r{}", n),
        n @ 32..=63 => format!("f{}", n - FPR_BASE),
        n => format!("dwarf{}", n),
    }
}

/// 記述子を短い形式で表示する（r3, f1:f2, [r3] など）
pub fn describe(descriptor: &LocationDescriptor) -> String {
    let mut parts = Vec::new();
    for atom in descriptor.atoms() {
        match *atom {
            LocAtom::Reg(register) => parts.push(register_name(register)),
            LocAtom::BReg { register, offset: 0 } => {
                parts.push(format!("[{}]", register_name(register)))
            }
            LocAtom::BReg { register, offset } => {
                parts.push(format!("[{}{:+}]", register_name(register), offset))
            }
            LocAtom::Piece { .. } => {}
        }
    }
    parts.join(":")
}
