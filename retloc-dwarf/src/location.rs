//! ロケーション記述子
//!
//! 値がどこにあるかを DWARF のロケーション式と同じ語彙（アトム列）で表します。
//! 記述子は `'static` なアトム列を指すだけなので、定数として共有できます。

use crate::Result;
use std::fmt;

/// ロケーション式の1要素
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocAtom {
    /// 値はレジスタにある（DW_OP_regN / DW_OP_regx）
    Reg(gimli::Register),
    /// 値はレジスタ+オフセットが指すメモリにある（DW_OP_bregN / DW_OP_bregx）
    BReg {
        register: gimli::Register,
        offset: i64,
    },
    /// 直前までのロケーションが値の size_in_bytes バイト分を占める（DW_OP_piece）
    Piece { size_in_bytes: u64 },
}

impl LocAtom {
    /// このアトムのエンコード先オペコード
    pub fn op(&self) -> gimli::DwOp {
        match *self {
            LocAtom::Reg(register) if register.0 < 32 => {
                gimli::DwOp(gimli::DW_OP_reg0.0 + register.0 as u8)
            }
            LocAtom::Reg(_) => gimli::DW_OP_regx,
            LocAtom::BReg { register, .. } if register.0 < 32 => {
                gimli::DwOp(gimli::DW_OP_breg0.0 + register.0 as u8)
            }
            LocAtom::BReg { .. } => gimli::DW_OP_bregx,
            LocAtom::Piece { .. } => gimli::DW_OP_piece,
        }
    }

    /// DWARF 式のバイト列として追記する
    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(self.op().0);
        match *self {
            LocAtom::Reg(register) => {
                if register.0 >= 32 {
                    gimli::leb128::write::unsigned(out, u64::from(register.0))?;
                }
            }
            LocAtom::BReg { register, offset } => {
                if register.0 >= 32 {
                    gimli::leb128::write::unsigned(out, u64::from(register.0))?;
                }
                gimli::leb128::write::signed(out, offset)?;
            }
            LocAtom::Piece { size_in_bytes } => {
                gimli::leb128::write::unsigned(out, size_in_bytes)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for LocAtom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LocAtom::Reg(register) if register.0 >= 32 => {
                write!(f, "{} {}", self.op(), register.0)
            }
            LocAtom::Reg(_) => write!(f, "{}", self.op()),
            LocAtom::BReg { register, offset } if register.0 >= 32 => {
                write!(f, "{} {} {}", self.op(), register.0, offset)
            }
            LocAtom::BReg { offset, .. } => write!(f, "{} {}", self.op(), offset),
            LocAtom::Piece { size_in_bytes } => write!(f, "{} {}", self.op(), size_in_bytes),
        }
    }
}

/// 不変のロケーション記述子
#[derive(Debug, PartialEq, Eq)]
pub struct LocationDescriptor {
    atoms: &'static [LocAtom],
}

impl LocationDescriptor {
    /// アトム列から記述子を作る
    pub const fn new(atoms: &'static [LocAtom]) -> Self {
        Self { atoms }
    }

    pub fn atoms(&self) -> &'static [LocAtom] {
        self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// レジスタが指すメモリ経由で値を返すか（隠しポインタ規約）
    pub fn is_indirect(&self) -> bool {
        self.atoms.iter().any(|atom| matches!(atom, LocAtom::BReg { .. }))
    }

    /// DW_OP_piece の数
    pub fn piece_count(&self) -> usize {
        self.atoms
            .iter()
            .filter(|atom| matches!(atom, LocAtom::Piece { .. }))
            .count()
    }

    /// DWARF ロケーション式にエンコードする
    pub fn to_expression_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for atom in self.atoms {
            atom.encode(&mut bytes)?;
        }
        Ok(bytes)
    }
}

impl fmt::Display for LocationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", atom)?;
        }
        Ok(())
    }
}
