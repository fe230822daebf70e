//! DWARF ロケーション式評価
//!
//! ロケーション記述子を DWARF 式にエンコードし、gimli の評価器で
//! 具体的なレジスタ・メモリ位置に変換します。

use crate::location::LocationDescriptor;
use crate::Result;
use gimli::{EndianSlice, Evaluation, EvaluationResult, Location, Piece, Reader, Value};

/// ロケーション評価の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loc {
    /// レジスタに格納されている
    Reg { reg: u16 },
    /// メモリアドレス
    Addr { addr: u64, size: usize },
    /// 複数のピースから構成される
    Pieces(Vec<LocPiece>),
    /// 値が存在しない
    Empty,
}

/// ロケーションのピース
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocPiece {
    /// サイズ（ビット）
    pub size_in_bits: u64,
    /// ビットオフセット
    pub bit_offset: Option<u64>,
    /// 実際のロケーション
    pub location: LocPieceLocation,
}

/// ピースのロケーション
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocPieceLocation {
    /// レジスタ
    Reg(u16),
    /// メモリアドレス
    Addr(u64),
}

/// ロケーション評価器
pub struct LocationEvaluator {
    encoding: gimli::Encoding,
}

impl LocationEvaluator {
    /// 新しいロケーション評価器を作成する
    ///
    /// # Arguments
    /// * `address_size` - ターゲットのアドレス幅（バイト）
    pub fn new(address_size: u8) -> Self {
        Self {
            encoding: gimli::Encoding {
                format: gimli::Format::Dwarf64,
                version: 4,
                address_size,
            },
        }
    }

    /// 記述子を評価する
    ///
    /// # Arguments
    /// * `descriptor` - 評価するロケーション記述子
    /// * `get_reg` - レジスタ値を取得するコールバック（DWARFレジスタ番号）
    pub fn evaluate<F>(&self, descriptor: &LocationDescriptor, mut get_reg: F) -> Result<Loc>
    where
        F: FnMut(u16) -> Result<u64>,
    {
        let bytes = descriptor.to_expression_bytes()?;
        let expr = gimli::Expression(EndianSlice::new(&bytes, gimli::LittleEndian));
        let mut eval: Evaluation<_> = expr.evaluation(self.encoding);

        let mut state = eval.evaluate()?;
        loop {
            match state {
                EvaluationResult::Complete => break,
                EvaluationResult::RequiresRegister { register, .. } => {
                    let value = get_reg(register.0)?;
                    state = eval.resume_with_register(Value::Generic(value))?;
                }
                other => {
                    return Err(anyhow::anyhow!("Unsupported evaluation result: {:?}", other));
                }
            }
        }

        let result = eval.result();
        match result.len() {
            0 => Ok(Loc::Empty),
            1 if result[0].size_in_bits.is_none() => Self::convert_piece(&result[0]),
            _ => {
                let pieces: Result<Vec<_>> =
                    result.iter().map(Self::convert_piece_to_loc_piece).collect();
                Ok(Loc::Pieces(pieces?))
            }
        }
    }

    /// Pieceを Loc に変換する（単一ピース用）
    fn convert_piece<R: Reader>(piece: &Piece<R>) -> Result<Loc> {
        match piece.location {
            Location::Empty => Ok(Loc::Empty),
            Location::Register { register } => Ok(Loc::Reg { reg: register.0 }),
            Location::Address { address } => {
                let size = piece.size_in_bits.map(|b| (b / 8) as usize).unwrap_or(8);
                Ok(Loc::Addr { addr: address, size })
            }
            _ => Err(anyhow::anyhow!("Unsupported piece location")),
        }
    }

    /// Pieceを LocPiece に変換する（複数ピース用）
    fn convert_piece_to_loc_piece<R: Reader>(piece: &Piece<R>) -> Result<LocPiece> {
        let location = match piece.location {
            Location::Register { register } => LocPieceLocation::Reg(register.0),
            Location::Address { address } => LocPieceLocation::Addr(address),
            Location::Empty => return Err(anyhow::anyhow!("Empty piece location")),
            _ => return Err(anyhow::anyhow!("Unsupported piece location")),
        };

        Ok(LocPiece {
            size_in_bits: piece.size_in_bits.unwrap_or(0),
            bit_offset: piece.bit_offset,
            location,
        })
    }
}
