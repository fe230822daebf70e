//! 読み込んだバイナリに対する戻り値ロケーションの問い合わせ

use anyhow::Result;
use retloc_dwarf::{
    DwarfLoader, DwarfTypeModel, FunctionEntry, FunctionFinder, Loc, LocPieceLocation,
    LocationEvaluator,
};
use retloc_ppc64::registers::RETURN_GPR;
use retloc_ppc64::{describe, register_name, ClassifierConfig, Outcome, ReturnValueClassifier};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// 1関数分の分類結果
#[derive(Debug, Clone)]
pub struct FunctionReport {
    /// 関数名
    pub name: String,
    /// .debug_info 内のユニット先頭オフセット
    pub unit_offset: Option<usize>,
    /// ユニット内の DIE オフセット
    pub die_offset: usize,
    /// 分類結果
    pub outcome: Outcome,
}

impl FunctionReport {
    /// ロケーションの短い表示
    pub fn location_text(&self) -> String {
        match self.outcome {
            Outcome::NoValue => "void".to_string(),
            Outcome::Location(descriptor) => describe(descriptor),
            Outcome::Unresolvable => "<unresolvable>".to_string(),
            Outcome::Unsupported => "<unsupported>".to_string(),
        }
    }

    /// DWARF式のバイト列（16進）
    pub fn expression_text(&self) -> Option<String> {
        let descriptor = self.outcome.location()?;
        let bytes = descriptor.to_expression_bytes().ok()?;
        let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        Some(format!("{} [{}]", descriptor, hex.join(" ")))
    }

    /// DIE の位置（.debug_info 内）
    pub fn offset_text(&self) -> String {
        match self.unit_offset {
            Some(unit) => format!("unit 0x{:x}, die 0x{:x}", unit, self.die_offset),
            None => format!("die 0x{:x}", self.die_offset),
        }
    }
}

/// 評価済みロケーションを表示用に整形する
pub fn format_loc(loc: &Loc) -> String {
    let place = |location: &LocPieceLocation| match *location {
        LocPieceLocation::Reg(reg) => register_name(gimli::Register(reg)),
        LocPieceLocation::Addr(addr) => format!("memory at 0x{:x}", addr),
    };
    match loc {
        Loc::Reg { reg } => register_name(gimli::Register(*reg)),
        Loc::Addr { addr, .. } => format!("memory at 0x{:x}", addr),
        Loc::Pieces(pieces) => pieces
            .iter()
            .map(|p| format!("{} ({} bytes)", place(&p.location), p.size_in_bits / 8))
            .collect::<Vec<_>>()
            .join(", "),
        Loc::Empty => "<none>".to_string(),
    }
}

impl fmt::Display for FunctionReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:<40} {}", self.name, self.location_text())
    }
}

/// バイナリ1つ分の問い合わせ窓口
pub struct Inspector {
    loader: DwarfLoader,
    classifier: ReturnValueClassifier,
}

impl Inspector {
    /// バイナリを読み込む
    pub fn load<P: AsRef<Path>>(path: P, config: ClassifierConfig) -> Result<Self> {
        let loader = DwarfLoader::load(path)?;
        if !loader.is_ppc64() {
            warn!(
                "Binary architecture is {:?}; return locations follow the PPC64 ABI",
                loader.architecture()
            );
        }
        Ok(Self {
            loader,
            classifier: ReturnValueClassifier::new(config),
        })
    }

    /// 呼び出し直後の r3 の値から戻り値の具体的な位置を求める
    ///
    /// 戻り値なし・分類できない場合は None。
    pub fn evaluate(&self, report: &FunctionReport, r3: u64) -> Result<Option<Loc>> {
        let Some(descriptor) = report.outcome.location() else {
            return Ok(None);
        };
        let evaluator = LocationEvaluator::new(self.loader.address_size());
        let loc = evaluator.evaluate(descriptor, |reg| {
            if reg == RETURN_GPR.0 {
                Ok(r3)
            } else {
                Err(anyhow::anyhow!("No value for register {}", reg))
            }
        })?;
        Ok(Some(loc))
    }

    /// 名前が一致する関数を分類する
    pub fn query(&self, name: &str) -> Result<Vec<FunctionReport>> {
        self.collect(|f| f.matches(name))
    }

    /// パターンを含む関数（None なら全関数）を分類する
    pub fn list(&self, pattern: Option<&str>) -> Result<Vec<FunctionReport>> {
        self.collect(|f| pattern.map_or(true, |p| f.contains(p)))
    }

    /// アドレスを含む関数を分類する
    pub fn at(&self, pc: u64) -> Result<Option<FunctionReport>> {
        let dwarf = self.loader.dwarf();
        let mut iter = dwarf.units();
        while let Some(header) = iter.next()? {
            let unit_offset = header.offset().as_debug_info_offset().map(|o| o.0);
            let unit = dwarf.unit(header)?;
            let Some(offset) = FunctionFinder::find_at_pc(dwarf, &unit, pc)? else {
                continue;
            };

            let name = FunctionFinder::functions(dwarf, &unit)?
                .into_iter()
                .find(|f| f.offset == offset)
                .map(|f| f.display_name().to_string())
                .unwrap_or_else(|| format!("<0x{:x}>", pc));
            let model = DwarfTypeModel::new(&unit);
            return Ok(Some(FunctionReport {
                name,
                unit_offset,
                die_offset: offset.0,
                outcome: self.classifier.classify(&model, model.die(offset)),
            }));
        }
        Ok(None)
    }

    /// 条件に合う関数を全ユニットから集めて分類する
    fn collect<F>(&self, mut filter: F) -> Result<Vec<FunctionReport>>
    where
        F: FnMut(&FunctionEntry<usize>) -> bool,
    {
        let dwarf = self.loader.dwarf();
        let mut reports = Vec::new();

        let mut iter = dwarf.units();
        while let Some(header) = iter.next()? {
            let unit_offset = header.offset().as_debug_info_offset().map(|o| o.0);
            let unit = dwarf.unit(header)?;
            let model = DwarfTypeModel::new(&unit);

            for function in FunctionFinder::functions(dwarf, &unit)? {
                if !filter(&function) {
                    continue;
                }
                let outcome = self.classifier.classify(&model, model.die(function.offset));
                debug!("{} -> {:?}", function.display_name(), outcome);
                reports.push(FunctionReport {
                    name: function.display_name().to_string(),
                    unit_offset,
                    die_offset: function.offset.0,
                    outcome,
                });
            }
        }

        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retloc_dwarf::LocPiece;
    use retloc_ppc64::{AGGREGATE, FLOAT_REGISTER_PAIR};

    fn report(outcome: Outcome) -> FunctionReport {
        FunctionReport {
            name: "f".to_string(),
            unit_offset: Some(0),
            die_offset: 0x2a,
            outcome,
        }
    }

    #[test]
    fn test_location_text() {
        assert_eq!(report(Outcome::NoValue).location_text(), "void");
        assert_eq!(report(Outcome::Location(&AGGREGATE)).location_text(), "[r3]");
        assert_eq!(
            report(Outcome::Location(&FLOAT_REGISTER_PAIR)).location_text(),
            "f1:f2"
        );
        assert_eq!(report(Outcome::Unsupported).location_text(), "<unsupported>");
    }

    #[test]
    fn test_expression_text() {
        assert_eq!(
            report(Outcome::Location(&AGGREGATE)).expression_text().unwrap(),
            "DW_OP_breg3 0 [73 00]"
        );
        assert!(report(Outcome::Unresolvable).expression_text().is_none());
    }

    #[test]
    fn test_offset_text() {
        assert_eq!(report(Outcome::NoValue).offset_text(), "unit 0x0, die 0x2a");
    }

    #[test]
    fn test_format_loc() {
        assert_eq!(format_loc(&Loc::Reg { reg: 3 }), "r3");
        assert_eq!(
            format_loc(&Loc::Addr {
                addr: 0x3fff_fff0,
                size: 8
            }),
            "memory at 0x3ffffff0"
        );
        let pieces = Loc::Pieces(vec![
            LocPiece {
                size_in_bits: 64,
                bit_offset: None,
                location: LocPieceLocation::Reg(33),
            },
            LocPiece {
                size_in_bits: 64,
                bit_offset: None,
                location: LocPieceLocation::Reg(34),
            },
        ]);
        assert_eq!(format_loc(&pieces), "f1 (8 bytes), f2 (8 bytes)");
    }
}
