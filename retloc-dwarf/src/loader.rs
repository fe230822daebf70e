//! ELFとDWARFの読み込み機能

use crate::Result;
use object::{Object, ObjectSection};
use std::fs;
use std::path::Path;

/// DWARFローダー
pub struct DwarfLoader {
    /// オブジェクトファイル
    object_file: object::File<'static>,
    /// DWARFコンテキスト
    dwarf: gimli::Dwarf<gimli::EndianSlice<'static, gimli::RunTimeEndian>>,
}

impl DwarfLoader {
    /// オブジェクトファイルからDWARF情報を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file_data = fs::read(path)
            .map_err(|e| anyhow::anyhow!("Failed to read file {:?}: {}", path, e))?;

        // DWARFのスライスをローダーと同じ寿命で持つため'staticにする
        let file_data: &'static [u8] = Box::leak(file_data.into_boxed_slice());

        let object_file = object::File::parse(file_data)
            .map_err(|e| anyhow::anyhow!("Failed to parse object file {:?}: {}", path, e))?;

        // ppc64 はビッグエンディアン（ELFv1）とリトルエンディアン（ELFv2）の両方がある
        let endian = if object_file.is_little_endian() {
            gimli::RunTimeEndian::Little
        } else {
            gimli::RunTimeEndian::Big
        };

        type Section = gimli::EndianSlice<'static, gimli::RunTimeEndian>;
        let load_section = |id: gimli::SectionId| -> Result<Section> {
            let data = object_file
                .section_by_name(id.name())
                .and_then(|section| section.data().ok())
                .unwrap_or(&[]);
            Ok(gimli::EndianSlice::new(data, endian))
        };

        let dwarf = gimli::Dwarf::load(load_section)
            .map_err(|e| anyhow::anyhow!("Failed to load DWARF sections: {}", e))?;

        tracing::debug!(
            "Loaded {:?} ({:?}, {:?})",
            path,
            object_file.architecture(),
            endian
        );

        Ok(Self { object_file, dwarf })
    }

    /// DWARFコンテキストへの参照を取得
    pub fn dwarf(&self) -> &gimli::Dwarf<gimli::EndianSlice<'static, gimli::RunTimeEndian>> {
        &self.dwarf
    }

    /// ターゲットアーキテクチャ
    pub fn architecture(&self) -> object::Architecture {
        self.object_file.architecture()
    }

    /// 64-bit PowerPC のバイナリかどうか
    pub fn is_ppc64(&self) -> bool {
        self.architecture() == object::Architecture::PowerPc64
    }

    /// アドレス幅（バイト）
    pub fn address_size(&self) -> u8 {
        if self.object_file.is_64() {
            8
        } else {
            4
        }
    }
}
